use super::traits::{DecodeOptions, Tokenizer};
use super::Vocabulary;
use crate::core::{Result, TokenId};
use std::collections::HashMap;

const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// GPT-2 style byte-level BPE.
pub struct BpeTokenizer {
    encoder: HashMap<String, TokenId>,
    decoder: HashMap<TokenId, String>,
    bpe_ranks: HashMap<(String, String), usize>,
    byte_encoder: HashMap<u8, char>,
    byte_decoder: HashMap<char, u8>,
    special: Vec<(String, TokenId)>,
    eos_token: Option<TokenId>,
    pattern: fancy_regex::Regex,
}

impl BpeTokenizer {
    pub fn new(vocab: Vocabulary) -> Result<Self> {
        let byte_encoder = Self::build_byte_encoder();
        let byte_decoder: HashMap<char, u8> = byte_encoder.iter().map(|(&k, &v)| (v, k)).collect();

        let mut encoder = HashMap::new();
        let mut decoder = HashMap::new();
        for (token, &id) in vocab.tokens.iter() {
            encoder.insert(token.clone(), TokenId(id));
            decoder.insert(TokenId(id), token.clone());
        }

        let mut bpe_ranks = HashMap::new();
        for (i, merge) in vocab.merges.iter().enumerate() {
            let parts: Vec<&str> = merge.split(' ').collect();
            if parts.len() == 2 {
                bpe_ranks.insert((parts[0].to_string(), parts[1].to_string()), i);
            }
        }

        // Longest first so overlapping specials match greedily.
        let mut special: Vec<(String, TokenId)> = vocab
            .special_tokens
            .iter()
            .filter_map(|t| encoder.get(t).map(|&id| (t.clone(), id)))
            .collect();
        special.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let pattern = fancy_regex::Regex::new(GPT2_PATTERN)?;

        Ok(Self {
            encoder,
            decoder,
            bpe_ranks,
            byte_encoder,
            byte_decoder,
            special,
            eos_token: vocab.eos_token,
            pattern,
        })
    }

    /// The 256 printable characters GPT-2 maps raw bytes onto, indexed by byte.
    pub fn byte_alphabet() -> Vec<char> {
        let encoder = Self::build_byte_encoder();
        (0..=255u8).map(|b| encoder[&b]).collect()
    }

    fn build_byte_encoder() -> HashMap<u8, char> {
        let mut mapping = HashMap::new();
        for b in (b'!'..=b'~').chain(0xA1..=0xAC).chain(0xAE..=0xFF) {
            mapping.insert(b, char::from(b));
        }

        let mut offset: u32 = 256;
        for b in 0..=255u8 {
            if let std::collections::hash_map::Entry::Vacant(e) = mapping.entry(b) {
                // 256.. are all valid scalar values
                e.insert(char::from_u32(offset).unwrap_or(char::REPLACEMENT_CHARACTER));
                offset += 1;
            }
        }

        mapping
    }

    fn get_pairs(word: &[String]) -> Vec<(String, String)> {
        word.windows(2)
            .map(|w| (w[0].clone(), w[1].clone()))
            .collect()
    }

    fn bpe(&self, token: &str) -> Vec<String> {
        let mut word: Vec<String> = token.chars().map(|c| c.to_string()).collect();

        loop {
            let pairs = Self::get_pairs(&word);
            let bigram = pairs
                .iter()
                .filter_map(|pair| self.bpe_ranks.get(pair).map(|&rank| (pair, rank)))
                .min_by_key(|(_, rank)| *rank)
                .map(|(pair, _)| pair.clone());

            let bigram = match bigram {
                Some(b) => b,
                None => break,
            };

            let mut new_word = Vec::with_capacity(word.len());
            let mut i = 0;
            while i < word.len() {
                if i + 1 < word.len() && word[i] == bigram.0 && word[i + 1] == bigram.1 {
                    new_word.push(format!("{}{}", word[i], word[i + 1]));
                    i += 2;
                } else {
                    new_word.push(word[i].clone());
                    i += 1;
                }
            }
            word = new_word;
        }
        word
    }

    fn byte_encode(&self, text: &str) -> String {
        text.bytes().map(|b| self.byte_encoder[&b]).collect()
    }

    fn encode_ordinary(&self, text: &str, tokens: &mut Vec<TokenId>) -> Result<()> {
        for piece in self.pattern.find_iter(text) {
            let encoded = self.byte_encode(piece?.as_str());
            for bpe_token in self.bpe(&encoded) {
                match self.encoder.get(&bpe_token) {
                    Some(&id) => tokens.push(id),
                    None => tokens.extend(
                        bpe_token
                            .chars()
                            .filter_map(|c| self.encoder.get(c.to_string().as_str()).copied()),
                    ),
                }
            }
        }
        Ok(())
    }

    fn next_special(&self, text: &str) -> Option<(usize, &str, TokenId)> {
        self.special
            .iter()
            .filter_map(|(s, id)| text.find(s.as_str()).map(|pos| (pos, s.as_str(), *id)))
            .min_by_key(|(pos, _, _)| *pos)
    }

    fn is_special(&self, id: TokenId) -> bool {
        self.special.iter().any(|(_, s)| *s == id)
    }
}

impl Tokenizer for BpeTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        let mut tokens = Vec::new();
        let mut rest = text;
        while let Some((pos, special, id)) = self.next_special(rest) {
            self.encode_ordinary(&rest[..pos], &mut tokens)?;
            tokens.push(id);
            rest = &rest[pos + special.len()..];
        }
        self.encode_ordinary(rest, &mut tokens)?;
        Ok(tokens)
    }

    fn decode_with_options(&self, tokens: &[TokenId], options: &DecodeOptions) -> Result<String> {
        let mut bytes = Vec::new();
        for &token in tokens {
            if options.skip_special_tokens && self.is_special(token) {
                continue;
            }
            if let Some(t) = self.decoder.get(&token) {
                if self.is_special(token) {
                    bytes.extend_from_slice(t.as_bytes());
                } else {
                    bytes.extend(t.chars().filter_map(|c| self.byte_decoder.get(&c).copied()));
                }
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn vocab_size(&self) -> usize {
        self.encoder.len()
    }

    fn eos_token(&self) -> Option<TokenId> {
        self.eos_token
    }

    fn token_to_id(&self, token: &str) -> Option<TokenId> {
        self.encoder.get(token).copied()
    }

    fn id_to_token(&self, id: TokenId) -> Option<String> {
        self.decoder.get(&id).cloned()
    }
}
