use super::traits::{DecodeOptions, Tokenizer};
use crate::core::error::LoadError;
use crate::core::{Result, TokenId};
use std::path::Path;

const EOS_CANDIDATES: &[&str] = &["<|endoftext|>", "</s>", "<eos>"];

/// A `tokenizer.json` driven through the `tokenizers` crate.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    eos_token: Option<TokenId>,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| LoadError::Tokenizer {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_inner(inner))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_bytes(bytes).map_err(anyhow::Error::msg)?;
        Ok(Self::from_inner(inner))
    }

    fn from_inner(inner: tokenizers::Tokenizer) -> Self {
        let eos_token = EOS_CANDIDATES
            .iter()
            .find_map(|t| inner.token_to_id(t))
            .map(TokenId);
        Self { inner, eos_token }
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        let encoding = self.inner.encode(text, false).map_err(anyhow::Error::msg)?;
        Ok(encoding.get_ids().iter().copied().map(TokenId).collect())
    }

    fn decode_with_options(&self, tokens: &[TokenId], options: &DecodeOptions) -> Result<String> {
        let ids: Vec<u32> = tokens.iter().map(|t| t.0).collect();
        self.inner
            .decode(&ids, options.skip_special_tokens)
            .map_err(anyhow::Error::msg)
    }

    fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    fn eos_token(&self) -> Option<TokenId> {
        self.eos_token
    }

    fn token_to_id(&self, token: &str) -> Option<TokenId> {
        self.inner.token_to_id(token).map(TokenId)
    }

    fn id_to_token(&self, id: TokenId) -> Option<String> {
        self.inner.id_to_token(id.0)
    }
}
