use crate::core::{Result, TokenId};

pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>>;

    fn decode(&self, tokens: &[TokenId]) -> Result<String> {
        self.decode_with_options(tokens, &DecodeOptions::default())
    }
    fn decode_with_options(&self, tokens: &[TokenId], options: &DecodeOptions) -> Result<String>;

    fn vocab_size(&self) -> usize;
    fn eos_token(&self) -> Option<TokenId>;

    fn token_to_id(&self, token: &str) -> Option<TokenId>;
    fn id_to_token(&self, id: TokenId) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenizerKind {
    /// `vocab.json` + `merges.txt`
    ByteLevelBpe,
    /// `tokenizer.json`
    HuggingFace,
}

#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    pub skip_special_tokens: bool,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_special(mut self) -> Self {
        self.skip_special_tokens = true;
        self
    }
}
