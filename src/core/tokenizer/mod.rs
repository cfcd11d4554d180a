pub mod bpe;
pub mod hf;
pub mod traits;

pub use bpe::BpeTokenizer;
pub use hf::HfTokenizer;
pub use traits::{DecodeOptions, Tokenizer, TokenizerKind};

use crate::core::error::LoadError;
use crate::core::{Result, TokenId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where a checkpoint keeps its tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerSource {
    Json(PathBuf),
    VocabMerges { vocab: PathBuf, merges: PathBuf },
}

impl TokenizerSource {
    pub fn kind(&self) -> TokenizerKind {
        match self {
            TokenizerSource::Json(_) => TokenizerKind::HuggingFace,
            TokenizerSource::VocabMerges { .. } => TokenizerKind::ByteLevelBpe,
        }
    }
}

pub fn load_tokenizer(source: &TokenizerSource) -> Result<Box<dyn Tokenizer>> {
    tracing::debug!(?source, "loading tokenizer");
    let tokenizer: Box<dyn Tokenizer> = match source {
        TokenizerSource::Json(path) => Box::new(HfTokenizer::from_file(path)?),
        TokenizerSource::VocabMerges { vocab, merges } => {
            Box::new(BpeTokenizer::new(Vocabulary::from_files(vocab, merges)?)?)
        }
    };
    Ok(tokenizer)
}

#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    pub tokens: HashMap<String, u32>,
    pub merges: Vec<String>,
    pub special_tokens: Vec<String>,
    pub eos_token: Option<TokenId>,
}

impl Vocabulary {
    pub fn from_files(vocab_path: &Path, merges_path: &Path) -> Result<Self> {
        let tokenizer_err = |path: &Path, reason: String| LoadError::Tokenizer {
            path: path.to_path_buf(),
            reason,
        };

        let raw = std::fs::read(vocab_path)?;
        let tokens: HashMap<String, u32> =
            serde_json::from_slice(&raw).map_err(|e| tokenizer_err(vocab_path, e.to_string()))?;

        let merges = std::fs::read_to_string(merges_path)?
            .lines()
            .filter(|l| !l.is_empty() && !l.starts_with("#version"))
            .map(String::from)
            .collect::<Vec<_>>();
        if tokens.is_empty() {
            return Err(tokenizer_err(vocab_path, "vocabulary is empty".to_string()).into());
        }

        let special_tokens: Vec<String> = tokens
            .keys()
            .filter(|t| t.len() > 4 && t.starts_with("<|") && t.ends_with("|>"))
            .cloned()
            .collect();
        let eos_token = tokens.get("<|endoftext|>").copied().map(TokenId);

        Ok(Self {
            tokens,
            merges,
            special_tokens,
            eos_token,
        })
    }
}
