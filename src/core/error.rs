use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(PathBuf),

    #[error("checkpoint {dir} is missing {file}")]
    MissingFile { dir: PathBuf, file: String },

    #[error("invalid model config {path}: {source}")]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model config {path}: {reason}")]
    InvalidConfigValue { path: PathBuf, reason: String },

    #[error("unsupported model type `{0}`, only gpt2 checkpoints can be loaded")]
    UnsupportedArchitecture(String),

    #[error("failed to load tokenizer from {path}: {reason}")]
    Tokenizer { path: PathBuf, reason: String },

    #[error("hub download of {repo}/{file} failed: {reason}")]
    Download {
        repo: String,
        file: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("prompt has {prompt} tokens but the model context is {context}")]
    PromptTooLong { prompt: usize, context: usize },
}
