pub mod app;
pub mod core;
pub mod discover;
pub mod envconfig;
pub mod format;
pub mod infra;
pub mod logging;
pub mod progress;

pub use crate::core::{
    CausalLM, DecodeOptions, DeviceKind, GenerateError, Gpt2Config, LoadError, ModelMeta, Result,
    TokenId, Tokenizer,
};

pub use crate::app::{
    load_checkpoint, load_model, GenerationOptions, GenerationOutput, InferenceRunner,
    LoadOptions, LoadedModel,
};

pub use crate::infra::{Checkpoint, HubClient};
