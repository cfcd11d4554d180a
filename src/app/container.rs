use crate::app::loader::load_checkpoint;
use crate::core::{CausalLM, DeviceKind, Result, Tokenizer};
use crate::infra::Checkpoint;
use std::path::Path;

/// Where the serving image bakes its checkpoint.
pub const CONTAINER_MODEL_PATH: &str = "/app/models/gpt2";

/// Loads the tokenizer and model baked into the container image.
pub fn load_model() -> Result<(Box<dyn Tokenizer>, Box<dyn CausalLM>)> {
    load_model_from(Path::new(CONTAINER_MODEL_PATH))
}

/// Same as [`load_model`] for a checkpoint directory somewhere else. The
/// directory is used as is; nothing is fetched from the hub.
pub fn load_model_from(dir: &Path) -> Result<(Box<dyn Tokenizer>, Box<dyn CausalLM>)> {
    println!("Loading GPT-2 model from {}", dir.display());
    let checkpoint = Checkpoint::from_dir(dir)?;
    load_checkpoint(&checkpoint, DeviceKind::detect())
}
