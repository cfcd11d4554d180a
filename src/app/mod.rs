pub mod container;
pub mod loader;
pub mod runner;

pub use loader::{load_checkpoint, load_model, LoadOptions, LoadedModel};
pub use runner::{GenerationOptions, GenerationOutput, InferenceRunner};
