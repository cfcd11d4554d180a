pub mod device;
pub mod error;
pub mod model;
pub mod tokenizer;

pub use device::DeviceKind;
pub use error::{GenerateError, LoadError};
pub use model::{CausalLM, Gpt2Config, ModelMeta};
pub use tokenizer::{DecodeOptions, Tokenizer};

pub type Result<T> = anyhow::Result<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u32);

impl From<u32> for TokenId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}
