pub mod architectures;
pub mod config;
pub mod traits;

pub use config::{Gpt2Config, Gpt2ConfigBuilder};
pub use traits::CausalLM;

use candle_core::DType;

#[derive(Debug, Clone)]
pub struct ModelMeta {
    pub name: String,
    pub architecture: String,
    pub parameter_count: u64,
    pub context_length: usize,
    pub vocab_size: usize,
    pub dtype: DType,
}

impl ModelMeta {
    /// Bytes held by the weights once placed on the device.
    pub fn weight_bytes(&self) -> u64 {
        self.parameter_count * self.dtype.size_in_bytes() as u64
    }
}

impl Default for ModelMeta {
    fn default() -> Self {
        Self {
            name: String::new(),
            architecture: "gpt2".to_string(),
            parameter_count: 0,
            context_length: 1024,
            vocab_size: 50257,
            dtype: DType::F32,
        }
    }
}
