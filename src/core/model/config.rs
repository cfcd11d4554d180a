use crate::core::error::LoadError;
use crate::core::{Result, TokenId};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_model_type() -> String {
    "gpt2".to_string()
}

fn default_vocab_size() -> usize {
    50257
}

fn default_n_positions() -> usize {
    1024
}

fn default_n_embd() -> usize {
    768
}

fn default_n_layer() -> usize {
    12
}

fn default_n_head() -> usize {
    12
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

fn default_eos_token_id() -> Option<u32> {
    Some(50256)
}

/// Hyperparameters read from a checkpoint's `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gpt2Config {
    #[serde(default = "default_model_type")]
    pub model_type: String,
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "default_n_positions")]
    pub n_positions: usize,
    #[serde(default = "default_n_embd")]
    pub n_embd: usize,
    #[serde(default = "default_n_layer")]
    pub n_layer: usize,
    #[serde(default = "default_n_head")]
    pub n_head: usize,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
    #[serde(default = "default_eos_token_id")]
    pub eos_token_id: Option<u32>,
}

impl Default for Gpt2Config {
    fn default() -> Self {
        Self::gpt2_small()
    }
}

impl Gpt2Config {
    pub fn gpt2_small() -> Self {
        Self {
            model_type: default_model_type(),
            vocab_size: default_vocab_size(),
            n_positions: default_n_positions(),
            n_embd: default_n_embd(),
            n_layer: default_n_layer(),
            n_head: default_n_head(),
            layer_norm_epsilon: default_layer_norm_epsilon(),
            eos_token_id: default_eos_token_id(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&raw).map_err(|source| LoadError::InvalidConfig {
            path: path.to_path_buf(),
            source,
        })?;
        if config.model_type != "gpt2" {
            return Err(LoadError::UnsupportedArchitecture(config.model_type).into());
        }
        config.validate().map_err(|reason| LoadError::InvalidConfigValue {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    /// Checks the hyperparameters the model shapes depend on.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.vocab_size == 0 {
            return Err("vocab_size must be positive".to_string());
        }
        if self.n_positions == 0 {
            return Err("n_positions must be positive".to_string());
        }
        if self.n_embd == 0 || self.n_layer == 0 {
            return Err("n_embd and n_layer must be positive".to_string());
        }
        if self.n_head == 0 {
            return Err("n_head must be positive".to_string());
        }
        if self.n_embd % self.n_head != 0 {
            return Err(format!(
                "n_embd ({}) is not divisible by n_head ({})",
                self.n_embd, self.n_head
            ));
        }
        if !(self.layer_norm_epsilon.is_finite() && self.layer_norm_epsilon > 0.0) {
            return Err(format!("layer_norm_epsilon {} is not positive", self.layer_norm_epsilon));
        }
        Ok(())
    }

    pub fn head_dim(&self) -> usize {
        self.n_embd / self.n_head
    }

    pub fn eos_token(&self) -> Option<TokenId> {
        self.eos_token_id.map(TokenId)
    }

    /// Number of distinct parameters. The LM head shares the token embedding
    /// and is not counted twice.
    pub fn parameter_count(&self) -> u64 {
        let c = self.n_embd as u64;
        let embeddings = (self.vocab_size as u64 + self.n_positions as u64) * c;
        let layer_norm = 2 * c;
        let attn = (c * 3 * c + 3 * c) + (c * c + c);
        let mlp = (c * 4 * c + 4 * c) + (4 * c * c + c);
        let block = 2 * layer_norm + attn + mlp;
        embeddings + self.n_layer as u64 * block + layer_norm
    }

    pub fn builder() -> Gpt2ConfigBuilder {
        Gpt2ConfigBuilder::new()
    }
}

pub struct Gpt2ConfigBuilder {
    config: Gpt2Config,
}

impl Gpt2ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Gpt2Config::default(),
        }
    }

    pub fn vocab_size(mut self, size: usize) -> Self {
        self.config.vocab_size = size;
        self
    }

    pub fn n_positions(mut self, n: usize) -> Self {
        self.config.n_positions = n;
        self
    }

    pub fn n_embd(mut self, n: usize) -> Self {
        self.config.n_embd = n;
        self
    }

    pub fn n_layer(mut self, n: usize) -> Self {
        self.config.n_layer = n;
        self
    }

    pub fn n_head(mut self, n: usize) -> Self {
        self.config.n_head = n;
        self
    }

    pub fn eos_token_id(mut self, id: Option<u32>) -> Self {
        self.config.eos_token_id = id;
        self
    }

    pub fn build(self) -> Gpt2Config {
        self.config
    }
}

impl Default for Gpt2ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
