use candle_core::Device;
use lm_runner::core::model::architectures::Gpt2Model;
use lm_runner::core::tokenizer::BpeTokenizer;
use lm_runner::Gpt2Config;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const EOS_ID: u32 = 258;

/// A throwaway checkpoint directory, removed on drop.
pub struct TinyCheckpoint {
    pub dir: PathBuf,
}

impl TinyCheckpoint {
    pub fn config() -> Gpt2Config {
        Gpt2Config::builder()
            .vocab_size(259)
            .n_positions(32)
            .n_embd(16)
            .n_layer(2)
            .n_head(2)
            .eos_token_id(Some(EOS_ID))
            .build()
    }

    pub fn create() -> Self {
        Self::build(true)
    }

    /// Neither the config nor the vocabulary names an end-of-sequence token,
    /// so generation only stops at its bounds.
    pub fn create_without_eos() -> Self {
        Self::build(false)
    }

    fn build(with_eos: bool) -> Self {
        let dir = std::env::temp_dir().join(format!("lm-runner-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut config = Self::config();
        if !with_eos {
            config.eos_token_id = None;
        }
        std::fs::write(dir.join("config.json"), serde_json::to_vec_pretty(&config).unwrap()).unwrap();

        let weights = Gpt2Model::init_weights(&config, &Device::Cpu).unwrap();
        candle_core::safetensors::save(&weights, dir.join("model.safetensors")).unwrap();

        write_tokenizer(&dir, with_eos);
        Self { dir }
    }

    pub fn path(&self) -> String {
        self.dir.to_string_lossy().into_owned()
    }
}

impl Drop for TinyCheckpoint {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn write_tokenizer(dir: &Path, with_eos: bool) {
    let mut vocab: HashMap<String, u32> = BpeTokenizer::byte_alphabet()
        .into_iter()
        .enumerate()
        .map(|(i, c)| (c.to_string(), i as u32))
        .collect();
    vocab.insert("Ġt".to_string(), 256);
    vocab.insert("he".to_string(), 257);
    if with_eos {
        vocab.insert("<|endoftext|>".to_string(), EOS_ID);
    }

    std::fs::write(dir.join("vocab.json"), serde_json::to_vec(&vocab).unwrap()).unwrap();
    std::fs::write(dir.join("merges.txt"), "#version: 0.2\nĠ t\nh e\n").unwrap();
}
