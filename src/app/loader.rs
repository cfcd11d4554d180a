use crate::core::model::architectures::Gpt2Model;
use crate::core::tokenizer::load_tokenizer;
use crate::core::{CausalLM, DeviceKind, Gpt2Config, Result, Tokenizer};
use crate::discover::MemoryUsage;
use crate::envconfig::EnvConfig;
use crate::format::{gigabytes, human_bytes, human_number, seconds};
use crate::infra::{resolve, Checkpoint, HubClient, WeightFiles};
use crate::progress::Progress;
use candle_core::DType;
use candle_nn::VarBuilder;
use std::io::{self, Write};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Stay on the CPU even when an accelerator is present.
    pub force_cpu: bool,
}

pub struct LoadedModel {
    pub tokenizer: Box<dyn Tokenizer>,
    pub model: Box<dyn CausalLM>,
    pub device: DeviceKind,
    pub load_time: Duration,
    pub checkpoint: Checkpoint,
}

/// Loads the tokenizer and weights of an already resolved checkpoint onto
/// `device`. Nothing is printed.
pub fn load_checkpoint(
    checkpoint: &Checkpoint,
    device: DeviceKind,
) -> Result<(Box<dyn Tokenizer>, Box<dyn CausalLM>)> {
    let tokenizer = load_tokenizer(&checkpoint.tokenizer)?;
    let config = Gpt2Config::from_file(&checkpoint.config)?;
    let candle_device = device.to_candle()?;

    let vb = match &checkpoint.weights {
        WeightFiles::Safetensors(files) => {
            // SAFETY: the files are memory-mapped read-only and must not be
            // modified while the model is alive.
            unsafe { VarBuilder::from_mmaped_safetensors(files, DType::F32, &candle_device)? }
        }
        WeightFiles::Pytorch(path) => VarBuilder::from_pth(path, DType::F32, &candle_device)?,
    };

    let name = checkpoint
        .dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gpt2".to_string());
    let model = Gpt2Model::load(vb, config, &name)?;

    if tokenizer.vocab_size() > model.meta().vocab_size {
        anyhow::bail!(
            "tokenizer in {} has {} tokens but the model only embeds {}",
            checkpoint.dir.display(),
            tokenizer.vocab_size(),
            model.meta().vocab_size
        );
    }

    Ok((tokenizer, Box::new(model)))
}

/// Resolves `spec` (a checkpoint directory or hub model id), loads it onto the
/// best available device and reports how long that took.
pub fn load_model(spec: &str, options: &LoadOptions, env: &EnvConfig) -> Result<LoadedModel> {
    println!("🔍 Loading model from: {}", spec);

    let start = Instant::now();
    let checkpoint = resolve(spec, &HubClient::from_env(env))?;
    let device = if options.force_cpu {
        DeviceKind::Cpu
    } else {
        DeviceKind::detect()
    };

    let mut progress = Progress::new();
    progress.spinner("Loading weights...");
    let (tokenizer, model) = load_checkpoint(&checkpoint, device)?;
    progress.stop_and_clear();
    let load_time = start.elapsed();

    tracing::info!(
        dir = %checkpoint.dir.display(),
        %device,
        tokenizer = ?checkpoint.tokenizer.kind(),
        secs = load_time.as_secs_f64(),
        "model loaded"
    );

    Ok(LoadedModel {
        tokenizer,
        model,
        device,
        load_time,
        checkpoint,
    })
}

fn loaded_line(device: DeviceKind, load_time: Duration) -> String {
    format!(
        "✅ Model loaded on {} in {} seconds",
        device.name().to_uppercase(),
        seconds(load_time)
    )
}

impl LoadedModel {
    pub fn memory_usage(&self) -> MemoryUsage {
        MemoryUsage::probe(self.device, self.model.meta().weight_bytes())
    }

    pub fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let meta = self.model.meta();
        let usage = self.memory_usage();

        writeln!(out, "{}", loaded_line(self.device, self.load_time))?;
        writeln!(
            out,
            "📦 Weights: {} ({} parameters)",
            gigabytes(usage.weights),
            human_number(meta.parameter_count)
        )?;
        if self.device.is_accelerator() {
            writeln!(out, "💽 GPU memory allocated: {}", gigabytes(usage.weights))?;
            if let Some(used) = usage.device_used {
                writeln!(out, "💽 GPU memory in use: {}", gigabytes(used))?;
            }
        }
        if let Some(resident) = usage.resident {
            writeln!(out, "🧮 Process memory: {}", human_bytes(resident))?;
        }
        Ok(())
    }

    pub fn report(&self) -> io::Result<()> {
        self.write_report(&mut io::stdout().lock())
    }
}
