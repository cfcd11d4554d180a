use anyhow::Result;
use clap::Parser;
use lm_runner::envconfig::{self, EnvConfig};
use lm_runner::{load_model, logging, GenerationOptions, InferenceRunner, LoadOptions};
use std::io::{self, Write};

#[derive(Parser)]
#[command(name = "lm-runner")]
#[command(version)]
#[command(about = "Load a causal language model and generate text from a prompt")]
struct Args {
    /// Checkpoint directory or hub model id [env: MODEL_PATH] [default: gpt2]
    model: Option<String>,

    #[arg(long, default_value_t = 50)]
    max_new_tokens: usize,

    /// Seed for sampling; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Run on CPU even if an accelerator is available
    #[arg(long)]
    cpu: bool,
}

fn read_prompt() -> Result<String> {
    print!("💬 Enter your prompt: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let spec = envconfig::model_path(args.model.as_deref());
    let options = LoadOptions { force_cpu: args.cpu };
    let mut loaded = load_model(&spec, &options, &EnvConfig::from_env())?;
    loaded.report()?;

    let prompt = read_prompt()?;

    let generation = GenerationOptions {
        max_new_tokens: args.max_new_tokens,
        seed: args.seed,
        ..GenerationOptions::default()
    };
    InferenceRunner::new(loaded.tokenizer.as_ref(), loaded.model.as_mut())
        .with_options(generation)
        .run(&prompt, &mut io::stdout().lock())?;

    Ok(())
}
