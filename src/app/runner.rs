use crate::core::{CausalLM, DecodeOptions, GenerateError, Result, TokenId, Tokenizer};
use crate::format::seconds;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use std::io::Write;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub max_new_tokens: usize,
    pub top_k: usize,
    pub top_p: f64,
    pub temperature: f64,
    /// Fixed seed for reproducible sampling; a fresh random seed otherwise.
    pub seed: Option<u64>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_new_tokens: 50,
            top_k: 50,
            top_p: 0.95,
            temperature: 1.0,
            seed: None,
        }
    }
}

impl GenerationOptions {
    pub fn sampling(&self) -> Sampling {
        if self.temperature <= 0.0 {
            Sampling::ArgMax
        } else {
            Sampling::TopKThenTopP {
                k: self.top_k,
                p: self.top_p,
                temperature: self.temperature,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// Prompt and continuation decoded together, special tokens removed.
    pub text: String,
    pub prompt_tokens: usize,
    pub generated: Vec<TokenId>,
    pub elapsed: Duration,
}

impl GenerationOutput {
    pub fn tokens_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.generated.len() as f64 / secs
        } else {
            0.0
        }
    }
}

pub struct InferenceRunner<'a> {
    tokenizer: &'a dyn Tokenizer,
    model: &'a mut dyn CausalLM,
    options: GenerationOptions,
}

impl<'a> InferenceRunner<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer, model: &'a mut dyn CausalLM) -> Self {
        Self {
            tokenizer,
            model,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn max_new_tokens(mut self, max: usize) -> Self {
        self.options.max_new_tokens = max;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = Some(seed);
        self
    }

    pub fn generate(&mut self, prompt: &str) -> Result<GenerationOutput> {
        let prompt_ids = self.tokenizer.encode(prompt)?;
        if prompt_ids.is_empty() {
            return Err(GenerateError::EmptyPrompt.into());
        }
        let context = self.model.meta().context_length;
        if prompt_ids.len() > context {
            return Err(GenerateError::PromptTooLong {
                prompt: prompt_ids.len(),
                context,
            }
            .into());
        }

        let eos = self.model.eos_token().or_else(|| self.tokenizer.eos_token());
        let seed = self.options.seed.unwrap_or_else(rand::random);
        let mut logits_processor = LogitsProcessor::from_sampling(seed, self.options.sampling());
        let max_new_tokens = self.options.max_new_tokens;

        tracing::debug!(prompt_tokens = prompt_ids.len(), seed, max_new_tokens, "generating");

        self.model.clear_cache();
        let start = Instant::now();
        let mut generated = Vec::with_capacity(max_new_tokens);

        if max_new_tokens > 0 {
            let mut logits = self.model.forward(&prompt_ids, 0)?;
            let mut pos = prompt_ids.len();
            loop {
                let next = TokenId(logits_processor.sample(&logits)?);
                if Some(next) == eos {
                    break;
                }
                generated.push(next);
                if generated.len() >= max_new_tokens {
                    break;
                }
                if pos >= context {
                    tracing::warn!(context, "context window full, stopping early");
                    break;
                }
                logits = self.model.forward(&[next], pos)?;
                pos += 1;
            }
        }
        let elapsed = start.elapsed();

        let all: Vec<TokenId> = prompt_ids.iter().chain(generated.iter()).copied().collect();
        let text = self
            .tokenizer
            .decode_with_options(&all, &DecodeOptions::new().skip_special())?;

        Ok(GenerationOutput {
            text,
            prompt_tokens: prompt_ids.len(),
            generated,
            elapsed,
        })
    }

    /// Generates for `prompt` and writes the timing and the decoded text.
    pub fn run<W: Write>(&mut self, prompt: &str, out: &mut W) -> Result<GenerationOutput> {
        writeln!(
            out,
            "\n⚙️ Running inference (max_new_tokens={})...",
            self.options.max_new_tokens
        )?;
        let output = self.generate(prompt)?;
        tracing::info!(
            generated = output.generated.len(),
            tokens_per_second = output.tokens_per_second(),
            "generation finished"
        );
        writeln!(out, "🕒 Inference time: {}s\n", seconds(output.elapsed))?;
        writeln!(out, "🧠 Output:")?;
        writeln!(out, "{}", output.text)?;
        out.flush()?;
        Ok(output)
    }
}
