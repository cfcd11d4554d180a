use super::ModelMeta;
use crate::core::{Result, TokenId};
use candle_core::{Device, Tensor};

pub trait CausalLM: Send {
    /// Runs `tokens` starting at absolute position `start_pos` and returns the
    /// logits of the last position as a `[vocab_size]` tensor.
    ///
    /// Keys and values are cached, so after the prompt only the newly sampled
    /// token needs to be passed in.
    fn forward(&mut self, tokens: &[TokenId], start_pos: usize) -> Result<Tensor>;

    fn clear_cache(&mut self);

    fn meta(&self) -> &ModelMeta;
    fn device(&self) -> &Device;
    fn eos_token(&self) -> Option<TokenId>;
}
