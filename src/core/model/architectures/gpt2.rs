use crate::core::model::{CausalLM, Gpt2Config, ModelMeta};
use crate::core::{Result, TokenId};
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{embedding, layer_norm, Embedding, LayerNorm, Linear, VarBuilder};
use std::collections::HashMap;

/// GPT-2 stores its projections as `Conv1D`: the weight is laid out
/// `(in, out)`, the transpose of `nn.Linear`.
struct Conv1D {
    weight: Tensor,
    bias: Tensor,
}

impl Conv1D {
    fn load(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get((in_dim, out_dim), "weight")?;
        let bias = vb.get(out_dim, "bias")?;
        Ok(Self { weight, bias })
    }
}

impl Module for Conv1D {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        xs.broadcast_matmul(&self.weight)?.broadcast_add(&self.bias)
    }
}

struct Attention {
    c_attn: Conv1D,
    c_proj: Conv1D,
    n_head: usize,
    head_dim: usize,
    scale: f64,
    kv_cache: Option<(Tensor, Tensor)>,
}

impl Attention {
    fn load(config: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        let c = config.n_embd;
        Ok(Self {
            c_attn: Conv1D::load(c, 3 * c, vb.pp("c_attn"))?,
            c_proj: Conv1D::load(c, c, vb.pp("c_proj"))?,
            n_head: config.n_head,
            head_dim: config.head_dim(),
            scale: 1.0 / (config.head_dim() as f64).sqrt(),
            kv_cache: None,
        })
    }

    fn forward(&mut self, xs: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        let (b, t, c) = xs.dims3()?;
        let (n_head, head_dim) = (self.n_head, self.head_dim);
        let qkv = self.c_attn.forward(xs)?;
        let split = |i: usize| -> candle_core::Result<Tensor> {
            qkv.narrow(D::Minus1, i * c, c)?
                .reshape((b, t, n_head, head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };
        let q = split(0)?;
        let mut k = split(1)?;
        let mut v = split(2)?;

        if let Some((prev_k, prev_v)) = &self.kv_cache {
            k = Tensor::cat(&[prev_k, &k], 2)?;
            v = Tensor::cat(&[prev_v, &v], 2)?;
        }
        self.kv_cache = Some((k.clone(), v.clone()));

        let att = (q.matmul(&k.t()?)? * self.scale)?;
        let att = match mask {
            Some(mask) => {
                let mask = mask.broadcast_as(att.shape())?;
                let neg_inf = Tensor::new(f32::NEG_INFINITY, att.device())?
                    .to_dtype(att.dtype())?
                    .broadcast_as(att.shape())?;
                mask.where_cond(&neg_inf, &att)?
            }
            None => att,
        };
        let att = candle_nn::ops::softmax_last_dim(&att)?;
        let ys = att.matmul(&v)?.transpose(1, 2)?.reshape((b, t, c))?;
        Ok(self.c_proj.forward(&ys)?)
    }
}

struct Mlp {
    c_fc: Conv1D,
    c_proj: Conv1D,
}

impl Mlp {
    fn load(config: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        let c = config.n_embd;
        Ok(Self {
            c_fc: Conv1D::load(c, 4 * c, vb.pp("c_fc"))?,
            c_proj: Conv1D::load(4 * c, c, vb.pp("c_proj"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        // `gelu` is the tanh approximation, which is what GPT-2 was trained with.
        let hidden = self.c_fc.forward(xs)?.gelu()?;
        Ok(self.c_proj.forward(&hidden)?)
    }
}

struct Block {
    ln_1: LayerNorm,
    attn: Attention,
    ln_2: LayerNorm,
    mlp: Mlp,
}

impl Block {
    fn load(config: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        let eps = config.layer_norm_epsilon;
        Ok(Self {
            ln_1: layer_norm(config.n_embd, eps, vb.pp("ln_1"))?,
            attn: Attention::load(config, vb.pp("attn"))?,
            ln_2: layer_norm(config.n_embd, eps, vb.pp("ln_2"))?,
            mlp: Mlp::load(config, vb.pp("mlp"))?,
        })
    }

    fn forward(&mut self, xs: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        let hidden = (xs + self.attn.forward(&self.ln_1.forward(xs)?, mask)?)?;
        let out = (&hidden + self.mlp.forward(&self.ln_2.forward(&hidden)?)?)?;
        Ok(out)
    }
}

pub struct Gpt2Model {
    config: Gpt2Config,
    meta: ModelMeta,
    device: Device,
    wte: Embedding,
    wpe: Embedding,
    blocks: Vec<Block>,
    ln_f: LayerNorm,
    lm_head: Linear,
}

impl Gpt2Model {
    /// Builds the model from a var builder rooted at the checkpoint. Both the
    /// bare `GPT2Model` layout (`wte.weight`) and the `GPT2LMHeadModel`
    /// layout (`transformer.wte.weight`) are accepted.
    pub fn load(vb: VarBuilder, config: Gpt2Config, name: &str) -> Result<Self> {
        if let Err(reason) = config.validate() {
            anyhow::bail!("cannot build {}: {}", name, reason);
        }
        let vb = if vb.contains_tensor("transformer.wte.weight") {
            vb.pp("transformer")
        } else {
            vb
        };
        let device = vb.device().clone();
        let dtype = vb.dtype();

        let wte = embedding(config.vocab_size, config.n_embd, vb.pp("wte"))?;
        let wpe = embedding(config.n_positions, config.n_embd, vb.pp("wpe"))?;
        let blocks = (0..config.n_layer)
            .map(|i| Block::load(&config, vb.pp(format!("h.{}", i))))
            .collect::<Result<Vec<_>>>()?;
        let ln_f = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_f"))?;
        let lm_head = Linear::new(wte.embeddings().clone(), None);

        let meta = ModelMeta {
            name: name.to_string(),
            architecture: "gpt2".to_string(),
            parameter_count: config.parameter_count(),
            context_length: config.n_positions,
            vocab_size: config.vocab_size,
            dtype,
        };

        tracing::debug!(
            layers = config.n_layer,
            embd = config.n_embd,
            heads = config.n_head,
            "built gpt2 model"
        );

        Ok(Self {
            config,
            meta,
            device,
            wte,
            wpe,
            blocks,
            ln_f,
            lm_head,
        })
    }

    /// Freshly initialised weights with the GPT-2 tensor layout: normal(0, 0.02)
    /// for projections and embeddings, unit layer-norm scales, zero biases.
    pub fn init_weights(config: &Gpt2Config, device: &Device) -> Result<HashMap<String, Tensor>> {
        let c = config.n_embd;
        let mut weights = HashMap::new();
        let mut normal = |name: String, shape: (usize, usize)| -> Result<()> {
            weights.insert(name, Tensor::randn(0f32, 0.02, shape, device)?);
            Ok(())
        };
        normal("wte.weight".to_string(), (config.vocab_size, c))?;
        normal("wpe.weight".to_string(), (config.n_positions, c))?;
        for i in 0..config.n_layer {
            let p = format!("h.{}", i);
            normal(format!("{p}.attn.c_attn.weight"), (c, 3 * c))?;
            normal(format!("{p}.attn.c_proj.weight"), (c, c))?;
            normal(format!("{p}.mlp.c_fc.weight"), (c, 4 * c))?;
            normal(format!("{p}.mlp.c_proj.weight"), (4 * c, c))?;
        }

        let mut fill = |name: String, len: usize, value: f32| -> Result<()> {
            weights.insert(name, Tensor::full(value, len, device)?);
            Ok(())
        };
        for i in 0..config.n_layer {
            let p = format!("h.{}", i);
            fill(format!("{p}.attn.c_attn.bias"), 3 * c, 0.0)?;
            fill(format!("{p}.attn.c_proj.bias"), c, 0.0)?;
            fill(format!("{p}.mlp.c_fc.bias"), 4 * c, 0.0)?;
            fill(format!("{p}.mlp.c_proj.bias"), c, 0.0)?;
            for ln in ["ln_1", "ln_2"] {
                fill(format!("{p}.{ln}.weight"), c, 1.0)?;
                fill(format!("{p}.{ln}.bias"), c, 0.0)?;
            }
        }
        fill("ln_f.weight".to_string(), c, 1.0)?;
        fill("ln_f.bias".to_string(), c, 0.0)?;

        Ok(weights)
    }
}

fn causal_mask(t: usize, offset: usize, device: &Device) -> Result<Tensor> {
    let total = t + offset;
    let mask: Vec<u8> = (0..t)
        .flat_map(|i| (0..total).map(move |j| u8::from(j > i + offset)))
        .collect();
    Ok(Tensor::from_slice(&mask, (t, total), device)?)
}

impl CausalLM for Gpt2Model {
    fn forward(&mut self, tokens: &[TokenId], start_pos: usize) -> Result<Tensor> {
        if tokens.is_empty() {
            anyhow::bail!("forward called with no tokens");
        }
        let t = tokens.len();
        if start_pos + t > self.config.n_positions {
            anyhow::bail!(
                "sequence length {} exceeds the model context of {}",
                start_pos + t,
                self.config.n_positions
            );
        }

        let ids: Vec<u32> = tokens.iter().map(|t| t.0).collect();
        let input = Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let positions =
            Tensor::arange(start_pos as u32, (start_pos + t) as u32, &self.device)?.unsqueeze(0)?;

        let mut hidden = (self.wte.forward(&input)? + self.wpe.forward(&positions)?)?;
        let mask = if t > 1 {
            Some(causal_mask(t, start_pos, &self.device)?)
        } else {
            None
        };
        for block in self.blocks.iter_mut() {
            hidden = block.forward(&hidden, mask.as_ref())?;
        }

        let hidden = self.ln_f.forward(&hidden)?;
        let last = hidden.narrow(1, t - 1, 1)?.squeeze(1)?;
        let logits = self.lm_head.forward(&last)?.squeeze(0)?;
        Ok(logits.to_dtype(DType::F32)?)
    }

    fn clear_cache(&mut self) {
        for block in self.blocks.iter_mut() {
            block.attn.kv_cache = None;
        }
    }

    fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn eos_token(&self) -> Option<TokenId> {
        self.config.eos_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_model() -> Gpt2Model {
        let config = Gpt2Config::builder()
            .vocab_size(64)
            .n_positions(16)
            .n_embd(16)
            .n_layer(2)
            .n_head(2)
            .eos_token_id(Some(63))
            .build();
        let device = Device::Cpu;
        let weights = Gpt2Model::init_weights(&config, &device).unwrap();
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        Gpt2Model::load(vb, config, "tiny").unwrap()
    }

    fn ids(raw: &[u32]) -> Vec<TokenId> {
        raw.iter().copied().map(TokenId).collect()
    }

    #[test]
    fn test_logits_cover_vocab() {
        let mut model = tiny_model();
        let logits = model.forward(&ids(&[1, 2, 3]), 0).unwrap();
        assert_eq!(logits.dims(), &[64]);
        assert_eq!(model.meta().vocab_size, 64);
        assert_eq!(model.eos_token(), Some(TokenId(63)));
    }

    #[test]
    fn test_cached_decoding_matches_full_pass() {
        let mut model = tiny_model();
        let full = model.forward(&ids(&[5, 9, 12, 7]), 0).unwrap();

        model.clear_cache();
        model.forward(&ids(&[5, 9, 12]), 0).unwrap();
        let incremental = model.forward(&ids(&[7]), 3).unwrap();

        let diff = (full - incremental)
            .unwrap()
            .abs()
            .unwrap()
            .max(0)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(diff < 1e-4, "max logit difference {}", diff);
    }

    #[test]
    fn test_context_window_is_enforced() {
        let mut model = tiny_model();
        assert!(model.forward(&ids(&[1; 17]), 0).is_err());
        assert!(model.forward(&[], 0).is_err());
    }

    #[test]
    fn test_load_rejects_indivisible_heads() {
        let config = Gpt2Config::builder()
            .vocab_size(32)
            .n_positions(8)
            .n_embd(16)
            .n_layer(1)
            .n_head(3)
            .build();
        let device = Device::Cpu;
        let weights = Gpt2Model::init_weights(&config, &device).unwrap();
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let err = Gpt2Model::load(vb, config, "uneven").err().unwrap();
        assert!(err.to_string().contains("not divisible"));
    }

    #[test]
    fn test_accepts_transformer_prefix() {
        let config = Gpt2Config::builder()
            .vocab_size(32)
            .n_positions(8)
            .n_embd(8)
            .n_layer(1)
            .n_head(2)
            .build();
        let device = Device::Cpu;
        let weights: HashMap<String, Tensor> = Gpt2Model::init_weights(&config, &device)
            .unwrap()
            .into_iter()
            .map(|(k, v)| (format!("transformer.{}", k), v))
            .collect();
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let mut model = Gpt2Model::load(vb, config, "prefixed").unwrap();
        assert_eq!(model.forward(&ids(&[1]), 0).unwrap().dims(), &[32]);
    }
}
