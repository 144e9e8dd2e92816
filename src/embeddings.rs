//! Text embeddings.
//!
//! [`Embedder`] is the seam the index and responders use; the production
//! implementation is [`EmbeddingModel`], a local sentence-transformers model
//! run with candle (behind the `embeddings` feature).

use crate::error::Result;

/// Turns text into fixed-dimension vectors.
pub trait Embedder {
    /// Identifier of the model, stored in index snapshots.
    fn model_name(&self) -> &str;

    /// Vector dimension.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input in order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::RagError::Embedding("empty embedding batch".to_string()))
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(feature = "embeddings")]
pub use local::EmbeddingModel;

#[cfg(feature = "embeddings")]
mod local {
    use super::Embedder;
    use crate::error::{RagError, Result};
    use candle_core::{Device, Tensor};
    use candle_nn::VarBuilder;
    use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
    use hf_hub::{Repo, RepoType, api::sync::Api};
    use tokenizers::Tokenizer;

    /// The parts of config.json this module reads itself.
    #[derive(serde::Deserialize)]
    struct ModelDims {
        hidden_size: usize,
        #[serde(default = "default_max_positions")]
        max_position_embeddings: usize,
    }

    fn default_max_positions() -> usize {
        512
    }

    fn embedding_error(context: &str, err: impl std::fmt::Display) -> RagError {
        RagError::Embedding(format!("{}: {}", context, err))
    }

    /// Sentence-transformers model with mean pooling and L2 normalization.
    pub struct EmbeddingModel {
        name: String,
        model: BertModel,
        tokenizer: Tokenizer,
        device: Device,
        dimension: usize,
    }

    impl EmbeddingModel {
        /// Download (or reuse the cached copy of) a model from Hugging Face Hub.
        pub fn load(model_id: &str) -> Result<Self> {
            let device = Device::Cpu;

            tracing::info!("Loading embedding model {}", model_id);

            let api = Api::new().map_err(|e| embedding_error("Failed to create HF Hub API", e))?;
            let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

            let config_path = repo
                .get("config.json")
                .map_err(|e| embedding_error("Failed to get config.json", e))?;
            let tokenizer_path = repo
                .get("tokenizer.json")
                .map_err(|e| embedding_error("Failed to get tokenizer.json", e))?;
            let weights_path = repo
                .get("model.safetensors")
                .map_err(|e| embedding_error("Failed to get model.safetensors", e))?;

            let raw_config = std::fs::read_to_string(&config_path)
                .map_err(|e| RagError::io(&config_path, e))?;
            let config: BertConfig = serde_json::from_str(&raw_config)
                .map_err(|e| embedding_error("Failed to parse model config", e))?;
            let dims: ModelDims = serde_json::from_str(&raw_config)
                .map_err(|e| embedding_error("Failed to parse model dimensions", e))?;

            let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| embedding_error("Failed to load tokenizer", e))?;
            // BERT position embeddings stop at 512; long chunks are cut, not rejected.
            tokenizer
                .with_truncation(Some(tokenizers::TruncationParams {
                    max_length: dims.max_position_embeddings,
                    ..Default::default()
                }))
                .map_err(|e| embedding_error("Failed to configure truncation", e))?;

            // SAFETY: the safetensors file is owned by the hf-hub cache and not
            // modified while mapped.
            let vb = unsafe {
                VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                    .map_err(|e| embedding_error("Failed to load model weights", e))?
            };

            let model = BertModel::load(vb, &config)
                .map_err(|e| embedding_error("Failed to load BERT model", e))?;

            Ok(Self {
                name: model_id.to_string(),
                model,
                tokenizer,
                device,
                dimension: dims.hidden_size,
            })
        }

        fn forward(&self, texts: &[&str]) -> candle_core::Result<Vec<Vec<f32>>> {
            let encodings = self
                .tokenizer
                .encode_batch(texts.to_vec(), true)
                .map_err(candle_core::Error::msg)?;

            let max_len = encodings
                .iter()
                .map(|e| e.get_ids().len())
                .max()
                .unwrap_or(0);

            let mut input_ids = Vec::with_capacity(texts.len() * max_len);
            let mut attention_mask = Vec::with_capacity(texts.len() * max_len);

            for encoding in &encodings {
                let mut ids = encoding.get_ids().to_vec();
                let mut mask = encoding.get_attention_mask().to_vec();
                ids.resize(max_len, 0);
                mask.resize(max_len, 0);
                input_ids.extend(ids);
                attention_mask.extend(mask);
            }

            let shape = (texts.len(), max_len);
            let input_ids = Tensor::from_vec(input_ids, shape, &self.device)?;
            let attention_mask = Tensor::from_vec(attention_mask, shape, &self.device)?;
            let token_type_ids = input_ids.zeros_like()?;

            let output = self
                .model
                .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

            // Mean pooling over the sequence, padding masked out
            let mask = attention_mask
                .unsqueeze(2)?
                .to_dtype(output.dtype())?
                .broadcast_as(output.shape())?;
            let summed = (output * &mask)?.sum(1)?;
            let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
            let pooled = (summed / counts)?;

            let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
            let normalized = pooled.broadcast_div(&norms)?;

            normalized.to_vec2::<f32>()
        }
    }

    impl Embedder for EmbeddingModel {
        fn model_name(&self) -> &str {
            &self.name
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            self.forward(texts)
                .map_err(|e| embedding_error("Embedding forward pass failed", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
