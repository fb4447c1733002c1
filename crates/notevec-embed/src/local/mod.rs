//! On-device embeddings with an XLM-RoBERTa encoder (BGE-M3 layout).
//!
//! The model directory must contain `tokenizer.json`, `config.json` and
//! `pytorch_model.bin`.

mod device;
mod pool;
mod tokenize;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use notevec_core::{EmbedError, EmbedProvider, EmbedRequest, Error, Result};

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

use tokenize::tensor_error;

const MAX_TOKENS: usize = 512;

struct Inner {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
}

pub struct LocalProvider {
    inner: Arc<Inner>,
    model_id: String,
    dims: usize,
}

impl LocalProvider {
    /// Load tokenizer, config and weights from `model_dir`.
    ///
    /// `dimensions` must equal the encoder's hidden size.
    pub fn load(model_dir: &Path, dimensions: usize) -> Result<Self> {
        let load_err = |what: &str, e: &dyn std::fmt::Display| {
            Error::InvalidConfig(format!("cannot load {what} from {}: {e}", model_dir.display()))
        };
        let device = select_device();

        let tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json")).map_err(|e| load_err("tokenizer", &e))?;
        let config_text = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: XLMRobertaConfig = serde_json::from_str(&config_text)?;
        if config.hidden_size != dimensions {
            return Err(Error::InvalidConfig(format!(
                "embedding.dimensions is {dimensions} but the local model produces {}",
                config.hidden_size
            )));
        }

        let vb = load_weights(model_dir, &device).map_err(|e| load_err("weights", &e))?;
        let model = XLMRobertaModel::new(&config, vb).map_err(|e| load_err("model", &e))?;

        let model_id = format!(
            "local/{}",
            model_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
        );
        info!(model = %model_id, dims = dimensions, "local embedding model loaded");
        Ok(Self { inner: Arc::new(Inner { model, tokenizer, device }), model_id, dims: dimensions })
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> candle_core::Result<VarBuilder<'static>> {
    let weights: HashMap<String, Tensor> =
        candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?.into_iter().collect();
    Ok(VarBuilder::from_tensors(weights, DType::F32, device))
}

impl Inner {
    fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbedError> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, MAX_TOKENS, &self.device)?;
        let token_type_ids = input_ids.zeros_like().map_err(tensor_error)?;
        let hidden = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)
            .map_err(tensor_error)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask).map_err(tensor_error)?;
        let vectors = pooled.to_device(&Device::Cpu).and_then(|t| t.to_vec2::<f32>()).map_err(tensor_error)?;
        debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "local batch embedded");
        Ok(vectors)
    }
}

#[async_trait]
impl EmbedProvider for LocalProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, request: EmbedRequest<'_>) -> std::result::Result<Vec<Vec<f32>>, EmbedError> {
        if request.dimensions != self.dims {
            return Err(EmbedError::InvalidRequest(format!(
                "local model only produces {}-dimensional vectors, {} requested",
                self.dims, request.dimensions
            )));
        }
        if request.texts.is_empty() {
            return Ok(Vec::new());
        }
        let inner = Arc::clone(&self.inner);
        let texts = request.texts.to_vec();
        tokio::task::spawn_blocking(move || inner.embed(&texts))
            .await
            .map_err(|e| EmbedError::Unavailable(format!("embedding worker failed: {e}")))?
    }
}

/// Model directory from config, falling back to `models/bge-m3` next to the working directory.
pub fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = notevec_core::config::expand_path(dir);
        if p.exists() {
            return Ok(p);
        }
        return Err(Error::InvalidConfig(format!("embedding.model_dir {} does not exist", p.display())));
    }
    let fallback = Path::new("models/bge-m3");
    if fallback.exists() {
        return Ok(fallback.to_path_buf());
    }
    Err(Error::InvalidConfig("embedding.model_dir is required for the local provider".into()))
}
