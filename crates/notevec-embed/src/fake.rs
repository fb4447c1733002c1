use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use twox_hash::XxHash64;

use notevec_core::{EmbedError, EmbedProvider, EmbedRequest};

pub const FAKE_MODEL_ID: &str = "fake-xxhash";

/// Deterministic bag-of-tokens embedder. Texts sharing words land close together,
/// which is enough for exercising ranking without a network or a model.
#[derive(Debug, Clone)]
pub struct FakeProvider {
    model: String,
    dims: usize,
}

impl FakeProvider {
    pub fn new(dims: usize) -> Self {
        Self { model: FAKE_MODEL_ID.to_string(), dims }
    }

    pub fn embed_text(&self, text: &str, dims: usize) -> Vec<f32> {
        let mut v = vec![0f32; dims];
        for (i, token) in text.split_whitespace().enumerate() {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % dims;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += val + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        v.iter_mut().for_each(|x| *x /= norm);
        v
    }
}

#[async_trait]
impl EmbedProvider for FakeProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, request: EmbedRequest<'_>) -> Result<Vec<Vec<f32>>, EmbedError> {
        if request.dimensions == 0 {
            return Err(EmbedError::InvalidRequest("dimensions must be positive".into()));
        }
        Ok(request.texts.iter().map(|t| self.embed_text(t, request.dimensions)).collect())
    }
}
