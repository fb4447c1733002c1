use async_trait::async_trait;

use crate::error::EmbedError;

/// One embedding round trip: ordered texts plus the requested dimensionality.
#[derive(Debug, Clone, Copy)]
pub struct EmbedRequest<'a> {
    pub texts: &'a [String],
    pub dimensions: usize,
}

impl<'a> EmbedRequest<'a> {
    pub fn new(texts: &'a [String], dimensions: usize) -> Self {
        Self { texts, dimensions }
    }
}

/// The embedding client contract consumed by the indexer and the search engine.
///
/// Implementations return exactly one vector per input text, in input order.
/// Vectors need not be normalized; the search engine normalizes on its own.
#[async_trait]
pub trait EmbedProvider: Send + Sync {
    /// Stable identifier of the model. Indexes built with different ids never mix.
    fn model_id(&self) -> &str;

    /// Dimensionality requested from the provider.
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, request: EmbedRequest<'_>) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Embed a single text, e.g. a search query.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let texts = [text.to_string()];
        self.embed_batch(EmbedRequest::new(&texts, self.dimensions()))
            .await?
            .pop()
            .ok_or_else(|| EmbedError::InvalidRequest("empty embedding response".into()))
    }
}
