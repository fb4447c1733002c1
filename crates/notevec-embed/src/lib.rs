//! Embedding providers behind the [`EmbedProvider`] contract.

use std::sync::Arc;

use tracing::info;

use notevec_core::{EmbedProvider, ProviderConfig, ProviderKind, Result};

pub mod fake;
#[cfg(feature = "local")]
pub mod local;
pub mod openai;

pub use fake::{FakeProvider, FAKE_MODEL_ID};
pub use openai::OpenAiProvider;

/// Construct the provider selected by `config.kind`.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn EmbedProvider>> {
    let provider: Arc<dyn EmbedProvider> = match config.kind {
        ProviderKind::Remote => Arc::new(OpenAiProvider::from_config(config)),
        ProviderKind::Fake => Arc::new(FakeProvider::new(config.dimensions)),
        ProviderKind::Local => build_local(config)?,
    };
    info!(kind = ?config.kind, model = provider.model_id(), dims = provider.dimensions(), "embedding provider ready");
    Ok(provider)
}

#[cfg(feature = "local")]
fn build_local(config: &ProviderConfig) -> Result<Arc<dyn EmbedProvider>> {
    let dir = local::resolve_model_dir(config.model_dir.as_deref())?;
    Ok(Arc::new(local::LocalProvider::load(&dir, config.dimensions)?))
}

#[cfg(not(feature = "local"))]
fn build_local(_config: &ProviderConfig) -> Result<Arc<dyn EmbedProvider>> {
    Err(notevec_core::Error::InvalidConfig(
        "the local provider requires building with the `local` feature".into(),
    ))
}
