//! Text embedding providers for vector search.
//!
//! The graph layer only sees the [`Embedder`] trait. Providers are chosen
//! from configuration by [`build_embedder`]; a provider that fails to start
//! disables vector search instead of aborting startup.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::error::AppError;

/// Turns text into a fixed-width vector.
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;
}

/// Deterministic feature-hashing embedder.
///
/// Lowercased alphanumeric tokens are hashed into buckets with a sign bit
/// and the result is L2 normalized. Token hashes come from SHA-256, so
/// stored vectors stay comparable with query vectors across builds. Texts sharing words land close together,
/// which is enough for offline use and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = token_hash(&token.to_lowercase());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }
}

/// First eight bytes of the token's SHA-256 digest, big-endian.
fn token_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

#[cfg(feature = "fastembed")]
pub use local::FastEmbedder;

#[cfg(feature = "fastembed")]
mod local {
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use once_cell::sync::OnceCell;

    use super::Embedder;
    use crate::error::AppError;

    /// Local sentence embeddings via `fastembed`.
    ///
    /// The model is downloaded and loaded on first use.
    pub struct FastEmbedder {
        model: EmbeddingModel,
        model_code: String,
        dimensions: usize,
        inner: OnceCell<TextEmbedding>,
    }

    impl FastEmbedder {
        /// Resolves `model_code` (e.g. `BAAI/bge-small-en-v1.5`) against the
        /// supported model list.
        pub fn new(model_code: &str) -> Result<Self, AppError> {
            let info = TextEmbedding::list_supported_models()
                .into_iter()
                .find(|info| info.model_code.eq_ignore_ascii_case(model_code))
                .ok_or_else(|| {
                    AppError::Embedding(format!("unsupported embedding model '{}'", model_code))
                })?;

            Ok(Self {
                model: info.model,
                model_code: info.model_code,
                dimensions: info.dim,
                inner: OnceCell::new(),
            })
        }

        fn model(&self) -> Result<&TextEmbedding, AppError> {
            self.inner.get_or_try_init(|| {
                tracing::info!(model = %self.model_code, "Loading embedding model");
                TextEmbedding::try_new(InitOptions::new(self.model.clone()))
                    .map_err(|e| AppError::Embedding(e.to_string()))
            })
        }
    }

    impl Embedder for FastEmbedder {
        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
            self.model()?
                .embed(vec![text], None)
                .map_err(|e| AppError::Embedding(e.to_string()))?
                .into_iter()
                .next()
                .ok_or_else(|| AppError::Embedding("model returned no embedding".into()))
        }
    }
}

/// Builds the configured embedder, or `None` when vector search is off.
pub fn build_embedder(config: &EmbeddingConfig) -> Option<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::None => {
            tracing::info!("Embedding disabled, search uses name matching only");
            None
        }
        EmbeddingProvider::Hashing => {
            tracing::info!(dimensions = config.dimensions, "Using hashing embedder");
            Some(Arc::new(HashingEmbedder::new(config.dimensions)))
        }
        EmbeddingProvider::Fastembed => fastembed_embedder(config),
    }
}

#[cfg(feature = "fastembed")]
fn fastembed_embedder(config: &EmbeddingConfig) -> Option<Arc<dyn Embedder>> {
    match FastEmbedder::new(&config.model) {
        Ok(embedder) => {
            if embedder.dimensions() != config.dimensions {
                tracing::warn!(
                    model = %config.model,
                    configured = config.dimensions,
                    actual = embedder.dimensions(),
                    "Configured dimensions differ from model, using model dimensions"
                );
            }
            Some(Arc::new(embedder))
        }
        Err(e) => {
            tracing::warn!(model = %config.model, error = %e, "Embedding model unavailable, vector search disabled");
            None
        }
    }
}

#[cfg(not(feature = "fastembed"))]
fn fastembed_embedder(config: &EmbeddingConfig) -> Option<Arc<dyn Embedder>> {
    tracing::warn!(
        model = %config.model,
        "Built without the `fastembed` feature, vector search disabled"
    );
    None
}
