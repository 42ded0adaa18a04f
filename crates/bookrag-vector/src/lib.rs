//! bookrag Vector - Embeddings and vector database abstraction
//!
//! Provides the embedding client and an abstraction over vector databases
//! (Qdrant, or an in-memory fallback) for storing and searching book chunks.

use async_trait::async_trait;
use bookrag_core::{ContentChunk, Result, ScoredChunk, VectorConfig};
use std::sync::Arc;

pub mod embedding;
pub mod memory_store;
pub mod qdrant_store;

pub use embedding::{EmbeddingClient, OpenAiEmbedding};
pub use memory_store::InMemoryStore;
pub use qdrant_store::QdrantStore;

/// Trait for vector database operations
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist yet
    async fn ensure_collection(&self, dimension: usize) -> Result<()>;

    /// Store chunks with their embeddings; existing ids are overwritten
    async fn upsert(&self, chunks: &[ContentChunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Search for the chunks closest to `query_vector`, best first
    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>>;

    /// Remove every stored chunk
    async fn clear(&self) -> Result<()>;

    /// Number of stored chunks
    async fn count(&self) -> Result<u64>;

    /// Flush to durable storage, for backends that need it
    async fn persist(&self) -> Result<()> {
        Ok(())
    }

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Cosine similarity of two vectors
///
/// Returns 0.0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    let norm = norm_a.sqrt() * norm_b.sqrt();
    if norm == 0.0 {
        0.0
    } else {
        dot / norm
    }
}

/// Create the configured vector store
///
/// Qdrant is used when a URL is configured; otherwise chunks live in memory,
/// with an optional JSON snapshot on disk.
pub async fn create_vector_store(config: &VectorConfig) -> Result<Arc<dyn VectorStore>> {
    match &config.qdrant_url {
        Some(_) => {
            let store = QdrantStore::new(config)?;
            tracing::info!(collection = %config.collection, "Using Qdrant vector store");
            Ok(Arc::new(store))
        }
        None => {
            let store = match &config.local_path {
                Some(dir) => InMemoryStore::with_snapshot(dir.join(memory_store::SNAPSHOT_FILE))
                    .await?,
                None => InMemoryStore::new(),
            };
            tracing::info!("QDRANT_URL not set, using in-memory vector store");
            Ok(Arc::new(store))
        }
    }
}
