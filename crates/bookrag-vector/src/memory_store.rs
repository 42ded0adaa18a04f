//! In-memory vector store
//!
//! Used when no Qdrant URL is configured. Chunks can be snapshotted to a
//! JSON file so a restarted server does not need to re-embed the book.

use async_trait::async_trait;
use bookrag_core::{ChatbotError, ContentChunk, Result, ScoredChunk};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::cosine_similarity;

/// File name of the snapshot inside the configured directory
pub const SNAPSHOT_FILE: &str = "vector_store.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPoint {
    chunk: ContentChunk,
    vector: Vec<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    dimension: Option<usize>,
    points: Vec<StoredPoint>,
}

#[derive(Debug, Default)]
struct Inner {
    dimension: Option<usize>,
    points: HashMap<String, StoredPoint>,
}

/// Vector store backed by a hash map
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryStore {
    /// Create an empty store without persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store persisted to `path`, loading it if the file exists
    pub async fn with_snapshot(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut inner = Inner::default();

        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                let snapshot: Snapshot = serde_json::from_str(&text).map_err(|e| {
                    ChatbotError::VectorStore(format!("Corrupt vector store snapshot: {e}"))
                })?;
                inner.dimension = snapshot.dimension;
                inner.points = snapshot
                    .points
                    .into_iter()
                    .map(|p| (p.chunk.id.clone(), p))
                    .collect();
                tracing::info!(
                    path = %path.display(),
                    chunks = inner.points.len(),
                    "Loaded vector store snapshot"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No vector store snapshot yet");
            }
            Err(e) => {
                return Err(ChatbotError::VectorStore(format!(
                    "Failed to read vector store snapshot: {e}"
                )))
            }
        }

        Ok(Self {
            inner: RwLock::new(inner),
            snapshot_path: Some(path),
        })
    }
}

#[async_trait]
impl super::VectorStore for InMemoryStore {
    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.dimension {
            Some(existing) if existing != dimension && !inner.points.is_empty() => {
                Err(ChatbotError::VectorStore(format!(
                    "Collection has dimension {existing}, requested {dimension}"
                )))
            }
            _ => {
                inner.dimension = Some(dimension);
                Ok(())
            }
        }
    }

    async fn upsert(&self, chunks: &[ContentChunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(ChatbotError::VectorStore(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut inner = self.inner.write().await;
        let Some(expected) = inner.dimension.or_else(|| vectors.first().map(Vec::len)) else {
            return Ok(());
        };
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(ChatbotError::VectorStore(format!(
                "Vector dimension {} does not match collection dimension {expected}",
                bad.len()
            )));
        }

        inner.dimension = Some(expected);
        for (chunk, vector) in chunks.iter().zip(vectors) {
            inner.points.insert(
                chunk.id.clone(),
                StoredPoint {
                    chunk: chunk.clone(),
                    vector: vector.clone(),
                },
            );
        }

        Ok(())
    }

    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let inner = self.inner.read().await;

        let mut results: Vec<ScoredChunk> = inner
            .points
            .values()
            .map(|p| ScoredChunk {
                chunk: p.chunk.clone(),
                score: cosine_similarity(query_vector, &p.vector),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        results.truncate(limit);

        Ok(results)
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.points.clear();
        inner.dimension = None;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.inner.read().await.points.len() as u64)
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let json = {
            let inner = self.inner.read().await;
            let mut points: Vec<StoredPoint> = inner.points.values().cloned().collect();
            points.sort_by(|a, b| a.chunk.id.cmp(&b.chunk.id));
            serde_json::to_string(&Snapshot {
                dimension: inner.dimension,
                points,
            })
            .map_err(|e| ChatbotError::VectorStore(format!("Failed to encode snapshot: {e}")))?
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ChatbotError::VectorStore(format!("Failed to create snapshot directory: {e}"))
            })?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| ChatbotError::VectorStore(format!("Failed to write snapshot: {e}")))?;

        tracing::debug!(path = %path.display(), "Persisted vector store snapshot");
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
