//! Qdrant implementation for vector storage
//!
//! Provides connection management and vector operations
//! for book chunk embeddings.

use async_trait::async_trait;
use bookrag_core::{
    ChatbotError, ChunkKind, ChunkMetadata, ContentChunk, Result, ScoredChunk, VectorConfig,
};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, DeleteCollectionBuilder, Distance, PointId,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;

/// Qdrant vector store implementation
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    batch_size: usize,
}

impl QdrantStore {
    /// Create a new Qdrant connection
    pub fn new(config: &VectorConfig) -> Result<Self> {
        let url = config
            .qdrant_url
            .as_deref()
            .ok_or_else(|| ChatbotError::Config("QDRANT_URL is required".to_string()))?;

        let mut builder = Qdrant::from_url(url);
        if let Some(key) = &config.qdrant_api_key {
            builder = builder.api_key(key.expose().to_string());
        }

        let client = builder
            .build()
            .map_err(|e| ChatbotError::VectorStore(format!("Qdrant connection failed: {e}")))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            batch_size: config.upsert_batch_size.max(1),
        })
    }

    async fn collection_exists(&self) -> Result<bool> {
        let collections = self.client.list_collections().await.map_err(|e| {
            ChatbotError::VectorStore(format!("Failed to list collections: {e}"))
        })?;

        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == self.collection))
    }
}

/// Convert a chunk into the payload stored with its vector
fn chunk_payload(chunk: &ContentChunk) -> HashMap<String, Value> {
    let mut payload = serde_json::to_value(&chunk.metadata)
        .ok()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();
    payload.insert(
        "content".to_string(),
        serde_json::Value::String(chunk.content.clone()),
    );

    payload.into_iter().map(|(k, v)| (k, v.into())).collect()
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Rebuild a chunk from a stored payload
fn chunk_from_payload(id: String, payload: &HashMap<String, Value>) -> ContentChunk {
    let kind = match payload_str(payload, "type").as_deref() {
        Some("selection") => ChunkKind::Selection,
        _ => ChunkKind::Paragraph,
    };

    let chunk_id = payload
        .get("chunk_id")
        .and_then(|v| v.as_integer())
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or_default();

    ContentChunk {
        id,
        content: payload_str(payload, "content")
            .or_else(|| payload_str(payload, "text"))
            .unwrap_or_default(),
        metadata: ChunkMetadata {
            file_path: payload_str(payload, "file_path").unwrap_or_else(|| "unknown".to_string()),
            chunk_id,
            kind,
            title: payload_str(payload, "title"),
            section: payload_str(payload, "section"),
            page_reference: payload_str(payload, "page_reference"),
            relevance: None,
        },
    }
}

fn point_id_string(id: Option<PointId>) -> String {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl super::VectorStore for QdrantStore {
    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        if self.collection_exists().await? {
            tracing::debug!(collection = %self.collection, "Qdrant collection already exists");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| {
                ChatbotError::VectorStore(format!("Failed to create collection: {e}"))
            })?;

        tracing::info!(collection = %self.collection, dimension, "Created Qdrant collection");
        Ok(())
    }

    async fn upsert(&self, chunks: &[ContentChunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(ChatbotError::VectorStore(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let points: Vec<PointStruct> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                PointStruct::new(chunk.id.clone(), vector.clone(), chunk_payload(chunk))
            })
            .collect();

        for batch in points.chunks(self.batch_size) {
            self.client
                .upsert_points(
                    UpsertPointsBuilder::new(&self.collection, batch.to_vec()).wait(true),
                )
                .await
                .map_err(|e| ChatbotError::VectorStore(format!("Failed to upsert vectors: {e}")))?;
        }

        Ok(())
    }

    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query_vector.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| ChatbotError::VectorStore(format!("Vector search failed: {e}")))?;

        Ok(results
            .result
            .into_iter()
            .map(|point| ScoredChunk {
                chunk: chunk_from_payload(point_id_string(point.id), &point.payload),
                score: point.score,
            })
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        if self.collection_exists().await? {
            self.client
                .delete_collection(DeleteCollectionBuilder::new(&self.collection))
                .await
                .map_err(|e| {
                    ChatbotError::VectorStore(format!("Failed to delete collection: {e}"))
                })?;
            tracing::info!(collection = %self.collection, "Cleared Qdrant collection");
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        if !self.collection_exists().await? {
            return Ok(0);
        }

        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| ChatbotError::VectorStore(format!("Failed to count points: {e}")))?;

        Ok(response.result.map(|r| r.count).unwrap_or_default())
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
