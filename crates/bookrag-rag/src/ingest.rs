//! Ingestion pipeline
//!
//! Loads the book, embeds every chunk and writes the vectors to the store.

use crate::warn_if_slow;
use bookrag_content::ContentLoader;
use bookrag_core::{ChatbotError, Result};
use bookrag_vector::{EmbeddingClient, VectorStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Summary of an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Files that produced chunks
    pub files: usize,

    /// Chunks written to the store
    pub chunks: usize,

    /// True when the built-in sample content was ingested
    pub used_sample: bool,
}

/// Loads, embeds and stores book content
pub struct IngestionPipeline {
    loader: ContentLoader,
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
    lock: Mutex<()>,
}

impl IngestionPipeline {
    /// Create a new pipeline
    pub fn new(
        loader: ContentLoader,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            loader,
            embedder,
            store,
            batch_size: 64,
            lock: Mutex::new(()),
        }
    }

    /// Set the number of chunks sent per embedding request
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Vector store the pipeline writes to
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Run ingestion once
    ///
    /// With `force`, the store is emptied before the new vectors are written.
    /// Concurrent calls wait for the running one to finish.
    pub async fn run(&self, force: bool) -> Result<IngestReport> {
        let _guard = self.lock.lock().await;
        let started = Instant::now();

        let loader = self.loader.clone();
        let loaded = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| ChatbotError::Content(format!("Content loading task failed: {e}")))?;

        if loaded.chunks.is_empty() {
            tracing::warn!(path = %self.loader.root().display(), "Nothing to ingest");
            return Ok(IngestReport::default());
        }

        let mut vectors = Vec::with_capacity(loaded.chunks.len());
        for batch in loaded.chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            vectors.extend(self.embedder.embed_batch(&texts).await?);
            tracing::debug!(embedded = vectors.len(), total = loaded.chunks.len(), "Embedded batch");
        }

        let dimension = vectors
            .first()
            .map(Vec::len)
            .unwrap_or_else(|| self.embedder.dimension());

        if force {
            tracing::info!(store = self.store.name(), "Clearing vector store before ingestion");
            self.store.clear().await?;
        }
        self.store.ensure_collection(dimension).await?;
        self.store.upsert(&loaded.chunks, &vectors).await?;
        self.store.persist().await?;

        let report = IngestReport {
            files: loaded.files,
            chunks: loaded.chunks.len(),
            used_sample: loaded.used_sample,
        };

        tracing::info!(
            files = report.files,
            chunks = report.chunks,
            failed = loaded.failed_files.len(),
            store = self.store.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ingestion complete"
        );
        warn_if_slow("ingest", started);

        Ok(report)
    }
}
