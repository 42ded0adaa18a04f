//! bookrag RAG - Retrieval-Augmented Generation over the book
//!
//! This crate implements the question answering pipeline:
//! - Retrieval of book chunks by vector similarity
//! - Selected-text mode, where only the reader's highlighted passage is used
//! - Prompt construction and a single completion call per question
//! - Ingestion of the book into the vector store

use bookrag_core::{
    ChatbotError, ChunkKind, ChunkMetadata, ContentChunk, ConversationTurn, LlmClient, Result,
    RetrievalConfig, ScoredChunk,
};
use bookrag_vector::{cosine_similarity, EmbeddingClient, VectorStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod ingest;
pub mod llm;
pub mod prompt;

pub use ingest::{IngestReport, IngestionPipeline};
pub use llm::OpenAiClient;
pub use prompt::PromptBuilder;

/// Answer returned when retrieval finds nothing
pub const NO_CONTENT_ANSWER: &str =
    "I couldn't find any relevant content in the book to answer your question.";

/// Id of the synthetic source built from selected text
pub const SELECTED_TEXT_ID: &str = "selected_text";

/// Operations slower than this are logged as warnings
pub const SLOW_OPERATION_THRESHOLD: Duration = Duration::from_secs(1);

/// Log a warning when `operation` took longer than [`SLOW_OPERATION_THRESHOLD`]
pub fn warn_if_slow(operation: &str, started: Instant) {
    let elapsed = started.elapsed();
    if elapsed > SLOW_OPERATION_THRESHOLD {
        tracing::warn!(
            operation,
            elapsed_ms = elapsed.as_millis() as u64,
            "Slow operation"
        );
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// A question to answer
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The question
    pub text: String,

    /// Passage the reader highlighted; when set, only it is used as context
    pub selected_text: Option<String>,

    /// Earlier exchanges, oldest first
    pub conversation_history: Vec<ConversationTurn>,

    /// Number of chunks to retrieve
    pub top_k: usize,
}

/// A chunk cited in an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl From<ScoredChunk> for Source {
    fn from(scored: ScoredChunk) -> Self {
        Self {
            id: scored.chunk.id,
            content: scored.chunk.content,
            metadata: scored.chunk.metadata,
        }
    }
}

/// Generated answer with the chunks it was based on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub sources: Vec<Source>,
}

// ============================================================================
// Retrieval
// ============================================================================

/// Finds the book content relevant to a question
pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    min_similarity: f32,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        min_similarity: f32,
    ) -> Self {
        Self {
            embedder,
            store,
            min_similarity,
        }
    }

    /// Retrieve chunks for `query`, best first
    ///
    /// With `selected_text`, the result is exactly one synthetic chunk holding
    /// the selection and its similarity to the query.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        selected_text: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let started = Instant::now();

        let results = match selected_text {
            Some(selection) => vec![self.score_selection(query, selection).await?],
            None => self.search_store(query, top_k).await?,
        };

        tracing::info!(
            results = results.len(),
            selection = selected_text.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Retrieval complete"
        );
        warn_if_slow("retrieve", started);

        Ok(results)
    }

    async fn score_selection(&self, query: &str, selection: &str) -> Result<ScoredChunk> {
        let vectors = self
            .embedder
            .embed_batch(&[query.to_string(), selection.to_string()])
            .await?;

        let [query_vector, selection_vector] = vectors.as_slice() else {
            return Err(ChatbotError::Embedding(format!(
                "Expected 2 embeddings, got {}",
                vectors.len()
            )));
        };
        let similarity = cosine_similarity(query_vector, selection_vector);

        let metadata = ChunkMetadata {
            file_path: SELECTED_TEXT_ID.to_string(),
            chunk_id: 0,
            kind: ChunkKind::Selection,
            title: None,
            section: Some("Selected Text".to_string()),
            page_reference: None,
            relevance: Some(similarity),
        };

        Ok(ScoredChunk {
            chunk: ContentChunk {
                id: SELECTED_TEXT_ID.to_string(),
                content: selection.to_string(),
                metadata,
            },
            score: similarity,
        })
    }

    async fn search_store(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        let query_vector = self.embedder.embed(query).await?;
        let results = self.store.search(&query_vector, top_k).await?;

        Ok(results
            .into_iter()
            .filter(|r| r.score >= self.min_similarity)
            .map(|mut r| {
                r.chunk.metadata.relevance = Some(r.score);
                r
            })
            .collect())
    }
}

// ============================================================================
// Chat Service
// ============================================================================

/// Answers questions about the book
pub struct ChatService {
    retrieval: RetrievalService,
    llm: Arc<dyn LlmClient>,
    config: RetrievalConfig,
}

impl ChatService {
    pub fn new(
        retrieval: RetrievalService,
        llm: Arc<dyn LlmClient>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            retrieval,
            llm,
            config,
        }
    }

    /// Answer a question from book content
    pub async fn answer(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let started = Instant::now();
        let top_k = match request.top_k {
            0 => self.config.default_top_k,
            n => n.min(self.config.max_top_k),
        };

        let retrieved = self
            .retrieval
            .retrieve(&request.text, top_k, request.selected_text.as_deref())
            .await?;

        if retrieved.is_empty() {
            tracing::info!("No relevant content found");
            return Ok(ChatResponse {
                text: NO_CONTENT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let messages = PromptBuilder::new()
            .add_chunks(&retrieved)
            .history(&request.conversation_history, self.config.history_turns)
            .question(&request.text)
            .max_context_length(self.config.max_context_length)
            .build();

        tracing::debug!(model = self.llm.model(), "Calling completion provider");
        let text = self.llm.generate(&messages).await?;

        tracing::info!(
            sources = retrieved.len(),
            answer_chars = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generated answer"
        );
        warn_if_slow("answer", started);

        Ok(ChatResponse {
            text,
            sources: retrieved.into_iter().map(Source::from).collect(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use bookrag_core::ChatMessage;
    use bookrag_vector::InMemoryStore;
    use std::sync::Mutex;

    const KEYWORDS: [&str; 3] = ["robot", "sensor", "walk"];

    /// Embeds text as keyword presence flags
    #[derive(Default)]
    pub(crate) struct KeywordEmbedder;

    impl KeywordEmbedder {
        fn vector(text: &str) -> Vec<f32> {
            let lower = text.to_lowercase();
            KEYWORDS
                .iter()
                .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                .collect()
        }
    }

    #[async_trait]
    impl EmbeddingClient for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(Self::vector(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| Self::vector(t)).collect())
        }

        fn dimension(&self) -> usize {
            KEYWORDS.len()
        }
    }

    /// Records prompts and replies with a fixed answer
    #[derive(Default)]
    struct RecordingLlm {
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
            self.calls.lock().unwrap().push(messages.to_vec());
            Ok("Robots walk on legs.".to_string())
        }

        fn model(&self) -> &str {
            "recording"
        }
    }

    async fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        let chunks = vec![
            ContentChunk::new("Robots walk on two legs.", ChunkMetadata::paragraph("a.md", 1)),
            ContentChunk::new("Sensors measure the world.", ChunkMetadata::paragraph("a.md", 2)),
            ContentChunk::new("Robot sensors fuse data.", ChunkMetadata::paragraph("b.md", 1)),
        ];
        let vectors: Vec<_> = chunks
            .iter()
            .map(|c| KeywordEmbedder::vector(&c.content))
            .collect();
        store.upsert(&chunks, &vectors).await.unwrap();
        store
    }

    fn service(store: Arc<InMemoryStore>, llm: Arc<RecordingLlm>) -> ChatService {
        let retrieval = RetrievalService::new(Arc::new(KeywordEmbedder), store, 0.1);
        ChatService::new(retrieval, llm, RetrievalConfig::default())
    }

    fn request(text: &str) -> ChatRequest {
        ChatRequest {
            text: text.to_string(),
            top_k: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retrieve_filters_by_similarity() {
        let retrieval =
            RetrievalService::new(Arc::new(KeywordEmbedder), seeded_store().await, 0.1);

        let results = retrieval.retrieve("how do robots walk", 5, None).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.content, "Robots walk on two legs.");
        assert_eq!(results[0].chunk.metadata.relevance, Some(results[0].score));
        assert!(results.iter().all(|r| r.score >= 0.1));
    }

    #[tokio::test]
    async fn test_selected_text_returns_single_source() {
        let retrieval =
            RetrievalService::new(Arc::new(KeywordEmbedder), seeded_store().await, 0.1);

        let results = retrieval
            .retrieve("what about sensors", 5, Some("Quantum gravity is unrelated."))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let chunk = &results[0].chunk;
        assert_eq!(chunk.id, SELECTED_TEXT_ID);
        assert_eq!(chunk.content, "Quantum gravity is unrelated.");
        assert_eq!(chunk.metadata.file_path, "selected_text");
        assert_eq!(chunk.metadata.kind, ChunkKind::Selection);
        assert_eq!(chunk.metadata.section.as_deref(), Some("Selected Text"));
        assert_eq!(chunk.metadata.relevance, Some(0.0));
    }

    #[tokio::test]
    async fn test_answer_uses_retrieved_sources() {
        let llm = Arc::new(RecordingLlm::default());
        let chat = service(seeded_store().await, llm.clone());

        let mut req = request("Tell me about robot sensors");
        req.conversation_history = vec![ConversationTurn {
            user: "hello".to_string(),
            assistant: "hi".to_string(),
        }];
        let response = chat.answer(&req).await.unwrap();

        assert_eq!(response.text, "Robots walk on legs.");
        assert_eq!(response.sources[0].content, "Robot sensors fuse data.");
        assert_eq!(response.sources.len(), 3);

        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0][1].content.contains("Robot sensors fuse data."));
        assert!(calls[0][1].content.contains("User: hello"));
    }

    #[tokio::test]
    async fn test_no_content_skips_llm() {
        let llm = Arc::new(RecordingLlm::default());
        let chat = service(seeded_store().await, llm.clone());

        let response = chat.answer(&request("quantum chromodynamics")).await.unwrap();

        assert_eq!(response.text, NO_CONTENT_ANSWER);
        assert!(response.sources.is_empty());
        assert!(llm.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_store_returns_fallback() {
        let llm = Arc::new(RecordingLlm::default());
        let chat = service(Arc::new(InMemoryStore::new()), llm.clone());

        let response = chat.answer(&request("robots")).await.unwrap();
        assert_eq!(response.text, NO_CONTENT_ANSWER);
    }

    #[tokio::test]
    async fn test_top_k_is_capped() {
        let llm = Arc::new(RecordingLlm::default());
        let chat = service(seeded_store().await, llm);

        let mut req = request("robot sensor walk");
        req.top_k = 1;
        let response = chat.answer(&req).await.unwrap();
        assert_eq!(response.sources.len(), 1);
    }

    #[test]
    fn test_source_serialization() {
        let source = Source::from(ScoredChunk {
            chunk: ContentChunk::new("text", ChunkMetadata::paragraph("a.md", 0)),
            score: 0.5,
        });
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["content"], "text");
        assert_eq!(json["metadata"]["type"], "paragraph");
        assert!(json["id"].is_string());
    }
}
