//! bookrag Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout bookrag:
//! - Book chunk models and their metadata
//! - Chat message types exchanged with completion providers
//! - Common error types
//! - Shared traits for completion backends
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, ContentConfig, LlmConfig, LoggingConfig, RetrievalConfig,
    Redactor, SecretString, SecurityConfig, ServerConfig, VectorConfig,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for bookrag operations
#[derive(Error, Debug)]
pub enum ChatbotError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Content error: {0}")]
    Content(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ChatbotError>;

// ============================================================================
// Chunk Models
// ============================================================================

/// Kind of text a chunk was produced from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// A paragraph of book content
    #[default]
    Paragraph,
    /// Text the reader highlighted and sent along with the question
    Selection,
}

/// Metadata stored alongside each chunk and returned to callers as part of a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the file the chunk came from
    pub file_path: String,

    /// Paragraph index within the file
    pub chunk_id: u32,

    /// Chunk kind
    #[serde(rename = "type")]
    pub kind: ChunkKind,

    /// Document title (first H1 header)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Nearest section header above the chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Page number mentioned in the text, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_reference: Option<String>,

    /// Similarity to the query, filled in at retrieval time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f32>,
}

impl ChunkMetadata {
    /// Create paragraph metadata for a file position
    pub fn paragraph(file_path: impl Into<String>, chunk_id: u32) -> Self {
        Self {
            file_path: file_path.into(),
            chunk_id,
            kind: ChunkKind::Paragraph,
            title: None,
            section: None,
            page_reference: None,
            relevance: None,
        }
    }

    /// Set document title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set section name
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Set page reference
    pub fn with_page_reference(mut self, page: Option<String>) -> Self {
        self.page_reference = page;
        self
    }
}

/// A chunk of book content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    /// Stable identifier (UUID string for book chunks)
    pub id: String,

    /// Text content
    pub content: String,

    /// Chunk metadata
    pub metadata: ChunkMetadata,
}

impl ContentChunk {
    /// Create a chunk whose id is derived from its file path and paragraph index,
    /// so the same paragraph always maps to the same id.
    pub fn new(content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            id: chunk_id_for(&metadata.file_path, metadata.chunk_id).to_string(),
            content: content.into(),
            metadata,
        }
    }
}

/// Deterministic chunk id
pub fn chunk_id_for(file_path: &str, chunk_id: u32) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("bookrag://{file_path}#{chunk_id}").as_bytes(),
    )
}

/// A chunk returned from similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The matched chunk
    pub chunk: ContentChunk,

    /// Similarity score (higher is better)
    pub score: f32,
}

// ============================================================================
// Chat Types
// ============================================================================

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single chat message sent to a completion provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// One earlier exchange between the reader and the assistant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub assistant: String,
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for chat completion clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for the given conversation
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Model name, for logging
    fn model(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
