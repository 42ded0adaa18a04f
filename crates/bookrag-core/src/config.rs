//! bookrag Configuration Management
//!
//! Handles configuration from environment variables and config files
//! with sensible defaults for development.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// API keys and rate limiting
    pub security: SecurityConfig,

    /// Vector database configuration
    pub vector: VectorConfig,

    /// Embedding and completion provider configuration
    pub llm: LlmConfig,

    /// Retrieval and prompt configuration
    pub retrieval: RetrievalConfig,

    /// Book content configuration
    pub content: ContentConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        // Server
        if let Some(host) = env_var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_var("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(origins) = env_var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Security
        if let Some(key) = env_var("API_KEY") {
            self.security.api_key = Some(SecretString::new(key));
        }
        if let Some(key) = env_var("ADMIN_API_KEY") {
            self.security.admin_api_key = Some(SecretString::new(key));
        }
        if let Some(requests) = env_var("RATE_LIMIT_REQUESTS") {
            self.security.rate_limit_requests = parse_value("RATE_LIMIT_REQUESTS", requests)?;
        }
        if let Some(window) = env_var("RATE_LIMIT_WINDOW_SECS") {
            self.security.rate_limit_window_secs = parse_value("RATE_LIMIT_WINDOW_SECS", window)?;
        }

        // Qdrant
        if let Some(url) = env_var("QDRANT_URL") {
            self.vector.qdrant_url = Some(url);
        }
        if let Some(key) = env_var("QDRANT_API_KEY") {
            self.vector.qdrant_api_key = Some(SecretString::new(key));
        }
        if let Some(collection) = env_var("QDRANT_COLLECTION") {
            self.vector.collection = collection;
        }
        if let Some(path) = env_var("VECTOR_STORE_PATH") {
            self.vector.local_path = Some(PathBuf::from(path));
        }

        // LLM
        if let Some(key) = env_var("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(SecretString::new(key));
        }
        if let Some(url) = env_var("OPENAI_BASE_URL") {
            self.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = env_var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = env_var("EMBEDDING_MODEL") {
            self.llm.embedding_model = model;
        }

        // Content
        if let Some(path) = env_var("BOOK_CONTENT_PATH") {
            self.content.book_content_path = PathBuf::from(path);
        }

        // Logging
        if let Some(level) = env_var("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Some(format) = env_var("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(self)
    }

    /// Redactor covering every configured key
    pub fn redactor(&self) -> Redactor {
        Redactor::new(
            [
                &self.security.api_key,
                &self.security.admin_api_key,
                &self.llm.openai_api_key,
                &self.vector.qdrant_api_key,
            ]
            .into_iter()
            .flatten()
            .cloned(),
        )
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.rate_limit_requests == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RATE_LIMIT_REQUESTS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.security.rate_limit_window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RATE_LIMIT_WINDOW_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.retrieval.default_top_k == 0
            || self.retrieval.default_top_k > self.retrieval.max_top_k
        {
            return Err(ConfigError::InvalidValue {
                key: "retrieval.default_top_k".to_string(),
                value: self.retrieval.default_top_k.to_string(),
            });
        }
        if self.llm.embedding_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "llm.embedding_batch_size".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Read an environment variable, treating empty values as unset
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// A string that never prints its value
///
/// Used for API keys so they cannot leak through `Debug` output, log lines
/// or the serialized configuration.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the underlying value
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every occurrence of the secret in `text`
    pub fn redact_in(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, "[REDACTED]")
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretString)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Scrubs a fixed set of secrets out of free text
#[derive(Clone, Default)]
pub struct Redactor {
    secrets: Vec<SecretString>,
}

impl Redactor {
    pub fn new(secrets: impl IntoIterator<Item = SecretString>) -> Self {
        let mut secrets: Vec<_> = secrets.into_iter().filter(|s| !s.is_empty()).collect();
        // longest first, so a key containing another is replaced whole
        secrets.sort_by_key(|s| std::cmp::Reverse(s.0.len()));
        Self { secrets }
    }

    /// Replace every known secret in `text`
    pub fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| secret.redact_in(&acc))
    }
}

impl fmt::Debug for Redactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redactor")
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_size: 1024 * 1024, // 1MB
            // Empty by default - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// API key and rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Key required on `/query`; unset means open access
    pub api_key: Option<SecretString>,

    /// Key required on `/admin/*`; unset means open access
    pub admin_api_key: Option<SecretString>,

    /// Requests allowed per client IP per window
    pub rate_limit_requests: u32,

    /// Rate limit window in seconds
    pub rate_limit_window_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            admin_api_key: None,
            rate_limit_requests: 10,
            rate_limit_window_secs: 60,
        }
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Qdrant URL; when unset the in-memory store is used
    pub qdrant_url: Option<String>,

    /// Qdrant API key (Qdrant Cloud)
    pub qdrant_api_key: Option<SecretString>,

    /// Qdrant collection name
    pub collection: String,

    /// Directory for the in-memory store snapshot
    pub local_path: Option<PathBuf>,

    /// Points per upsert request
    pub upsert_batch_size: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            qdrant_url: None,
            qdrant_api_key: None,
            collection: "robotics_book_content".to_string(),
            local_path: Some(PathBuf::from("./vector_store")),
            upsert_batch_size: 128,
        }
    }
}

/// Embedding and completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI API key
    pub openai_api_key: Option<SecretString>,

    /// OpenAI-compatible API base URL
    pub base_url: String,

    /// Completion model name
    pub model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Texts per embedding request
    pub embedding_batch_size: usize,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_batch_size: 64,
            max_tokens: 1024,
            temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

/// Retrieval and prompt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results returned when the request does not say
    pub default_top_k: usize,

    /// Largest accepted `top_k`
    pub max_top_k: usize,

    /// Results scoring below this are dropped
    pub min_similarity: f32,

    /// Maximum context length for the prompt (in characters)
    pub max_context_length: usize,

    /// Earlier conversation turns included in the prompt
    pub history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 20,
            min_similarity: 0.1,
            max_context_length: 8000,
            history_turns: 3,
        }
    }
}

/// Book content configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Directory holding the book's markdown files
    pub book_content_path: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            book_content_path: PathBuf::from("./docs"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", .path.display())]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
