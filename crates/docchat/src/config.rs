//! Configuration for the document chat system

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::generation::ollama::retry_budget;

/// Environment variable naming the TOML configuration file
pub const CONFIG_PATH_ENV: &str = "DOCCHAT_CONFIG";

/// Environment variable selecting the primary LLM provider by name
pub const LLM_PROVIDER_ENV: &str = "LLM_PROVIDER";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Answer generation configuration
    pub llm: LlmConfig,
    /// Retrieval and grounding gate
    pub retrieval: RetrievalConfig,
    /// Session index lifecycle
    pub sessions: SessionConfig,
    /// Background ingestion
    pub processing: ProcessingConfig,
}

impl RagConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load from `DOCCHAT_CONFIG` (or defaults), apply env overrides, and validate
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                tracing::info!("Loading configuration from {}", path);
                Self::from_file(path)?
            }
            _ => {
                tracing::info!("{} not set, using default configuration", CONFIG_PATH_ENV);
                Self::default()
            }
        };

        if let Ok(provider) = std::env::var(LLM_PROVIDER_ENV) {
            config.llm.select_primary(&provider)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every bound the core relies on. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.embeddings.validate()?;
        self.retrieval.validate()?;
        self.sessions.validate()?;
        self.processing.validate()?;
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be > 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Output dimensionality (768 for nomic-embed-text, 384 for MiniLM)
    pub dimensions: usize,
    /// Texts per embedding request
    pub batch_size: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries inside the adapter
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 32,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

impl EmbeddingConfig {
    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be > 0".to_string()));
        }
        if self.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be > 0".to_string()));
        }
        Ok(())
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Deadline for one embedding call, adapter retries included
    pub fn deadline(&self) -> Duration {
        retry_budget(self.timeout(), self.max_retries)
    }
}

/// Kind of answer-generation backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Local Ollama server
    Ollama,
    /// Any `/chat/completions` endpoint (OpenAI, Groq, ...)
    OpenaiCompatible,
}

/// One answer-generation provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name used for selection and logging
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key, if the provider needs one
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub max_retries: u32,
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    2048
}

impl ProviderConfig {
    /// Resolve the API key from the environment
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "ollama".to_string(),
            kind: ProviderKind::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            api_key_env: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: 2,
        }
    }
}

/// Answer generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider tried first
    pub primary: ProviderConfig,
    /// Provider tried when the primary fails
    pub fallback: Option<ProviderConfig>,
    /// Per-request timeout, applied to each provider separately
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            primary: ProviderConfig::default(),
            fallback: None,
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Make the provider called `name` the primary one.
    ///
    /// Selecting the fallback swaps the two; any other name is a configuration error.
    pub fn select_primary(&mut self, name: &str) -> Result<()> {
        if self.primary.name == name {
            return Ok(());
        }
        match self.fallback.take() {
            Some(fallback) if fallback.name == name => {
                let previous = std::mem::replace(&mut self.primary, fallback);
                self.fallback = Some(previous);
                tracing::info!("LLM provider '{}' selected as primary", name);
                Ok(())
            }
            other => {
                self.fallback = other;
                Err(Error::Config(format!(
                    "LLM provider '{}' not found in config",
                    name
                )))
            }
        }
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Deadline for one provider, adapter retries included
    pub fn provider_deadline(&self, provider: &ProviderConfig) -> Duration {
        retry_budget(self.timeout(), provider.max_retries)
    }

    /// Deadline for one generation call: the primary's deadline plus the fallback's
    pub fn generate_deadline(&self) -> Duration {
        let primary = self.provider_deadline(&self.primary);
        match &self.fallback {
            Some(fallback) => primary.saturating_add(self.provider_deadline(fallback)),
            None => primary,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks retrieved per query
    pub top_k: usize,
    /// Largest per-request override of `top_k`
    pub max_top_k: usize,
    /// Largest L2 distance the best hit may have before the query is answered "I don't know"
    pub similarity_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_top_k: 20,
            similarity_threshold: 1.2,
        }
    }
}

impl RetrievalConfig {
    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be > 0".to_string()));
        }
        if self.top_k > self.max_top_k {
            return Err(Error::Config(format!(
                "retrieval.top_k ({}) exceeds max_top_k ({})",
                self.top_k, self.max_top_k
            )));
        }
        if !self.similarity_threshold.is_finite() || self.similarity_threshold < 0.0 {
            return Err(Error::Config(
                "retrieval.similarity_threshold must be a finite, non-negative distance".to_string(),
            ));
        }
        Ok(())
    }
}

/// Session index lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session index is evicted
    pub ttl_secs: u64,
    /// Sessions held at once; the least recently used is evicted beyond this
    pub max_sessions: usize,
    /// How often the sweeper looks for idle sessions
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            max_sessions: 128,
            sweep_interval_secs: 60,
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<()> {
        if self.max_sessions == 0 {
            return Err(Error::Config("sessions.max_sessions must be > 0".to_string()));
        }
        if self.ttl_secs == 0 {
            return Err(Error::Config("sessions.ttl_secs must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Background ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Ingestion jobs running at once
    pub worker_count: usize,
    /// Jobs waiting before submission applies backpressure
    pub queue_capacity: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().min(4),
            queue_capacity: 256,
        }
    }
}

impl ProcessingConfig {
    fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::Config("processing.worker_count must be > 0".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("processing.queue_capacity must be > 0".to_string()));
        }
        Ok(())
    }
}
