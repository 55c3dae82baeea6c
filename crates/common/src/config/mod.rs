//! Configuration management for Citeforge
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use crate::errors::{AppError, Result};
use crate::{
    DEFAULT_CITATION_CHUNK_OVERLAP, DEFAULT_CITATION_CHUNK_SIZE, DEFAULT_MAX_CONTEXT_CHARS,
    DEFAULT_SOURCE_CHUNK_OVERLAP, DEFAULT_SOURCE_CHUNK_SIZE,
};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    /// Retrieval-granularity splitting (documents into passages)
    pub source: ChunkingConfig,

    /// Citation-granularity splitting (passages into numbered sources)
    pub citation: ChunkingConfig,

    /// Answer synthesis configuration
    pub synthesis: SynthesisConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

/// How chunk sizes are measured
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SizeMeasure {
    /// Unicode scalar values
    Characters,
    /// cl100k BPE tokens
    Tokens,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ChunkingConfig {
    /// Upper bound on each chunk, in `measure` units
    pub chunk_size: usize,

    /// Trailing content repeated at the start of the next chunk, in `measure` units
    pub chunk_overlap: usize,

    /// Unit used for `chunk_size` and `chunk_overlap`
    pub measure: SizeMeasure,
}

/// How retrieved context is fed to the language model
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Pack as many sources per call as fit in the context budget
    Compact,
    /// One source per call, refining the running answer
    Refine,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SynthesisConfig {
    /// Response mode
    pub response_mode: ResponseMode,

    /// Maximum characters of labeled source text per language model call
    pub max_context_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    pub log_level: String,

    /// Enable JSON logging
    pub json_logging: bool,

    /// Service name attached to log lines
    pub service_name: String,
}

// Default values
fn default_measure() -> &'static str { "tokens" }
fn default_response_mode() -> &'static str { "compact" }
fn default_log_level() -> &'static str { "info" }
fn default_json_logging() -> bool { false }
fn default_service_name() -> &'static str { "citeforge" }

impl ChunkingConfig {
    /// Retrieval-granularity defaults (512/20 tokens)
    pub fn source_default() -> Self {
        Self {
            chunk_size: DEFAULT_SOURCE_CHUNK_SIZE,
            chunk_overlap: DEFAULT_SOURCE_CHUNK_OVERLAP,
            measure: SizeMeasure::Tokens,
        }
    }

    /// Citation-granularity defaults (256/20 tokens)
    pub fn citation_default() -> Self {
        Self {
            chunk_size: DEFAULT_CITATION_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CITATION_CHUNK_OVERLAP,
            measure: SizeMeasure::Tokens,
        }
    }

    /// Character-measured chunking
    pub fn characters(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            measure: SizeMeasure::Characters,
        }
    }

    /// Reject sizes the splitter cannot honour.
    ///
    /// An overlap equal to or larger than the chunk size would never make
    /// progress, so it is rejected rather than clamped.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AppError::invalid_chunk_config(
                self.chunk_size,
                self.chunk_overlap,
                "chunk size must be greater than zero",
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::invalid_chunk_config(
                self.chunk_size,
                self.chunk_overlap,
                "chunk overlap must be smaller than chunk size",
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = with_defaults(Config::builder())?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__CITATION__CHUNK_SIZE=128
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let config = with_defaults(Config::builder())?
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.citation.validate()?;
        if self.synthesis.max_context_chars == 0 {
            return Err(AppError::Configuration {
                message: "synthesis.max_context_chars must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("source.chunk_size", DEFAULT_SOURCE_CHUNK_SIZE as i64)?
        .set_default("source.chunk_overlap", DEFAULT_SOURCE_CHUNK_OVERLAP as i64)?
        .set_default("source.measure", default_measure())?
        .set_default("citation.chunk_size", DEFAULT_CITATION_CHUNK_SIZE as i64)?
        .set_default("citation.chunk_overlap", DEFAULT_CITATION_CHUNK_OVERLAP as i64)?
        .set_default("citation.measure", default_measure())?
        .set_default("synthesis.response_mode", default_response_mode())?
        .set_default("synthesis.max_context_chars", DEFAULT_MAX_CONTEXT_CHARS as i64)?
        .set_default("observability.log_level", default_log_level())?
        .set_default("observability.json_logging", default_json_logging())?
        .set_default("observability.service_name", default_service_name())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: ChunkingConfig::source_default(),
            citation: ChunkingConfig::citation_default(),
            synthesis: SynthesisConfig {
                response_mode: ResponseMode::Compact,
                max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            },
            observability: ObservabilityConfig {
                log_level: default_log_level().to_string(),
                json_logging: default_json_logging(),
                service_name: default_service_name().to_string(),
            },
        }
    }
}
