//! Error types for Citeforge
//!
//! Provides a single error enum shared by the engine and its collaborators:
//! - Distinct variants for configuration, collaborator and internal failures
//! - Machine-readable error codes
//! - A coarse category used by callers to decide how to render a failure

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Configuration errors (1xxx)
    InvalidChunkConfig,
    ConfigurationError,

    // Collaborator errors (2xxx)
    RetrievalError,
    SynthesisError,
    LanguageModelError,
    UpstreamError,

    // Internal errors (9xxx)
    TemplateError,
    InvalidStateTransition,
    SerializationError,
    IoError,
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Configuration (1xxx)
            ErrorCode::InvalidChunkConfig => 1001,
            ErrorCode::ConfigurationError => 1002,

            // Collaborators (2xxx)
            ErrorCode::RetrievalError => 2001,
            ErrorCode::SynthesisError => 2002,
            ErrorCode::LanguageModelError => 2003,
            ErrorCode::UpstreamError => 2004,

            // Internal (9xxx)
            ErrorCode::TemplateError => 9001,
            ErrorCode::InvalidStateTransition => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::IoError => 9004,
            ErrorCode::InternalError => 9005,
        }
    }
}

/// Broad classes of failure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid sizing or settings, detected before any query runs
    Configuration,
    /// Raised by a retriever, synthesizer or language model
    Collaborator,
    /// Bug or environment failure inside this crate family
    Internal,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Configuration errors
    #[error("Invalid chunk configuration (size {chunk_size}, overlap {chunk_overlap}): {message}")]
    InvalidChunkConfig {
        chunk_size: usize,
        chunk_overlap: usize,
        message: String,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Configuration source error: {0}")]
    Config(#[from] config::ConfigError),

    // Collaborator errors
    #[error("Retrieval failed: {message}")]
    Retrieval { message: String },

    #[error("Synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("Language model error: {message}")]
    LanguageModel { message: String },

    // Internal errors
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Invalid query state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidChunkConfig { .. } => ErrorCode::InvalidChunkConfig,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Config(_) => ErrorCode::ConfigurationError,
            AppError::Retrieval { .. } => ErrorCode::RetrievalError,
            AppError::Synthesis { .. } => ErrorCode::SynthesisError,
            AppError::LanguageModel { .. } => ErrorCode::LanguageModelError,
            AppError::Template { .. } => ErrorCode::TemplateError,
            AppError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Io(_) => ErrorCode::IoError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Other(_) => ErrorCode::UpstreamError,
        }
    }

    /// Get the category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::InvalidChunkConfig { .. }
            | AppError::Configuration { .. }
            | AppError::Config(_) => ErrorCategory::Configuration,

            // Collaborators may surface arbitrary failures through `Other`
            AppError::Retrieval { .. }
            | AppError::Synthesis { .. }
            | AppError::LanguageModel { .. }
            | AppError::Other(_) => ErrorCategory::Collaborator,

            AppError::Template { .. }
            | AppError::InvalidStateTransition { .. }
            | AppError::Serialization(_)
            | AppError::Io(_)
            | AppError::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Check if this error came from an external collaborator
    pub fn is_collaborator_error(&self) -> bool {
        self.category() == ErrorCategory::Collaborator
    }

    /// Check if this error is a configuration error
    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    /// Build a chunk sizing error
    pub fn invalid_chunk_config(
        chunk_size: usize,
        chunk_overlap: usize,
        message: impl Into<String>,
    ) -> Self {
        AppError::InvalidChunkConfig {
            chunk_size,
            chunk_overlap,
            message: message.into(),
        }
    }
}
