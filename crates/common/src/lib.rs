//! Citeforge Common Library
//!
//! Shared code for the citation query engine and its drivers:
//! - Node, query and response types
//! - Error types and handling
//! - Configuration management
//! - Query lifecycle callbacks
//! - Metrics

pub mod callbacks;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod schema;

// Re-export commonly used types
pub use callbacks::{
    CallbackHandler, CallbackManager, EventId, EventKind, EventPayload, TracingHandler,
};
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use schema::{
    CitationNode, Metadata, Node, NodePosition, NodeRelationship, Passage, QueryBundle,
    Relationships, Response, ScoredNode,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default chunk size for retrieval-granularity passages
pub const DEFAULT_SOURCE_CHUNK_SIZE: usize = 512;

/// Default overlap for retrieval-granularity passages
pub const DEFAULT_SOURCE_CHUNK_OVERLAP: usize = 20;

/// Default chunk size for citation nodes
pub const DEFAULT_CITATION_CHUNK_SIZE: usize = 256;

/// Default overlap for citation nodes
pub const DEFAULT_CITATION_CHUNK_OVERLAP: usize = 20;

/// Default max characters of labeled source text per language model call
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8000;
