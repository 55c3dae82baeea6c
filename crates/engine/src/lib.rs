//! Citeforge Engine
//!
//! Citation query engine: retrieves passages, re-splits them into small
//! numbered sources and asks a language model to answer with `[n]` citations.
//!
//! # Modules
//!
//! - `splitter`: Overlap-aware text splitting
//! - `citation`: Numbered citation node construction and answer citation lookup
//! - `document`: Document-to-passage splitting
//! - `postprocessor`: Citation node filtering before synthesis
//! - `prompts`: Citation prompt templates
//! - `llm`: Language model boundary
//! - `retriever`: Retrieval boundary and a static retriever
//! - `synthesizer`: Compact and refine answer synthesis
//! - `engine`: Query orchestration

pub mod citation;
pub mod document;
pub mod engine;
pub mod llm;
pub mod postprocessor;
pub mod prompts;
pub mod retriever;
pub mod splitter;
pub mod synthesizer;

pub use citation::{cited_sources, source_label, CitationNodeBuilder};
pub use document::{split_document, Document};
pub use engine::{CitationQueryEngine, CitationQueryEngineBuilder, QueryRun, QueryState};
pub use llm::LanguageModel;
pub use postprocessor::{NodePostprocessor, SimilarityCutoff};
pub use prompts::PromptTemplate;
pub use retriever::{Retriever, StaticRetriever};
pub use splitter::{ChunkSplit, OverlapSplitter, Splitter};
pub use synthesizer::{ResponseSynthesizer, Synthesizer};
