//! Overlap-aware text splitting
//!
//! Splits text into bounded chunks and reports, for each chunk, how many
//! characters it repeats from the end of the previous one.

use citeforge_common::config::{ChunkingConfig, SizeMeasure};
use citeforge_common::errors::{AppError, Result};
use text_splitter::{Characters, ChunkConfig, ChunkSizer, TextSplitter};
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// One chunk of a split text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSplit {
    /// Chunk text, a contiguous substring of the input
    pub text: String,
    /// Characters shared with the end of the previous chunk (0 for the first)
    pub overlap_chars: usize,
}

impl ChunkSplit {
    pub fn new(text: impl Into<String>, overlap_chars: usize) -> Self {
        Self {
            text: text.into(),
            overlap_chars,
        }
    }
}

/// Splits text into ordered, overlap-annotated chunks
pub trait Splitter: Send + Sync {
    /// Split `text`. Empty input yields no chunks.
    fn split(&self, text: &str) -> Vec<ChunkSplit>;
}

enum SplitterKind {
    Characters(TextSplitter<Characters>),
    Tokens(TextSplitter<CoreBPE>),
}

/// Sliding-window splitter backed by `text-splitter`.
///
/// Chunks break at the largest semantic unit that fits (sentences, then
/// words, then characters) and whitespace is kept, so dropping each chunk's
/// leading `overlap_chars` and concatenating gives back the input.
pub struct OverlapSplitter {
    config: ChunkingConfig,
    kind: SplitterKind,
}

impl OverlapSplitter {
    /// Create a splitter, rejecting `chunk_overlap >= chunk_size`
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        config.validate()?;

        let kind = match config.measure {
            SizeMeasure::Characters => {
                SplitterKind::Characters(TextSplitter::new(chunk_config(config, Characters)?))
            }
            SizeMeasure::Tokens => {
                let tokenizer = tiktoken_rs::cl100k_base().map_err(|e| AppError::Configuration {
                    message: format!("Failed to load cl100k tokenizer: {}", e),
                })?;
                SplitterKind::Tokens(TextSplitter::new(chunk_config(config, tokenizer)?))
            }
        };

        Ok(Self {
            config: config.clone(),
            kind,
        })
    }

    /// Character-measured splitter
    pub fn characters(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::new(&ChunkingConfig::characters(chunk_size, chunk_overlap))
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }
}

fn chunk_config<S: ChunkSizer>(config: &ChunkingConfig, sizer: S) -> Result<ChunkConfig<S>> {
    ChunkConfig::new(config.chunk_size)
        .with_sizer(sizer)
        .with_trim(false)
        .with_overlap(config.chunk_overlap)
        .map_err(|e| {
            AppError::invalid_chunk_config(config.chunk_size, config.chunk_overlap, e.to_string())
        })
}

impl Splitter for OverlapSplitter {
    fn split(&self, text: &str) -> Vec<ChunkSplit> {
        if text.is_empty() {
            return Vec::new();
        }

        let indexed: Vec<(usize, &str)> = match &self.kind {
            SplitterKind::Characters(splitter) => splitter.chunk_indices(text).collect(),
            SplitterKind::Tokens(splitter) => splitter.chunk_indices(text).collect(),
        };

        let mut splits = Vec::with_capacity(indexed.len());
        // Byte offset one past the furthest chunk end seen so far
        let mut covered = 0usize;

        for (offset, chunk) in indexed {
            let overlap_chars = if splits.is_empty() || offset >= covered {
                0
            } else {
                text[offset..covered]
                    .chars()
                    .count()
                    .min(chunk.chars().count())
            };
            covered = covered.max(offset + chunk.len());
            splits.push(ChunkSplit::new(chunk, overlap_chars));
        }

        debug!(
            input_len = text.len(),
            chunk_count = splits.len(),
            chunk_size = self.config.chunk_size,
            chunk_overlap = self.config.chunk_overlap,
            "Text split"
        );

        splits
    }
}
