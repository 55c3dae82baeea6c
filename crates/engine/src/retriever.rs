//! Retrieval boundary

use async_trait::async_trait;
use citeforge_common::errors::Result;
use citeforge_common::schema::{Passage, QueryBundle};

/// Common trait for all retrievers.
///
/// `aretrieve` must return the same passages as `retrieve` for the same
/// query. The default delegates to the blocking call.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve passages for a query, best first
    fn retrieve(&self, query: &QueryBundle) -> Result<Vec<Passage>>;

    /// Retrieve without blocking the scheduler
    async fn aretrieve(&self, query: &QueryBundle) -> Result<Vec<Passage>> {
        self.retrieve(query)
    }
}

/// Returns a fixed passage list regardless of the query
#[derive(Debug, Clone, Default)]
pub struct StaticRetriever {
    passages: Vec<Passage>,
    top_k: Option<usize>,
}

impl StaticRetriever {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            top_k: None,
        }
    }

    /// Return at most `top_k` passages
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }
}

impl Retriever for StaticRetriever {
    fn retrieve(&self, _query: &QueryBundle) -> Result<Vec<Passage>> {
        let limit = self.top_k.unwrap_or(self.passages.len());
        Ok(self.passages.iter().take(limit).cloned().collect())
    }
}
