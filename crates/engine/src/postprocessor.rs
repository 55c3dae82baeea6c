//! Node postprocessing before synthesis
//!
//! Postprocessors filter or reorder citation nodes after numbering. They
//! never touch node text, so surviving nodes keep their `Source N:` labels
//! and an answer's `[n]` markers still resolve against the original set.

use citeforge_common::schema::{QueryBundle, ScoredNode};
use tracing::debug;

/// Filters or reranks candidate nodes for a query
pub trait NodePostprocessor: Send + Sync {
    fn postprocess(&self, nodes: Vec<ScoredNode>, query: &QueryBundle) -> Vec<ScoredNode>;
}

/// Drops nodes scoring below a minimum similarity.
///
/// Nodes without a score are dropped too.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityCutoff {
    min_score: f32,
}

impl SimilarityCutoff {
    pub fn new(min_score: f32) -> Self {
        Self { min_score }
    }

    pub fn min_score(&self) -> f32 {
        self.min_score
    }
}

impl NodePostprocessor for SimilarityCutoff {
    fn postprocess(&self, nodes: Vec<ScoredNode>, _query: &QueryBundle) -> Vec<ScoredNode> {
        let before = nodes.len();
        let kept: Vec<ScoredNode> = nodes
            .into_iter()
            .filter(|node| node.score.is_some_and(|score| score >= self.min_score))
            .collect();

        debug!(
            min_score = self.min_score,
            before,
            after = kept.len(),
            "Similarity cutoff applied"
        );
        kept
    }
}
