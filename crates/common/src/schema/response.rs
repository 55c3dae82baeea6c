//! Synthesized answers and their supporting sources

use super::node::{Metadata, NodeRelationship, ScoredNode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final answer plus the nodes it was based on
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Response {
    /// Answer text, `None` when nothing was synthesized
    pub response: Option<String>,

    /// Citation nodes in numbering order, followed by any additional sources
    #[serde(default)]
    pub source_nodes: Vec<ScoredNode>,

    /// Extra information attached by the synthesizer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Response {
    pub fn new(response: Option<String>, source_nodes: Vec<ScoredNode>) -> Self {
        Self {
            response,
            source_nodes,
            metadata: None,
        }
    }

    /// One `> Source (Doc id: ..): text` line per source node, each text cut
    /// to `length` characters.
    pub fn formatted_sources(&self, length: usize) -> String {
        self.source_nodes
            .iter()
            .map(|source| {
                let doc_id = source
                    .node
                    .relationships
                    .as_ref()
                    .and_then(|r| r.get(&NodeRelationship::Source))
                    .map(String::as_str)
                    .unwrap_or("none");
                format!("> Source (Doc id: {}): {}", doc_id, truncate(source.text(), length))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.response.as_deref().unwrap_or("None"))
    }
}

fn truncate(text: &str, length: usize) -> String {
    if text.chars().count() <= length {
        return text.to_string();
    }
    let cut: String = text.chars().take(length.saturating_sub(3)).collect();
    format!("{}...", cut)
}
