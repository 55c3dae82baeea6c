//! Text nodes and their scored wrappers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Arbitrary key/value metadata carried alongside node text
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Links from a node to other nodes, keyed by relationship kind
pub type Relationships = BTreeMap<NodeRelationship, String>;

/// Kind of link between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRelationship {
    /// The document the node was cut from
    Source,
    /// The node immediately before this one in its document
    Previous,
    /// The node immediately after this one in its document
    Next,
    /// Enclosing node
    Parent,
    /// Contained node
    Child,
}

/// Character window of a node within a larger original document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodePosition {
    /// Offset of the first character
    pub start: usize,
    /// Offset one past the last character
    pub end: usize,
}

impl NodePosition {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of characters covered
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A unit of text with optional metadata, relationships and position
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    /// Node text
    pub text: String,

    /// Arbitrary metadata (absent for passages that carry none)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    /// Links to other nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Relationships>,

    /// Position within the original document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<NodePosition>,
}

impl Node {
    /// Create a node with text only
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_relationships(mut self, relationships: Relationships) -> Self {
        self.relationships = Some(relationships);
        self
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some(NodePosition::new(start, end));
        self
    }

    /// Citation number from a leading `Source N:` label, if present
    pub fn citation_number(&self) -> Option<usize> {
        let rest = self.text.strip_prefix("Source ")?;
        let (number, _) = rest.split_once(":\n")?;
        number.parse().ok()
    }
}

/// A node paired with its relevance score
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoredNode {
    pub node: Node,

    /// Similarity or relevance score assigned by the retriever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl ScoredNode {
    pub fn new(node: Node, score: Option<f32>) -> Self {
        Self { node, score }
    }

    /// Shorthand for a scored node with text only
    pub fn from_text(text: impl Into<String>, score: f32) -> Self {
        Self::new(Node::new(text), Some(score))
    }

    pub fn text(&self) -> &str {
        &self.node.text
    }

    pub fn citation_number(&self) -> Option<usize> {
        self.node.citation_number()
    }
}

/// A retrieved unit of text with its score
pub type Passage = ScoredNode;

/// A `Source N:` labeled, offset-annotated sub-chunk of a passage
pub type CitationNode = ScoredNode;
