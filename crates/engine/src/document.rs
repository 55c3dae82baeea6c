//! Splitting source documents into retrieval-granularity passages

use crate::splitter::Splitter;
use citeforge_common::schema::{
    Metadata, Node, NodePosition, NodeRelationship, Passage, Relationships, ScoredNode,
};
use serde::{Deserialize, Serialize};

/// A whole source document before splitting
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    /// Identifier recorded as each passage's source relationship
    #[serde(default)]
    pub doc_id: Option<String>,

    pub text: String,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }
}

/// Split a document into unscored passages with document-relative positions.
///
/// Chunks from the splitter are contiguous apart from their declared overlap,
/// so each passage's `{start, end}` is exact in the document's character
/// coordinates.
pub fn split_document(document: &Document, splitter: &dyn Splitter) -> Vec<Passage> {
    let relationships = document.doc_id.as_ref().map(|doc_id| {
        let mut relationships = Relationships::new();
        relationships.insert(NodeRelationship::Source, doc_id.clone());
        relationships
    });
    let metadata = (!document.metadata.is_empty()).then(|| document.metadata.clone());

    let mut cursor = 0usize;
    splitter
        .split(&document.text)
        .into_iter()
        .map(|split| {
            let start = cursor.saturating_sub(split.overlap_chars);
            let end = start + split.text.chars().count();
            cursor = end;

            let node = Node {
                text: split.text,
                metadata: metadata.clone(),
                relationships: relationships.clone(),
                position: Some(NodePosition::new(start, end)),
            };
            ScoredNode::new(node, None)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::OverlapSplitter;

    const REPORT: &str = "Morning fog lifted over the harbour. Fishing boats returned before noon \
        with a modest catch. By evening the sky turned red and the wind dropped. \
        Water on the docks stayed wet until the sun rose again.";

    #[test]
    fn test_positions_index_document() {
        let splitter = OverlapSplitter::characters(60, 12).unwrap();
        let document = Document::new(REPORT).with_id("harbour-log");

        let passages = split_document(&document, &splitter);
        assert!(passages.len() > 1);

        let chars: Vec<char> = REPORT.chars().collect();
        for passage in &passages {
            let position = passage.node.position.unwrap();
            let expected: String = chars[position.start..position.end].iter().collect();
            assert_eq!(passage.text(), expected);
        }
        assert_eq!(passages.last().unwrap().node.position.unwrap().end, chars.len());
    }

    #[test]
    fn test_source_relationship_and_metadata() {
        let splitter = OverlapSplitter::characters(500, 20).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("author".into(), serde_json::json!("harbour master"));
        let document = Document {
            doc_id: Some("harbour-log".into()),
            text: REPORT.into(),
            metadata: metadata.clone(),
        };

        let passages = split_document(&document, &splitter);

        assert_eq!(passages.len(), 1);
        let node = &passages[0].node;
        assert_eq!(node.metadata.as_ref(), Some(&metadata));
        assert_eq!(
            node.relationships.as_ref().and_then(|r| r.get(&NodeRelationship::Source)),
            Some(&"harbour-log".to_string())
        );
        assert_eq!(passages[0].score, None);
    }

    #[test]
    fn test_bare_document() {
        let splitter = OverlapSplitter::characters(500, 20).unwrap();
        let passages = split_document(&Document::new("short"), &splitter);

        assert_eq!(passages[0].node.metadata, None);
        assert_eq!(passages[0].node.relationships, None);
        assert_eq!(passages[0].node.position, Some(NodePosition::new(0, 5)));
    }

    #[test]
    fn test_empty_document() {
        let splitter = OverlapSplitter::characters(500, 20).unwrap();
        assert!(split_document(&Document::new(""), &splitter).is_empty());
    }
}
