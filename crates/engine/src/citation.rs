//! Citation node construction
//!
//! Re-splits retrieved passages into small, numbered sources. Every chunk
//! becomes a node labeled `Source N:` where N runs from 1 across all passages
//! of one call, in passage-then-chunk order.

use crate::splitter::{OverlapSplitter, Splitter};
use citeforge_common::config::ChunkingConfig;
use citeforge_common::errors::Result;
use citeforge_common::schema::{CitationNode, Node, NodePosition, Passage, ScoredNode};
use regex_lite::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Label a chunk as citation source `number`
pub fn source_label(number: usize, chunk: &str) -> String {
    format!("Source {}:\n{}\n", number, chunk)
}

/// Builds numbered citation nodes from passages
#[derive(Clone)]
pub struct CitationNodeBuilder {
    splitter: Arc<dyn Splitter>,
}

impl CitationNodeBuilder {
    pub fn new(splitter: Arc<dyn Splitter>) -> Self {
        Self { splitter }
    }

    /// Builder over an [`OverlapSplitter`] with the given sizing
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(OverlapSplitter::new(config)?)))
    }

    /// Builder with citation-granularity defaults (256/20 tokens)
    pub fn with_defaults() -> Result<Self> {
        Self::from_config(&ChunkingConfig::citation_default())
    }

    /// Turn passages into citation nodes, numbered from 1 in generation order
    pub fn build(&self, passages: &[Passage]) -> Vec<CitationNode> {
        let mut citations = Vec::new();
        for passage in passages {
            let first_number = citations.len() + 1;
            citations.extend(self.passage_citations(passage, first_number));
        }

        debug!(
            passage_count = passages.len(),
            citation_count = citations.len(),
            "Citation nodes built"
        );
        citations
    }

    fn passage_citations(&self, passage: &Passage, first_number: usize) -> Vec<CitationNode> {
        let mut start_offset = passage.node.position.map(|p| p.start).unwrap_or(0);
        let metadata = passage.node.metadata.clone().unwrap_or_default();
        let relationships = passage.node.relationships.clone().unwrap_or_default();

        self.splitter
            .split(&passage.node.text)
            .into_iter()
            .enumerate()
            .map(|(index, split)| {
                let chunk_len = split.text.chars().count();
                let start = start_offset.saturating_sub(split.overlap_chars);
                // Assumes a single separator character between consecutive
                // chunks; escaped or multi-character separators drift.
                start_offset += chunk_len + 1;

                let node = Node {
                    text: source_label(first_number + index, &split.text),
                    metadata: Some(metadata.clone()),
                    relationships: Some(relationships.clone()),
                    position: Some(NodePosition::new(start, start + chunk_len)),
                };
                ScoredNode::new(node, passage.score)
            })
            .collect()
    }
}

fn citation_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"\[(\d+(?:\s*,\s*\d+)*)\]").expect("citation marker pattern is valid")
    })
}

/// Citation nodes referenced by `[n]` or `[n, m]` markers in an answer.
///
/// Returned in ascending citation order without duplicates; numbers with no
/// matching `Source n:` node are ignored.
pub fn cited_sources<'a>(answer: &str, nodes: &'a [CitationNode]) -> Vec<&'a CitationNode> {
    let mut numbers = BTreeSet::new();
    for caps in citation_marker().captures_iter(answer) {
        for part in caps[1].split(',') {
            if let Ok(number) = part.trim().parse::<usize>() {
                numbers.insert(number);
            }
        }
    }

    numbers
        .into_iter()
        .filter_map(|number| nodes.iter().find(|n| n.citation_number() == Some(number)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::ChunkSplit;
    use citeforge_common::schema::{Metadata, NodeRelationship, Relationships};

    /// Returns the same splits for any input
    struct FixedSplits(Vec<ChunkSplit>);

    impl Splitter for FixedSplits {
        fn split(&self, _text: &str) -> Vec<ChunkSplit> {
            self.0.clone()
        }
    }

    /// One chunk per line, no overlap
    struct LineSplitter;

    impl Splitter for LineSplitter {
        fn split(&self, text: &str) -> Vec<ChunkSplit> {
            text.lines().map(|line| ChunkSplit::new(line, 0)).collect()
        }
    }

    fn builder(splitter: impl Splitter + 'static) -> CitationNodeBuilder {
        CitationNodeBuilder::new(Arc::new(splitter))
    }

    #[test]
    fn test_offsets_with_overlap() {
        let text = "abcdefghijklmnopqrstuvwxyz0123";
        let splits = vec![
            ChunkSplit::new(&text[..20], 0),
            ChunkSplit::new(&text[19..], 1),
        ];
        let passage = ScoredNode::new(Node::new(text).with_position(100, 130), Some(0.8));

        let nodes = builder(FixedSplits(splits)).build(&[passage]);

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].node.position, Some(NodePosition::new(100, 120)));
        assert_eq!(nodes[1].node.position, Some(NodePosition::new(120, 131)));
    }

    #[test]
    fn test_missing_position_starts_at_zero() {
        let passage = ScoredNode::from_text("Water is wet when the sky is red.", 0.5);
        let nodes = builder(LineSplitter).build(&[passage]);

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node.position, Some(NodePosition::new(0, 33)));
    }

    #[test]
    fn test_offsets_advance_past_separator() {
        let passage = ScoredNode::from_text("one\ntwo\nthree", 0.5);
        let nodes = builder(LineSplitter).build(&[passage]);

        let positions: Vec<_> = nodes.iter().map(|n| n.node.position.unwrap()).collect();
        assert_eq!(
            positions,
            vec![
                NodePosition::new(0, 3),
                NodePosition::new(4, 7),
                NodePosition::new(8, 13),
            ]
        );
    }

    #[test]
    fn test_numbering_is_global_and_contiguous() {
        let passages = vec![
            ScoredNode::from_text("a\nb\nc", 0.9),
            ScoredNode::from_text("d", 0.7),
            ScoredNode::from_text("e\nf", 0.5),
        ];
        let nodes = builder(LineSplitter).build(&passages);

        let numbers: Vec<_> = nodes.iter().filter_map(|n| n.citation_number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(nodes[3].text(), "Source 4:\nd\n");
        assert_eq!(nodes[5].text(), "Source 6:\nf\n");
    }

    #[test]
    fn test_numbering_restarts_per_call() {
        let b = builder(LineSplitter);
        let passages = vec![ScoredNode::from_text("x\ny", 0.1)];

        let first = b.build(&passages);
        let second = b.build(&passages);
        assert_eq!(first, second);
        assert_eq!(second[0].citation_number(), Some(1));
    }

    #[test]
    fn test_score_metadata_and_relationships_copied() {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".into(), serde_json::json!("weather.txt"));
        let mut relationships = Relationships::new();
        relationships.insert(NodeRelationship::Source, "doc-1".into());
        let passage = ScoredNode::new(
            Node::new("first\nsecond")
                .with_metadata(metadata.clone())
                .with_relationships(relationships.clone()),
            Some(0.42),
        );

        let nodes = builder(LineSplitter).build(&[passage]);

        for node in &nodes {
            assert_eq!(node.score, Some(0.42));
            assert_eq!(node.node.metadata.as_ref(), Some(&metadata));
            assert_eq!(node.node.relationships.as_ref(), Some(&relationships));
        }
    }

    #[test]
    fn test_absent_maps_default_to_empty() {
        let nodes = builder(LineSplitter).build(&[ScoredNode::new(Node::new("text"), None)]);

        assert_eq!(nodes[0].score, None);
        assert_eq!(nodes[0].node.metadata, Some(Metadata::new()));
        assert_eq!(nodes[0].node.relationships, Some(Relationships::new()));
    }

    #[test]
    fn test_empty_passage_yields_no_nodes() {
        let passages = vec![
            ScoredNode::from_text("", 0.9),
            ScoredNode::from_text("only", 0.8),
        ];
        let nodes = builder(LineSplitter).build(&passages);

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].text(), "Source 1:\nonly\n");
    }

    #[test]
    fn test_default_builder_single_chunk_passages() {
        let passages = vec![
            ScoredNode::from_text("The sky is red in the evening and blue in the morning.", 0.9),
            ScoredNode::from_text("Water is wet when the sky is red.", 0.8),
        ];
        let nodes = CitationNodeBuilder::with_defaults().unwrap().build(&passages);

        assert_eq!(nodes.len(), 2);
        assert_eq!(
            nodes[0].text(),
            "Source 1:\nThe sky is red in the evening and blue in the morning.\n"
        );
        assert_eq!(nodes[1].text(), "Source 2:\nWater is wet when the sky is red.\n");
    }

    #[test]
    fn test_cited_sources() {
        let nodes = builder(LineSplitter).build(&[ScoredNode::from_text("a\nb\nc", 1.0)]);

        let answer = "Wet when red [2], in the evening [1]. Also [2, 3] and [9].";
        let cited = cited_sources(answer, &nodes);
        let numbers: Vec<_> = cited.iter().filter_map(|n| n.citation_number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        assert!(cited_sources("No markers here.", &nodes).is_empty());
    }
}
