//! Node, query and response types shared by retrievers, the citation
//! builder and synthesizers.

mod node;
mod query;
mod response;

pub use node::{
    CitationNode, Metadata, Node, NodePosition, NodeRelationship, Passage, Relationships,
    ScoredNode,
};
pub use query::QueryBundle;
pub use response::Response;
