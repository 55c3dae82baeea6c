//! Request-side input to retrieval and synthesis

use serde::{Deserialize, Serialize};

/// The query string plus any auxiliary representations a retriever may use
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryBundle {
    /// Raw query text
    pub query_str: String,

    /// Alternative strings to embed instead of the query text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_embedding_strs: Option<Vec<String>>,

    /// Precomputed query embedding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl QueryBundle {
    pub fn new(query_str: impl Into<String>) -> Self {
        Self {
            query_str: query_str.into(),
            ..Self::default()
        }
    }

    /// Strings a retriever should embed, falling back to the query text
    pub fn embedding_strs(&self) -> Vec<&str> {
        match &self.custom_embedding_strs {
            Some(strs) => strs.iter().map(String::as_str).collect(),
            None => vec![self.query_str.as_str()],
        }
    }
}

impl From<&str> for QueryBundle {
    fn from(query_str: &str) -> Self {
        Self::new(query_str)
    }
}

impl From<String> for QueryBundle {
    fn from(query_str: String) -> Self {
        Self::new(query_str)
    }
}
