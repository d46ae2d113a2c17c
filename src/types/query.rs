//! Query request types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A question scoped to one user's documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Owning user. There is no ambient identity; every query names its user.
    pub user_id: String,

    /// The question to answer
    pub question: String,

    /// Number of chunks to retrieve (defaults to the configured value)
    #[serde(default)]
    pub top_k: Option<usize>,

    /// Restrict retrieval to specific documents
    #[serde(default)]
    pub document_filter: Option<Vec<Uuid>>,

    /// Context budget for answer composition, in characters
    /// (defaults to the configured value)
    #[serde(default)]
    pub max_context_chars: Option<usize>,
}

impl QueryRequest {
    /// Create a new query
    pub fn new(user_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            question: question.into(),
            top_k: None,
            document_filter: None,
            max_context_chars: None,
        }
    }

    /// Set the number of chunks to retrieve
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Restrict retrieval to specific documents
    pub fn with_documents(mut self, doc_ids: Vec<Uuid>) -> Self {
        self.document_filter = Some(doc_ids);
        self
    }
}
