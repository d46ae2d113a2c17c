//! Document registry collaborator
//!
//! The persisted registry is owned by an external collaborator; the
//! pipeline consumes this interface and nothing more. The in-memory
//! implementation backs the server and the tests.

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Document, IngestStatus};

/// Registry of documents and their ingestion state
pub trait DocumentRegistry: Send + Sync {
    /// Register a new document
    fn create(&self, document: Document) -> Result<()>;

    /// Fetch a document, scoped to its owner. A wrong owner looks the
    /// same as a missing document so ids leak nothing across users.
    fn get(&self, user_id: &str, id: &Uuid) -> Option<Document>;

    /// All documents owned by a user
    fn list(&self, user_id: &str) -> Vec<Document>;

    /// Advance a document's ingestion state
    fn advance(&self, id: &Uuid, status: IngestStatus) -> Result<()>;

    /// Mark a document failed with a human-readable reason
    fn mark_failed(&self, id: &Uuid, reason: &str) -> Result<()>;

    /// Record the extracted-text hash
    fn set_content_hash(&self, id: &Uuid, hash: &str) -> Result<()>;

    /// Record the final chunk count
    fn set_total_chunks(&self, id: &Uuid, total: u32) -> Result<()>;

    /// Flag a document whose index rollback failed
    fn mark_needs_cleanup(&self, id: &Uuid) -> Result<()>;

    /// Clear the cleanup flag once the index is clean again
    fn clear_needs_cleanup(&self, id: &Uuid) -> Result<()>;

    /// Documents whose rollback still has to be retried
    fn needing_cleanup(&self) -> Vec<Document>;

    /// Remove a document, scoped to its owner
    fn remove(&self, user_id: &str, id: &Uuid) -> Result<()>;
}

/// DashMap-backed registry
#[derive(Default)]
pub struct InMemoryRegistry {
    documents: DashMap<Uuid, Document>,
}

impl InMemoryRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn with_document<F>(&self, id: &Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut Document) -> Result<()>,
    {
        let mut entry = self
            .documents
            .get_mut(id)
            .ok_or(Error::DocumentNotFound(*id))?;
        f(entry.value_mut())
    }
}

impl DocumentRegistry for InMemoryRegistry {
    fn create(&self, document: Document) -> Result<()> {
        self.documents.insert(document.id, document);
        Ok(())
    }

    fn get(&self, user_id: &str, id: &Uuid) -> Option<Document> {
        self.documents
            .get(id)
            .filter(|doc| doc.user_id == user_id)
            .map(|doc| doc.value().clone())
    }

    fn list(&self, user_id: &str) -> Vec<Document> {
        self.documents
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn advance(&self, id: &Uuid, status: IngestStatus) -> Result<()> {
        self.with_document(id, |doc| doc.advance(status))
    }

    fn mark_failed(&self, id: &Uuid, reason: &str) -> Result<()> {
        self.with_document(id, |doc| {
            doc.fail(reason);
            Ok(())
        })
    }

    fn set_content_hash(&self, id: &Uuid, hash: &str) -> Result<()> {
        self.with_document(id, |doc| {
            doc.content_hash = Some(hash.to_string());
            Ok(())
        })
    }

    fn set_total_chunks(&self, id: &Uuid, total: u32) -> Result<()> {
        self.with_document(id, |doc| {
            doc.total_chunks = total;
            Ok(())
        })
    }

    fn mark_needs_cleanup(&self, id: &Uuid) -> Result<()> {
        self.with_document(id, |doc| {
            doc.needs_cleanup = true;
            Ok(())
        })
    }

    fn clear_needs_cleanup(&self, id: &Uuid) -> Result<()> {
        self.with_document(id, |doc| {
            doc.needs_cleanup = false;
            Ok(())
        })
    }

    fn needing_cleanup(&self) -> Vec<Document> {
        self.documents
            .iter()
            .filter(|entry| entry.needs_cleanup)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn remove(&self, user_id: &str, id: &Uuid) -> Result<()> {
        match self.documents.get(id) {
            Some(doc) if doc.user_id == user_id => {}
            _ => return Err(Error::DocumentNotFound(*id)),
        }
        self.documents.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaType;

    #[test]
    fn test_get_is_owner_scoped() {
        let registry = InMemoryRegistry::new();
        let doc = Document::new("alice", "a.txt", MediaType::Text);
        let id = doc.id;
        registry.create(doc).unwrap();

        assert!(registry.get("alice", &id).is_some());
        assert!(registry.get("bob", &id).is_none());
    }

    #[test]
    fn test_remove_is_owner_scoped() {
        let registry = InMemoryRegistry::new();
        let doc = Document::new("alice", "a.txt", MediaType::Text);
        let id = doc.id;
        registry.create(doc).unwrap();

        assert!(matches!(
            registry.remove("bob", &id),
            Err(Error::DocumentNotFound(_))
        ));
        assert!(registry.remove("alice", &id).is_ok());
        assert!(registry.get("alice", &id).is_none());
    }

    #[test]
    fn test_cleanup_flag_round_trip() {
        let registry = InMemoryRegistry::new();
        let doc = Document::new("alice", "a.txt", MediaType::Text);
        let id = doc.id;
        registry.create(doc).unwrap();

        registry.mark_needs_cleanup(&id).unwrap();
        assert_eq!(registry.needing_cleanup().len(), 1);
        registry.clear_needs_cleanup(&id).unwrap();
        assert!(registry.needing_cleanup().is_empty());
    }
}
