//! In-memory document store for exercising the smoke test without a server.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::errors::ProbeError;
use crate::models::{CollectionName, DocumentId, FieldValue, Fields};
use crate::store::{DocumentStore, StoredDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    List,
    Add,
    Get,
    Delete,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, BTreeMap<String, StoredDocument>>>,
    failing: Mutex<HashSet<StoreOperation>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of `operation` fail with a network error.
    pub fn fail_on(&self, operation: StoreOperation) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn contains(&self, collection: &str, id: &str) -> bool {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .is_some_and(|docs| docs.contains_key(id))
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Overwrites one top-level field of a stored document.
    pub fn set_field(&self, collection: &str, id: &str, field: &str, value: FieldValue) {
        if let Some(doc) = self
            .collections
            .lock()
            .unwrap()
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
        {
            doc.fields.insert(field.to_string(), value);
        }
    }

    fn check(&self, operation: StoreOperation) -> Result<(), ProbeError> {
        if self.failing.lock().unwrap().contains(&operation) {
            return Err(ProbeError::network(format!("injected {:?} failure", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_collections(&self) -> Result<Vec<String>, ProbeError> {
        self.check(StoreOperation::List)?;
        Ok(self.collections.lock().unwrap().keys().cloned().collect())
    }

    async fn add_document(&self, collection: &CollectionName, fields: &Fields) -> Result<StoredDocument, ProbeError> {
        self.check(StoreOperation::Add)?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let stored = StoredDocument {
            id: DocumentId::new(format!("mem{:017}", n))?,
            fields: fields.clone(),
            create_time: Some(now),
            update_time: Some(now),
        };
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(stored.id.to_string(), stored.clone());
        Ok(stored)
    }

    async fn get_document(
        &self,
        collection: &CollectionName,
        id: &DocumentId,
    ) -> Result<Option<StoredDocument>, ProbeError> {
        self.check(StoreOperation::Get)?;
        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(collection.as_str())
            .and_then(|docs| docs.get(id.as_str()))
            .cloned())
    }

    async fn delete_document(&self, collection: &CollectionName, id: &DocumentId) -> Result<(), ProbeError> {
        self.check(StoreOperation::Delete)?;
        let removed = self
            .collections
            .lock()
            .unwrap()
            .get_mut(collection.as_str())
            .and_then(|docs| docs.remove(id.as_str()));
        match removed {
            Some(_) => Ok(()),
            None => Err(ProbeError::not_found(collection.as_str(), id.as_str())),
        }
    }
}
