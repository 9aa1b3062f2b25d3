use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use super::{auto_id, Document, DocumentStore, Fields, StoreError};

/// In-process store. Lists come back in document id order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    /// Number of documents currently held in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    #[cfg(test)]
    pub async fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_document(&self, collection: &str, fields: Fields) -> anyhow::Result<Document> {
        let now = OffsetDateTime::now_utc();
        let mut guard = self.collections.write().await;
        let docs = guard.entry(collection.to_string()).or_default();
        let mut id = auto_id();
        while docs.contains_key(&id) {
            id = auto_id();
        }
        let doc = Document {
            id: id.clone(),
            fields,
            create_time: now,
            update_time: now,
        };
        docs.insert(id, doc.clone());
        debug!(collection, id = %doc.id, "memory document created");
        Ok(doc)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> anyhow::Result<Document> {
        let mut guard = self.collections.write().await;
        let doc = guard
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::not_found(format!("No document to update: {collection}/{id}")))?;
        doc.fields.extend(fields);
        doc.update_time = OffsetDateTime::now_utc();
        Ok(doc.clone())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> anyhow::Result<()> {
        let mut guard = self.collections.write().await;
        if let Some(docs) = guard.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}
