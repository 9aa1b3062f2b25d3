use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use time::OffsetDateTime;

use crate::config::{StoreBackend, StoreConfig};

pub mod firestore;
pub mod memory;
pub mod postgres;
pub mod wire;

/// Schemaless document payload.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// One document as last read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
    pub create_time: OffsetDateTime,
    pub update_time: OffsetDateTime,
}

impl Document {
    pub fn from_wire(doc: wire::WireDocument) -> Result<Self, StoreError> {
        let id = doc.id().to_string();
        if id.is_empty() {
            return Err(StoreError::Decode("document without a name".into()));
        }
        Ok(Self {
            id,
            fields: wire::decode_fields(doc.fields),
            create_time: doc.create_time.unwrap_or(OffsetDateTime::UNIX_EPOCH),
            update_time: doc.update_time.unwrap_or(OffsetDateTime::UNIX_EPOCH),
        })
    }
}

/// Failures raised by a document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store answered with a structured error.
    #[error("{message}")]
    Remote { code: String, message: String },
    #[error("store responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed store response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Remote {
            code: "not-found".into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// A remote document collection addressed by collection name and document id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_documents(&self, collection: &str) -> anyhow::Result<Vec<Document>>;

    /// Creates a document; the store mints its id.
    async fn create_document(&self, collection: &str, fields: Fields) -> anyhow::Result<Document>;

    /// Overwrites the given fields of an existing document. Fails with a
    /// `not-found` [`StoreError::Remote`] if the document does not exist.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> anyhow::Result<Document>;

    /// Deleting a missing document is not an error.
    async fn delete_document(&self, collection: &str, id: &str) -> anyhow::Result<()>;

    async fn close(&self) {}
}

/// Builds the backend selected by `config`.
pub async fn connect(config: &StoreConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.backend {
        StoreBackend::Firestore => Arc::new(firestore::FirestoreStore::new(config)?),
        StoreBackend::Memory => Arc::new(memory::MemoryStore::new()),
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            Arc::new(postgres::PgStore::connect(url).await?)
        }
    };
    tracing::info!(backend = ?config.backend, "document store ready");
    Ok(store)
}

/// 20 alphanumeric characters, the shape of the managed store's auto ids.
pub fn auto_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}
