use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::wire::{self, ErrorEnvelope, ListDocumentsResponse, WireDocument};
use super::{Document, DocumentStore, Fields, StoreError};
use crate::config::StoreConfig;

/// REST client for a Firestore-compatible document endpoint.
///
/// Every call is one request/response cycle; the list call follows
/// `nextPageToken` until the collection is exhausted.
#[derive(Clone)]
pub struct FirestoreStore {
    http: Client,
    base_url: Url,
    project_id: String,
    database_id: String,
    api_key: Option<String>,
    page_size: u32,
}

impl FirestoreStore {
    pub fn new(config: &StoreConfig) -> anyhow::Result<Self> {
        let project_id = config
            .project_id
            .clone()
            .context("STORE_PROJECT_ID is required for the firestore backend")?;
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("invalid STORE_BASE_URL {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("STORE_BASE_URL {} cannot be a base url", config.base_url);
        }

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("build http client")?;

        Ok(Self {
            http,
            base_url,
            project_id,
            database_id: config.database_id.clone(),
            api_key: config.api_key.clone(),
            page_size: config.page_size,
        })
    }

    fn url(&self, collection: &str, id: Option<&str>) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("base url cannot be a base"))?;
            segments.pop_if_empty().extend([
                "v1",
                "projects",
                &self.project_id,
                "databases",
                &self.database_id,
                "documents",
                collection,
            ]);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, StoreError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(error_from_body(status.as_u16(), body));
    }
    serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
}

fn error_from_body(status: u16, body: String) -> StoreError {
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(env) => {
            let code = if env.error.status.is_empty() {
                status.to_string()
            } else {
                wire::status_to_code(&env.error.status)
            };
            StoreError::Remote {
                code,
                message: env.error.message,
            }
        }
        Err(_) => StoreError::Status { status, body },
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    #[instrument(skip(self))]
    async fn list_documents(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        let url = self.url(collection, None)?;
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .http
                .get(url.clone())
                .query(&[("pageSize", self.page_size.to_string())]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }
            let page: ListDocumentsResponse = read_json(req.send().await.map_err(StoreError::from)?).await?;
            for doc in page.documents {
                out.push(Document::from_wire(doc)?);
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        debug!(count = out.len(), "documents listed");
        Ok(out)
    }

    #[instrument(skip(self, fields))]
    async fn create_document(&self, collection: &str, fields: Fields) -> anyhow::Result<Document> {
        let body = WireDocument {
            fields: wire::encode_fields(&fields),
            ..Default::default()
        };
        let resp = self
            .http
            .post(self.url(collection, None)?)
            .json(&body)
            .send()
            .await
            .map_err(StoreError::from)?;
        let created: WireDocument = read_json(resp).await?;
        let doc = Document::from_wire(created)?;
        debug!(id = %doc.id, "document created");
        Ok(doc)
    }

    #[instrument(skip(self, fields))]
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> anyhow::Result<Document> {
        let mut query: Vec<(&str, &str)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", k.as_str()))
            .collect();
        query.push(("currentDocument.exists", "true"));

        let body = WireDocument {
            fields: wire::encode_fields(&fields),
            ..Default::default()
        };
        let resp = self
            .http
            .patch(self.url(collection, Some(id))?)
            .query(&query)
            .json(&body)
            .send()
            .await
            .map_err(StoreError::from)?;
        let updated: WireDocument = read_json(resp).await?;
        Ok(Document::from_wire(updated)?)
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, collection: &str, id: &str) -> anyhow::Result<()> {
        let resp = self
            .http
            .delete(self.url(collection, Some(id))?)
            .send()
            .await
            .map_err(StoreError::from)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.map_err(StoreError::from)?;
            return Err(error_from_body(status.as_u16(), body).into());
        }
        Ok(())
    }
}
