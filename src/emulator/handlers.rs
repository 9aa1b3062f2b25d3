use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use crate::{
    state::AppState,
    store::{
        wire::{self, ErrorEnvelope, ListDocumentsResponse, WireDocument},
        StoreError,
    },
};

const DEFAULT_PAGE_SIZE: usize = 300;
const MAX_PAGE_SIZE: usize = 1000;

pub fn document_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/projects/:project/databases/:database/documents/:collection",
            get(list_documents).post(create_document),
        )
        .route(
            "/v1/projects/:project/databases/:database/documents/:collection/:id",
            patch(update_document).delete(delete_document),
        )
}

type ApiError = (StatusCode, Json<ErrorEnvelope>);

#[derive(Debug, Deserialize)]
pub struct CollectionPath {
    project: String,
    database: String,
    collection: String,
}

impl CollectionPath {
    fn parent(&self) -> String {
        wire::collection_path(&self.project, &self.database, &self.collection)
    }
}

#[derive(Debug, Deserialize)]
pub struct DocumentPath {
    project: String,
    database: String,
    collection: String,
    id: String,
}

impl DocumentPath {
    fn parent(&self) -> String {
        wire::collection_path(&self.project, &self.database, &self.collection)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    page_size: Option<usize>,
    page_token: Option<String>,
}

#[instrument(skip(state))]
pub async fn list_documents(
    State(state): State<AppState>,
    Path(path): Path<CollectionPath>,
    Query(p): Query<ListParams>,
) -> Result<Json<ListDocumentsResponse>, ApiError> {
    let size = p
        .page_size
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    let offset = match p.page_token.as_deref().filter(|t| !t.is_empty()) {
        None => 0,
        Some(t) => t
            .parse::<usize>()
            .map_err(|_| invalid_argument(format!("invalid page token {t}")))?,
    };

    let docs = state
        .store
        .list_documents(&path.collection)
        .await
        .map_err(store_failure)?;

    let parent = path.parent();
    let end = offset.saturating_add(size).min(docs.len());
    let page = docs.get(offset..end).unwrap_or_default();
    Ok(Json(ListDocumentsResponse {
        documents: page
            .iter()
            .map(|d| WireDocument::from_document(d, &parent))
            .collect(),
        next_page_token: (end < docs.len()).then(|| end.to_string()),
    }))
}

#[instrument(skip(state, body))]
pub async fn create_document(
    State(state): State<AppState>,
    Path(path): Path<CollectionPath>,
    Json(body): Json<WireDocument>,
) -> Result<Json<WireDocument>, ApiError> {
    let doc = state
        .store
        .create_document(&path.collection, wire::decode_fields(body.fields))
        .await
        .map_err(store_failure)?;
    info!(collection = %path.collection, id = %doc.id, "document created");
    Ok(Json(WireDocument::from_document(&doc, &path.parent())))
}

/// Applies the fields named by `updateMask.fieldPaths` (all body fields when
/// no mask is given) to an existing document.
#[instrument(skip(state, params, body))]
pub async fn update_document(
    State(state): State<AppState>,
    Path(path): Path<DocumentPath>,
    Query(params): Query<Vec<(String, String)>>,
    Json(body): Json<WireDocument>,
) -> Result<Json<WireDocument>, ApiError> {
    let mask: Vec<&str> = params
        .iter()
        .filter(|(k, _)| k == "updateMask.fieldPaths")
        .map(|(_, v)| v.as_str())
        .collect();
    let mut fields = wire::decode_fields(body.fields);
    if !mask.is_empty() {
        fields.retain(|k, _| mask.contains(&k.as_str()));
    }

    let doc = state
        .store
        .update_document(&path.collection, &path.id, fields)
        .await
        .map_err(store_failure)?;
    info!(collection = %path.collection, id = %doc.id, "document updated");
    Ok(Json(WireDocument::from_document(&doc, &path.parent())))
}

#[instrument(skip(state))]
pub async fn delete_document(
    State(state): State<AppState>,
    Path(path): Path<DocumentPath>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .store
        .delete_document(&path.collection, &path.id)
        .await
        .map_err(store_failure)?;
    info!(collection = %path.collection, id = %path.id, "document deleted");
    Ok(Json(serde_json::json!({})))
}

fn invalid_argument(message: String) -> ApiError {
    warn!(%message, "invalid argument");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorEnvelope::new("INVALID_ARGUMENT", message)),
    )
}

fn store_failure(e: anyhow::Error) -> ApiError {
    let remote = e.chain().find_map(|c| match c.downcast_ref::<StoreError>() {
        Some(StoreError::Remote { code, message }) => Some((wire::code_to_status(code), message.clone())),
        _ => None,
    });
    let (status, message) = remote.unwrap_or_else(|| ("INTERNAL".into(), format!("{e:#}")));
    let envelope = ErrorEnvelope::new(&status, message);
    let http = StatusCode::from_u16(envelope.error.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if http.is_server_error() {
        error!(error = %format!("{e:#}"), %http, "store failure");
    } else {
        warn!(error = %format!("{e:#}"), %http, "store rejected request");
    }
    (http, Json(envelope))
}
