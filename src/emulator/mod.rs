//! Local stand-in for the managed document store's REST surface, backed by
//! any [`DocumentStore`](crate::store::DocumentStore).

pub mod handlers;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::document_routes())
}
