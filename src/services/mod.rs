use serde_json::Value;

use crate::database::document::Document;
use crate::interfaces::document_store::DocumentStore;
use crate::middleware::error::{AppError, AppResult};

pub mod comment_service;
pub mod like_service;
pub mod listing_service;
pub mod playlist_service;
pub mod subscription_service;
pub mod toggle_service;
pub mod tweet_service;
pub mod video_service;

/// Loads a record or fails with `EntityFailIdNotFound`.
pub(crate) async fn get_required(
    store: &dyn DocumentStore,
    table: &str,
    id: &str,
) -> AppResult<Document> {
    store
        .find_by_id(table, id)
        .await?
        .ok_or_else(|| AppError::EntityFailIdNotFound {
            ident: id.to_string(),
        })
}

pub(crate) fn require_owner(document: &Document, actor_id: &str) -> AppResult<()> {
    match document.get("owner") {
        Some(Value::String(owner)) if owner == actor_id => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}
