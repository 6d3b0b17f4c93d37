use async_trait::async_trait;
use serde_json::Value;

use crate::database::document::Document;
use crate::database::pipeline::{Filter, Stage};
use crate::middleware::error::AppResult;

#[derive(Debug, Clone, Copy)]
pub struct UpdateOptions {
    /// Return the document after the update instead of before it.
    pub return_updated: bool,
    /// Reject patches that touch `id` or change the type of an existing field.
    pub validate: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        UpdateOptions {
            return_updated: true,
            validate: true,
        }
    }
}

/// Single-statement change to an array field.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayOp {
    /// Appends the value unless it is already present.
    AddToSet(Value),
    /// Removes every copy of the value.
    Pull(Value),
}

/// Persistence collaborator shared by every service. Implementations must be
/// safe to use from concurrent requests.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, filter: &Filter) -> AppResult<Option<Document>>;

    async fn find_by_id(&self, collection: &str, id: &str) -> AppResult<Option<Document>>;

    /// Stores the document, assigning a fresh `<collection>:<key>` id when it has none.
    async fn insert(&self, collection: &str, document: Document) -> AppResult<Document>;

    async fn delete_by_id(&self, collection: &str, id: &str) -> AppResult<bool>;

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
        options: UpdateOptions,
    ) -> AppResult<Option<Document>>;

    /// Applies `op` to the array at `field` and sets `patch` in the same
    /// atomic write. Returns the updated document.
    async fn update_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        op: ArrayOp,
        patch: Document,
    ) -> AppResult<Option<Document>>;

    async fn count(&self, collection: &str, filter: &Filter) -> AppResult<u64>;

    async fn aggregate(&self, collection: &str, stages: &[Stage]) -> AppResult<Vec<Document>>;

    /// Opens a transaction. Dropping it without `commit` discards its writes.
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    async fn find_one(&mut self, collection: &str, filter: &Filter) -> AppResult<Option<Document>>;

    async fn insert(&mut self, collection: &str, document: Document) -> AppResult<Document>;

    async fn delete_by_id(&mut self, collection: &str, id: &str) -> AppResult<bool>;

    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn abort(self: Box<Self>) -> AppResult<()>;
}
