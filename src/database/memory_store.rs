use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::database::document::{apply_array_op, apply_patch, new_record_id, Document, ID_FIELD};
use crate::database::pipeline::{run_stages, Filter, LookupSource, Stage};
use crate::interfaces::document_store::{ArrayOp, DocumentStore, StoreTransaction, UpdateOptions};
use crate::middleware::error::{AppError, AppResult};

#[derive(Debug, Default)]
struct MemoryState {
    // insertion order is the natural order of a collection
    collections: HashMap<String, Vec<Document>>,
}

impl MemoryState {
    fn documents(&self, collection: &str) -> &[Document] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn position(&self, collection: &str, id: &str) -> Option<usize> {
        self.documents(collection)
            .iter()
            .position(|d| d.get(ID_FIELD).and_then(Value::as_str) == Some(id))
    }

    fn find_one(&self, collection: &str, filter: &Filter) -> Option<Document> {
        self.documents(collection)
            .iter()
            .find(|d| filter.matches(d))
            .cloned()
    }

    fn find_by_id(&self, collection: &str, id: &str) -> Option<Document> {
        self.position(collection, id)
            .map(|i| self.documents(collection)[i].clone())
    }

    fn insert(&mut self, collection: &str, mut document: Document) -> AppResult<Document> {
        let id = match document.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) => {
                if !id.starts_with(&format!("{collection}:")) {
                    return Err(AppError::InvalidIdentifier {
                        value: id.to_string(),
                    });
                }
                id.to_string()
            }
            None => new_record_id(collection),
        };
        if self.position(collection, &id).is_some() {
            return Err(AppError::Conflict {
                description: format!("record {id} already exists"),
            });
        }
        document.insert(ID_FIELD.to_string(), Value::String(id));
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    fn remove(&mut self, collection: &str, id: &str) -> Option<(usize, Document)> {
        let index = self.position(collection, id)?;
        let docs = self.collections.get_mut(collection)?;
        Some((index, docs.remove(index)))
    }
}

/// In-process document store. Transactions hold an exclusive lock over the
/// whole store, which makes them serializable.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LookupSource for MemoryStore {
    async fn fetch_by_ids(&self, collection: &str, ids: &[String]) -> AppResult<Vec<Document>> {
        let state = self.state.lock().await;
        Ok(state
            .documents(collection)
            .iter()
            .filter(|d| {
                d.get(ID_FIELD)
                    .and_then(Value::as_str)
                    .map(|id| ids.iter().any(|wanted| wanted == id))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> AppResult<Option<Document>> {
        Ok(self.state.lock().await.find_one(collection, filter))
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        Ok(self.state.lock().await.find_by_id(collection, id))
    }

    async fn insert(&self, collection: &str, document: Document) -> AppResult<Document> {
        self.state.lock().await.insert(collection, document)
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> AppResult<bool> {
        Ok(self.state.lock().await.remove(collection, id).is_some())
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
        options: UpdateOptions,
    ) -> AppResult<Option<Document>> {
        let mut state = self.state.lock().await;
        let Some(index) = state.position(collection, id) else {
            return Ok(None);
        };
        let Some(docs) = state.collections.get_mut(collection) else {
            return Ok(None);
        };
        let before = docs[index].clone();
        let after = apply_patch(before.clone(), patch, options.validate)?;
        docs[index] = after.clone();
        Ok(Some(if options.return_updated { after } else { before }))
    }

    async fn update_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        op: ArrayOp,
        patch: Document,
    ) -> AppResult<Option<Document>> {
        let mut state = self.state.lock().await;
        let Some(index) = state.position(collection, id) else {
            return Ok(None);
        };
        let Some(docs) = state.collections.get_mut(collection) else {
            return Ok(None);
        };
        let mut after = apply_patch(docs[index].clone(), patch, true)?;
        apply_array_op(&mut after, field, &op)?;
        docs[index] = after.clone();
        Ok(Some(after))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .documents(collection)
            .iter()
            .filter(|d| filter.matches(d))
            .count() as u64)
    }

    async fn aggregate(&self, collection: &str, stages: &[Stage]) -> AppResult<Vec<Document>> {
        // snapshot first so lookups can take the lock again
        let documents = self.state.lock().await.documents(collection).to_vec();
        run_stages(self, documents, stages).await
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            guard: Some(guard),
            undo: vec![],
        }))
    }
}

#[derive(Debug)]
enum UndoEntry {
    Remove {
        collection: String,
        id: String,
    },
    Restore {
        collection: String,
        index: usize,
        document: Document,
    },
}

pub struct MemoryTransaction {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    undo: Vec<UndoEntry>,
}

impl MemoryTransaction {
    fn state(&mut self) -> AppResult<&mut MemoryState> {
        self.guard.as_deref_mut().ok_or_else(|| AppError::Store {
            source: "transaction already finished".to_string(),
        })
    }

    fn rollback(&mut self) {
        let Some(state) = self.guard.as_deref_mut() else {
            return;
        };
        while let Some(entry) = self.undo.pop() {
            match entry {
                UndoEntry::Remove { collection, id } => {
                    state.remove(&collection, &id);
                }
                UndoEntry::Restore {
                    collection,
                    index,
                    document,
                } => {
                    let docs = state.collections.entry(collection).or_default();
                    let index = index.min(docs.len());
                    docs.insert(index, document);
                }
            }
        }
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.rollback();
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find_one(&mut self, collection: &str, filter: &Filter) -> AppResult<Option<Document>> {
        Ok(self.state()?.find_one(collection, filter))
    }

    async fn insert(&mut self, collection: &str, document: Document) -> AppResult<Document> {
        let inserted = self.state()?.insert(collection, document)?;
        let id = inserted
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.undo.push(UndoEntry::Remove {
            collection: collection.to_string(),
            id,
        });
        Ok(inserted)
    }

    async fn delete_by_id(&mut self, collection: &str, id: &str) -> AppResult<bool> {
        match self.state()?.remove(collection, id) {
            Some((index, document)) => {
                self.undo.push(UndoEntry::Restore {
                    collection: collection.to_string(),
                    index,
                    document,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut this = self;
        this.undo.clear();
        this.guard.take();
        Ok(())
    }

    async fn abort(self: Box<Self>) -> AppResult<()> {
        let mut this = self;
        this.rollback();
        this.guard.take();
        Ok(())
    }
}
