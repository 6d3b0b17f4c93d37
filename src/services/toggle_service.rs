use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error};

use crate::database::document::{document_id, to_document};
use crate::database::pipeline::Filter;
use crate::database::table_names::USER_TABLE_NAME;
use crate::database::transaction::{with_timeout, with_transaction};
use crate::entities::association::{Association, RelationKind, ToggleResult, ToggleState};
use crate::interfaces::document_store::DocumentStore;
use crate::middleware::error::{AppError, AppResult};
use crate::middleware::utils::string_utils::{get_str_id, split_record_id};

/// Creates or removes the single association of `kind` between an actor
/// and a subject. Every like and subscription goes through here.
pub struct ToggleService<'a> {
    store: &'a dyn DocumentStore,
    timeout: Duration,
}

impl<'a> ToggleService<'a> {
    pub fn new(store: &'a dyn DocumentStore, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn toggle(
        &self,
        actor_id: &str,
        subject_id: &str,
        kind: RelationKind,
    ) -> AppResult<ToggleResult> {
        let actor = get_str_id(actor_id, USER_TABLE_NAME)?;
        let (subject_table, _) = split_record_id(subject_id)?;
        if !kind.subject_tables().contains(&subject_table) {
            return Err(AppError::InvalidIdentifier {
                value: subject_id.to_string(),
            });
        }
        if !kind.allows_self_reference() && actor == subject_id {
            return Err(AppError::SelfReferenceNotAllowed);
        }

        with_timeout(self.timeout, self.toggle_checked(actor, subject_id, subject_table, kind)).await
    }

    async fn toggle_checked(
        &self,
        actor: String,
        subject: &str,
        subject_table: &str,
        kind: RelationKind,
    ) -> AppResult<ToggleResult> {
        if self.store.find_by_id(subject_table, subject).await?.is_none() {
            return Err(AppError::SubjectNotFound {
                ident: subject.to_string(),
            });
        }

        let collection = kind.collection();
        let filter = Filter::And(vec![
            Filter::eq("actor", actor.clone()),
            Filter::eq("subject", subject),
        ]);
        let association = to_document(&Association {
            id: None,
            actor,
            subject: subject.to_string(),
            subject_type: subject_table.to_string(),
            kind,
            created_at: Utc::now(),
        })?;

        let state = with_transaction(self.store, move |tx| {
            Box::pin(async move {
                match tx.find_one(collection, &filter).await? {
                    Some(existing) => {
                        let id = document_id(&existing)?.to_string();
                        if !tx.delete_by_id(collection, &id).await? {
                            return Err(AppError::Store {
                                source: format!("association {id} vanished inside transaction"),
                            });
                        }
                        Ok(ToggleState::Removed)
                    }
                    None => {
                        tx.insert(collection, association).await?;
                        Ok(ToggleState::Created)
                    }
                }
            })
        })
        .await
        .map_err(|err| {
            error!(error = ?err, %kind, subject, "toggle failed");
            AppError::ToggleOperationFailed {
                source: format!("{err:?}"),
            }
        })?;

        debug!(%kind, subject, %state, "association toggled");
        Ok(ToggleResult {
            state,
            kind,
            subject: subject.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_store::testing::SlowStore;
    use crate::database::memory_store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn seed(store: &MemoryStore, collection: &str, id: &str) {
        let doc = json!({"id": id, "username": id}).as_object().cloned().unwrap();
        store.insert(collection, doc).await.unwrap();
    }

    #[tokio::test]
    async fn toggle_twice_creates_then_removes() {
        let store = MemoryStore::new();
        seed(&store, "user", "user:a").await;
        seed(&store, "video", "video:v").await;
        let service = ToggleService::new(&store, TIMEOUT);

        let first = service.toggle("user:a", "video:v", RelationKind::Like).await.unwrap();
        assert_eq!(first.state, ToggleState::Created);
        assert_eq!(store.count("like", &Filter::All).await.unwrap(), 1);

        let second = service.toggle("user:a", "video:v", RelationKind::Like).await.unwrap();
        assert_eq!(second.state, ToggleState::Removed);
        assert_eq!(store.count("like", &Filter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn validation_runs_before_any_write() {
        let store = MemoryStore::new();
        seed(&store, "user", "user:a").await;
        let service = ToggleService::new(&store, TIMEOUT);

        let res = service.toggle("user:a", "user:a", RelationKind::Subscription).await;
        assert_eq!(res, Err(AppError::SelfReferenceNotAllowed));

        let res = service.toggle("user:a", "user:a", RelationKind::Like).await;
        assert!(matches!(res, Err(AppError::InvalidIdentifier { .. })));

        let res = service.toggle("video:a", "video:v", RelationKind::Like).await;
        assert!(matches!(res, Err(AppError::InvalidIdentifier { .. })));

        let res = service.toggle("user:a", "not an id", RelationKind::Like).await;
        assert!(matches!(res, Err(AppError::InvalidIdentifier { .. })));

        let res = service.toggle("user:a", "tweet:missing", RelationKind::Like).await;
        assert!(matches!(res, Err(AppError::SubjectNotFound { .. })));

        assert_eq!(store.count("like", &Filter::All).await.unwrap(), 0);
        assert_eq!(store.count("subscription", &Filter::All).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_stay_consistent() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "user", "user:a").await;
        seed(&store, "user", "user:c").await;

        let handles: Vec<_> = (0..9)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    ToggleService::new(store.as_ref(), TIMEOUT)
                        .toggle("user:a", "user:c", RelationKind::Subscription)
                        .await
                })
            })
            .collect();

        let mut created = 0i64;
        let mut removed = 0i64;
        for handle in handles {
            match handle.await.unwrap().unwrap().state {
                ToggleState::Created => created += 1,
                ToggleState::Removed => removed += 1,
            }
        }
        let stored = store.count("subscription", &Filter::All).await.unwrap() as i64;
        assert!(stored <= 1);
        assert_eq!(created - removed, stored);
        assert_eq!(stored, 1);
    }

    #[tokio::test]
    async fn slow_store_times_out_without_writes() {
        let inner = MemoryStore::new();
        seed(&inner, "user", "user:a").await;
        seed(&inner, "video", "video:v").await;
        let store = SlowStore::new(inner.clone(), Duration::from_millis(200));
        let service = ToggleService::new(&store, Duration::from_millis(20));

        let res = service.toggle("user:a", "video:v", RelationKind::Like).await;
        assert_eq!(res, Err(AppError::OperationTimedOut));
        assert_eq!(inner.count("like", &Filter::All).await.unwrap(), 0);
    }
}
