use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use crate::interfaces::document_store::{DocumentStore, StoreTransaction};
use crate::middleware::error::{AppError, AppResult};

/// Runs `work` inside a store transaction: commits when it returns `Ok`,
/// aborts when it returns `Err`. If the returned future is dropped midway
/// the transaction is dropped too, which discards its writes.
pub async fn with_transaction<T, F>(store: &dyn DocumentStore, work: F) -> AppResult<T>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut (dyn StoreTransaction + 'static)) -> BoxFuture<'t, AppResult<T>>
        + Send,
{
    let mut tx = store.begin().await?;
    match work(tx.as_mut()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = tx.abort().await {
                warn!(error = ?abort_err, "transaction abort failed");
            }
            Err(err)
        }
    }
}

/// Bounds `work` by `limit`; the future is dropped on expiry, which also
/// drops any transaction it holds.
pub async fn with_timeout<T, Fut>(limit: Duration, work: Fut) -> AppResult<T>
where
    Fut: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = limit.as_millis() as u64, "store operation timed out");
            Err(AppError::OperationTimedOut)
        }
    }
}
