use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::database::document::{from_document, timestamp, to_document};
use crate::database::pipeline::{Filter, SortKey, Stage};
use crate::database::transaction::with_timeout;
use crate::entities::tweet::{self, Tweet, MAX_CONTENT_LEN};
use crate::entities::user;
use crate::interfaces::document_store::{DocumentStore, UpdateOptions};
use crate::middleware::error::{AppError, AppResult};
use crate::middleware::utils::string_utils::get_str_id;
use crate::services::{get_required, require_owner};

fn checked_content(content: &str) -> AppResult<String> {
    let content = content.trim();
    let len = content.chars().count();
    if len == 0 || len > MAX_CONTENT_LEN {
        return Err(AppError::InvalidInput {
            description: format!("Tweet must be between 1 and {MAX_CONTENT_LEN} characters"),
        });
    }
    Ok(content.to_string())
}

pub struct TweetService<'a> {
    store: &'a dyn DocumentStore,
    timeout: Duration,
}

impl<'a> TweetService<'a> {
    pub fn new(store: &'a dyn DocumentStore, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn create(&self, actor_id: &str, content: &str) -> AppResult<Tweet> {
        let owner = get_str_id(actor_id, user::TABLE_NAME)?;
        let content = checked_content(content)?;
        let now = Utc::now();
        let tweet = to_document(&Tweet {
            id: None,
            content,
            owner,
            created_at: now,
            updated_at: now,
        })?;
        let saved = with_timeout(self.timeout, self.store.insert(tweet::TABLE_NAME, tweet)).await?;
        from_document(saved)
    }

    pub async fn user_tweets(&self, user_id: &str) -> AppResult<Vec<Tweet>> {
        let user_id = get_str_id(user_id, user::TABLE_NAME)?;
        let stages = vec![
            Stage::Match(Filter::eq("owner", user_id)),
            Stage::Sort(vec![SortKey::desc("created_at"), SortKey::asc("id")]),
        ];
        let tweets =
            with_timeout(self.timeout, self.store.aggregate(tweet::TABLE_NAME, &stages)).await?;
        if tweets.is_empty() {
            return Err(AppError::NoResults {
                description: "No tweets found for this user".to_string(),
            });
        }
        tweets.into_iter().map(from_document).collect()
    }

    pub async fn update(&self, actor_id: &str, tweet_id: &str, content: &str) -> AppResult<Tweet> {
        let tweet_id = get_str_id(tweet_id, tweet::TABLE_NAME)?;
        let content = checked_content(content)?;
        with_timeout(self.timeout, async {
            let existing = get_required(self.store, tweet::TABLE_NAME, &tweet_id).await?;
            require_owner(&existing, actor_id)?;

            let mut patch = Map::new();
            patch.insert("content".to_string(), Value::String(content));
            patch.insert("updated_at".to_string(), timestamp::now_value());
            let updated = self
                .store
                .update_by_id(tweet::TABLE_NAME, &tweet_id, patch, UpdateOptions::default())
                .await?
                .ok_or_else(|| AppError::EntityFailIdNotFound {
                    ident: tweet_id.clone(),
                })?;
            from_document(updated)
        })
        .await
    }

    pub async fn delete(&self, actor_id: &str, tweet_id: &str) -> AppResult<()> {
        let tweet_id = get_str_id(tweet_id, tweet::TABLE_NAME)?;
        with_timeout(self.timeout, async {
            let existing = get_required(self.store, tweet::TABLE_NAME, &tweet_id).await?;
            require_owner(&existing, actor_id)?;
            self.store.delete_by_id(tweet::TABLE_NAME, &tweet_id).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_store::testing::SlowStore;
    use crate::database::memory_store::MemoryStore;

    #[tokio::test]
    async fn tweet_lifecycle() {
        let store = MemoryStore::new();
        let service = TweetService::new(&store, Duration::from_secs(5));

        assert!(matches!(
            service.user_tweets("user:a").await,
            Err(AppError::NoResults { .. })
        ));

        let tweet = service.create("user:a", "  hello world ").await.unwrap();
        assert_eq!(tweet.content, "hello world");
        let id = tweet.id.clone().unwrap();

        assert!(matches!(
            service.create("user:a", &"x".repeat(281)).await,
            Err(AppError::InvalidInput { .. })
        ));
        assert!(service.create("user:a", &"é".repeat(280)).await.is_ok());

        assert_eq!(service.user_tweets("user:a").await.unwrap().len(), 2);

        assert_eq!(
            service.update("user:b", &id, "hijack").await,
            Err(AppError::Forbidden)
        );
        assert_eq!(service.update("user:a", &id, "edited").await.unwrap().content, "edited");

        assert_eq!(service.delete("user:b", &id).await, Err(AppError::Forbidden));
        service.delete("user:a", &id).await.unwrap();
        assert_eq!(service.user_tweets("user:a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let inner = MemoryStore::new();
        let tweet = TweetService::new(&inner, Duration::from_secs(5))
            .create("user:a", "hello")
            .await
            .unwrap();
        let store = SlowStore::new(inner.clone(), Duration::from_millis(200));
        let service = TweetService::new(&store, Duration::from_millis(20));

        let id = tweet.id.unwrap();
        assert_eq!(
            service.update("user:a", &id, "late edit").await,
            Err(AppError::OperationTimedOut)
        );
        assert_eq!(service.delete("user:a", &id).await, Err(AppError::OperationTimedOut));
        let tweets = TweetService::new(&inner, Duration::from_secs(5))
            .user_tweets("user:a")
            .await
            .unwrap();
        assert_eq!(tweets[0].content, "hello");
    }
}
