use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::pipeline::{Lookup, SortKey};
use crate::database::table_names::{LIKE_TABLE_NAME, USER_TABLE_NAME};
use crate::entities::association::{RelationKind, ToggleResult};
use crate::entities::{comment, tweet, video};
use crate::interfaces::document_store::DocumentStore;
use crate::middleware::error::AppResult;
use crate::middleware::utils::string_utils::get_str_id;
use crate::services::listing_service::{ListingQuery, ListingService, ListingSpec, Page};
use crate::services::toggle_service::ToggleService;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LikedVideoView {
    pub id: String,
    /// The liked video, or null when it was deleted since.
    pub video: Option<Value>,
    pub created_at: String,
}

pub struct LikeService<'a> {
    toggle: ToggleService<'a>,
    listing: ListingService<'a>,
}

impl<'a> LikeService<'a> {
    pub fn new(store: &'a dyn DocumentStore, max_page_size: u64, timeout: Duration) -> Self {
        Self {
            toggle: ToggleService::new(store, timeout),
            listing: ListingService::new(store, max_page_size, timeout),
        }
    }

    pub async fn toggle_video_like(&self, actor_id: &str, video_id: &str) -> AppResult<ToggleResult> {
        let video_id = get_str_id(video_id, video::TABLE_NAME)?;
        self.toggle.toggle(actor_id, &video_id, RelationKind::Like).await
    }

    pub async fn toggle_comment_like(&self, actor_id: &str, comment_id: &str) -> AppResult<ToggleResult> {
        let comment_id = get_str_id(comment_id, comment::TABLE_NAME)?;
        self.toggle.toggle(actor_id, &comment_id, RelationKind::Like).await
    }

    pub async fn toggle_tweet_like(&self, actor_id: &str, tweet_id: &str) -> AppResult<ToggleResult> {
        let tweet_id = get_str_id(tweet_id, tweet::TABLE_NAME)?;
        self.toggle.toggle(actor_id, &tweet_id, RelationKind::Like).await
    }

    pub async fn liked_videos(&self, actor_id: &str, query: ListingQuery) -> AppResult<Page<LikedVideoView>> {
        let actor = get_str_id(actor_id, USER_TABLE_NAME)?;
        let query = query
            .with_filter("actor", actor)
            .with_filter("subject_type", video::TABLE_NAME);
        let spec = ListingSpec {
            collection: LIKE_TABLE_NAME,
            text_fields: &[],
            sort_keys: &["created_at"],
            default_sort: SortKey::desc("created_at"),
            lookups: vec![Lookup::new(video::TABLE_NAME, "subject", "video", video::SUMMARY_FIELDS)],
            projection: vec!["video".to_string(), "created_at".to_string()],
            empty_message: "No liked videos found",
        };
        self.listing.list(&query, &spec).await?.typed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_store::MemoryStore;
    use crate::entities::association::ToggleState;
    use crate::middleware::error::AppError;
    use serde_json::json;

    async fn seed(store: &MemoryStore, collection: &str, value: Value) {
        store
            .insert(collection, value.as_object().cloned().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn liked_videos_only_lists_video_likes_of_actor() {
        let store = MemoryStore::new();
        seed(&store, "user", json!({"id": "user:a", "username": "a", "email": "a@x.io"})).await;
        seed(&store, "user", json!({"id": "user:b", "username": "b", "email": "b@x.io"})).await;
        seed(&store, "video", json!({"id": "video:v", "title": "clip", "owner": "user:b"})).await;
        seed(&store, "tweet", json!({"id": "tweet:t", "content": "hi", "owner": "user:b"})).await;
        let service = LikeService::new(&store, 100, Duration::from_secs(5));

        let empty = service.liked_videos("user:a", ListingQuery::default()).await;
        assert!(matches!(empty, Err(AppError::NoResults { .. })));

        let liked = service.toggle_video_like("user:a", "video:v").await.unwrap();
        assert_eq!(liked.state, ToggleState::Created);
        service.toggle_tweet_like("user:a", "tweet:t").await.unwrap();
        service.toggle_video_like("user:b", "video:v").await.unwrap();

        let page = service.liked_videos("user:a", ListingQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        let video = page.items[0].video.as_ref().unwrap();
        assert_eq!(video["title"], json!("clip"));
    }

    #[tokio::test]
    async fn route_kind_must_match_subject_table() {
        let store = MemoryStore::new();
        let service = LikeService::new(&store, 100, Duration::from_secs(5));
        let res = service.toggle_comment_like("user:a", "video:v").await;
        assert!(matches!(res, Err(AppError::InvalidIdentifier { .. })));
    }
}
