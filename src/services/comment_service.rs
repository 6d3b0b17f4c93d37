use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::database::document::{document_id, from_document, timestamp, to_document};
use crate::database::pipeline::{Filter, Lookup, SortKey, Stage};
use crate::database::transaction::with_timeout;
use crate::entities::comment::{self, Comment, CommentView};
use crate::entities::{user, video};
use crate::interfaces::document_store::{DocumentStore, UpdateOptions};
use crate::middleware::error::{AppError, AppResult};
use crate::middleware::utils::string_utils::{get_str_id, LEN_OR_NONE};
use crate::services::listing_service::{ListingQuery, ListingService, ListingSpec, Page};
use crate::services::{get_required, require_owner};

fn owner_lookup() -> Lookup {
    Lookup::new(user::TABLE_NAME, "owner", "owner", user::PUBLIC_FIELDS)
}

fn view_fields() -> Vec<String> {
    vec!["content".to_string(), "owner".to_string(), "created_at".to_string()]
}

fn required_content(content: String) -> AppResult<String> {
    LEN_OR_NONE(content).ok_or(AppError::InvalidInput {
        description: "Content is required".to_string(),
    })
}

pub struct CommentService<'a> {
    store: &'a dyn DocumentStore,
    listing: ListingService<'a>,
    timeout: Duration,
}

impl<'a> CommentService<'a> {
    pub fn new(store: &'a dyn DocumentStore, listing: ListingService<'a>, timeout: Duration) -> Self {
        Self {
            store,
            listing,
            timeout,
        }
    }

    pub async fn video_comments(&self, video_id: &str, query: ListingQuery) -> AppResult<Page<CommentView>> {
        let video_id = get_str_id(video_id, video::TABLE_NAME)?;
        with_timeout(self.timeout, get_required(self.store, video::TABLE_NAME, &video_id)).await?;

        let spec = ListingSpec {
            collection: comment::TABLE_NAME,
            text_fields: &["content"],
            sort_keys: comment::SORT_KEYS,
            default_sort: SortKey::desc("created_at"),
            lookups: vec![owner_lookup()],
            projection: view_fields(),
            empty_message: "No comments found for this video",
        };
        let query = query.with_filter("video", video_id);
        self.listing.list(&query, &spec).await?.typed()
    }

    pub async fn add(&self, actor_id: &str, video_id: &str, content: String) -> AppResult<CommentView> {
        let owner = get_str_id(actor_id, user::TABLE_NAME)?;
        let video_id = get_str_id(video_id, video::TABLE_NAME)?;
        let content = required_content(content)?;
        with_timeout(self.timeout, async {
            get_required(self.store, video::TABLE_NAME, &video_id).await?;

            let now = Utc::now();
            let saved = self
                .store
                .insert(
                    comment::TABLE_NAME,
                    to_document(&Comment {
                        id: None,
                        content,
                        video: video_id.clone(),
                        owner,
                        created_at: now,
                        updated_at: now,
                    })?,
                )
                .await?;
            self.view(document_id(&saved)?).await
        })
        .await
    }

    pub async fn update(&self, actor_id: &str, comment_id: &str, content: String) -> AppResult<Comment> {
        let comment_id = get_str_id(comment_id, comment::TABLE_NAME)?;
        let content = required_content(content)?;
        with_timeout(self.timeout, async {
            let existing = get_required(self.store, comment::TABLE_NAME, &comment_id).await?;
            require_owner(&existing, actor_id)?;

            if existing.get("content").and_then(Value::as_str) == Some(content.as_str()) {
                return Err(AppError::InvalidInput {
                    description: "No changes detected".to_string(),
                });
            }

            let mut patch = Map::new();
            patch.insert("content".to_string(), Value::String(content));
            patch.insert("updated_at".to_string(), timestamp::now_value());
            let updated = self
                .store
                .update_by_id(comment::TABLE_NAME, &comment_id, patch, UpdateOptions::default())
                .await?
                .ok_or_else(|| AppError::EntityFailIdNotFound {
                    ident: comment_id.clone(),
                })?;
            from_document(updated)
        })
        .await
    }

    pub async fn delete(&self, actor_id: &str, comment_id: &str) -> AppResult<()> {
        let comment_id = get_str_id(comment_id, comment::TABLE_NAME)?;
        with_timeout(self.timeout, async {
            let existing = get_required(self.store, comment::TABLE_NAME, &comment_id).await?;
            require_owner(&existing, actor_id)?;
            self.store.delete_by_id(comment::TABLE_NAME, &comment_id).await?;
            Ok(())
        })
        .await
    }

    async fn view(&self, comment_id: &str) -> AppResult<CommentView> {
        let stages = vec![
            Stage::Match(Filter::eq("id", comment_id)),
            Stage::Lookup(owner_lookup()),
            Stage::Project(view_fields()),
        ];
        let row = self
            .store
            .aggregate(comment::TABLE_NAME, &stages)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::EntityFailIdNotFound {
                ident: comment_id.to_string(),
            })?;
        from_document(row)
    }
}
