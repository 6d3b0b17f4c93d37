use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::database::document::{from_document, new_record_id, timestamp, to_document, Document};
use crate::database::pipeline::{Lookup, SortKey};
use crate::database::transaction::with_timeout;
use crate::entities::user;
use crate::entities::video::{self, Video, VideoView};
use crate::interfaces::document_store::{DocumentStore, UpdateOptions};
use crate::interfaces::file_storage::{FileStorageInterface, UploadedFile};
use crate::middleware::error::{AppError, AppResult};
use crate::middleware::utils::string_utils::{get_str_id, LEN_OR_NONE};
use crate::services::listing_service::{ListingQuery, ListingService, ListingSpec, Page};
use crate::services::{get_required, require_owner};
use crate::utils::file::convert::FileUpload;

const VIDEOS_DIR: &str = "videos";
const THUMBNAILS_DIR: &str = "thumbnails";

pub struct PublishVideo {
    pub title: String,
    pub description: String,
    pub video_file: FileUpload,
    pub thumbnail: Option<FileUpload>,
}

pub struct UpdateVideo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<FileUpload>,
}

fn listing_spec() -> ListingSpec {
    ListingSpec {
        collection: video::TABLE_NAME,
        text_fields: video::TEXT_FIELDS,
        sort_keys: video::SORT_KEYS,
        default_sort: SortKey::desc("created_at"),
        lookups: vec![Lookup::new(
            user::TABLE_NAME,
            "owner",
            "owner",
            &["username", "email", "full_name"],
        )],
        projection: [
            "title",
            "description",
            "thumbnail",
            "duration",
            "views",
            "owner",
            "created_at",
        ]
        .iter()
        .map(|f| f.to_string())
        .collect(),
        empty_message: "No videos found",
    }
}

fn media_name(url: &str) -> Option<&str> {
    url.rsplit('/').next().filter(|name| !name.is_empty())
}

pub struct VideoService<'a> {
    store: &'a dyn DocumentStore,
    file_storage: &'a (dyn FileStorageInterface + Send + Sync),
    listing: ListingService<'a>,
    timeout: Duration,
}

/// Store calls are bounded by `timeout`; media uploads are not.
impl<'a> VideoService<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        file_storage: &'a (dyn FileStorageInterface + Send + Sync),
        listing: ListingService<'a>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            file_storage,
            listing,
            timeout,
        }
    }

    pub async fn list(&self, query: ListingQuery) -> AppResult<Page<VideoView>> {
        self.listing.list(&query, &listing_spec()).await?.typed()
    }

    pub async fn get(&self, video_id: &str) -> AppResult<Video> {
        let video_id = get_str_id(video_id, video::TABLE_NAME)?;
        from_document(self.required(&video_id).await?)
    }

    pub async fn publish(&self, actor_id: &str, data: PublishVideo) -> AppResult<Video> {
        let owner = get_str_id(actor_id, user::TABLE_NAME)?;
        let title = LEN_OR_NONE(data.title).ok_or(AppError::InvalidInput {
            description: "title and description are required".to_string(),
        })?;
        let description = LEN_OR_NONE(data.description).ok_or(AppError::InvalidInput {
            description: "title and description are required".to_string(),
        })?;

        let id = new_record_id(video::TABLE_NAME);
        let prefix = id.replace(':', "_");

        let video_file = self.upload(VIDEOS_DIR, &prefix, data.video_file).await?;
        let thumbnail = match data.thumbnail {
            Some(file) => match self.upload(THUMBNAILS_DIR, &prefix, file).await {
                Ok(uploaded) => Some(uploaded.url),
                Err(err) => {
                    self.remove_media(VIDEOS_DIR, &video_file.url).await;
                    return Err(err);
                }
            },
            None => None,
        };

        let now = Utc::now();
        let video = Video {
            id: Some(id),
            video_file: video_file.url,
            thumbnail: thumbnail.unwrap_or_default(),
            title,
            description,
            duration: video_file.duration.unwrap_or(0.0),
            views: 0,
            is_published: false,
            owner,
            created_at: now,
            updated_at: now,
        };

        let document = to_document(&video)?;
        match with_timeout(self.timeout, self.store.insert(video::TABLE_NAME, document)).await {
            Ok(saved) => {
                info!(video = ?video.id, "video published");
                from_document(saved)
            }
            Err(err) => {
                self.remove_media(VIDEOS_DIR, &video.video_file).await;
                self.remove_media(THUMBNAILS_DIR, &video.thumbnail).await;
                Err(err)
            }
        }
    }

    pub async fn update(&self, actor_id: &str, video_id: &str, data: UpdateVideo) -> AppResult<Video> {
        let video_id = get_str_id(video_id, video::TABLE_NAME)?;
        let existing = self.required(&video_id).await?;
        require_owner(&existing, actor_id)?;

        let mut patch = Map::new();
        if let Some(title) = data.title.and_then(LEN_OR_NONE) {
            patch.insert("title".to_string(), Value::String(title));
        }
        if let Some(description) = data.description.and_then(LEN_OR_NONE) {
            patch.insert("description".to_string(), Value::String(description));
        }
        if let Some(file) = data.thumbnail {
            let prefix = video_id.replace(':', "_");
            let uploaded = self.upload(THUMBNAILS_DIR, &prefix, file).await?;
            patch.insert("thumbnail".to_string(), Value::String(uploaded.url));
        }
        if patch.is_empty() {
            return Err(AppError::InvalidInput {
                description: "Nothing to update".to_string(),
            });
        }
        self.save_patch(&video_id, patch).await
    }

    pub async fn delete(&self, actor_id: &str, video_id: &str) -> AppResult<Video> {
        let video_id = get_str_id(video_id, video::TABLE_NAME)?;
        let existing = self.required(&video_id).await?;
        require_owner(&existing, actor_id)?;

        if !with_timeout(self.timeout, self.store.delete_by_id(video::TABLE_NAME, &video_id)).await? {
            return Err(AppError::EntityFailIdNotFound { ident: video_id });
        }
        let video: Video = from_document(existing)?;
        self.remove_media(VIDEOS_DIR, &video.video_file).await;
        self.remove_media(THUMBNAILS_DIR, &video.thumbnail).await;
        Ok(video)
    }

    pub async fn toggle_publish(&self, actor_id: &str, video_id: &str) -> AppResult<Video> {
        let video_id = get_str_id(video_id, video::TABLE_NAME)?;
        let existing = self.required(&video_id).await?;
        require_owner(&existing, actor_id)?;

        let published = existing
            .get("is_published")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let mut patch = Map::new();
        patch.insert("is_published".to_string(), json!(!published));
        self.save_patch(&video_id, patch).await
    }

    async fn save_patch(&self, video_id: &str, mut patch: Document) -> AppResult<Video> {
        patch.insert("updated_at".to_string(), timestamp::now_value());
        let updated = with_timeout(
            self.timeout,
            self.store
                .update_by_id(video::TABLE_NAME, video_id, patch, UpdateOptions::default()),
        )
        .await?
        .ok_or_else(|| AppError::EntityFailIdNotFound {
            ident: video_id.to_string(),
        })?;
        from_document(updated)
    }

    async fn required(&self, video_id: &str) -> AppResult<Document> {
        with_timeout(self.timeout, get_required(self.store, video::TABLE_NAME, video_id)).await
    }

    async fn upload(
        &self,
        dir: &str,
        prefix: &str,
        file: FileUpload,
    ) -> AppResult<UploadedFile> {
        let file_name = format!("{prefix}_{}", file.file_name);
        self.file_storage
            .upload(file.data, Some(dir), &file_name, file.content_type.as_deref())
            .await
            .map_err(|source| AppError::UpstreamUploadFailed { source })
    }

    async fn remove_media(&self, dir: &str, url: &str) {
        if let Some(name) = media_name(url) {
            if let Err(err) = self.file_storage.delete(Some(dir), name).await {
                warn!(error = %err, url, "could not delete media");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_store::MemoryStore;
    use crate::database::memory_store::testing::SlowStore;
    use async_trait::async_trait;

    struct FakeStorage {
        fail: bool,
    }

    #[async_trait]
    impl FileStorageInterface for FakeStorage {
        async fn upload(
            &self,
            _bytes: Vec<u8>,
            path: Option<&str>,
            file_name: &str,
            _content_type: Option<&str>,
        ) -> Result<UploadedFile, String> {
            if self.fail {
                return Err("bucket unavailable".to_string());
            }
            Ok(UploadedFile {
                url: format!("https://media.test/{}/{file_name}", path.unwrap_or_default()),
                duration: Some(12.5),
            })
        }

        async fn delete(&self, _path: Option<&str>, _file_name: &str) -> Result<(), String> {
            Ok(())
        }
    }

    fn upload(name: &str) -> FileUpload {
        FileUpload {
            content_type: Some("video/mp4".to_string()),
            file_name: name.to_string(),
            data: vec![1, 2, 3],
            extension: "mp4".to_string(),
        }
    }

    fn publish_input() -> PublishVideo {
        PublishVideo {
            title: " First ".to_string(),
            description: "a video".to_string(),
            video_file: upload("clip.mp4"),
            thumbnail: None,
        }
    }

    fn service<'a>(store: &'a dyn DocumentStore, storage: &'a FakeStorage) -> VideoService<'a> {
        timed_service(store, storage, Duration::from_secs(5))
    }

    fn timed_service<'a>(
        store: &'a dyn DocumentStore,
        storage: &'a FakeStorage,
        timeout: Duration,
    ) -> VideoService<'a> {
        VideoService::new(store, storage, ListingService::new(store, 100, timeout), timeout)
    }

    #[tokio::test]
    async fn publish_update_toggle_delete() {
        let store = MemoryStore::new();
        let storage = FakeStorage { fail: false };
        let service = service(&store, &storage);

        let video = service.publish("user:a", publish_input()).await.unwrap();
        let id = video.id.clone().unwrap();
        assert_eq!(video.title, "First");
        assert_eq!(video.duration, 12.5);
        assert_eq!(video.owner, "user:a");
        assert!(!video.is_published);
        assert!(video.video_file.starts_with("https://media.test/videos/video_"));

        let res = service
            .update(
                "user:b",
                &id,
                UpdateVideo {
                    title: Some("Stolen".to_string()),
                    description: None,
                    thumbnail: None,
                },
            )
            .await;
        assert_eq!(res, Err(AppError::Forbidden));

        let updated = service
            .update(
                "user:a",
                &id,
                UpdateVideo {
                    title: Some("Second".to_string()),
                    description: Some("  ".to_string()),
                    thumbnail: Some(upload("thumb.png")),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Second");
        assert_eq!(updated.description, "a video");
        assert!(updated.thumbnail.contains("/thumbnails/"));

        let toggled = service.toggle_publish("user:a", &id).await.unwrap();
        assert!(toggled.is_published);
        assert!(!service.toggle_publish("user:a", &id).await.unwrap().is_published);

        assert_eq!(service.delete("user:b", &id).await, Err(AppError::Forbidden));
        service.delete("user:a", &id).await.unwrap();
        assert!(matches!(
            service.get(&id).await,
            Err(AppError::EntityFailIdNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failed_upload_creates_nothing() {
        let store = MemoryStore::new();
        let storage = FakeStorage { fail: true };
        let service = service(&store, &storage);

        let res = service.publish("user:a", publish_input()).await;
        assert!(matches!(res, Err(AppError::UpstreamUploadFailed { .. })));
        assert!(matches!(
            service.list(ListingQuery::default()).await,
            Err(AppError::NoResults { .. })
        ));
    }

    #[tokio::test]
    async fn list_joins_owner() {
        let store = MemoryStore::new();
        store
            .insert(
                "user",
                json!({"id": "user:a", "username": "anna", "email": "anna@x.io", "password": "p"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();
        let storage = FakeStorage { fail: false };
        let service = service(&store, &storage);
        service.publish("user:a", publish_input()).await.unwrap();

        let page = service.list(ListingQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        let owner = page.items[0].owner.as_ref().unwrap();
        assert_eq!(owner.username, "anna");
        assert_eq!(owner.email.as_deref(), Some("anna@x.io"));
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let inner = MemoryStore::new();
        let storage = FakeStorage { fail: false };
        let video = service(&inner, &storage).publish("user:a", publish_input()).await.unwrap();
        let id = video.id.unwrap();
        let store = SlowStore::new(inner.clone(), Duration::from_millis(200));
        let slow = timed_service(&store, &storage, Duration::from_millis(20));

        assert_eq!(slow.get(&id).await, Err(AppError::OperationTimedOut));
        assert_eq!(slow.toggle_publish("user:a", &id).await, Err(AppError::OperationTimedOut));
        assert_eq!(slow.delete("user:a", &id).await, Err(AppError::OperationTimedOut));
        assert!(service(&inner, &storage).get(&id).await.is_ok());
    }
}
