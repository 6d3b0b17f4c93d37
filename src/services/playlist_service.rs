use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::database::document::{document_id, from_document, timestamp, to_document, Document};
use crate::database::pipeline::{Filter, Lookup, SortKey, Stage};
use crate::database::transaction::with_timeout;
use crate::entities::playlist::{self, Playlist};
use crate::entities::{user, video};
use crate::interfaces::document_store::{ArrayOp, DocumentStore, UpdateOptions};
use crate::middleware::error::{AppError, AppResult};
use crate::middleware::utils::string_utils::get_str_id;
use crate::services::{get_required, require_owner};

const NAME_LEN: (usize, usize) = (3, 50);
const DESCRIPTION_LEN: (usize, usize) = (10, 200);

fn checked_text(value: &str, field: &str, (min, max): (usize, usize)) -> AppResult<String> {
    let value = value.trim();
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::InvalidInput {
            description: format!("{field} must be between {min}-{max} characters"),
        });
    }
    Ok(value.to_string())
}

pub struct PlaylistService<'a> {
    store: &'a dyn DocumentStore,
    timeout: Duration,
}

impl<'a> PlaylistService<'a> {
    pub fn new(store: &'a dyn DocumentStore, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn create(&self, actor_id: &str, name: &str, description: &str) -> AppResult<Playlist> {
        let owner = get_str_id(actor_id, user::TABLE_NAME)?;
        let name = checked_text(name, "Name", NAME_LEN)?;
        let description = checked_text(description, "Description", DESCRIPTION_LEN)?;
        with_timeout(self.timeout, async {
            self.ensure_unique_name(&owner, &name, None).await?;

            let now = Utc::now();
            let saved = self
                .store
                .insert(
                    playlist::TABLE_NAME,
                    to_document(&Playlist {
                        id: None,
                        name,
                        description,
                        owner,
                        videos: vec![],
                        created_at: now,
                        updated_at: now,
                    })?,
                )
                .await?;
            from_document(saved)
        })
        .await
    }

    pub async fn user_playlists(&self, user_id: &str) -> AppResult<Vec<Playlist>> {
        let user_id = get_str_id(user_id, user::TABLE_NAME)?;
        let stages = vec![
            Stage::Match(Filter::eq("owner", user_id)),
            Stage::Sort(vec![SortKey::desc("created_at"), SortKey::asc("id")]),
        ];
        let playlists =
            with_timeout(self.timeout, self.store.aggregate(playlist::TABLE_NAME, &stages)).await?;
        if playlists.is_empty() {
            return Err(AppError::NoResults {
                description: "No playlists found for this user".to_string(),
            });
        }
        playlists.into_iter().map(from_document).collect()
    }

    /// The playlist with its videos and owner attached.
    pub async fn get(&self, playlist_id: &str) -> AppResult<Document> {
        let playlist_id = get_str_id(playlist_id, playlist::TABLE_NAME)?;
        with_timeout(self.timeout, self.joined(&playlist_id)).await
    }

    pub async fn add_video(&self, actor_id: &str, video_id: &str, playlist_id: &str) -> AppResult<Document> {
        let video_id = get_str_id(video_id, video::TABLE_NAME)?;
        let playlist_id = get_str_id(playlist_id, playlist::TABLE_NAME)?;
        with_timeout(self.timeout, async {
            let existing = get_required(self.store, playlist::TABLE_NAME, &playlist_id).await?;
            require_owner(&existing, actor_id)?;
            get_required(self.store, video::TABLE_NAME, &video_id).await?;
            self.change_videos(&playlist_id, ArrayOp::AddToSet(Value::String(video_id)))
                .await?;
            self.joined(&playlist_id).await
        })
        .await
    }

    pub async fn remove_video(&self, actor_id: &str, video_id: &str, playlist_id: &str) -> AppResult<Document> {
        let video_id = get_str_id(video_id, video::TABLE_NAME)?;
        let playlist_id = get_str_id(playlist_id, playlist::TABLE_NAME)?;
        with_timeout(self.timeout, async {
            let existing = get_required(self.store, playlist::TABLE_NAME, &playlist_id).await?;
            require_owner(&existing, actor_id)?;
            self.change_videos(&playlist_id, ArrayOp::Pull(Value::String(video_id)))
                .await?;
            self.joined(&playlist_id).await
        })
        .await
    }

    pub async fn update(
        &self,
        actor_id: &str,
        playlist_id: &str,
        name: &str,
        description: &str,
    ) -> AppResult<Playlist> {
        let playlist_id = get_str_id(playlist_id, playlist::TABLE_NAME)?;
        let name = checked_text(name, "Name", NAME_LEN)?;
        let description = checked_text(description, "Description", DESCRIPTION_LEN)?;
        with_timeout(self.timeout, async {
            let existing = get_required(self.store, playlist::TABLE_NAME, &playlist_id).await?;
            require_owner(&existing, actor_id)?;
            self.ensure_unique_name(actor_id, &name, Some(&playlist_id)).await?;

            let mut patch = Map::new();
            patch.insert("name".to_string(), Value::String(name));
            patch.insert("description".to_string(), Value::String(description));
            patch.insert("updated_at".to_string(), timestamp::now_value());
            let updated = self
                .store
                .update_by_id(playlist::TABLE_NAME, &playlist_id, patch, UpdateOptions::default())
                .await?
                .ok_or_else(|| AppError::EntityFailIdNotFound {
                    ident: playlist_id.clone(),
                })?;
            from_document(updated)
        })
        .await
    }

    pub async fn delete(&self, actor_id: &str, playlist_id: &str) -> AppResult<()> {
        let playlist_id = get_str_id(playlist_id, playlist::TABLE_NAME)?;
        with_timeout(self.timeout, async {
            let existing = get_required(self.store, playlist::TABLE_NAME, &playlist_id).await?;
            require_owner(&existing, actor_id)?;
            self.store.delete_by_id(playlist::TABLE_NAME, &playlist_id).await?;
            Ok(())
        })
        .await
    }

    async fn ensure_unique_name(&self, owner: &str, name: &str, except: Option<&str>) -> AppResult<()> {
        let filter = Filter::And(vec![Filter::eq("owner", owner), Filter::eq("name", name)]);
        if let Some(found) = self.store.find_one(playlist::TABLE_NAME, &filter).await? {
            if Some(document_id(&found)?) != except {
                return Err(AppError::Conflict {
                    description: "Playlist with this name already exists".to_string(),
                });
            }
        }
        Ok(())
    }

    async fn change_videos(&self, playlist_id: &str, op: ArrayOp) -> AppResult<()> {
        let mut patch = Map::new();
        patch.insert("updated_at".to_string(), timestamp::now_value());
        self.store
            .update_array(playlist::TABLE_NAME, playlist_id, "videos", op, patch)
            .await?
            .ok_or_else(|| AppError::EntityFailIdNotFound {
                ident: playlist_id.to_string(),
            })?;
        Ok(())
    }

    async fn joined(&self, playlist_id: &str) -> AppResult<Document> {
        let stages = vec![
            Stage::Match(Filter::eq("id", playlist_id)),
            Stage::Lookup(Lookup::new(
                video::TABLE_NAME,
                "videos",
                "videos",
                &["video_file", "title", "duration"],
            )),
            Stage::Lookup(Lookup::new(user::TABLE_NAME, "owner", "owner", &["username", "email"])),
            Stage::Project(
                ["name", "description", "videos", "owner"]
                    .iter()
                    .map(|f| f.to_string())
                    .collect(),
            ),
        ];
        self.store
            .aggregate(playlist::TABLE_NAME, &stages)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::EntityFailIdNotFound {
                ident: playlist_id.to_string(),
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

    async fn setup() -> MemoryStore {
        let store = MemoryStore::new();
        for doc in [
            json!({"id": "user:a", "username": "anna", "email": "a@x.io"}),
            json!({"id": "video:1", "title": "one", "duration": 3.0, "video_file": "f1"}),
            json!({"id": "video:2", "title": "two", "duration": 4.0, "video_file": "f2"}),
        ] {
            let table = doc["id"].as_str().unwrap().split(':').next().unwrap().to_string();
            store.insert(&table, doc.as_object().cloned().unwrap()).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn create_validates_and_rejects_duplicates() {
        let store = setup().await;
        let service = PlaylistService::new(&store, TIMEOUT);

        assert!(matches!(
            service.create("user:a", "ab", "long enough text").await,
            Err(AppError::InvalidInput { .. })
        ));
        assert!(matches!(
            service.create("user:a", "Road trip", "short").await,
            Err(AppError::InvalidInput { .. })
        ));
        let created = service
            .create("user:a", " Road trip ", "songs for the road")
            .await
            .unwrap();
        assert_eq!(created.name, "Road trip");
        assert!(created.videos.is_empty());
        assert!(matches!(
            service.create("user:a", "Road trip", "another description").await,
            Err(AppError::Conflict { .. })
        ));
        assert!(service.create("user:b", "Road trip", "someone else's list").await.is_ok());
        assert_eq!(service.user_playlists("user:a").await.unwrap().len(), 1);
        assert!(matches!(
            service.user_playlists("user:c").await,
            Err(AppError::NoResults { .. })
        ));
    }

    #[tokio::test]
    async fn add_and_remove_videos() {
        let store = setup().await;
        let service = PlaylistService::new(&store, TIMEOUT);
        let playlist = service
            .create("user:a", "Favourites", "the best videos around")
            .await
            .unwrap();
        let id = playlist.id.unwrap();

        service.add_video("user:a", "video:1", &id).await.unwrap();
        service.add_video("user:a", "video:2", &id).await.unwrap();
        let joined = service.add_video("user:a", "video:1", &id).await.unwrap();
        let videos = joined["videos"].as_array().unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0]["title"], json!("one"));
        assert_eq!(joined["owner"]["username"], json!("anna"));

        assert!(matches!(
            service.add_video("user:a", "video:9", &id).await,
            Err(AppError::EntityFailIdNotFound { .. })
        ));
        assert_eq!(
            service.add_video("user:b", "video:1", &id).await,
            Err(AppError::Forbidden)
        );

        let joined = service.remove_video("user:a", "video:1", &id).await.unwrap();
        assert_eq!(joined["videos"], json!([{"id": "video:2", "video_file": "f2", "title": "two", "duration": 4.0}]));

        let updated = service
            .update("user:a", &id, "Renamed", "a fresh description")
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.videos, vec!["video:2".to_string()]);

        assert_eq!(service.delete("user:b", &id).await, Err(AppError::Forbidden));
        service.delete("user:a", &id).await.unwrap();
        assert!(matches!(
            service.get(&id).await,
            Err(AppError::EntityFailIdNotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_adds_keep_every_video() {
        let inner = setup().await;
        let playlist = PlaylistService::new(&inner, TIMEOUT)
            .create("user:a", "Overlap", "added from two requests")
            .await
            .unwrap();
        let id = playlist.id.unwrap();
        let store = Arc::new(SlowStore::new(inner.clone(), Duration::from_millis(10)));

        let handles: Vec<_> = ["video:1", "video:2"]
            .into_iter()
            .map(|video_id| {
                let store = store.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    PlaylistService::new(store.as_ref(), TIMEOUT)
                        .add_video("user:a", video_id, &id)
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored: Playlist = from_document(inner.find_by_id("playlist", &id).await.unwrap().unwrap()).unwrap();
        let mut videos = stored.videos;
        videos.sort();
        assert_eq!(videos, vec!["video:1".to_string(), "video:2".to_string()]);
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let inner = setup().await;
        let playlist = PlaylistService::new(&inner, TIMEOUT)
            .create("user:a", "Patience", "waiting on the store")
            .await
            .unwrap();
        let store = SlowStore::new(inner, Duration::from_millis(200));
        let service = PlaylistService::new(&store, Duration::from_millis(20));

        assert_eq!(
            service.add_video("user:a", "video:1", playlist.id.as_deref().unwrap()).await,
            Err(AppError::OperationTimedOut)
        );
    }
}
