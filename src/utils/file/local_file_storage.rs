use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::interfaces::file_storage::{FileStorageInterface, UploadedFile};

/// Writes uploads below `uploads_dir`; they are served back under `upload_base_url`.
pub struct LocalFileStorage {
    uploads_dir: String,
    upload_base_url: String,
}

impl LocalFileStorage {
    pub fn new(uploads_dir: String, upload_base_url: String) -> Self {
        LocalFileStorage {
            uploads_dir,
            upload_base_url,
        }
    }

    fn object_name(path: Option<&str>, file_name: &str) -> String {
        match path.filter(|p| !p.is_empty()) {
            Some(path) => format!("{path}/{file_name}"),
            None => file_name.to_string(),
        }
    }

    fn file_path(&self, object_name: &str) -> PathBuf {
        PathBuf::from(&self.uploads_dir).join(object_name)
    }
}

#[async_trait]
impl FileStorageInterface for LocalFileStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        path: Option<&str>,
        file_name: &str,
        _: Option<&str>,
    ) -> Result<UploadedFile, String> {
        let object_name = Self::object_name(path, file_name);
        let target = self.file_path(&object_name);
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).await.map_err(|e| e.to_string())?;
        }
        fs::write(&target, bytes).await.map_err(|e| e.to_string())?;

        Ok(UploadedFile {
            url: format!("{}/{}", self.upload_base_url, object_name),
            duration: None,
        })
    }

    async fn delete(&self, path: Option<&str>, file_name: &str) -> Result<(), String> {
        let target = self.file_path(&Self::object_name(path, file_name));
        fs::remove_file(target).await.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(
            dir.path().to_string_lossy().to_string(),
            "http://localhost/uploads".to_string(),
        );
        let uploaded = storage
            .upload(b"abc".to_vec(), Some("videos"), "clip.mp4", Some("video/mp4"))
            .await
            .unwrap();
        assert_eq!(uploaded.url, "http://localhost/uploads/videos/clip.mp4");
        assert_eq!(uploaded.duration, None);
        assert!(dir.path().join("videos/clip.mp4").exists());

        storage.delete(Some("videos"), "clip.mp4").await.unwrap();
        assert!(!dir.path().join("videos/clip.mp4").exists());
        assert!(storage.delete(Some("videos"), "clip.mp4").await.is_err());
    }
}
