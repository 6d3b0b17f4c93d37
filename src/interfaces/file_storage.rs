use std::sync::Arc;

use async_trait::async_trait;

/// Result of a successful media upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub url: String,
    /// Playback length in seconds, when the backend can tell.
    pub duration: Option<f64>,
}

#[async_trait]
pub trait FileStorageInterface {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        path: Option<&str>,
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<UploadedFile, String>;

    async fn delete(&self, path: Option<&str>, file_name: &str) -> Result<(), String>;
}

#[async_trait]
impl<T: FileStorageInterface + Send + Sync> FileStorageInterface for Arc<T> {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        path: Option<&str>,
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<UploadedFile, String> {
        (**self).upload(bytes, path, file_name, content_type).await
    }

    async fn delete(&self, path: Option<&str>, file_name: &str) -> Result<(), String> {
        (**self).delete(path, file_name).await
    }
}
