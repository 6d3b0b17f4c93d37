use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;

use crate::config::AppConfig;
use crate::interfaces::document_store::DocumentStore;
use crate::interfaces::file_storage::FileStorageInterface;
use crate::utils::file::local_file_storage::LocalFileStorage;
use crate::utils::jwt::JWT;

pub const JWT_KEY: &str = "jwt";

pub struct CtxState {
    pub store: Arc<dyn DocumentStore>,
    pub jwt: JWT,
    pub file_storage: Arc<dyn FileStorageInterface + Send + Sync>,
    pub uploads_dir: String,
    pub upload_max_size_mb: u64,
    pub max_page_size: u64,
    pub db_timeout: Duration,
}

impl Debug for CtxState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CtxState")
            .field("uploads_dir", &self.uploads_dir)
            .field("upload_max_size_mb", &self.upload_max_size_mb)
            .field("max_page_size", &self.max_page_size)
            .field("db_timeout", &self.db_timeout)
            .finish_non_exhaustive()
    }
}

pub fn create_ctx_state(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Arc<CtxState> {
    let ctx_state = CtxState {
        store,
        jwt: JWT::new(config.jwt_secret.clone(), TimeDelta::days(1)),
        file_storage: Arc::new(LocalFileStorage::new(
            config.uploads_dir.clone(),
            config.uploads_base_url.clone(),
        )),
        uploads_dir: config.uploads_dir.clone(),
        upload_max_size_mb: config.upload_file_size_max_mb,
        max_page_size: config.max_page_size,
        db_timeout: Duration::from_millis(config.db_operation_timeout_ms),
    };
    Arc::new(ctx_state)
}
