use dotenvy;

/// `DB_URL` value selecting the in-process store instead of SurrealDB.
pub const MEMORY_DB_URL: &str = "memory";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_namespace: String,
    pub db_database: String,
    pub db_password: Option<String>,
    pub db_username: Option<String>,
    pub db_url: String,
    pub jwt_secret: String,
    pub uploads_dir: String,
    pub uploads_base_url: String,
    pub upload_file_size_max_mb: u64,
    pub max_page_size: u64,
    pub db_operation_timeout_ms: u64,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let db_namespace = std::env::var("DB_NAMESPACE").unwrap_or("namespace".to_string());
        let db_database = std::env::var("DB_DATABASE").unwrap_or("database".to_string());
        let db_password = std::env::var("DB_PASSWORD").ok();
        let db_username = std::env::var("DB_USERNAME").ok();
        let db_url = std::env::var("DB_URL").expect("Missing DB_URL in env");

        let jwt_secret = std::env::var("JWT_SECRET").expect("Missing JWT_SECRET in env");

        let uploads_dir = std::env::var("UPLOADS_DIRECTORY").unwrap_or("uploads".to_string());
        let uploads_base_url = std::env::var("UPLOADS_BASE_URL").unwrap_or("/uploads".to_string());
        let upload_file_size_max_mb: u64 = std::env::var("UPLOAD_MAX_SIZE_MB")
            .unwrap_or("15".to_string())
            .parse()
            .expect("UPLOAD_MAX_SIZE_MB should be number");

        let max_page_size = std::env::var("MAX_PAGE_SIZE").map_or(100, |v| {
            v.parse::<u64>().expect("MAX_PAGE_SIZE must be number")
        });
        let db_operation_timeout_ms = std::env::var("DB_OPERATION_TIMEOUT_MS").map_or(5000, |v| {
            v.parse::<u64>()
                .expect("DB_OPERATION_TIMEOUT_MS must be number")
        });
        let port = std::env::var("PORT").map_or(8080, |v| v.parse::<u16>().expect("PORT must be number"));

        Self {
            db_namespace,
            db_database,
            db_password,
            db_username,
            db_url,
            jwt_secret,
            uploads_dir,
            uploads_base_url,
            upload_file_size_max_mb,
            max_page_size,
            db_operation_timeout_ms,
            port,
        }
    }

    pub fn uses_memory_store(&self) -> bool {
        self.db_url == MEMORY_DB_URL
    }
}
