use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use vidshare_server::config::AppConfig;
use vidshare_server::database::client::{Database, DbConfig};
use vidshare_server::database::memory_store::MemoryStore;
use vidshare_server::database::surreal_store::SurrealStore;
use vidshare_server::init;
use vidshare_server::interfaces::document_store::DocumentStore;
use vidshare_server::middleware::error::AppResult;
use vidshare_server::middleware::mw_ctx;
use vidshare_server::utils::dir_utils::ensure_dir_exists;

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = AppConfig::from_env();
    info!(uploads_dir = %config.uploads_dir, max_mb = config.upload_file_size_max_mb, "uploads");
    ensure_dir_exists(&config.uploads_dir).expect("uploads directory can be created");

    let store: Arc<dyn DocumentStore> = if config.uses_memory_store() {
        info!("using in-memory document store");
        Arc::new(MemoryStore::new())
    } else {
        let db = Database::connect(DbConfig {
            url: &config.db_url,
            database: &config.db_database,
            namespace: &config.db_namespace,
            username: config.db_username.as_deref(),
            password: config.db_password.as_deref(),
        })
        .await?;
        init::run_migrations(&db).await?;
        Arc::new(SurrealStore::new(db.client))
    };

    let ctx_state = mw_ctx::create_ctx_state(store, &config);
    let routes_all = init::main_router(&ctx_state);

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("listener binds");

    axum::serve(listener, routes_all.into_make_service())
        .await
        .expect("server runs");

    Ok(())
}
