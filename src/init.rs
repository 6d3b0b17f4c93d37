use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::database::client::Database;
use crate::database::surreal_store::SurrealStore;
use crate::middleware::{error::AppResult, mw_ctx::CtxState};
use crate::routes::{comments, likes, playlists, subscriptions, tweets, videos};

pub async fn run_migrations(database: &Database) -> AppResult<()> {
    SurrealStore::new(database.client.clone()).mutate_db().await?;
    info!("migrations applied");
    Ok(())
}

pub fn main_router(ctx_state: &Arc<CtxState>) -> Router {
    Router::new()
        .route("/hc", get(get_hc))
        .nest_service("/uploads", ServeDir::new(&ctx_state.uploads_dir))
        .merge(videos::routes(ctx_state.upload_max_size_mb))
        .merge(comments::routes())
        .merge(likes::routes())
        .merge(subscriptions::routes())
        .merge(playlists::routes())
        .merge(tweets::routes())
        .with_state(ctx_state.clone())
        .layer(TraceLayer::new_for_http())
}

async fn get_hc() -> Response {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    (StatusCode::OK, format!("v{}", VERSION)).into_response()
}
