use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Router;
use serde::Deserialize;
use validator::Validate;

use crate::database::document::Document;
use crate::entities::playlist::Playlist;
use crate::middleware::auth_with_login_access::AuthWithLoginAccess;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::CtxResult;
use crate::middleware::mw_ctx::CtxState;
use crate::middleware::utils::extractor_utils::JsonOrFormValidated;
use crate::middleware::utils::request_utils::ApiResponse;
use crate::services::playlist_service::PlaylistService;

pub fn routes() -> Router<Arc<CtxState>> {
    Router::new()
        .route("/api/playlists", post(create_playlist))
        .route("/api/playlists/user/:user_id", get(get_user_playlists))
        .route(
            "/api/playlists/:playlist_id",
            get(get_playlist)
                .patch(update_playlist)
                .delete(delete_playlist),
        )
        .route(
            "/api/playlists/add/:video_id/:playlist_id",
            patch(add_video_to_playlist),
        )
        .route(
            "/api/playlists/remove/:video_id/:playlist_id",
            patch(remove_video_from_playlist),
        )
}

/// Lengths are checked on the trimmed values by the service.
#[derive(Debug, Deserialize, Validate)]
pub struct PlaylistInput {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
}

async fn create_playlist(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    JsonOrFormValidated(input): JsonOrFormValidated<PlaylistInput>,
) -> CtxResult<ApiResponse<Playlist>> {
    let playlist = PlaylistService::new(state.store.as_ref(), state.db_timeout)
        .create(&auth_data.user_id, &input.name, &input.description)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::created(playlist, "Playlist created successfully"))
}

async fn get_user_playlists(
    ctx: Ctx,
    State(state): State<Arc<CtxState>>,
    Path(user_id): Path<String>,
) -> CtxResult<ApiResponse<Vec<Playlist>>> {
    let playlists = PlaylistService::new(state.store.as_ref(), state.db_timeout)
        .user_playlists(&user_id)
        .await
        .map_err(|e| ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(playlists, "Playlists fetched successfully"))
}

async fn get_playlist(
    ctx: Ctx,
    State(state): State<Arc<CtxState>>,
    Path(playlist_id): Path<String>,
) -> CtxResult<ApiResponse<Document>> {
    let playlist = PlaylistService::new(state.store.as_ref(), state.db_timeout)
        .get(&playlist_id)
        .await
        .map_err(|e| ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(playlist, "Playlist fetched successfully"))
}

async fn add_video_to_playlist(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> CtxResult<ApiResponse<Document>> {
    let playlist = PlaylistService::new(state.store.as_ref(), state.db_timeout)
        .add_video(&auth_data.user_id, &video_id, &playlist_id)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(playlist, "Video added to playlist"))
}

async fn remove_video_from_playlist(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> CtxResult<ApiResponse<Document>> {
    let playlist = PlaylistService::new(state.store.as_ref(), state.db_timeout)
        .remove_video(&auth_data.user_id, &video_id, &playlist_id)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(playlist, "Video removed from playlist"))
}

async fn update_playlist(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(playlist_id): Path<String>,
    JsonOrFormValidated(input): JsonOrFormValidated<PlaylistInput>,
) -> CtxResult<ApiResponse<Playlist>> {
    let playlist = PlaylistService::new(state.store.as_ref(), state.db_timeout)
        .update(&auth_data.user_id, &playlist_id, &input.name, &input.description)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(playlist, "Playlist updated successfully"))
}

async fn delete_playlist(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(playlist_id): Path<String>,
) -> CtxResult<ApiResponse<()>> {
    PlaylistService::new(state.store.as_ref(), state.db_timeout)
        .delete(&auth_data.user_id, &playlist_id)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok((), "Playlist deleted successfully"))
}
