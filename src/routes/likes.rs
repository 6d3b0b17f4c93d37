use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Router;

use crate::entities::association::ToggleResult;
use crate::middleware::auth_with_login_access::AuthWithLoginAccess;
use crate::middleware::error::CtxResult;
use crate::middleware::mw_ctx::CtxState;
use crate::middleware::utils::request_utils::ApiResponse;
use crate::services::like_service::{LikeService, LikedVideoView};
use crate::services::listing_service::{ListingParams, ListingQuery, Page};

pub fn routes() -> Router<Arc<CtxState>> {
    Router::new()
        .route("/api/likes/toggle/v/:video_id", post(toggle_video_like))
        .route("/api/likes/toggle/c/:comment_id", post(toggle_comment_like))
        .route("/api/likes/toggle/t/:tweet_id", post(toggle_tweet_like))
        .route("/api/likes/videos", get(get_liked_videos))
}

fn like_service(state: &CtxState) -> LikeService<'_> {
    LikeService::new(state.store.as_ref(), state.max_page_size, state.db_timeout)
}

async fn toggle_video_like(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(video_id): Path<String>,
) -> CtxResult<ApiResponse<ToggleResult>> {
    let result = like_service(&state)
        .toggle_video_like(&auth_data.user_id, &video_id)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::toggled(result, "Video liked", "Video unliked"))
}

async fn toggle_comment_like(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(comment_id): Path<String>,
) -> CtxResult<ApiResponse<ToggleResult>> {
    let result = like_service(&state)
        .toggle_comment_like(&auth_data.user_id, &comment_id)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::toggled(result, "Comment liked", "Comment unliked"))
}

async fn toggle_tweet_like(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(tweet_id): Path<String>,
) -> CtxResult<ApiResponse<ToggleResult>> {
    let result = like_service(&state)
        .toggle_tweet_like(&auth_data.user_id, &tweet_id)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::toggled(result, "Tweet liked", "Tweet unliked"))
}

async fn get_liked_videos(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Query(params): Query<ListingParams>,
) -> CtxResult<ApiResponse<Page<LikedVideoView>>> {
    let ctx = &auth_data.ctx;
    let query = ListingQuery::parse(&params).map_err(|e| ctx.to_ctx_error(e))?;
    let page = like_service(&state)
        .liked_videos(&auth_data.user_id, query)
        .await
        .map_err(|e| ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(page, "Liked videos fetched successfully"))
}
