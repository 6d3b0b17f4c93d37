use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use axum::Router;
use serde::Deserialize;
use validator::Validate;

use crate::entities::comment::{Comment, CommentView};
use crate::middleware::auth_with_login_access::AuthWithLoginAccess;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::CtxResult;
use crate::middleware::mw_ctx::CtxState;
use crate::middleware::utils::extractor_utils::JsonOrFormValidated;
use crate::middleware::utils::request_utils::ApiResponse;
use crate::services::comment_service::CommentService;
use crate::services::listing_service::{ListingParams, ListingQuery, Page};

use super::listing_service;

pub fn routes() -> Router<Arc<CtxState>> {
    Router::new()
        .route(
            "/api/videos/:video_id/comments",
            get(get_video_comments).post(add_comment),
        )
        .route(
            "/api/comments/:comment_id",
            patch(update_comment).delete(delete_comment),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
}

fn comment_service(state: &CtxState) -> CommentService<'_> {
    CommentService::new(state.store.as_ref(), listing_service(state), state.db_timeout)
}

async fn get_video_comments(
    ctx: Ctx,
    State(state): State<Arc<CtxState>>,
    Path(video_id): Path<String>,
    Query(params): Query<ListingParams>,
) -> CtxResult<ApiResponse<Page<CommentView>>> {
    let query = ListingQuery::parse(&params).map_err(|e| ctx.to_ctx_error(e))?;
    let page = comment_service(&state)
        .video_comments(&video_id, query)
        .await
        .map_err(|e| ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(page, "Comments fetched successfully"))
}

async fn add_comment(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(video_id): Path<String>,
    JsonOrFormValidated(input): JsonOrFormValidated<CommentInput>,
) -> CtxResult<ApiResponse<CommentView>> {
    let comment = comment_service(&state)
        .add(&auth_data.user_id, &video_id, input.content)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

async fn update_comment(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(comment_id): Path<String>,
    JsonOrFormValidated(input): JsonOrFormValidated<CommentInput>,
) -> CtxResult<ApiResponse<Comment>> {
    let comment = comment_service(&state)
        .update(&auth_data.user_id, &comment_id, input.content)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(comment, "Comment updated successfully"))
}

async fn delete_comment(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(comment_id): Path<String>,
) -> CtxResult<ApiResponse<()>> {
    comment_service(&state)
        .delete(&auth_data.user_id, &comment_id)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok((), "Comment deleted successfully"))
}
