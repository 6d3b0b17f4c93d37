use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::routing::{get, patch};
use axum::Router;
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use tempfile::NamedTempFile;

use crate::entities::user;
use crate::entities::video::{Video, VideoView};
use crate::middleware::auth_with_login_access::AuthWithLoginAccess;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, AppResult, CtxResult};
use crate::middleware::mw_ctx::CtxState;
use crate::middleware::utils::request_utils::ApiResponse;
use crate::middleware::utils::string_utils::get_str_id;
use crate::services::listing_service::{ListingParams, ListingQuery, Page};
use crate::services::video_service::{PublishVideo, UpdateVideo, VideoService};
use crate::utils::file::convert::convert_field_file_data;

use super::listing_service;

pub fn routes(upload_max_size_mb: u64) -> Router<Arc<CtxState>> {
    let max_bytes_val = (1024 * 1024 * upload_max_size_mb) as usize;
    Router::new()
        .route("/api/videos", get(list_videos).post(publish_video))
        .route(
            "/api/videos/:video_id",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/api/videos/:video_id/toggle-publish", patch(toggle_publish))
        .layer(DefaultBodyLimit::max(max_bytes_val))
}

#[derive(TryFromMultipart)]
pub struct PublishVideoInput {
    pub title: Option<String>,
    pub description: Option<String>,
    #[form_data(limit = "unlimited")]
    pub video_file: Option<FieldData<NamedTempFile>>,
    #[form_data(limit = "unlimited")]
    pub thumbnail: Option<FieldData<NamedTempFile>>,
}

#[derive(TryFromMultipart)]
pub struct UpdateVideoInput {
    pub title: Option<String>,
    pub description: Option<String>,
    #[form_data(limit = "unlimited")]
    pub thumbnail: Option<FieldData<NamedTempFile>>,
}

fn video_service(state: &CtxState) -> VideoService<'_> {
    VideoService::new(
        state.store.as_ref(),
        state.file_storage.as_ref(),
        listing_service(state),
        state.db_timeout,
    )
}

fn video_query(params: &ListingParams) -> AppResult<ListingQuery> {
    let query = ListingQuery::parse(params)?;
    Ok(match params.user_id.as_deref() {
        Some(user_id) if !user_id.trim().is_empty() => {
            query.with_filter("owner", get_str_id(user_id.trim(), user::TABLE_NAME)?)
        }
        _ => query,
    })
}

async fn list_videos(
    ctx: Ctx,
    State(state): State<Arc<CtxState>>,
    Query(params): Query<ListingParams>,
) -> CtxResult<ApiResponse<Page<VideoView>>> {
    let query = video_query(&params).map_err(|e| ctx.to_ctx_error(e))?;
    let page = video_service(&state)
        .list(query)
        .await
        .map_err(|e| ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(page, "Videos fetched successfully"))
}

async fn publish_video(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    TypedMultipart(input): TypedMultipart<PublishVideoInput>,
) -> CtxResult<ApiResponse<Video>> {
    let ctx = &auth_data.ctx;
    let video_file = input.video_file.ok_or_else(|| {
        ctx.to_ctx_error(AppError::InvalidInput {
            description: "Video file is required".to_string(),
        })
    })?;
    let data = PublishVideo {
        title: input.title.unwrap_or_default(),
        description: input.description.unwrap_or_default(),
        video_file: convert_field_file_data(video_file).map_err(|e| ctx.to_ctx_error(e))?,
        thumbnail: input
            .thumbnail
            .map(convert_field_file_data)
            .transpose()
            .map_err(|e| ctx.to_ctx_error(e))?,
    };
    let video = video_service(&state)
        .publish(&auth_data.user_id, data)
        .await
        .map_err(|e| ctx.to_ctx_error(e))?;
    Ok(ApiResponse::created(video, "Video published successfully"))
}

async fn get_video(
    ctx: Ctx,
    State(state): State<Arc<CtxState>>,
    Path(video_id): Path<String>,
) -> CtxResult<ApiResponse<Video>> {
    let video = video_service(&state)
        .get(&video_id)
        .await
        .map_err(|e| ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

async fn update_video(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(video_id): Path<String>,
    TypedMultipart(input): TypedMultipart<UpdateVideoInput>,
) -> CtxResult<ApiResponse<Video>> {
    let ctx = &auth_data.ctx;
    let data = UpdateVideo {
        title: input.title,
        description: input.description,
        thumbnail: input
            .thumbnail
            .map(convert_field_file_data)
            .transpose()
            .map_err(|e| ctx.to_ctx_error(e))?,
    };
    let video = video_service(&state)
        .update(&auth_data.user_id, &video_id, data)
        .await
        .map_err(|e| ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(video, "Video updated successfully"))
}

async fn delete_video(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(video_id): Path<String>,
) -> CtxResult<ApiResponse<Video>> {
    let video = video_service(&state)
        .delete(&auth_data.user_id, &video_id)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(video, "Video deleted successfully"))
}

async fn toggle_publish(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(video_id): Path<String>,
) -> CtxResult<ApiResponse<Video>> {
    let video = video_service(&state)
        .toggle_publish(&auth_data.user_id, &video_id)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    let message = if video.is_published {
        "Video published"
    } else {
        "Video unpublished"
    };
    Ok(ApiResponse::ok(video, message))
}
