use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Router;
use serde::Deserialize;
use validator::Validate;

use crate::entities::tweet::Tweet;
use crate::middleware::auth_with_login_access::AuthWithLoginAccess;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::CtxResult;
use crate::middleware::mw_ctx::CtxState;
use crate::middleware::utils::extractor_utils::JsonOrFormValidated;
use crate::middleware::utils::request_utils::ApiResponse;
use crate::services::tweet_service::TweetService;

pub fn routes() -> Router<Arc<CtxState>> {
    Router::new()
        .route("/api/tweets", post(create_tweet))
        .route("/api/tweets/user/:user_id", get(get_user_tweets))
        .route("/api/tweets/:tweet_id", patch(update_tweet).delete(delete_tweet))
}

#[derive(Debug, Deserialize, Validate)]
pub struct TweetInput {
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
}

async fn create_tweet(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    JsonOrFormValidated(input): JsonOrFormValidated<TweetInput>,
) -> CtxResult<ApiResponse<Tweet>> {
    let tweet = TweetService::new(state.store.as_ref(), state.db_timeout)
        .create(&auth_data.user_id, &input.content)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::created(tweet, "Tweet created successfully"))
}

async fn get_user_tweets(
    ctx: Ctx,
    State(state): State<Arc<CtxState>>,
    Path(user_id): Path<String>,
) -> CtxResult<ApiResponse<Vec<Tweet>>> {
    let tweets = TweetService::new(state.store.as_ref(), state.db_timeout)
        .user_tweets(&user_id)
        .await
        .map_err(|e| ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(tweets, "Tweets fetched successfully"))
}

async fn update_tweet(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(tweet_id): Path<String>,
    JsonOrFormValidated(input): JsonOrFormValidated<TweetInput>,
) -> CtxResult<ApiResponse<Tweet>> {
    let tweet = TweetService::new(state.store.as_ref(), state.db_timeout)
        .update(&auth_data.user_id, &tweet_id, &input.content)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(tweet, "Tweet updated successfully"))
}

async fn delete_tweet(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(tweet_id): Path<String>,
) -> CtxResult<ApiResponse<()>> {
    TweetService::new(state.store.as_ref(), state.db_timeout)
        .delete(&auth_data.user_id, &tweet_id)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok((), "Tweet deleted successfully"))
}
