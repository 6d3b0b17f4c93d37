use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;

use crate::entities::association::ToggleResult;
use crate::middleware::auth_with_login_access::AuthWithLoginAccess;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::CtxResult;
use crate::middleware::mw_ctx::CtxState;
use crate::middleware::utils::request_utils::ApiResponse;
use crate::services::subscription_service::{
    ChannelSubscribers, SubscribedChannels, SubscriptionService,
};

pub fn routes() -> Router<Arc<CtxState>> {
    Router::new()
        .route(
            "/api/subscriptions/c/:channel_id",
            get(get_channel_subscribers).post(toggle_subscription),
        )
        .route(
            "/api/subscriptions/u/:subscriber_id",
            get(get_subscribed_channels),
        )
}

fn subscription_service(state: &CtxState) -> SubscriptionService<'_> {
    SubscriptionService::new(state.store.as_ref(), state.db_timeout)
}

async fn toggle_subscription(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(channel_id): Path<String>,
) -> CtxResult<ApiResponse<ToggleResult>> {
    let result = subscription_service(&state)
        .toggle_subscription(&auth_data.user_id, &channel_id)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::toggled(result, "Subscribed", "Unsubscribed"))
}

async fn get_channel_subscribers(
    ctx: Ctx,
    State(state): State<Arc<CtxState>>,
    Path(channel_id): Path<String>,
) -> CtxResult<ApiResponse<ChannelSubscribers>> {
    let subscribers = subscription_service(&state)
        .channel_subscribers(&channel_id)
        .await
        .map_err(|e| ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(subscribers, "Subscribers fetched successfully"))
}

async fn get_subscribed_channels(
    auth_data: AuthWithLoginAccess,
    State(state): State<Arc<CtxState>>,
    Path(subscriber_id): Path<String>,
) -> CtxResult<ApiResponse<SubscribedChannels>> {
    let channels = subscription_service(&state)
        .subscribed_channels(&auth_data.user_id, &subscriber_id)
        .await
        .map_err(|e| auth_data.ctx.to_ctx_error(e))?;
    Ok(ApiResponse::ok(channels, "Subscribed channels fetched successfully"))
}
