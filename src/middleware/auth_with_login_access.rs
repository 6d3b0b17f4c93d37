use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::{
    middleware::{
        error::{AppError, CtxError},
        mw_ctx::CtxState,
    },
    utils::jwt::TokenType,
};

use super::ctx::{request_token, Ctx};

/// Extractor for routes that need a logged in user.
#[derive(Debug)]
pub struct AuthWithLoginAccess {
    pub user_id: String,
    pub ctx: Ctx,
}

#[async_trait]
impl FromRequestParts<Arc<CtxState>> for AuthWithLoginAccess {
    type Rejection = CtxError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<CtxState>,
    ) -> Result<Self, Self::Rejection> {
        let token = request_token(parts).ok_or(AppError::Unauthenticated)?;
        match state.jwt.decode_by_type(&token, TokenType::Login) {
            Ok(claims) => Ok(AuthWithLoginAccess {
                user_id: claims.auth.clone(),
                ctx: Ctx::new(Ok(claims.auth)),
            }),
            Err(err) => {
                debug!(error = %err, "rejected token");
                Err(AppError::Unauthenticated.into())
            }
        }
    }
}
