use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use uuid::Uuid;

use super::error::{AppError, AppResult, CtxError, CtxResult};
use crate::middleware::mw_ctx::{CtxState, JWT_KEY};
use crate::utils::jwt::TokenType;

/// Per-request context: a request id for error correlation and the
/// authenticated user, if any.
#[derive(Clone, Debug)]
pub struct Ctx {
    pub req_id: Uuid,
    result_user_id: AppResult<String>,
}

impl Ctx {
    pub fn new(result_user_id: AppResult<String>) -> Self {
        Self {
            req_id: Uuid::new_v4(),
            result_user_id,
        }
    }

    pub fn user_id(&self) -> CtxResult<String> {
        self.result_user_id
            .clone()
            .map_err(|error| self.to_ctx_error(error))
    }

    pub fn to_ctx_error(&self, error: AppError) -> CtxError {
        CtxError::new(error, self.req_id)
    }
}

/// Token from `Authorization: Bearer` or, failing that, the `jwt` cookie.
pub(crate) fn request_token(parts: &Parts) -> Option<String> {
    if let Some(header) = parts.headers.typed_get::<Authorization<Bearer>>() {
        return Some(header.token().to_string());
    }
    CookieJar::from_headers(&parts.headers)
        .get(JWT_KEY)
        .map(|cookie| cookie.value().to_string())
}

#[async_trait]
impl FromRequestParts<Arc<CtxState>> for Ctx {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<CtxState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = match request_token(parts) {
            Some(token) => state
                .jwt
                .decode_by_type(&token, TokenType::Login)
                .map(|claims| claims.auth)
                .map_err(|_| AppError::Unauthenticated),
            None => Err(AppError::Unauthenticated),
        };
        Ok(Ctx::new(user_id))
    }
}
