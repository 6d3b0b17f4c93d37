use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::entities::association::{ToggleResult, ToggleState};

/// Success envelope shared by every JSON endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub data: T,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            data,
            message: message.into(),
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED, data, message)
    }
}

impl ApiResponse<ToggleResult> {
    /// 201 when the toggle created the association, 200 when it removed it.
    pub fn toggled(result: ToggleResult, created: &str, removed: &str) -> Self {
        match result.state {
            ToggleState::Created => Self::created(result, created),
            ToggleState::Removed => Self::ok(result, removed),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::association::RelationKind;

    #[test]
    fn toggle_status_follows_state() {
        let result = |state| ToggleResult {
            state,
            kind: RelationKind::Like,
            subject: "video:1".to_string(),
        };
        let created = ApiResponse::toggled(result(ToggleState::Created), "Liked", "Unliked");
        assert_eq!(created.status, 201);
        assert_eq!(created.message, "Liked");
        let removed = ApiResponse::toggled(result(ToggleState::Removed), "Liked", "Unliked");
        assert_eq!(removed.status, 200);
        assert_eq!(removed.message, "Unliked");
    }
}
