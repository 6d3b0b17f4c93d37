use std::fmt;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;
use validator::ValidationErrors;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CtxError {
    pub error: AppError,
    pub req_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppError {
    Generic { description: String },
    InvalidIdentifier { value: String },
    InvalidQuery { description: String },
    InvalidSortKey { key: String },
    InvalidInput { description: String },
    SubjectNotFound { ident: String },
    EntityFailIdNotFound { ident: String },
    NoResults { description: String },
    SelfReferenceNotAllowed,
    Unauthenticated,
    Forbidden,
    Conflict { description: String },
    ToggleOperationFailed { source: String },
    OperationTimedOut,
    UpstreamUploadFailed { source: String },
    Serde { source: String },
    Store { source: String },
    SurrealDb { source: String },
}

/// Error carrying the request id, returned from route handlers.
pub type CtxResult<T> = core::result::Result<T, CtxError>;
/// Any error raised below the route layer, before a req_id is attached.
pub type AppResult<T> = core::result::Result<T, AppError>;

impl std::error::Error for AppError {}

impl AppError {
    /// Stable machine-readable code sent to clients next to the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Generic { .. } => "Generic",
            Self::InvalidIdentifier { .. } => "InvalidIdentifier",
            Self::InvalidQuery { .. } => "InvalidQuery",
            Self::InvalidSortKey { .. } => "InvalidSortKey",
            Self::InvalidInput { .. } => "InvalidInput",
            Self::SubjectNotFound { .. } => "SubjectNotFound",
            Self::EntityFailIdNotFound { .. } => "NotFound",
            Self::NoResults { .. } => "NoResults",
            Self::SelfReferenceNotAllowed => "SelfReferenceNotAllowed",
            Self::Unauthenticated => "Unauthenticated",
            Self::Forbidden => "Forbidden",
            Self::Conflict { .. } => "Conflict",
            Self::ToggleOperationFailed { .. } => "ToggleOperationFailed",
            Self::OperationTimedOut => "OperationTimedOut",
            Self::UpstreamUploadFailed { .. } => "UpstreamUploadFailed",
            Self::Serde { .. } => "Serde",
            Self::Store { .. } | Self::SurrealDb { .. } => "Store",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Generic { .. }
            | Self::InvalidIdentifier { .. }
            | Self::InvalidQuery { .. }
            | Self::InvalidSortKey { .. }
            | Self::InvalidInput { .. }
            | Self::SelfReferenceNotAllowed => StatusCode::BAD_REQUEST,
            Self::SubjectNotFound { .. }
            | Self::EntityFailIdNotFound { .. }
            | Self::NoResults { .. } => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::OperationTimedOut => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamUploadFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::ToggleOperationFailed { .. }
            | Self::Serde { .. }
            | Self::Store { .. }
            | Self::SurrealDb { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl CtxError {
    pub fn new(error: AppError, req_id: Uuid) -> Self {
        CtxError { error, req_id }
    }
}

impl From<AppError> for CtxError {
    fn from(value: AppError) -> Self {
        CtxError {
            req_id: Uuid::new_v4(),
            error: value,
        }
    }
}

impl From<surrealdb::Error> for CtxError {
    fn from(value: surrealdb::Error) -> Self {
        AppError::from(value).into()
    }
}

const INTERNAL: &str = "Internal error";

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic { description } => write!(f, "{description}"),
            Self::InvalidIdentifier { value } => write!(f, "Invalid identifier {value}"),
            Self::InvalidQuery { description } => write!(f, "Invalid query: {description}"),
            Self::InvalidSortKey { key } => write!(f, "Can not sort by '{key}'"),
            Self::InvalidInput { description } => write!(f, "{description}"),
            Self::SubjectNotFound { ident } => write!(f, "{ident} not found"),
            Self::EntityFailIdNotFound { ident } => write!(f, "Record id= {ident} not found"),
            Self::NoResults { description } => write!(f, "{description}"),
            Self::SelfReferenceNotAllowed => write!(f, "You cannot subscribe to yourself"),
            Self::Unauthenticated => write!(f, "You are not logged in"),
            Self::Forbidden => write!(f, "Forbidden"),
            Self::Conflict { description } => write!(f, "{description}"),
            Self::ToggleOperationFailed { .. } => {
                write!(f, "Something went wrong while toggling")
            }
            Self::OperationTimedOut => write!(f, "Operation timed out"),
            Self::UpstreamUploadFailed { .. } => write!(f, "File upload failed"),
            Self::Serde { source } => write!(f, "Serde error - {source}"),
            Self::Store { .. } | Self::SurrealDb { .. } => write!(f, "{INTERNAL}"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponseBody {
    pub status: u16,
    pub code: String,
    pub message: String,
    pub req_id: String,
}

impl ErrorResponseBody {
    pub fn new(error: &AppError, req_id: Option<String>) -> Self {
        ErrorResponseBody {
            status: error.status_code().as_u16(),
            code: error.code().to_string(),
            message: error.to_string(),
            req_id: req_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        }
    }
}

// REST error response
impl IntoResponse for CtxError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.error.status_code();
        if status_code.is_server_error() {
            error!(req_id = %self.req_id, error = ?self.error, "request failed");
        } else {
            warn!(req_id = %self.req_id, error = ?self.error, "request rejected");
        }
        let body = ErrorResponseBody::new(&self.error, Some(self.req_id.to_string()));
        let mut response = (status_code, Json(body)).into_response();
        // Insert the real Error into the response - for the logger
        response.extensions_mut().insert(self.error);
        response
    }
}

// External Errors
impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde {
            source: value.to_string(),
        }
    }
}

impl From<surrealdb::Error> for AppError {
    fn from(value: surrealdb::Error) -> Self {
        Self::SurrealDb {
            source: value.to_string(),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(value: ValidationErrors) -> Self {
        Self::InvalidInput {
            description: value.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthenticated
    }
}

impl From<CtxError> for AppError {
    fn from(value: CtxError) -> Self {
        value.error
    }
}
