use async_trait::async_trait;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::{
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::middleware::error::{AppError, CtxError};

/// Body extractor accepting JSON or url-encoded forms, validated before the
/// handler runs.
#[derive(Debug)]
pub struct JsonOrFormValidated<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonOrFormValidated<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send + Sync + 'static,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let payload: T = if content_type.starts_with("application/json") {
            let Json(payload) = Json::<T>::from_request(req, state)
                .await
                .map_err(|err: JsonRejection| invalid_body(err.body_text()))?;
            payload
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(payload) = Form::<T>::from_request(req, state)
                .await
                .map_err(|err: FormRejection| invalid_body(err.body_text()))?;
            payload
        } else {
            return Err(invalid_body(format!("Unsupported content type '{content_type}'")));
        };

        payload
            .validate()
            .map_err(|err| CtxError::from(AppError::from(err)).into_response())?;
        Ok(Self(payload))
    }
}

fn invalid_body(description: String) -> Response {
    CtxError::from(AppError::InvalidInput { description }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Debug, Deserialize, Validate)]
    struct NoteInput {
        #[validate(length(min = 1, max = 10))]
        content: String,
    }

    fn request(content_type: &str, body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    async fn read_body(res: Response) -> (StatusCode, Value) {
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn accepts_json_and_form_bodies() {
        let JsonOrFormValidated(note) = JsonOrFormValidated::<NoteInput>::from_request(
            request("application/json", r#"{"content":"hi"}"#),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(note.content, "hi");

        let JsonOrFormValidated(note) = JsonOrFormValidated::<NoteInput>::from_request(
            request("application/x-www-form-urlencoded", "content=hey"),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(note.content, "hey");
    }

    #[tokio::test]
    async fn malformed_or_invalid_bodies_are_invalid_input() {
        for req in [
            request("application/json", "{not json"),
            request("application/json", r#"{"content":""}"#),
            request("application/x-www-form-urlencoded", "other=1"),
            request("text/plain", "content"),
        ] {
            let res = JsonOrFormValidated::<NoteInput>::from_request(req, &())
                .await
                .unwrap_err();
            let (status, body) = read_body(res).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["code"], "InvalidInput");
        }
    }
}
