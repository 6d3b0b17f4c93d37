pub mod test_with_server;
pub mod user_helpers;
pub mod video_helpers;

use axum_test::TestResponse;
use serde_json::Value;

/// `data` of a successful envelope.
#[allow(dead_code)]
pub fn response_data(response: &TestResponse) -> Value {
    response.json::<Value>()["data"].clone()
}
