use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};

#[allow(dead_code)]
pub fn video_form(title: &str, description: &str) -> MultipartForm {
    let video = Part::bytes(b"not really a video".to_vec())
        .file_name("clip.mp4")
        .mime_type("video/mp4");
    let thumbnail = Part::bytes(b"not really an image".to_vec())
        .file_name("thumb.png")
        .mime_type("image/png");
    MultipartForm::new()
        .add_text("title", title.to_string())
        .add_text("description", description.to_string())
        .add_part("video_file", video)
        .add_part("thumbnail", thumbnail)
}

#[allow(dead_code)]
pub async fn publish_video(server: &TestServer, token: &str, title: &str) -> TestResponse {
    server
        .post("/api/videos")
        .add_header("Authorization", format!("Bearer {token}"))
        .multipart(video_form(title, &format!("{title} description")))
        .await
}

/// Publishes a video and returns its id.
#[allow(dead_code)]
pub async fn create_video(server: &TestServer, token: &str, title: &str) -> String {
    let response = publish_video(server, token, title).await;
    response.assert_status(axum::http::StatusCode::CREATED);
    super::response_data(&response)["id"]
        .as_str()
        .expect("video id")
        .to_string()
}
