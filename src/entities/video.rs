use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserView;
use crate::database::document::timestamp;

pub use crate::database::table_names::VIDEO_TABLE_NAME as TABLE_NAME;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Video {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: u64,
    pub is_published: bool,
    pub owner: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Listing row: a video with its owner joined.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VideoView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub duration: f64,
    pub views: u64,
    pub owner: Option<UserView>,
    pub created_at: String,
}

pub const SORT_KEYS: &[&str] = &["created_at", "title", "views", "duration"];
pub const TEXT_FIELDS: &[&str] = &["title", "description"];
/// Fields attached when a video is joined into another record.
pub const SUMMARY_FIELDS: &[&str] = &[
    "video_file",
    "title",
    "thumbnail",
    "views",
    "duration",
    "owner",
    "is_published",
];
