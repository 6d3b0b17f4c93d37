use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserView;
use crate::database::document::timestamp;

pub use crate::database::table_names::COMMENT_TABLE_NAME as TABLE_NAME;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    pub video: String,
    pub owner: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CommentView {
    pub id: String,
    pub content: String,
    pub owner: Option<UserView>,
    pub created_at: String,
}

pub const SORT_KEYS: &[&str] = &["created_at"];
