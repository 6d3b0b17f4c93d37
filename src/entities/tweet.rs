use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::document::timestamp;

pub use crate::database::table_names::TWEET_TABLE_NAME as TABLE_NAME;

pub const MAX_CONTENT_LEN: usize = 280;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Tweet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    pub owner: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}
