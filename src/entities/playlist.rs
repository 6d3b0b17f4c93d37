use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::document::timestamp;

pub use crate::database::table_names::PLAYLIST_TABLE_NAME as TABLE_NAME;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Playlist {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub owner: String,
    /// Video ids, without duplicates, in the order they were added.
    pub videos: Vec<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}
