use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::database::document::timestamp;
use crate::database::table_names::{
    COMMENT_TABLE_NAME, LIKE_TABLE_NAME, SUBSCRIPTION_TABLE_NAME, TWEET_TABLE_NAME,
    USER_TABLE_NAME, VIDEO_TABLE_NAME,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RelationKind {
    Like,
    Subscription,
}

impl RelationKind {
    /// Collection the associations of this kind live in.
    pub fn collection(&self) -> &'static str {
        match self {
            RelationKind::Like => LIKE_TABLE_NAME,
            RelationKind::Subscription => SUBSCRIPTION_TABLE_NAME,
        }
    }

    pub fn subject_tables(&self) -> &'static [&'static str] {
        match self {
            RelationKind::Like => &[VIDEO_TABLE_NAME, COMMENT_TABLE_NAME, TWEET_TABLE_NAME],
            RelationKind::Subscription => &[USER_TABLE_NAME],
        }
    }

    pub fn allows_self_reference(&self) -> bool {
        match self {
            RelationKind::Like => true,
            RelationKind::Subscription => false,
        }
    }
}

/// Directed actor -> subject relation. Never updated, only created or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub actor: String,
    pub subject: String,
    pub subject_type: String,
    pub kind: RelationKind,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToggleState {
    Created,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToggleResult {
    pub state: ToggleState,
    pub kind: RelationKind,
    pub subject: String,
}
