use serde::{Deserialize, Serialize};

pub use crate::database::table_names::USER_TABLE_NAME as TABLE_NAME;

/// Users are written by the auth service; this crate only reads them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Public fields attached wherever a user is joined into another record.
pub const PUBLIC_FIELDS: &[&str] = &["username", "email", "full_name", "avatar"];

/// Joined user as it appears inside listings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserView {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}
