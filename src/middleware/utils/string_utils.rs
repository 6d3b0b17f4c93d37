use once_cell::sync::Lazy;
use regex::Regex;

use crate::middleware::error::{AppError, AppResult};

static RECORD_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z_]+):([A-Za-z0-9_]+)$").expect("valid record id regex"));

/// Splits `<collection>:<key>` into its parts.
pub fn split_record_id(value: &str) -> AppResult<(&str, &str)> {
    let caps = RECORD_ID
        .captures(value)
        .ok_or_else(|| AppError::InvalidIdentifier {
            value: value.to_string(),
        })?;
    match (caps.get(1), caps.get(2)) {
        (Some(table), Some(key)) => Ok((table.as_str(), key.as_str())),
        _ => Err(AppError::InvalidIdentifier {
            value: value.to_string(),
        }),
    }
}

/// Validates that `value` is a record id of `table` and returns it owned.
pub fn get_str_id(value: &str, table: &str) -> AppResult<String> {
    let (tb, _) = split_record_id(value)?;
    if tb != table {
        return Err(AppError::InvalidIdentifier {
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

pub const LEN_OR_NONE: fn(v: String) -> Option<String> = |v| {
    let v = v.trim().to_string();
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_must_match_table() {
        assert_eq!(get_str_id("video:abc_1", "video").unwrap(), "video:abc_1");
        assert!(get_str_id("comment:abc", "video").is_err());
        assert!(get_str_id("video:", "video").is_err());
        assert!(get_str_id("abc", "video").is_err());
        assert!(get_str_id("video:a-b", "video").is_err());
        assert_eq!(split_record_id("user:42").unwrap(), ("user", "42"));
    }

    #[test]
    fn blank_strings_become_none() {
        assert_eq!(LEN_OR_NONE("  ".to_string()), None);
        assert_eq!(LEN_OR_NONE(" a ".to_string()), Some("a".to_string()));
    }
}
