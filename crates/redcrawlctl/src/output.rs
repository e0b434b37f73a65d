//! Terminal formatting helpers.

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;

/// Backend timestamp for display, `-` when absent.
///
/// Accepts RFC 3339 and the naive ISO form the backend emits for some
/// columns; anything else is shown as delivered.
pub fn timestamp(value: Option<&str>) -> String {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return "-".to_string();
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format("%Y-%m-%d %H:%M:%S").to_string();
    }
    raw.to_string()
}

/// Shorten to `width` characters, marking the cut with `…`.
pub fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(1)).collect();
    format!("{}…", kept)
}

pub fn short_hash(hash: &str) -> &str {
    match hash.char_indices().nth(7) {
        Some((idx, _)) => &hash[..idx],
        None => hash,
    }
}

pub fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_formats() {
        assert_eq!(timestamp(Some("2024-05-01T10:00:00Z")), "2024-05-01 10:00:00");
        assert_eq!(timestamp(Some("2024-05-01T12:00:00+02:00")), "2024-05-01 10:00:00");
        assert_eq!(timestamp(Some("2024-05-01T10:00:00.123456")), "2024-05-01 10:00:00");
        assert_eq!(timestamp(Some("yesterday")), "yesterday");
        assert_eq!(timestamp(None), "-");
        assert_eq!(timestamp(Some("")), "-");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("subscription.scheduled", 40), "subscription.scheduled");
        assert_eq!(truncate("https://eur-lex.europa.eu/legal-content", 12), "https://eur…");
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("9f86d081884c7d65"), "9f86d08");
        assert_eq!(short_hash("abc"), "abc");
    }

    #[test]
    fn test_optional() {
        assert_eq!(optional(Some(3)), "3");
        assert_eq!(optional::<i64>(None), "-");
    }
}
