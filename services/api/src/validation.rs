//! Input validation utilities

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Longest name accepted for users, skills and categories
pub const MAX_NAME_LENGTH: usize = 100;

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp for the `since` filter.
///
/// Timestamps without an offset are read in `default_zone`.
pub fn parse_since(raw: &str, default_zone: Tz) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    let invalid = || "Invalid 'since' parameter. Use ISO 8601 format.".to_string();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(invalid)?;

    default_zone
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(invalid)
}

/// Trim a chat message, rejecting blank content
pub fn normalize_message_content(content: &str) -> Result<String, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("Message content is required".to_string());
    }
    Ok(trimmed.to_string())
}

/// Trim and validate a required name field
pub fn validate_name(value: &str) -> Result<String, String> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err("Name is required".to_string());
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "Name must be at most {} characters long",
            MAX_NAME_LENGTH
        ));
    }

    Ok(trimmed.to_string())
}

/// Validate a rating score
pub fn validate_score(score: i16) -> Result<(), String> {
    if !(1..=5).contains(&score) {
        return Err("Score must be between 1 and 5".to_string());
    }
    Ok(())
}

/// Validate a free-text search term
pub fn validate_search_term(term: &str) -> Result<String, String> {
    let trimmed = term.trim();

    if trimmed.is_empty() {
        return Err("Search term is required".to_string());
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "Search term must be at most {} characters long",
            MAX_NAME_LENGTH
        ));
    }

    Ok(trimmed.to_string())
}

/// Build a `LIKE` pattern matching `term` anywhere, with metacharacters escaped
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_parse_since_with_offset() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();

        assert_eq!(parse_since("2024-05-01T12:30:00Z", Tz::UTC), Ok(expected));
        assert_eq!(
            parse_since("2024-05-01T08:30:00-04:00", Tz::UTC),
            Ok(expected)
        );
        assert_eq!(
            parse_since("2024-05-01 14:30:00+0200", Tz::UTC),
            Ok(expected)
        );
    }

    #[test]
    fn test_parse_since_keeps_fractional_seconds() {
        let parsed = parse_since("2024-05-01T12:30:00.250Z", Tz::UTC).unwrap();
        let whole = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(parsed - whole, Duration::milliseconds(250));
    }

    #[test]
    fn test_parse_since_naive_uses_default_zone() {
        let parsed = parse_since("2024-01-15T09:00:00", Tz::America__Santiago).unwrap();
        // Santiago is UTC-3 in January (summer time)
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());

        let parsed = parse_since("2024-01-15 09:00", Tz::UTC).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_since_rejects_garbage() {
        assert!(parse_since("yesterday", Tz::UTC).is_err());
        assert!(parse_since("2024-13-01T00:00:00", Tz::UTC).is_err());
        assert!(parse_since("", Tz::UTC).is_err());
    }

    #[test]
    fn test_message_content_is_trimmed() {
        assert_eq!(normalize_message_content("  hola \n"), Ok("hola".to_string()));
        assert!(normalize_message_content("").is_err());
        assert!(normalize_message_content(" \t\n ").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Rust "), Ok("Rust".to_string()));
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_score() {
        assert!(validate_score(1).is_ok());
        assert!(validate_score(5).is_ok());
        assert!(validate_score(0).is_err());
        assert!(validate_score(6).is_err());
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("rust"), "%rust%");
        assert_eq!(contains_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }
}
