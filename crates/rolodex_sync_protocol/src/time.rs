//! Timestamp parsing and formatting.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Parses a server-supplied timestamp string into an instant.
///
/// Accepts RFC 3339 (`2024-01-02T10:30:00Z`), a naive datetime
/// without offset (`2024-01-02T10:30:00`, read as UTC), or a bare
/// date (`2024-01-02`, read as midnight UTC). Returns `None` for
/// anything else; callers treat `None` as "older than any local
/// state".
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    None
}

/// Formats an instant as the RFC 3339 string sent on the wire.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339() {
        let parsed = parse_instant("2024-01-02T10:30:00Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 2, 10, 30, 0).unwrap());
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse_instant("2024-01-02T12:30:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 2, 10, 30, 0).unwrap());
    }

    #[test]
    fn parses_bare_date_as_midnight_utc() {
        let parsed = parse_instant("2024-01-02").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_instant("").is_none());
        assert!(parse_instant("   ").is_none());
        assert!(parse_instant("not a timestamp").is_none());
        assert!(parse_instant("2024-13-40").is_none());
    }

    #[test]
    fn format_roundtrips() {
        let instant = Utc.with_ymd_and_hms(2024, 6, 1, 8, 15, 30).unwrap();
        let formatted = format_instant(instant);
        assert_eq!(parse_instant(&formatted), Some(instant));
    }
}
