//! ISO 8601 date handling and Modified Julian Date conversion.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// MJD of the Unix epoch (1970-01-01T00:00:00Z).
pub const MJD_UNIX_EPOCH: f64 = 40587.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Parse an ISO 8601 date or datetime string.
///
/// Supports:
/// - Full datetime with timezone: "2024-01-15T12:00:00Z"
/// - Datetime without timezone (UTC assumed): "2024-01-15T12:00:00"
/// - Fractional seconds: "2024-01-15T12:00:00.250"
/// - Date only: "2024-01-15"
/// - Year and month: "2024-01"
pub fn parse_iso_date(s: &str) -> Result<DateTime<Utc>, DateParseError> {
    let s = s.trim();

    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try without timezone (assume UTC)
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Try date only
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()));
    }

    // Try year-month
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()));
    }

    Err(DateParseError::InvalidFormat(s.to_string()))
}

/// Whether a token has the leading `YYYY-MM` shape of an ISO date.
///
/// Used for type inference so that plain numbers such as "2000" stay numeric.
pub fn looks_like_iso_date(s: &str) -> bool {
    let bytes = s.trim().as_bytes();
    bytes.len() >= 7
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
}

/// Convert a UTC datetime to a Modified Julian Date.
pub fn to_mjd(dt: &DateTime<Utc>) -> f64 {
    let seconds = dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) * 1e-9;
    MJD_UNIX_EPOCH + seconds / SECONDS_PER_DAY
}

/// Convert a Modified Julian Date back to a UTC datetime (millisecond precision).
pub fn from_mjd(mjd: f64) -> Option<DateTime<Utc>> {
    let millis = ((mjd - MJD_UNIX_EPOCH) * SECONDS_PER_DAY * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis).single()
}

/// Format a datetime the way range lists serialize dates.
pub fn format_iso_date(dt: &DateTime<Utc>) -> String {
    if dt.timestamp_subsec_millis() == 0 {
        dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DateParseError {
    #[error("invalid ISO date string: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use test_utils::assert_approx_eq;

    #[test]
    fn test_parse_iso8601() {
        let dt = parse_iso_date("2024-01-15T12:00:00Z").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 12);

        let date_only = parse_iso_date("2010-06-30").unwrap();
        assert_eq!(date_only.day(), 30);
        assert_eq!(date_only.hour(), 0);

        assert!(parse_iso_date("yesterday").is_err());
    }

    #[test]
    fn test_mjd_epochs() {
        let epoch = parse_iso_date("1858-11-17T00:00:00Z").unwrap();
        assert_approx_eq!(to_mjd(&epoch), 0.0, 1e-9);

        let j2000 = parse_iso_date("2000-01-01T12:00:00Z").unwrap();
        assert_approx_eq!(to_mjd(&j2000), 51544.5, 1e-9);

        let back = from_mjd(51544.5).unwrap();
        assert_eq!(back, j2000);
    }

    #[test]
    fn test_looks_like_iso_date() {
        assert!(looks_like_iso_date("2001-03-04"));
        assert!(looks_like_iso_date("2001-03"));
        assert!(!looks_like_iso_date("2001"));
        assert!(!looks_like_iso_date("-12.5"));
        assert!(!looks_like_iso_date("abc-de"));
    }

    #[test]
    fn test_format_iso_date() {
        let dt = parse_iso_date("2024-01-15T12:30:00").unwrap();
        assert_eq!(format_iso_date(&dt), "2024-01-15T12:30:00Z");
    }
}
