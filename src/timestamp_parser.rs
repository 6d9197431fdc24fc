use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Handles parsing the timestamp layouts found in ticket exports.
///
/// All timestamps are site-local wall-clock times. Values carrying an explicit
/// offset keep their local reading and drop the offset.
pub struct TimestampParser;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M",
];

impl TimestampParser {
    pub fn parse(timestamp_str: &str) -> Result<NaiveDateTime> {
        let timestamp = timestamp_str.trim();

        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp, format) {
                return Ok(naive);
            }
        }

        // Handle both Z suffix and timezone info
        let with_offset = if timestamp.ends_with('Z') {
            timestamp.replace('Z', "+00:00")
        } else {
            timestamp.to_string()
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(&with_offset) {
            return Ok(dt.naive_local());
        }

        anyhow::bail!("Failed to parse timestamp: {}", timestamp_str)
    }

    /// Parses a `YYYY-MM-DD` calendar date.
    pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Invalid date '{}' (expected YYYY-MM-DD): {}", date_str, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_space_separated() {
        let ts = TimestampParser::parse("2024-03-05 08:15:30").unwrap();
        assert_eq!(ts.hour(), 8);
        assert_eq!(ts.minute(), 15);
    }

    #[test]
    fn test_parse_iso_with_fraction() {
        assert!(TimestampParser::parse("2024-03-05T08:15:30.250").is_ok());
    }

    #[test]
    fn test_parse_day_first() {
        let ts = TimestampParser::parse("05/03/2024 23:10:00").unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[test]
    fn test_offset_keeps_local_reading() {
        let ts = TimestampParser::parse("2024-03-05T08:00:00-03:00").unwrap();
        assert_eq!(ts.hour(), 8);
        let utc = TimestampParser::parse("2024-03-05T08:00:00Z").unwrap();
        assert_eq!(utc.hour(), 8);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(TimestampParser::parse("invalid").is_err());
        assert!(TimestampParser::parse_date("2024-13-01").is_err());
        assert!(TimestampParser::parse_date("2024-03-01").is_ok());
    }
}
