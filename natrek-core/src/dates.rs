use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::{CoreError, CoreResult};

/// All entity dates are stored as an instant at 12:00:00 UTC on the calendar
/// day. Noon keeps the displayed calendar date stable for every timezone
/// within UTC-12..UTC+12, which midnight does not.
pub const CANONICAL_HOUR: u32 = 12;

fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(CANONICAL_HOUR, 0, 0).expect("12:00:00 is a valid time")
}

/// Re-encode a calendar date as its canonical noon-UTC instant.
pub fn from_calendar_date(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(noon()))
}

/// Clamp an instant to the canonical noon-UTC instant of its UTC calendar day.
/// Idempotent.
pub fn normalize(instant: DateTime<Utc>) -> DateTime<Utc> {
    from_calendar_date(instant.date_naive())
}

/// Parse a client-supplied date. Accepts a plain `YYYY-MM-DD` calendar date or
/// an RFC 3339 timestamp; the calendar date is taken as written in the input's
/// own offset and any time-of-day is discarded. Impossible dates (e.g. a
/// day-of-month that does not exist) are rejected, never rolled over.
pub fn normalize_input(raw: &str) -> CoreResult<DateTime<Utc>> {
    let trimmed = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(from_calendar_date(date));
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(from_calendar_date(ts.date_naive()));
    }

    Err(CoreError::InvalidDate(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_calendar_date_becomes_noon_utc() {
        let d = normalize_input("2025-12-31").unwrap();
        assert_eq!(d.hour(), 12);
        assert_eq!(d.minute(), 0);
        assert_eq!(d.to_rfc3339(), "2025-12-31T12:00:00+00:00");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let d = normalize_input("2025-06-15").unwrap();
        assert_eq!(normalize(d), d);
        assert_eq!(normalize(normalize(d)), normalize(d));
    }

    #[test]
    fn test_timestamp_keeps_senders_calendar_date() {
        // 23:30 in Bogota is already Jan 1st in UTC; the written date wins.
        let d = normalize_input("2025-12-31T23:30:00-05:00").unwrap();
        assert_eq!(d.to_rfc3339(), "2025-12-31T12:00:00+00:00");
    }

    #[test]
    fn test_impossible_date_is_rejected_not_rolled_over() {
        assert!(matches!(
            normalize_input("2025-02-30"),
            Err(CoreError::InvalidDate(_))
        ));
        assert!(matches!(
            normalize_input("2025-04-31"),
            Err(CoreError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_garbage_input_is_rejected() {
        assert!(normalize_input("next tuesday").is_err());
        assert!(normalize_input("31-12-2025").is_err());
    }
}
