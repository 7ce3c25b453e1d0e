//! Strict date parsing for report cells
//!
//! Accepts spreadsheet date serials, `DD.MM.YYYY` strings and a short list of
//! ISO-like fallbacks. Absence of a valid date is always `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::ingest::types::CellValue;

/// Days between the spreadsheet epoch (1899-12-30) and 1970-01-01
const SERIAL_EPOCH_OFFSET_DAYS: f64 = 25569.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Naive formats tried after `DD.MM.YYYY` and RFC 3339; interpreted as UTC
const FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Converts cell values into UTC timestamps
///
/// `DD.MM.YYYY` dates are anchored at noon in the parser's time zone so the
/// calendar day survives conversion to UTC.
#[derive(Debug, Clone, Copy)]
pub struct DateParser {
    tz: Tz,
}

impl Default for DateParser {
    fn default() -> Self {
        DateParser { tz: Tz::UTC }
    }
}

impl DateParser {
    pub fn new(tz: Tz) -> Self {
        DateParser { tz }
    }

    pub fn parse(&self, cell: &CellValue) -> Option<DateTime<Utc>> {
        match cell {
            CellValue::Empty | CellValue::Bool(_) => None,
            CellValue::Number(serial) | CellValue::DateTime(serial) => serial_to_datetime(*serial),
            CellValue::Text(s) => self.parse_str(s),
        }
    }

    pub fn parse_str(&self, s: &str) -> Option<DateTime<Utc>> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(date) = parse_dotted(trimmed) {
            return self.noon(date);
        }

        parse_fallback(trimmed)
    }

    /// Noon of `date` in the parser's time zone, as UTC
    pub fn noon(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let local = date.and_time(NaiveTime::from_hms_opt(12, 0, 0)?);
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Whether local noon stays on the same UTC calendar day in winter and summer
    ///
    /// Fails for zones at UTC+13 or beyond (and at -12), where a dotted date
    /// would be stored as the neighbouring day.
    pub fn keeps_calendar_day(&self) -> bool {
        [1, 7].into_iter().all(|month| {
            NaiveDate::from_ymd_opt(2025, month, 15)
                .and_then(|date| self.noon(date).map(|utc| utc.date_naive() == date))
                .unwrap_or(false)
        })
    }
}

/// Convert a spreadsheet date serial into a UTC timestamp
///
/// A zero serial is treated as an absent date.
pub fn serial_to_datetime(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() || serial == 0.0 {
        return None;
    }
    let millis = ((serial - SERIAL_EPOCH_OFFSET_DAYS) * MILLIS_PER_DAY).round();
    if millis.abs() >= i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// Noon UTC of a calendar day, used for report dates
pub fn noon_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN + chrono::Duration::hours(12)).and_utc()
}

/// Format a day as `DD.MM.YYYY`
pub fn format_day(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Strict `DD.MM.YYYY`; rejects overflowing days such as `31.02.2025`
fn parse_dotted(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let (day, month, year) = (parts[0].trim(), parts[1].trim(), parts[2].trim());
    if !all_digits(day) || !all_digits(month) || year.len() != 4 || !all_digits(year) {
        return None;
    }

    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn parse_fallback(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in FALLBACK_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_dotted_date_round_trips() {
        let parser = DateParser::default();
        for input in ["25.12.2025", "01.01.2024", "29.02.2024", "31.12.1999"] {
            let parsed = parser.parse_str(input).unwrap();
            assert_eq!(format_day(parsed.date_naive()), input);
        }

        let parsed = parser.parse_str("25.12.2025").unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2025, 12, 25));
        assert_eq!(parsed.to_rfc3339(), "2025-12-25T12:00:00+00:00");
    }

    #[test]
    fn test_dotted_date_is_noon_in_configured_zone() {
        let parser = DateParser::new(chrono_tz::Europe::Moscow);
        let parsed = parser.parse(&CellValue::from(" 25.12.2025 ")).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-12-25T09:00:00+00:00");

        let parser = DateParser::new(chrono_tz::America::New_York);
        let parsed = parser.parse_str("25.12.2025").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-12-25T17:00:00+00:00");
        assert_eq!(format_day(parsed.date_naive()), "25.12.2025");
    }

    #[test]
    fn test_zones_far_from_utc_shift_the_day() {
        assert!(DateParser::default().keeps_calendar_day());
        assert!(DateParser::new(chrono_tz::Europe::Moscow).keeps_calendar_day());
        assert!(DateParser::new(chrono_tz::Asia::Kamchatka).keeps_calendar_day());
        assert!(DateParser::new(chrono_tz::Pacific::Honolulu).keeps_calendar_day());

        for tz in [
            chrono_tz::Pacific::Kiritimati,
            chrono_tz::Pacific::Tongatapu,
            chrono_tz::Pacific::Auckland,
        ] {
            let parser = DateParser::new(tz);
            assert!(!parser.keeps_calendar_day(), "{tz}");
        }

        let parsed = DateParser::new(chrono_tz::Pacific::Kiritimati).parse_str("25.12.2025").unwrap();
        assert_eq!(parsed.date_naive().day(), 24);
    }

    #[test]
    fn test_serial_date() {
        // 45655 - 25569 = 20086 days after 1970-01-01
        let parsed = DateParser::default().parse(&CellValue::Number(45655.0)).unwrap();
        assert_eq!(parsed.date_naive(), NaiveDate::from_ymd_opt(2024, 12, 29).unwrap());
        assert_eq!(parsed.to_rfc3339(), "2024-12-29T00:00:00+00:00");

        let with_time = serial_to_datetime(45655.5).unwrap();
        assert_eq!(with_time.to_rfc3339(), "2024-12-29T12:00:00+00:00");
    }

    #[test]
    fn test_invalid_dates_are_rejected() {
        let parser = DateParser::default();
        assert_eq!(parser.parse_str("31.02.2025"), None);
        assert_eq!(parser.parse_str("abc"), None);
        assert_eq!(parser.parse_str("13.13.2025"), None);
        assert_eq!(parser.parse_str("1.2"), None);
        assert_eq!(parser.parse_str("+1.02.2025"), None);
        assert_eq!(parser.parse(&CellValue::Empty), None);
        assert_eq!(parser.parse(&CellValue::Bool(true)), None);
        assert_eq!(parser.parse(&CellValue::Number(f64::NAN)), None);
        assert_eq!(parser.parse(&CellValue::Number(1e300)), None);
        assert_eq!(parser.parse(&CellValue::Number(0.0)), None);
    }

    #[test]
    fn test_fallback_formats() {
        let parser = DateParser::default();
        assert_eq!(
            parser.parse_str("2025-01-02").unwrap().to_rfc3339(),
            "2025-01-02T00:00:00+00:00"
        );
        assert_eq!(
            parser.parse_str("2025-01-02T08:30:00+03:00").unwrap().to_rfc3339(),
            "2025-01-02T05:30:00+00:00"
        );
        assert_eq!(
            parser.parse_str("2025-01-02 08:30").unwrap().to_rfc3339(),
            "2025-01-02T08:30:00+00:00"
        );
    }

    #[test]
    fn test_noon_utc_and_format_day() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert_eq!(noon_utc(day).to_rfc3339(), "2025-01-02T12:00:00+00:00");
        assert_eq!(format_day(day), "02.01.2025");
    }
}
