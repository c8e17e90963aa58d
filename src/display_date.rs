//! Study date normalization for the report header.
//!
//! Backends hand us whatever their locale produced ("8/30/2023, 10:15:00 AM",
//! "2023-08-30T10:15:00Z", DICOM "20230830", ...). The header always prints
//! `DD-Month-YYYY`. The function is total: anything unparseable is returned
//! trimmed but otherwise verbatim, so a bad date never blocks a report.

use chrono::{DateTime, NaiveDate};

/// Canonical display format, e.g. `30-August-2023`.
pub const DISPLAY_DATE_FORMAT: &str = "%d-%B-%Y";

/// Date-only formats tried in order. Slash dates are read month-first
/// (the en-US `toLocaleString` shape) and fall back to day-first when the
/// month-first reading is impossible.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d-%B-%Y",
];

/// Normalize a raw backend date to `DD-Month-YYYY`, falling back to the raw
/// string (trimmed) when it cannot be parsed.
pub fn normalize_display_date(raw: &str) -> String {
    match parse_study_date(raw) {
        Some(date) => date.format(DISPLAY_DATE_FORMAT).to_string(),
        None => raw.trim().to_string(),
    }
}

/// Best-effort parse of a backend date. `None` when no known shape matches.
pub fn parse_study_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }

    // Strip any time component: "8/30/2023, 10:15 AM", "2023-08-30T10:15", "2023-08-30 10:15"
    let token = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .next()
        .unwrap_or(raw);
    let date_part = match token.split_once('T') {
        Some((date, _)) if date.len() == 10 => date,
        _ => token,
    };

    if let Some(date) = parse_dicom_date(date_part) {
        return Some(date);
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// DICOM DA value: exactly eight digits, `YYYYMMDD`.
fn parse_dicom_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = s[0..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_us_locale_timestamp() {
        assert_eq!(
            normalize_display_date("8/30/2023, 10:15:00 AM"),
            "30-August-2023"
        );
    }

    #[test]
    fn normalizes_iso_and_rfc3339() {
        assert_eq!(normalize_display_date("2023-08-30"), "30-August-2023");
        assert_eq!(
            normalize_display_date("2023-08-30T10:15:00Z"),
            "30-August-2023"
        );
        assert_eq!(
            normalize_display_date("2023-08-30T10:15:00"),
            "30-August-2023"
        );
        assert_eq!(
            normalize_display_date("2023-08-30 10:15:00"),
            "30-August-2023"
        );
    }

    #[test]
    fn normalizes_dicom_date() {
        assert_eq!(normalize_display_date("20230830"), "30-August-2023");
        assert!(parse_dicom_date("20231340").is_none());
    }

    #[test]
    fn day_first_when_month_first_is_impossible() {
        assert_eq!(normalize_display_date("30/08/2023"), "30-August-2023");
    }

    #[test]
    fn ambiguous_slash_date_reads_month_first() {
        assert_eq!(normalize_display_date("03/04/2023"), "04-March-2023");
    }

    #[test]
    fn already_display_shaped_dates_are_canonicalized() {
        assert_eq!(normalize_display_date("30-Aug-2023"), "30-August-2023");
        assert_eq!(normalize_display_date("30-August-2023"), "30-August-2023");
    }

    #[test]
    fn unparseable_falls_back_to_raw() {
        assert_eq!(normalize_display_date("  yesterday "), "yesterday");
        assert_eq!(normalize_display_date(""), "");
        assert_eq!(normalize_display_date("2023-02-30"), "2023-02-30");
    }
}
