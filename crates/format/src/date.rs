//! Date parsing from the input layouts clients actually send.

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt::Write;

const INPUT_FORMATS: [&str; 5] = ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"];

/// Parse a date, ignoring a trailing time component.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for layout in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(dt.date());
        }
    }
    INPUT_FORMATS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(raw, layout).ok())
}

/// Render with a chrono pattern. A bad pattern is an error, not a panic.
pub fn render_date(date: NaiveDate, pattern: &str) -> Result<String, String> {
    let mut out = String::new();
    write!(out, "{}", date.format(pattern)).map_err(|_| format!("invalid date pattern '{pattern}'"))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        for raw in ["09/03/2024", "2024-03-09", "09-03-2024", "09.03.2024", "2024-03-09T10:30:00", " 9/3/2024 "] {
            assert_eq!(parse_date(raw), Some(expected), "{raw}");
        }
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("ontem"), None);
    }

    #[test]
    fn renders_with_pattern() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(render_date(date, "%d/%m/%Y").unwrap(), "09/03/2024");
        assert_eq!(render_date(date, "%Y-%m-%d").unwrap(), "2024-03-09");
        assert!(render_date(date, "%Q").is_err());
    }
}
