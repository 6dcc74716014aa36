use chrono::{Datelike, NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Accepted listing date formats, tried in order.
pub const DATE_FORMATS: &[&str] = &["%d.%m.%y", "%d-%m-%y"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised date format: {input:?}")]
pub struct DateFormatError {
    pub input: String,
}

/// Last year a two-digit `yy` maps to in the 2000s; later ones are 19xx.
const LATEST_TWO_DIGIT_YEAR: i32 = 2068;

/// Parse a listing date such as `01.02.23` or `01-02-23` into midnight of
/// that day. Two-digit years 00-68 are 20xx and 69-99 are 19xx.
pub fn normalize_date(raw: &str) -> Result<NaiveDateTime, DateFormatError> {
    let trimmed = raw.trim();

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .and_then(apply_year_pivot)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DateFormatError {
            input: raw.to_string(),
        })
}

// chrono's `%y` puts 69 in the 2000s.
fn apply_year_pivot(date: NaiveDate) -> Option<NaiveDate> {
    if date.year() > LATEST_TWO_DIGIT_YEAR {
        date.with_year(date.year() - 100)
    } else {
        Some(date)
    }
}
