use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::detection::config::DetectionConfig;
use crate::extraction::tabular::excel_serial_to_date;
use crate::model::{CellValue, YearMonth};

/// Currency markers stripped before parsing an amount.
const CURRENCY_MARKERS: [&str; 8] = ["EUR", "USD", "GBP", "CHF", "€", "$", "£", "¥"];

/// Smallest year accepted from a date format.
const MIN_FULL_YEAR: i32 = 1000;

/// Coerce a raw cell to a currency amount.
///
/// Text is parsed with `parse_amount`; numeric cells go through a string
/// round-trip so `0.1_f64` stays `0.1`. Dates never coerce.
pub fn cell_amount(cell: &CellValue) -> Option<Decimal> {
    match cell {
        CellValue::Text(s) => parse_amount(s),
        CellValue::Number(f) => f64_to_decimal(*f),
        CellValue::Empty | CellValue::Date(_) => None,
    }
}

/// Parse an amount string written with either decimal convention.
///
/// Handles formats like:
/// - "49.90" / "49,90" -> 49.90
/// - "1 234,56 €" / "$1,234.56" / "1.234,56" -> 1234.56
/// - "1,234,567" / "1.234.567" -> 1234567
/// - "-12,00", "12,00-", "(12.00)" -> -12.00
///
/// When both `,` and `.` occur, the last one is the decimal separator. A
/// single separator occurring once is the decimal separator; one occurring
/// several times groups thousands.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let mut s = s.trim().to_string();
    for marker in CURRENCY_MARKERS {
        s = s.replace(marker, "");
    }
    let mut s: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '\u{2019}')
        .collect();

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        negative = true;
        s = s[1..s.len() - 1].to_string();
    }
    if let Some(rest) = s.strip_suffix('-') {
        negative = !negative;
        s = rest.to_string();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.to_string();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.to_string();
    }

    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
        return None;
    }

    let normalized = normalize_separators(&s)?;
    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

/// Rewrite digits with `,`/`.` separators into a plain `1234.56` literal.
fn normalize_separators(s: &str) -> Option<String> {
    let commas = s.matches(',').count();
    let dots = s.matches('.').count();

    let decimal_sep = match (commas, dots) {
        (0, 0) => None,
        (_, 0) if commas == 1 => Some(','),
        (0, _) if dots == 1 => Some('.'),
        (_, 0) | (0, _) => None,
        _ => {
            let last_comma = s.rfind(',')?;
            let last_dot = s.rfind('.')?;
            Some(if last_comma > last_dot { ',' } else { '.' })
        }
    };

    let mut out = String::with_capacity(s.len());
    let mut seen_decimal = false;
    for c in s.chars() {
        match c {
            '0'..='9' => out.push(c),
            c if Some(c) == decimal_sep => {
                if seen_decimal {
                    return None;
                }
                seen_decimal = true;
                out.push('.');
            }
            _ => {
                // Thousands separators may not follow the decimal separator.
                if seen_decimal {
                    return None;
                }
            }
        }
    }

    if out.is_empty() || out == "." {
        None
    } else {
        Some(out)
    }
}

/// Convert f64 to Decimal, preserving reasonable precision.
///
/// Uses string round-trip to avoid floating-point artifacts
/// (e.g., 0.0035_f64 becoming 0.00349999...). Non-finite values are rejected.
pub fn f64_to_decimal(f: f64) -> Option<Decimal> {
    if !f.is_finite() {
        return None;
    }
    let s = format!("{f}");
    s.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::try_from(f).ok())
}

/// Resolve a raw cell to the calendar month it falls in.
///
/// Text is tried as `YYYY-MM` first, then against the configured date and
/// datetime formats. Numeric cells are read as Excel serial dates.
pub fn cell_month(cell: &CellValue, config: &DetectionConfig) -> Option<YearMonth> {
    match cell {
        CellValue::Date(d) => YearMonth::from_date(*d),
        CellValue::Text(s) => parse_month(s, config),
        CellValue::Number(f) => excel_serial_to_date(*f).and_then(YearMonth::from_date),
        CellValue::Empty => None,
    }
}

/// Parse a month from text using the configured formats.
pub fn parse_month(s: &str, config: &DetectionConfig) -> Option<YearMonth> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(month) = s.parse::<YearMonth>() {
        return Some(month);
    }

    config
        .date_formats
        .iter()
        .find_map(|fmt| {
            NaiveDate::parse_from_str(s, fmt)
                .ok()
                .filter(has_full_year)
        })
        .or_else(|| {
            config.datetime_formats.iter().find_map(|fmt| {
                NaiveDateTime::parse_from_str(s, fmt)
                    .ok()
                    .map(|dt| dt.date())
                    .filter(has_full_year)
            })
        })
        .and_then(YearMonth::from_date)
}

/// chrono's `%Y` takes any number of digits, so `05/01/24` parses as year 24
/// under `%d/%m/%Y`. Rejecting such years lets a later `%y` format match.
fn has_full_year(date: &NaiveDate) -> bool {
    date.year() >= MIN_FULL_YEAR
}
