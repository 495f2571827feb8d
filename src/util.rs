// Utility helpers for parsing, rounding and number formatting.
//
// Values coming back from the data service are loosely typed (ids may be
// numbers or strings, dates may carry a time suffix); this module turns
// them into clean typed values so the rest of the code doesn't have to.
use crate::error::{DashboardError, DashboardResult};
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Deserializer};

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

pub const MONTH_NAMES: [&str; 12] = [
    "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho", "Julho", "Agosto", "Setembro",
    "Outubro", "Novembro", "Dezembro",
];

pub fn parse_i32_safe(s: Option<&str>) -> Option<i32> {
    // `?` propagates `None` early if the option is missing.
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<i32>().ok()
}

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    // Dates are `YYYY-MM-DD`, possibly followed by a time component.
    let s = s?.trim();
    if s.len() < 10 {
        return None;
    }
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

/// Abbreviated Portuguese month name for a 1-indexed month.
///
/// Month 0 or anything above 12 is a caller error and is rejected rather
/// than clamped.
pub fn month_abbrev(month: u32) -> DashboardResult<&'static str> {
    match month {
        1..=12 => Ok(MONTH_ABBREVIATIONS[(month - 1) as usize]),
        _ => Err(DashboardError::Validation(format!(
            "month {month} is outside 1..=12"
        ))),
    }
}

/// `Mmm/YYYY` label used on time-series charts.
pub fn period_label(year: i32, month: u32) -> DashboardResult<String> {
    Ok(format!("{}/{}", month_abbrev(month)?, year))
}

/// Round to two decimal places, the precision every derived percentage is shown with.
pub fn round2(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

/// `part / total * 100`, or 0 when `total` is 0.
pub fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

/// `sum / total`, or 0 when `total` is 0.
pub fn mean(sum: f64, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    sum / total as f64
}

/// Fixed decimals with `,` thousands separators, e.g. `1,234,567.89`.
/// A value that rounds to zero is never printed with a minus sign.
pub fn format_number(n: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (fixed.as_str(), None),
    };
    let grouped = int_part
        .parse::<u64>()
        .map(|v| v.to_formatted_string(&Locale::en))
        .unwrap_or_else(|_| int_part.to_string());
    let rounds_to_zero = fixed.bytes().all(|b| b == b'0' || b == b'.');
    let sign = if n < 0.0 && !rounds_to_zero { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Counts in console messages, e.g. `9,855 entregas`.
pub fn format_int<T: ToFormattedString>(n: T) -> String {
    n.to_formatted_string(&Locale::en)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Int(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

/// Accept either a numeric or a string identifier.
pub fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

pub fn deserialize_opt_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?
        .map(String::from)
        .filter(|s| !s.is_empty()))
}

/// Unparsable dates become `None` instead of failing the whole row.
pub fn deserialize_lenient_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(parse_date_safe(raw.as_deref()))
}
