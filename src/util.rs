// Utility helpers for parsing and basic statistics.
//
// This module centralizes all the "dirty" CSV/number/date handling so the
// rest of the code can assume clean, typed values.
use chrono::{Datelike, NaiveDate};
use num_format::{Locale, ToFormattedString};
use std::cmp::Ordering;

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports (commas, spaces, text).
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(",", "");
    s.parse::<f64>().ok()
}

/// Largest count a cell may carry: the biggest whole number an `f64` holds
/// exactly.
pub const MAX_COUNT: f64 = 9_007_199_254_740_992.0;

/// Counts are whole, non-negative numbers. Blank, negative or garbled cells
/// count as zero; `"12.0"` (a float written by a spreadsheet) is 12. Values
/// above [`MAX_COUNT`] are garbled too.
pub fn parse_count(s: Option<&str>) -> u64 {
    match parse_f64_safe(s) {
        Some(v) if v.is_finite() && v > 0.0 && v <= MAX_COUNT => v.round() as u64,
        _ => 0,
    }
}

/// Sum of counts, pinned at `u64::MAX` instead of overflowing.
pub fn sum_counts<I: IntoIterator<Item = u64>>(counts: I) -> u64 {
    counts.into_iter().fold(0, u64::saturating_add)
}

/// Dates show up as `DD-MM-YYYY` in the API extracts, `YYYY-MM-DD` in the
/// generated ones, and as a bare `YYYY-MM` period in the monthly rollups.
/// A bare period resolves to the first of the month.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").ok()
}

pub fn days_diff(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// `YYYY-MM` label used as the month key in every monthly table.
pub fn month_key(d: NaiveDate) -> String {
    format!("{:04}-{:02}", d.year(), d.month())
}

pub fn average(v: &[f64]) -> f64 {
    // Standard arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

pub fn median(v: Vec<f64>) -> f64 {
    percentile(v, 50.0)
}

/// Percentile with linear interpolation between closest ranks, the same
/// convention spreadsheet `PERCENTILE.INC` uses. `q` is in `[0, 100]`.
pub fn percentile(mut v: Vec<f64>, q: f64) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (v.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return v[lo];
    }
    v[lo] + (v[hi] - v[lo]) * (rank - lo as f64)
}

/// Sample standard deviation (n - 1). Zero for fewer than two values.
pub fn std_dev(v: &[f64]) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let mean = average(v);
    let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (v.len() - 1) as f64;
    var.sqrt()
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_forgiving() {
        assert_eq!(parse_count(Some(" 1,204 ")), 1204);
        assert_eq!(parse_count(Some("12.0")), 12);
        assert_eq!(parse_count(Some("")), 0);
        assert_eq!(parse_count(Some("n/a")), 0);
        assert_eq!(parse_count(Some("-3")), 0);
        assert_eq!(parse_count(None), 0);
        assert_eq!(parse_count(Some("99999999999999999999999")), 0);
        assert_eq!(parse_count(Some("1e300")), 0);
        assert_eq!(parse_count(Some("9007199254740992")), 9_007_199_254_740_992);
        assert_eq!(sum_counts([u64::MAX, 5]), u64::MAX);
        assert_eq!(sum_counts([2, 3]), 5);
    }

    #[test]
    fn dates_in_all_extract_formats() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(parse_date_safe(Some("09-03-2025")), Some(d));
        assert_eq!(parse_date_safe(Some("2025-03-09")), Some(d));
        assert_eq!(
            parse_date_safe(Some("2025-03")),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
        assert_eq!(parse_date_safe(Some("March")), None);
        assert_eq!(month_key(d), "2025-03");
    }

    #[test]
    fn percentile_interpolates() {
        let v = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile(v.clone(), 0.0), 10.0);
        assert_eq!(percentile(v.clone(), 100.0), 50.0);
        assert!((percentile(v.clone(), 90.0) - 46.0).abs() < 1e-9);
        assert_eq!(median(v), 30.0);
        assert_eq!(percentile(Vec::new(), 50.0), 0.0);
    }

    #[test]
    fn std_dev_of_constant_is_zero() {
        assert_eq!(std_dev(&[4.0, 4.0, 4.0]), 0.0);
        assert!((std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.138).abs() < 1e-3);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-12.5, 1), "-12.5");
        assert_eq!(format_int(9855u64), "9,855");
    }
}
