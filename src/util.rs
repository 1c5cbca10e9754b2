// Utility helpers for parsing, calendar arithmetic and number formatting.
//
// This module centralizes all the "dirty" spreadsheet cell handling so the
// rest of the code can assume clean, typed values.
use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday,
};
use num_format::{Locale, ToFormattedString};

use crate::types::MonthLabelStyle;

pub const WEEKDAY_NAMES: [&str; 7] = ["월", "화", "수", "목", "금", "토", "일"];

const DATETIME_FORMATS: [&str; 10] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S%.f",
    "%Y.%m.%d %H:%M",
    "%Y. %m. %d. %H:%M:%S",
    "%Y. %m. %d. %H:%M",
];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y. %m. %d.", "%Y년 %m월 %d일"];

const TIME_FORMATS: [&str; 5] = ["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p", "%p %I:%M"];

// Largest serial Excel accepts (9999-12-31).
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

// 1970-01-01. A time cell holding a smaller serial is not a timestamp.
const EXCEL_MIN_TIMESTAMP_SERIAL: f64 = 25_569.0;

fn clean(s: Option<&str>) -> Option<&str> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn parse_with_time(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
}

fn parse_date_only(s: &str) -> Option<NaiveDate> {
    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        // Compact `YYYYMMDD`; chrono's `%Y` is greedy so split by hand.
        let y = s[0..4].parse().ok()?;
        let m = s[4..6].parse().ok()?;
        let d = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

/// Excel stores timestamps as days since 1899-12-30 with the time as a fraction.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(1.0..=EXCEL_MAX_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let days = serial.trunc() as i64;
    let secs = ((serial - serial.trunc()) * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::days(days) + Duration::seconds(secs))
}

/// Parse an occurrence timestamp in any of the layouts the kiosk exports use.
///
/// - Full timestamps with `-`, `/` or `.` date separators.
/// - Date-only values (midnight is assumed).
/// - Excel serial numbers for cells that lost their date formatting.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_datetime_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = clean(s)?;
    if let Some(dt) = parse_with_time(s) {
        return Some(dt);
    }
    if let Some(d) = parse_date_only(s) {
        return d.and_hms_opt(0, 0, 0);
    }
    s.parse::<f64>().ok().and_then(excel_serial_to_datetime)
}

fn parse_korean_hour(s: &str) -> Option<u32> {
    let (h, _) = s.split_once('시')?;
    h.trim().parse::<u32>().ok()
}

/// Extract an hour of day (0..=23) from a free-form time cell.
///
/// The cell may hold a full timestamp, a clock time (`14:05`, `2:05 PM`),
/// a Korean clock (`오후 2:05`, `14시 5분`) or an Excel day fraction.
pub fn parse_hour_safe(s: Option<&str>) -> Option<u32> {
    let s = clean(s)?;

    let (meridiem, rest) = if let Some(r) = s.strip_prefix("오전") {
        (Some(false), r.trim())
    } else if let Some(r) = s.strip_prefix("오후") {
        (Some(true), r.trim())
    } else {
        (None, s)
    };

    let hour = parse_with_time(rest)
        .map(|dt| dt.hour())
        .or_else(|| {
            TIME_FORMATS
                .iter()
                .find_map(|f| NaiveTime::parse_from_str(rest, f).ok())
                .map(|t| t.hour())
        })
        .or_else(|| parse_korean_hour(rest))
        .or_else(|| {
            let n = rest.parse::<f64>().ok()?;
            if !n.is_finite() || n < 0.0 {
                None
            } else if n.fract() == 0.0 {
                // Whole numbers are bare hours; `24` or `1430` is not one.
                (n <= 23.0).then_some(n as u32)
            } else if n < 1.0 {
                Some(((n * 24.0).floor() as u32).min(23))
            } else if n >= EXCEL_MIN_TIMESTAMP_SERIAL {
                excel_serial_to_datetime(n).map(|dt| dt.hour())
            } else {
                None
            }
        })?;

    let hour = match meridiem {
        Some(true) if hour < 12 => hour + 12,
        Some(false) if hour == 12 => 0,
        _ => hour,
    };
    if hour <= 23 {
        Some(hour)
    } else {
        None
    }
}

/// First day (Sunday) of the 7-day week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = (date.weekday().num_days_from_monday() + 1) % 7;
    date - Duration::days(back as i64)
}

pub fn week_end(date: NaiveDate) -> NaiveDate {
    week_start(date) + Duration::days(6)
}

pub fn week_label(start: NaiveDate, end: NaiveDate) -> String {
    format!("{}~{}", start.format("%m/%d"), end.format("%m/%d"))
}

pub fn month_label(date: NaiveDate, style: MonthLabelStyle) -> String {
    match style {
        MonthLabelStyle::YearMonth => date.format("%Y년 %m월").to_string(),
        MonthLabelStyle::MonthOnly => date.format("%m월").to_string(),
    }
}

pub fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

pub fn year_label(year: i32) -> String {
    format!("{}년", year)
}

pub fn quarter_label(quarter: u32) -> String {
    format!("{}분기", quarter)
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    WEEKDAY_NAMES[weekday.num_days_from_monday() as usize]
}

/// The quarter before `(year, quarter)`; Q1 rolls back to Q4 of the prior year.
/// `None` when the year cannot go back any further.
pub fn previous_quarter(year: i32, quarter: u32) -> Option<(i32, u32)> {
    if quarter <= 1 {
        Some((year.checked_sub(1)?, 4))
    } else {
        Some((year, quarter - 1))
    }
}

pub fn average(v: &[f64]) -> f64 {
    // Standard arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// `(current - prior) / prior * 100`, or `None` when there is no baseline.
pub fn percent_change(current: usize, prior: usize) -> Option<f64> {
    if prior == 0 {
        return None;
    }
    Some((current as f64 - prior as f64) / prior as f64 * 100.0)
}

pub fn signed_delta(current: usize, prior: usize) -> i64 {
    current as i64 - prior as i64
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with locale-aware thousands separators (`1,234.5`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = parts.next() {
        res.push('.');
        res.push_str(frac);
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

/// Count with unit suffix, e.g. `1,234건`.
pub fn format_count(n: usize) -> String {
    format!("{}건", format_int(n))
}

/// Always carries a sign: `+5건`, `-3건`, `+0건`.
pub fn format_delta(delta: i64) -> String {
    let sign = if delta < 0 { "-" } else { "+" };
    format!("{}{}건", sign, format_int(delta.unsigned_abs()))
}

pub fn format_percent(pct: Option<f64>) -> String {
    match pct {
        Some(p) => format!("{}%", format_number(p, 1)),
        None => "-".to_string(),
    }
}
