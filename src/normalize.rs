use chrono::{Datelike, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use crate::types::{CalendarFields, IncidentRecord, MonthLabelStyle, RawSheet};
use crate::util::{
    month_label, parse_datetime_safe, parse_hour_safe, quarter_label, quarter_of, week_end,
    week_label, week_start, weekday_name, year_label,
};

pub const COL_OCCURRED_AT: &str = "발생일";
pub const COL_OCCURRED_TIME: &str = "발생시간";
pub const COL_DEVICE: &str = "기기명";
pub const COL_FAULT_TYPE: &str = "장애유형";
pub const COL_FAULT_ALARM: &str = "장애알람";
pub const COL_ACTION: &str = "조치 내용";
pub const COL_REPLACED_AT: &str = "교체일시";
pub const COL_REPLACEMENT_DEVICE: &str = "교체 기기명";
pub const COL_REPLACEMENT_MODULE: &str = "교체 모듈";

const KNOWN_COLUMNS: [&str; 9] = [
    COL_OCCURRED_AT,
    COL_OCCURRED_TIME,
    COL_DEVICE,
    COL_FAULT_TYPE,
    COL_FAULT_ALARM,
    COL_ACTION,
    COL_REPLACED_AT,
    COL_REPLACEMENT_DEVICE,
    COL_REPLACEMENT_MODULE,
];

/// Source column name -> canonical column name.
pub static DEFAULT_COLUMN_ALIASES: Lazy<Vec<(String, String)>> =
    Lazy::new(|| vec![("접수일시".to_string(), COL_OCCURRED_AT.to_string())]);

#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    pub column_aliases: Vec<(String, String)>,
    pub month_label_style: MonthLabelStyle,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            column_aliases: DEFAULT_COLUMN_ALIASES.clone(),
            month_label_style: MonthLabelStyle::default(),
        }
    }
}

impl NormalizeConfig {
    pub fn with_alias(mut self, source: &str, canonical: &str) -> Self {
        self.column_aliases
            .push((source.to_string(), canonical.to_string()));
        self
    }

    pub fn with_month_label_style(mut self, style: MonthLabelStyle) -> Self {
        self.month_label_style = style;
        self
    }

    fn canonical_name<'a>(&'a self, header: &'a str) -> &'a str {
        self.column_aliases
            .iter()
            .find(|(source, _)| source == header)
            .map(|(_, canonical)| canonical.as_str())
            .unwrap_or(header)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub total_rows: usize,
    pub dropped_rows: usize,
    pub unknown_hours: usize,
    pub duplicates: usize,
}

/// Column positions of one sheet after alias resolution.
struct SheetColumns {
    occurred_at: Option<usize>,
    occurred_time: Option<usize>,
    device: Option<usize>,
    fault_type: Option<usize>,
    fault_alarm: Option<usize>,
    action: Option<usize>,
    replaced_at: Option<usize>,
    replacement_device: Option<usize>,
    replacement_module: Option<usize>,
    extras: Vec<(usize, String)>,
}

impl SheetColumns {
    fn resolve(sheet: &RawSheet, config: &NormalizeConfig) -> Self {
        let headers: Vec<String> = sheet.headers.iter().map(|h| h.trim().to_string()).collect();
        // An alias only applies when the sheet lacks the canonical column itself.
        let names: Vec<String> = headers
            .iter()
            .map(|h| {
                let canonical = config.canonical_name(h);
                if canonical != h.as_str() && headers.iter().any(|o| o == canonical) {
                    h.clone()
                } else {
                    canonical.to_string()
                }
            })
            .collect();

        let find = |name: &str| names.iter().position(|n| n == name);
        let extras = names
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.is_empty() && !KNOWN_COLUMNS.contains(&n.as_str()))
            .map(|(i, n)| (i, n.clone()))
            .collect();

        SheetColumns {
            occurred_at: find(COL_OCCURRED_AT),
            occurred_time: find(COL_OCCURRED_TIME),
            device: find(COL_DEVICE),
            fault_type: find(COL_FAULT_TYPE),
            fault_alarm: find(COL_FAULT_ALARM),
            action: find(COL_ACTION),
            replaced_at: find(COL_REPLACED_AT),
            replacement_device: find(COL_REPLACEMENT_DEVICE),
            replacement_module: find(COL_REPLACEMENT_MODULE),
            extras,
        }
    }
}

fn cell(row: &[String], idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row.get(i)).map(|s| s.as_str())
}

fn text(row: &[String], idx: Option<usize>) -> Option<String> {
    let s = cell(row, idx)?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

pub fn calendar_fields(occurred_at: NaiveDateTime, style: MonthLabelStyle) -> CalendarFields {
    let date = occurred_at.date();
    let start = week_start(date);
    let end = week_end(date);
    CalendarFields {
        month_label: month_label(date, style),
        day_label: date.format("%d일").to_string(),
        weekday_index: date.weekday().num_days_from_monday(),
        weekday_name: weekday_name(date.weekday()).to_string(),
        week_start: start,
        week_end: end,
        week_label: week_label(start, end),
        year: date.year(),
        year_label: year_label(date.year()),
        quarter: quarter_of(date),
        quarter_label: quarter_label(quarter_of(date)),
    }
}

fn dedupe(records: Vec<IncidentRecord>) -> (Vec<IncidentRecord>, usize) {
    let before = records.len();
    let mut seen: HashSet<IncidentRecord> = HashSet::with_capacity(before);
    let kept: Vec<IncidentRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Merge raw sheets into the canonical record set.
///
/// Rows without a parseable occurrence timestamp are dropped. A time cell that
/// cannot be parsed only clears `occurred_hour`; the row itself is kept.
/// Deduplication runs last, on fully derived rows.
pub fn normalize(
    sheets: &[RawSheet],
    config: &NormalizeConfig,
) -> (Vec<IncidentRecord>, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let mut records: Vec<IncidentRecord> = Vec::new();

    for sheet in sheets {
        let cols = SheetColumns::resolve(sheet, config);
        if cols.occurred_at.is_none() {
            debug!(sheet = %sheet.name, "sheet has no occurrence column; all rows dropped");
        }

        for (line, row) in sheet.rows.iter().enumerate() {
            report.total_rows += 1;
            let occurred_at = match parse_datetime_safe(cell(row, cols.occurred_at)) {
                Some(dt) => dt,
                None => {
                    report.dropped_rows += 1;
                    debug!(sheet = %sheet.name, line, "unparseable occurrence timestamp; row dropped");
                    continue;
                }
            };

            let raw_time = text(row, cols.occurred_time);
            let occurred_hour = if cols.occurred_time.is_some() {
                parse_hour_safe(raw_time.as_deref())
            } else {
                Some(occurred_at.hour())
            };
            if occurred_hour.is_none() {
                report.unknown_hours += 1;
            }

            let extras: BTreeMap<String, String> = cols
                .extras
                .iter()
                .filter_map(|(i, name)| text(row, Some(*i)).map(|v| (name.clone(), v)))
                .collect();

            records.push(IncidentRecord {
                occurred_at,
                occurred_hour,
                raw_time,
                device_id: text(row, cols.device),
                fault_type: text(row, cols.fault_type),
                fault_alarm: text(row, cols.fault_alarm),
                action_taken: text(row, cols.action),
                replaced_at: text(row, cols.replaced_at),
                replacement_device: text(row, cols.replacement_device),
                replacement_module: text(row, cols.replacement_module),
                extras,
                calendar: calendar_fields(occurred_at, config.month_label_style),
            });
        }
    }

    let (records, duplicates) = dedupe(records);
    report.duplicates = duplicates;

    info!(
        total_rows = report.total_rows,
        kept = records.len(),
        dropped = report.dropped_rows,
        unknown_hours = report.unknown_hours,
        duplicates = report.duplicates,
        "normalized incident records"
    );
    (records, report)
}

/// Re-derive calendar fields and deduplicate an existing record set.
pub fn canonicalize(records: Vec<IncidentRecord>, style: MonthLabelStyle) -> Vec<IncidentRecord> {
    let rederived = records
        .into_iter()
        .map(|mut r| {
            r.calendar = calendar_fields(r.occurred_at, style);
            r
        })
        .collect();
    dedupe(rederived).0
}
