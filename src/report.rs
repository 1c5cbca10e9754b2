//! One dashboard render pass: resolve, aggregate, summarize.
//!
//! Nothing here is cached; every call recomputes from the canonical set.
use serde::Serialize;

use crate::aggregate::{
    aggregate, counts_by_hour, counts_by_month, counts_by_quarter, counts_by_week,
    counts_by_weekday, daily_comparison, day_time_pattern, device_summary, drill_down,
    trend_stats,
};
use crate::narrative::{
    comparison_insight, day_time_insight, device_insight, focus_insight, trend_insight,
};
use crate::period::resolve;
use crate::session::Session;
use crate::types::{
    Bucket, BucketRow, CategoryRow, Comparison, DailyComparison, DayTimePattern, DetailRow,
    DeviceRow, DeviceSummary, IncidentRecord, Selection, TrendStats,
};
use crate::util::{format_count, format_delta, format_percent};

pub const DEFAULT_TOP_N: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct Insights {
    pub trend: String,
    pub day_time: String,
    pub devices: String,
    pub comparison: String,
    pub focus: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub selection: Selection,
    pub selection_label: String,
    pub prior_selection: Option<Selection>,
    pub fault_filter: Option<String>,
    /// Set only when a prior period with records exists.
    pub comparison_label: Option<String>,
    pub comparison: Comparison,
    pub trend: Vec<Bucket>,
    pub trend_stats: Option<TrendStats>,
    pub weekly: Vec<Bucket>,
    pub daily: Option<Vec<DailyComparison>>,
    pub weekdays: Vec<Bucket>,
    pub hours: Vec<Bucket>,
    pub day_time: Option<DayTimePattern>,
    pub devices: DeviceSummary,
    pub insights: Insights,
    pub highlighted: Option<String>,
    pub current_details: Vec<DetailRow>,
    pub prior_details: Vec<DetailRow>,
}

impl From<&IncidentRecord> for DetailRow {
    fn from(r: &IncidentRecord) -> Self {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        DetailRow {
            date: r.occurred_at.format("%Y-%m-%d").to_string(),
            time: r
                .raw_time
                .clone()
                .unwrap_or_else(|| r.occurred_at.format("%H:%M:%S").to_string()),
            device_id: opt(&r.device_id),
            fault_type: opt(&r.fault_type),
            fault_alarm: opt(&r.fault_alarm),
            action_taken: opt(&r.action_taken),
            replaced_at: opt(&r.replaced_at),
            replacement_device: opt(&r.replacement_device),
            replacement_module: opt(&r.replacement_module),
        }
    }
}

fn details(records: &[&IncidentRecord], highlighted: Option<&str>) -> Vec<DetailRow> {
    let rows = match highlighted {
        Some(category) => drill_down(records, category),
        None => {
            let mut all = records.to_vec();
            all.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
            all
        }
    };
    rows.into_iter().map(DetailRow::from).collect()
}

/// Trend base: the whole set for month/week views, the selected year for
/// quarter views. The fault filter applies in both cases.
fn trend_buckets(
    records: &[IncidentRecord],
    selection: &Selection,
    fault_type: Option<&str>,
) -> Vec<Bucket> {
    let base: Vec<&IncidentRecord> = records
        .iter()
        .filter(|r| fault_type.map_or(true, |t| r.has_fault_type(t)))
        .filter(|r| match selection {
            Selection::YearAndQuarter(year, _) => r.calendar.year == *year,
            _ => true,
        })
        .collect();
    match selection {
        Selection::YearAndQuarter(_, _) => counts_by_quarter(&base),
        _ => counts_by_month(&base),
    }
}

pub fn build_report(
    records: &[IncidentRecord],
    selection: &Selection,
    fault_type: Option<&str>,
    session: &Session,
    top_n: usize,
) -> DashboardReport {
    let resolution = resolve(records, selection, fault_type);
    let comparison = aggregate(&resolution.current, &resolution.prior);

    let trend = trend_buckets(records, selection, fault_type);
    let stats = trend_stats(&trend);
    let day_time = day_time_pattern(&resolution.current);
    let devices = device_summary(&resolution.current, top_n);
    let highlighted = session.highlighted();

    let daily = match selection {
        Selection::MonthAndWeek(_, _) => {
            Some(daily_comparison(&resolution.current, &resolution.prior))
        }
        _ => None,
    };

    let insights = Insights {
        trend: trend_insight(stats.as_ref()),
        day_time: day_time_insight(day_time.as_ref()),
        devices: device_insight(&devices),
        comparison: comparison_insight(&comparison),
        focus: focus_insight(&comparison, highlighted),
    };

    let comparison_label = if comparison.has_prior() {
        selection.comparison_label().map(str::to_string)
    } else {
        None
    };

    let prior_details = match (highlighted, resolution.prior_records()) {
        (Some(h), Some(prior)) => details(prior, Some(h)),
        _ => Vec::new(),
    };

    DashboardReport {
        selection: selection.clone(),
        selection_label: selection.label(),
        prior_selection: resolution.prior_selection.clone(),
        fault_filter: fault_type.map(str::to_string),
        comparison_label,
        weekly: counts_by_week(&resolution.current),
        weekdays: counts_by_weekday(&resolution.current),
        hours: counts_by_hour(&resolution.current),
        current_details: details(&resolution.current, highlighted),
        prior_details,
        comparison,
        trend,
        trend_stats: stats,
        daily,
        day_time,
        devices,
        insights,
        highlighted: highlighted.map(str::to_string),
    }
}

pub fn category_rows(cmp: &Comparison) -> Vec<CategoryRow> {
    cmp.per_category
        .iter()
        .map(|r| CategoryRow {
            category: r.category.clone(),
            prior: r.prior.map(format_count).unwrap_or_else(|| "-".to_string()),
            current: format_count(r.current),
            delta: r.delta.map(format_delta).unwrap_or_else(|| "-".to_string()),
            percent_change: if r.is_new() {
                "신규".to_string()
            } else {
                format_percent(r.percent_change)
            },
        })
        .collect()
}

pub fn device_rows(summary: &DeviceSummary) -> Vec<DeviceRow> {
    summary
        .devices
        .iter()
        .enumerate()
        .map(|(i, d)| DeviceRow {
            rank: i + 1,
            device_id: d.device_id.clone(),
            total: d.total,
            breakdown: d
                .breakdown
                .iter()
                .map(|c| format!("{}({})", c.category, format_count(c.count)))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect()
}

pub fn bucket_rows(buckets: &[Bucket]) -> Vec<BucketRow> {
    buckets
        .iter()
        .map(|b| BucketRow {
            label: b.label.clone(),
            count: b.count,
        })
        .collect()
}
