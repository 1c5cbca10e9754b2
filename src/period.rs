//! Period resolution: turns a [`Selection`] into the current record subset and
//! the subset of the comparable period immediately before it.
//!
//! Two resolvers share one interface. [`MonthWeekResolver`] handles month and
//! week selections (including legacy `"MM월"` labels), [`QuarterResolver`]
//! handles year/quarter selections. The fault-type filter is applied after
//! both subsets are resolved so it never changes week or month membership.
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{IncidentRecord, Selection};
use crate::util::{previous_quarter, quarter_label, year_label};

pub trait PeriodResolver {
    /// Records that fall inside `selection`, taken from the full canonical set.
    fn select<'a>(
        &self,
        records: &'a [IncidentRecord],
        selection: &Selection,
    ) -> Vec<&'a IncidentRecord>;

    /// The comparable period immediately before `selection`, if one exists.
    fn prior(&self, records: &[IncidentRecord], selection: &Selection) -> Option<Selection>;
}

pub struct MonthWeekResolver;

pub struct QuarterResolver;

#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    pub selection: Selection,
    pub current: Vec<&'a IncidentRecord>,
    pub prior: Vec<&'a IncidentRecord>,
    pub prior_selection: Option<Selection>,
}

impl Resolution<'_> {
    /// Prior-period records, or `None` when no prior period was resolved or
    /// it holds no records after filtering.
    pub fn prior_records(&self) -> Option<&[&IncidentRecord]> {
        if self.prior_selection.is_some() && !self.prior.is_empty() {
            Some(&self.prior)
        } else {
            None
        }
    }
}

impl PeriodResolver for MonthWeekResolver {
    fn select<'a>(
        &self,
        records: &'a [IncidentRecord],
        selection: &Selection,
    ) -> Vec<&'a IncidentRecord> {
        match selection {
            Selection::MonthOnly(month) => records
                .iter()
                .filter(|r| &r.calendar.month_label == month)
                .collect(),
            // A week spanning two months keeps rows from both.
            Selection::MonthAndWeek(_, week) => records
                .iter()
                .filter(|r| &r.calendar.week_label == week)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn prior(&self, records: &[IncidentRecord], selection: &Selection) -> Option<Selection> {
        match selection {
            Selection::MonthOnly(month) => {
                let months = available_months(records);
                let idx = months.iter().position(|m| m == month)?;
                months
                    .get(idx + 1)
                    .map(|prev| Selection::MonthOnly(prev.clone()))
            }
            Selection::MonthAndWeek(month, week) => {
                let weeks = weeks_in_month(records, month);
                let idx = weeks.iter().position(|w| w == week)?;
                if idx == 0 {
                    return None;
                }
                Some(Selection::MonthAndWeek(month.clone(), weeks[idx - 1].clone()))
            }
            _ => None,
        }
    }
}

impl PeriodResolver for QuarterResolver {
    fn select<'a>(
        &self,
        records: &'a [IncidentRecord],
        selection: &Selection,
    ) -> Vec<&'a IncidentRecord> {
        match selection {
            Selection::YearAndQuarter(year, quarter) => records
                .iter()
                .filter(|r| r.calendar.year == *year && r.calendar.quarter == *quarter)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn prior(&self, _records: &[IncidentRecord], selection: &Selection) -> Option<Selection> {
        match selection {
            Selection::YearAndQuarter(year, quarter) => previous_quarter(*year, *quarter)
                .map(|(y, q)| Selection::YearAndQuarter(y, q)),
            _ => None,
        }
    }
}

impl Selection {
    pub fn resolver(&self) -> Option<&'static dyn PeriodResolver> {
        match self {
            Selection::Unselected => None,
            Selection::MonthOnly(_) | Selection::MonthAndWeek(_, _) => Some(&MonthWeekResolver),
            Selection::YearAndQuarter(_, _) => Some(&QuarterResolver),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Selection::Unselected => "전체".to_string(),
            Selection::MonthOnly(month) => month.clone(),
            Selection::MonthAndWeek(month, week) => format!("{} {}", month, week),
            Selection::YearAndQuarter(year, quarter) => {
                format!("{} {}", year_label(*year), quarter_label(*quarter))
            }
        }
    }

    /// Caption used next to period-over-period deltas.
    pub fn comparison_label(&self) -> Option<&'static str> {
        match self {
            Selection::Unselected => None,
            Selection::MonthOnly(_) => Some("전월 대비"),
            Selection::MonthAndWeek(_, _) => Some("지난주 대비"),
            Selection::YearAndQuarter(_, _) => Some("전분기 대비"),
        }
    }
}

fn matches_filter(record: &IncidentRecord, fault_type: Option<&str>) -> bool {
    match fault_type {
        Some(t) => record.has_fault_type(t),
        None => true,
    }
}

/// Resolve `selection` against the full canonical set, then apply the
/// optional fault-type filter to both subsets.
pub fn resolve<'a>(
    records: &'a [IncidentRecord],
    selection: &Selection,
    fault_type: Option<&str>,
) -> Resolution<'a> {
    type Split<'r> = (Vec<&'r IncidentRecord>, Option<Selection>, Vec<&'r IncidentRecord>);
    let (current, prior_selection, prior): Split<'a> = match selection.resolver() {
        None => (records.iter().collect(), None, Vec::new()),
        Some(resolver) => {
            let current = resolver.select(records, selection);
            let prior_selection = resolver.prior(records, selection);
            let prior = prior_selection
                .as_ref()
                .map(|s| resolver.select(records, s))
                .unwrap_or_default();
            (current, prior_selection, prior)
        }
    };

    let current: Vec<&IncidentRecord> = current
        .into_iter()
        .filter(|r| matches_filter(r, fault_type))
        .collect();
    let prior: Vec<&IncidentRecord> = prior
        .into_iter()
        .filter(|r| matches_filter(r, fault_type))
        .collect();

    Resolution {
        selection: selection.clone(),
        current,
        prior,
        prior_selection,
    }
}

/// Month labels, newest first. Ordered by the earliest record bearing each
/// label, which is chronological for both label styles.
pub fn available_months(records: &[IncidentRecord]) -> Vec<String> {
    let mut first_seen: BTreeMap<&str, NaiveDateTime> = BTreeMap::new();
    for r in records {
        let e = first_seen
            .entry(r.calendar.month_label.as_str())
            .or_insert(r.occurred_at);
        if r.occurred_at < *e {
            *e = r.occurred_at;
        }
    }
    let mut months: Vec<(&str, NaiveDateTime)> = first_seen.into_iter().collect();
    months.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(a.0)));
    months.into_iter().map(|(m, _)| m.to_string()).collect()
}

/// Week labels touching `month`, ascending by week start.
pub fn weeks_in_month(records: &[IncidentRecord], month: &str) -> Vec<String> {
    let weeks: BTreeSet<(NaiveDate, &str)> = records
        .iter()
        .filter(|r| r.calendar.month_label == month)
        .map(|r| (r.calendar.week_start, r.calendar.week_label.as_str()))
        .collect();
    let mut labels: Vec<String> = Vec::with_capacity(weeks.len());
    for (_, label) in weeks {
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }
    labels
}

pub fn available_years(records: &[IncidentRecord]) -> Vec<i32> {
    let years: BTreeSet<i32> = records.iter().map(|r| r.calendar.year).collect();
    years.into_iter().rev().collect()
}

pub fn quarters_in_year(records: &[IncidentRecord], year: i32) -> Vec<u32> {
    let quarters: BTreeSet<u32> = records
        .iter()
        .filter(|r| r.calendar.year == year)
        .map(|r| r.calendar.quarter)
        .collect();
    quarters.into_iter().collect()
}

pub fn available_fault_types(records: &[IncidentRecord]) -> Vec<String> {
    let types: BTreeSet<&str> = records
        .iter()
        .filter_map(|r| r.fault_type.as_deref())
        .collect();
    types.into_iter().map(str::to_string).collect()
}
