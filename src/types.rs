use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

/// One worksheet (or CSV file) as read from disk: a header row plus string cells.
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawSheet {
    pub fn new(name: &str, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        RawSheet {
            name: name.to_string(),
            headers,
            rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MonthLabelStyle {
    /// `"2025년 01월"`
    #[default]
    YearMonth,
    /// `"01월"`, used by single-file exports that never span a year.
    MonthOnly,
}

/// Calendar attributes derived from `occurred_at` once, at normalization time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CalendarFields {
    pub month_label: String,
    pub day_label: String,
    pub weekday_index: u32,
    pub weekday_name: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub week_label: String,
    pub year: i32,
    pub year_label: String,
    pub quarter: u32,
    pub quarter_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IncidentRecord {
    pub occurred_at: NaiveDateTime,
    /// `None` when the sheet's time column could not be parsed for this row.
    pub occurred_hour: Option<u32>,
    /// Free-form time cell as it arrived, if the sheet carried one.
    pub raw_time: Option<String>,
    pub device_id: Option<String>,
    pub fault_type: Option<String>,
    pub fault_alarm: Option<String>,
    pub action_taken: Option<String>,
    pub replaced_at: Option<String>,
    pub replacement_device: Option<String>,
    pub replacement_module: Option<String>,
    pub extras: BTreeMap<String, String>,
    pub calendar: CalendarFields,
}

impl IncidentRecord {
    pub fn occurred_date(&self) -> NaiveDate {
        self.occurred_at.date()
    }

    pub fn has_fault_type(&self, fault_type: &str) -> bool {
        self.fault_type.as_deref() == Some(fault_type)
    }
}

/// The user's current period choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Selection {
    Unselected,
    MonthOnly(String),
    MonthAndWeek(String, String),
    YearAndQuarter(i32, u32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub category: String,
    pub current: usize,
    pub prior: Option<usize>,
    pub delta: Option<i64>,
    pub percent_change: Option<f64>,
}

impl AggregateRow {
    /// Category absent in the prior period but present now.
    pub fn is_new(&self) -> bool {
        self.prior == Some(0) && self.current > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub total_current: usize,
    pub total_prior: Option<usize>,
    pub delta_total: Option<i64>,
    pub per_category: Vec<AggregateRow>,
    pub top_category: Option<CategoryCount>,
    pub top_category_delta: Option<i64>,
    pub daily_average: f64,
}

impl Comparison {
    pub fn has_prior(&self) -> bool {
        self.total_prior.is_some()
    }

    pub fn category(&self, name: &str) -> Option<&AggregateRow> {
        self.per_category.iter().find(|r| r.category == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRanking {
    pub device_id: String,
    pub total: usize,
    pub breakdown: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub total_records: usize,
    pub devices: Vec<DeviceRanking>,
    pub leader_share_pct: f64,
    pub shared_categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendStats {
    pub peak_label: String,
    pub peak_count: usize,
    pub mean: f64,
    pub ratio_to_mean: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayTimePattern {
    pub top_weekday: String,
    pub top_weekday_count: usize,
    pub top_hour: Option<u32>,
    pub top_hour_count: usize,
    pub weekday_count: usize,
    pub weekend_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyComparison {
    pub weekday: String,
    pub current: usize,
    pub prior: usize,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct CategoryRow {
    #[tabled(rename = "장애유형")]
    pub category: String,
    #[tabled(rename = "이전 기간")]
    pub prior: String,
    #[tabled(rename = "현재 기간")]
    pub current: String,
    #[tabled(rename = "증감")]
    pub delta: String,
    #[tabled(rename = "증감률")]
    pub percent_change: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct DeviceRow {
    #[tabled(rename = "순위")]
    pub rank: usize,
    #[tabled(rename = "기기명")]
    pub device_id: String,
    #[tabled(rename = "건수")]
    pub total: usize,
    #[tabled(rename = "유형별 내역")]
    pub breakdown: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct BucketRow {
    #[tabled(rename = "구간")]
    pub label: String,
    #[tabled(rename = "건수")]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct DetailRow {
    #[tabled(rename = "발생일")]
    pub date: String,
    #[tabled(rename = "발생시간")]
    pub time: String,
    #[tabled(rename = "기기명")]
    pub device_id: String,
    #[tabled(rename = "장애유형")]
    pub fault_type: String,
    #[tabled(rename = "장애알람")]
    pub fault_alarm: String,
    #[tabled(rename = "조치 내용")]
    pub action_taken: String,
    #[tabled(rename = "교체일시")]
    pub replaced_at: String,
    #[tabled(rename = "교체 기기명")]
    pub replacement_device: String,
    #[tabled(rename = "교체 모듈")]
    pub replacement_module: String,
}
