use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::{
    AggregateRow, Bucket, CategoryCount, Comparison, DailyComparison, DayTimePattern,
    DeviceRanking, DeviceSummary, IncidentRecord, TrendStats,
};
use crate::util::{average, percent_change, quarter_label, signed_delta, year_label, WEEKDAY_NAMES};

/// Incident counts per fault type, in lexical order. Rows without a fault
/// type are not counted.
pub fn category_counts<'a>(records: &[&'a IncidentRecord]) -> BTreeMap<&'a str, usize> {
    let mut map: BTreeMap<&str, usize> = BTreeMap::new();
    for &r in records {
        if let Some(t) = r.fault_type.as_deref() {
            *map.entry(t).or_default() += 1;
        }
    }
    map
}

/// Highest count wins; equal counts go to the lexically first category.
pub fn top_category(counts: &BTreeMap<&str, usize>) -> Option<CategoryCount> {
    let mut best: Option<(&str, usize)> = None;
    for (name, count) in counts {
        match best {
            Some((_, c)) if *count <= c => {}
            _ => best = Some((*name, *count)),
        }
    }
    best.map(|(category, count)| CategoryCount {
        category: category.to_string(),
        count,
    })
}

pub fn daily_average(records: &[&IncidentRecord]) -> f64 {
    let days: BTreeSet<NaiveDate> = records.iter().map(|r| r.occurred_date()).collect();
    if days.is_empty() {
        return 0.0;
    }
    records.len() as f64 / days.len() as f64
}

/// Compare the current subset against the prior one. An empty prior subset
/// means "no comparison": every prior-dependent field is `None`.
pub fn aggregate(current: &[&IncidentRecord], prior: &[&IncidentRecord]) -> Comparison {
    let has_prior = !prior.is_empty();
    let cur_counts = category_counts(current);
    let prior_counts = category_counts(prior);

    let categories: BTreeSet<&str> = cur_counts.keys().chain(prior_counts.keys()).copied().collect();
    let mut per_category: Vec<AggregateRow> = categories
        .into_iter()
        .map(|name| {
            let c = cur_counts.get(name).copied().unwrap_or(0);
            let p = prior_counts.get(name).copied().unwrap_or(0);
            AggregateRow {
                category: name.to_string(),
                current: c,
                prior: has_prior.then_some(p),
                delta: has_prior.then(|| signed_delta(c, p)),
                percent_change: if has_prior { percent_change(c, p) } else { None },
            }
        })
        .collect();
    per_category.sort_by(|a, b| b.current.cmp(&a.current).then_with(|| a.category.cmp(&b.category)));

    let top = top_category(&cur_counts);
    let top_category_delta = match (&top, has_prior) {
        (Some(t), true) => {
            let p = prior_counts.get(t.category.as_str()).copied().unwrap_or(0);
            Some(signed_delta(t.count, p))
        }
        _ => None,
    };

    Comparison {
        total_current: current.len(),
        total_prior: has_prior.then_some(prior.len()),
        delta_total: has_prior.then(|| signed_delta(current.len(), prior.len())),
        per_category,
        top_category: top,
        top_category_delta,
        daily_average: daily_average(current),
    }
}

/// Devices ranked by incident count (ties by device id), with a per-category
/// breakdown for each.
pub fn top_n_devices(records: &[&IncidentRecord], n: usize) -> Vec<DeviceRanking> {
    let mut by_device: HashMap<&str, Vec<&IncidentRecord>> = HashMap::new();
    for &r in records {
        if let Some(d) = r.device_id.as_deref() {
            by_device.entry(d).or_default().push(r);
        }
    }

    let mut ranked: Vec<(&str, Vec<&IncidentRecord>)> = by_device.into_iter().collect();
    ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(n)
        .map(|(device, recs)| {
            let mut breakdown: Vec<CategoryCount> = category_counts(&recs)
                .into_iter()
                .map(|(category, count)| CategoryCount {
                    category: category.to_string(),
                    count,
                })
                .collect();
            breakdown.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
            DeviceRanking {
                device_id: device.to_string(),
                total: recs.len(),
                breakdown,
            }
        })
        .collect()
}

pub fn device_summary(records: &[&IncidentRecord], n: usize) -> DeviceSummary {
    let devices = top_n_devices(records, n);
    let leader_share_pct = match devices.first() {
        Some(d) if !records.is_empty() => d.total as f64 / records.len() as f64 * 100.0,
        _ => 0.0,
    };

    let mut seen_in: BTreeMap<&str, usize> = BTreeMap::new();
    for d in &devices {
        for c in &d.breakdown {
            *seen_in.entry(c.category.as_str()).or_default() += 1;
        }
    }
    let shared_categories = seen_in
        .into_iter()
        .filter(|(_, n)| *n >= 2)
        .map(|(c, _)| c.to_string())
        .collect();

    DeviceSummary {
        total_records: records.len(),
        devices,
        leader_share_pct,
        shared_categories,
    }
}

fn ordered_buckets<K: Ord>(groups: BTreeMap<K, (String, usize)>) -> Vec<Bucket> {
    groups
        .into_values()
        .map(|(label, count)| Bucket { label, count })
        .collect()
}

/// Counts per month label, oldest first.
pub fn counts_by_month(records: &[&IncidentRecord]) -> Vec<Bucket> {
    let mut first_seen: HashMap<&str, NaiveDateTime> = HashMap::new();
    for r in records {
        let e = first_seen
            .entry(r.calendar.month_label.as_str())
            .or_insert(r.occurred_at);
        if r.occurred_at < *e {
            *e = r.occurred_at;
        }
    }
    let mut groups: BTreeMap<(NaiveDateTime, &str), (String, usize)> = BTreeMap::new();
    for r in records {
        let label = r.calendar.month_label.as_str();
        let key = (first_seen[label], label);
        groups.entry(key).or_insert_with(|| (label.to_string(), 0)).1 += 1;
    }
    ordered_buckets(groups)
}

/// Counts per quarter. Labels carry the year only when several years appear.
pub fn counts_by_quarter(records: &[&IncidentRecord]) -> Vec<Bucket> {
    let years: BTreeSet<i32> = records.iter().map(|r| r.calendar.year).collect();
    let multi_year = years.len() > 1;
    let mut groups: BTreeMap<(i32, u32), (String, usize)> = BTreeMap::new();
    for r in records {
        let (y, q) = (r.calendar.year, r.calendar.quarter);
        groups
            .entry((y, q))
            .or_insert_with(|| {
                let label = if multi_year {
                    format!("{} {}", year_label(y), quarter_label(q))
                } else {
                    quarter_label(q)
                };
                (label, 0)
            })
            .1 += 1;
    }
    ordered_buckets(groups)
}

/// Counts per week, oldest first.
pub fn counts_by_week(records: &[&IncidentRecord]) -> Vec<Bucket> {
    let mut groups: BTreeMap<NaiveDate, (String, usize)> = BTreeMap::new();
    for r in records {
        groups
            .entry(r.calendar.week_start)
            .or_insert_with(|| (r.calendar.week_label.clone(), 0))
            .1 += 1;
    }
    ordered_buckets(groups)
}

fn weekday_slots(records: &[&IncidentRecord]) -> [usize; 7] {
    let mut slots = [0usize; 7];
    for r in records {
        slots[r.calendar.weekday_index as usize % 7] += 1;
    }
    slots
}

/// Seven buckets, Monday first, zero-filled.
pub fn counts_by_weekday(records: &[&IncidentRecord]) -> Vec<Bucket> {
    weekday_slots(records)
        .iter()
        .zip(WEEKDAY_NAMES.iter())
        .map(|(count, name)| Bucket {
            label: name.to_string(),
            count: *count,
        })
        .collect()
}

fn hour_slots(records: &[&IncidentRecord]) -> [usize; 24] {
    let mut slots = [0usize; 24];
    for r in records {
        if let Some(h) = r.occurred_hour.filter(|h| *h < 24) {
            slots[h as usize] += 1;
        }
    }
    slots
}

/// Twenty-four buckets; rows with an unknown hour are left out.
pub fn counts_by_hour(records: &[&IncidentRecord]) -> Vec<Bucket> {
    hour_slots(records)
        .iter()
        .enumerate()
        .map(|(h, count)| Bucket {
            label: format!("{:02}시", h),
            count: *count,
        })
        .collect()
}

pub fn daily_comparison(current: &[&IncidentRecord], prior: &[&IncidentRecord]) -> Vec<DailyComparison> {
    let cur = weekday_slots(current);
    let prev = weekday_slots(prior);
    WEEKDAY_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| DailyComparison {
            weekday: name.to_string(),
            current: cur[i],
            prior: prev[i],
        })
        .collect()
}

/// Peak bucket against the bucket mean. The earliest bucket wins a tie.
pub fn trend_stats(buckets: &[Bucket]) -> Option<TrendStats> {
    let mut peak: Option<&Bucket> = None;
    for b in buckets {
        match peak {
            Some(p) if b.count <= p.count => {}
            _ => peak = Some(b),
        }
    }
    let peak = peak?;
    let counts: Vec<f64> = buckets.iter().map(|b| b.count as f64).collect();
    let mean = average(&counts);
    let ratio_to_mean = if mean > 0.0 {
        peak.count as f64 / mean
    } else {
        0.0
    };
    Some(TrendStats {
        peak_label: peak.label.clone(),
        peak_count: peak.count,
        mean,
        ratio_to_mean,
    })
}

fn argmax(slots: &[usize]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for (i, c) in slots.iter().enumerate() {
        if *c == 0 {
            continue;
        }
        match best {
            Some((_, b)) if *c <= b => {}
            _ => best = Some((i, *c)),
        }
    }
    best
}

/// Busiest weekday and hour (lower index wins ties), plus the weekday/weekend split.
pub fn day_time_pattern(records: &[&IncidentRecord]) -> Option<DayTimePattern> {
    let days = weekday_slots(records);
    let (day_idx, day_count) = argmax(&days)?;
    let hours = hour_slots(records);
    let top_hour = argmax(&hours);
    let weekend_count = days[5] + days[6];
    Some(DayTimePattern {
        top_weekday: WEEKDAY_NAMES[day_idx].to_string(),
        top_weekday_count: day_count,
        top_hour: top_hour.map(|(h, _)| h as u32),
        top_hour_count: top_hour.map(|(_, c)| c).unwrap_or(0),
        weekday_count: records.len() - weekend_count,
        weekend_count,
    })
}

/// Records of one fault type, newest first.
pub fn drill_down<'a>(records: &[&'a IncidentRecord], category: &str) -> Vec<&'a IncidentRecord> {
    let mut rows: Vec<&IncidentRecord> = records
        .iter()
        .copied()
        .filter(|r| r.has_fault_type(category))
        .collect();
    rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize, NormalizeConfig};
    use crate::types::RawSheet;

    /// (timestamp, device, fault type)
    fn records(rows: &[(&str, &str, &str)]) -> Vec<IncidentRecord> {
        let sheet = RawSheet::new(
            "Sheet1",
            vec!["발생일".to_string(), "기기명".to_string(), "장애유형".to_string()],
            rows.iter()
                .map(|(d, dev, t)| vec![d.to_string(), dev.to_string(), t.to_string()])
                .collect(),
        );
        normalize(&[sheet], &NormalizeConfig::default()).0
    }

    fn refs(records: &[IncidentRecord]) -> Vec<&IncidentRecord> {
        records.iter().collect()
    }

    fn repeated(n: usize, day: u32, device: &str, fault: &str) -> Vec<(String, String, String)> {
        (0..n)
            .map(|i| {
                (
                    format!("2025-03-{:02} {:02}:{:02}:00", day, i % 24, i / 24),
                    device.to_string(),
                    fault.to_string(),
                )
            })
            .collect()
    }

    fn build(spec: &[(usize, u32, &str, &str)]) -> Vec<IncidentRecord> {
        let rows: Vec<(String, String, String)> = spec
            .iter()
            .flat_map(|(n, day, dev, t)| repeated(*n, *day, dev, t))
            .collect();
        let borrowed: Vec<(&str, &str, &str)> = rows
            .iter()
            .map(|(a, b, c)| (a.as_str(), b.as_str(), c.as_str()))
            .collect();
        records(&borrowed)
    }

    #[test]
    fn delta_sign_follows_current_minus_prior() {
        let cur = build(&[(15, 10, "K-01", "A")]);
        let prev = build(&[(10, 3, "K-01", "A")]);
        let cmp = aggregate(&refs(&cur), &refs(&prev));
        assert_eq!(cmp.delta_total, Some(5));

        let cur = build(&[(7, 10, "K-01", "A")]);
        let cmp = aggregate(&refs(&cur), &refs(&prev));
        assert_eq!(cmp.delta_total, Some(-3));
        assert_eq!(cmp.total_prior, Some(10));
    }

    #[test]
    fn empty_prior_means_no_comparison() {
        let cur = build(&[(3, 10, "K-01", "A")]);
        let cmp = aggregate(&refs(&cur), &[]);
        assert_eq!(cmp.total_current, 3);
        assert_eq!(cmp.total_prior, None);
        assert_eq!(cmp.delta_total, None);
        assert_eq!(cmp.top_category_delta, None);
        assert!(cmp.per_category.iter().all(|r| r.delta.is_none() && r.prior.is_none()));
    }

    #[test]
    fn new_category_has_null_percent_change() {
        let cur = build(&[(4, 10, "K-01", "A"), (2, 10, "K-01", "B")]);
        let prev = build(&[(2, 3, "K-01", "A")]);
        let cmp = aggregate(&refs(&cur), &refs(&prev));
        let b = cmp.category("B").unwrap();
        assert_eq!(b.prior, Some(0));
        assert_eq!(b.delta, Some(2));
        assert_eq!(b.percent_change, None);
        assert!(b.is_new());
        let a = cmp.category("A").unwrap();
        assert_eq!(a.percent_change, Some(100.0));
    }

    #[test]
    fn vanished_category_reports_full_decline() {
        let cur = build(&[(1, 10, "K-01", "A")]);
        let prev = build(&[(1, 3, "K-01", "A"), (4, 3, "K-01", "B")]);
        let cmp = aggregate(&refs(&cur), &refs(&prev));
        let b = cmp.category("B").unwrap();
        assert_eq!(b.current, 0);
        assert_eq!(b.delta, Some(-4));
        assert_eq!(b.percent_change, Some(-100.0));
    }

    #[test]
    fn top_category_tie_is_lexical() {
        let cur = build(&[
            (5, 10, "K-01", "화면 멈춤"),
            (5, 11, "K-01", "카드 미방출"),
            (2, 12, "K-01", "지폐 걸림"),
        ]);
        for _ in 0..5 {
            let cmp = aggregate(&refs(&cur), &[]);
            let top = cmp.top_category.clone().unwrap();
            assert_eq!(top.category, "카드 미방출");
            assert_eq!(top.count, 5);
        }
    }

    #[test]
    fn top_category_delta_uses_prior_count_of_same_category() {
        let cur = build(&[(6, 10, "K-01", "A"), (2, 10, "K-01", "B")]);
        let prev = build(&[(4, 3, "K-01", "A"), (9, 3, "K-01", "B")]);
        let cmp = aggregate(&refs(&cur), &refs(&prev));
        assert_eq!(cmp.top_category.as_ref().map(|t| t.category.as_str()), Some("A"));
        assert_eq!(cmp.top_category_delta, Some(2));
    }

    #[test]
    fn daily_average_counts_distinct_dates() {
        let cur = build(&[(3, 10, "K-01", "A"), (1, 11, "K-01", "A")]);
        let cmp = aggregate(&refs(&cur), &[]);
        assert!((cmp.daily_average - 2.0).abs() < 1e-9);
        assert_eq!(aggregate(&[], &[]).daily_average, 0.0);
    }

    #[test]
    fn devices_rank_by_count_then_id() {
        let cur = build(&[
            (3, 10, "K-09", "A"),
            (3, 10, "K-02", "B"),
            (1, 10, "K-02", "A"),
            (3, 11, "K-05", "A"),
            (1, 12, "K-07", "C"),
        ]);
        let top = top_n_devices(&refs(&cur), 3);
        let ids: Vec<&str> = top.iter().map(|d| d.device_id.as_str()).collect();
        assert_eq!(ids, vec!["K-02", "K-05", "K-09"]);
        assert_eq!(top[0].total, 4);
        assert_eq!(top[0].breakdown[0].category, "B");
        assert_eq!(top[0].breakdown[0].count, 3);
    }

    #[test]
    fn device_summary_flags_shared_categories() {
        let cur = build(&[
            (4, 10, "K-01", "A"),
            (2, 10, "K-02", "A"),
            (1, 10, "K-02", "B"),
            (2, 10, "K-03", "C"),
            (1, 10, "K-04", "B"),
        ]);
        let summary = device_summary(&refs(&cur), 3);
        assert_eq!(summary.total_records, 10);
        assert!((summary.leader_share_pct - 40.0).abs() < 1e-9);
        assert_eq!(summary.shared_categories, vec!["A"]);
    }

    #[test]
    fn week_buckets_are_chronological() {
        let recs = records(&[
            ("2025-02-05", "K-01", "A"),
            ("2025-01-27", "K-01", "A"),
            ("2025-02-01", "K-01", "A"),
        ]);
        let weeks = counts_by_week(&refs(&recs));
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].label, "01/26~02/01");
        assert_eq!(weeks[0].count, 2);
        assert_eq!(weeks[1].label, "02/02~02/08");
    }

    #[test]
    fn month_and_quarter_buckets() {
        let recs = records(&[
            ("2025-12-05", "K-01", "A"),
            ("2026-01-27", "K-01", "A"),
            ("2026-01-28", "K-01", "A"),
        ]);
        let months = counts_by_month(&refs(&recs));
        assert_eq!(months[0].label, "2025년 12월");
        assert_eq!(months[1].count, 2);
        let quarters = counts_by_quarter(&refs(&recs));
        assert_eq!(quarters[0].label, "2025년 4분기");
        assert_eq!(quarters[1].label, "2026년 1분기");
    }

    #[test]
    fn trend_stats_guard_zero_mean() {
        let buckets = vec![
            Bucket { label: "1분기".into(), count: 0 },
            Bucket { label: "2분기".into(), count: 0 },
        ];
        let stats = trend_stats(&buckets).unwrap();
        assert_eq!(stats.ratio_to_mean, 0.0);
        assert_eq!(stats.peak_label, "1분기");
        assert!(trend_stats(&[]).is_none());

        let buckets = vec![
            Bucket { label: "01월".into(), count: 2 },
            Bucket { label: "02월".into(), count: 6 },
            Bucket { label: "03월".into(), count: 6 },
            Bucket { label: "04월".into(), count: 2 },
        ];
        let stats = trend_stats(&buckets).unwrap();
        assert_eq!(stats.peak_label, "02월");
        assert!((stats.mean - 4.0).abs() < 1e-9);
        assert!((stats.ratio_to_mean - 1.5).abs() < 1e-9);
    }

    #[test]
    fn day_time_pattern_skips_unknown_hours() {
        let sheet = RawSheet::new(
            "Sheet1",
            vec!["발생일".to_string(), "발생시간".to_string()],
            vec![
                vec!["2025-03-08".to_string(), "14:00".to_string()],
                vec!["2025-03-09".to_string(), "??".to_string()],
                vec!["2025-03-10".to_string(), "09:00".to_string()],
                vec!["2025-03-15".to_string(), "14:30".to_string()],
            ],
        );
        let (recs, _) = normalize(&[sheet], &NormalizeConfig::default());
        let pattern = day_time_pattern(&refs(&recs)).unwrap();
        assert_eq!(pattern.top_weekday, "토");
        assert_eq!(pattern.top_weekday_count, 2);
        assert_eq!(pattern.top_hour, Some(14));
        assert_eq!(pattern.top_hour_count, 2);
        assert_eq!(pattern.weekend_count, 3);
        assert_eq!(pattern.weekday_count, 1);
        let hours = counts_by_hour(&refs(&recs));
        assert_eq!(hours.iter().map(|b| b.count).sum::<usize>(), 3);
        assert!(day_time_pattern(&[]).is_none());
    }

    #[test]
    fn drill_down_is_newest_first() {
        let recs = records(&[
            ("2025-03-01", "K-01", "A"),
            ("2025-03-05", "K-02", "A"),
            ("2025-03-03", "K-03", "B"),
        ]);
        let rows = drill_down(&refs(&recs), "A");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].device_id.as_deref(), Some("K-02"));
    }
}
