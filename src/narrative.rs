// Narrative findings built from aggregates only; nothing here looks at raw records.
use crate::types::{AggregateRow, Comparison, DayTimePattern, DeviceSummary, TrendStats};
use crate::util::{format_count, format_number, format_int};

pub const HEADLINE: &str = "**분석:**";
pub const INSUFFICIENT_DATA: &str = "데이터가 부족하여 분석할 수 없습니다.";
pub const NO_DATA: &str = "분석할 데이터가 없습니다.";
pub const CATEGORY_NOT_AVAILABLE: &str = "장애유형 정보가 없어 유형 분석을 제공할 수 없습니다.";
pub const DEVICE_NOT_AVAILABLE: &str = "기기명 정보가 없어 기기 분석을 제공할 수 없습니다.";
pub const NO_SIGNIFICANT_CHANGE: &str =
    "**분석:** 지난 기간과 비교했을 때 장애 발생 건수에 큰 변동이 없습니다.";

pub fn trend_insight(stats: Option<&TrendStats>) -> String {
    let Some(stats) = stats else {
        return INSUFFICIENT_DATA.to_string();
    };
    if stats.peak_count == 0 {
        return INSUFFICIENT_DATA.to_string();
    }
    format!(
        "{} 전체 기간 중 **'{}'**에 장애가 가장 집중되었습니다. (총 {})\n\n\
         이는 평균 발생 건수({}건) 대비 **약 {}배 높은 수치**로, \
         해당 시점의 특이 사항(업데이트, 이벤트 등) 점검이 필요합니다.",
        HEADLINE,
        stats.peak_label,
        format_count(stats.peak_count),
        format_number(stats.mean, 1),
        format_number(stats.ratio_to_mean, 1),
    )
}

pub fn day_time_insight(pattern: Option<&DayTimePattern>) -> String {
    let Some(p) = pattern else {
        return NO_DATA.to_string();
    };
    let focus = if p.weekday_count > p.weekend_count {
        "평일"
    } else {
        "주말"
    };
    let slot = match p.top_hour {
        Some(h) => format!("{}요일 {}시", p.top_weekday, h),
        None => format!("{}요일", p.top_weekday),
    };
    format!(
        "{} 장애 발생 패턴은 주로 **{}**에 집중되어 있으며, 특히 **'{}'** 대역에 빈도가 가장 높습니다.",
        HEADLINE, focus, slot
    )
}

pub fn device_insight(summary: &DeviceSummary) -> String {
    if summary.total_records == 0 {
        return NO_DATA.to_string();
    }
    if summary.devices.is_empty() {
        return DEVICE_NOT_AVAILABLE.to_string();
    }

    let mut text = format!(
        "{} 상위 {}개 기기가 전체 장애의 **{}%(1위 기준)** 를 점유하고 있습니다. \
         각 기기별 주요 장애 원인은 다음과 같습니다.",
        HEADLINE,
        summary.devices.len(),
        format_number(summary.leader_share_pct, 1)
    );

    for (i, device) in summary.devices.iter().enumerate() {
        let details: Vec<String> = device
            .breakdown
            .iter()
            .map(|c| {
                let part = format!("{}({})", c.category, format_count(c.count));
                // Categories hitting several top devices are worth a second look.
                if summary.shared_categories.contains(&c.category) {
                    format!("**{}**", part)
                } else {
                    part
                }
            })
            .collect();
        text.push_str(&format!(
            "\n\n**{}위. {} (총 {})**\n",
            i + 1,
            device.device_id,
            format_count(device.total)
        ));
        if details.is_empty() {
            text.push_str("   - 유형 정보 없음");
        } else {
            text.push_str(&format!("   - {}", details.join("\n   - ")));
        }
    }

    text.push_str(
        "\n\n반복적인 장애가 발생하는 기기에 대해서는 부품 교체 이력 및 \
         설치 환경(전원/통신) 정밀 진단이 권장됩니다.",
    );
    text
}

fn largest_increase(rows: &[AggregateRow]) -> Option<&AggregateRow> {
    let mut best: Option<&AggregateRow> = None;
    for r in rows {
        let d = r.delta.unwrap_or(0);
        if d <= 0 {
            continue;
        }
        match best {
            Some(b) if (d, &b.category) <= (b.delta.unwrap_or(0), &r.category) => {}
            _ => best = Some(r),
        }
    }
    best
}

fn largest_decrease(rows: &[AggregateRow]) -> Option<&AggregateRow> {
    let mut best: Option<&AggregateRow> = None;
    for r in rows {
        let d = r.delta.unwrap_or(0);
        if d >= 0 {
            continue;
        }
        match best {
            Some(b) if (-d, &b.category) <= (-b.delta.unwrap_or(0), &r.category) => {}
            _ => best = Some(r),
        }
    }
    best
}

/// Period-over-period findings for fault types.
///
/// Without a prior period only the leading category is reported and no
/// comparison wording is used.
pub fn comparison_insight(cmp: &Comparison) -> String {
    if cmp.total_current == 0 {
        return INSUFFICIENT_DATA.to_string();
    }
    let Some(top) = cmp.top_category.as_ref() else {
        return CATEGORY_NOT_AVAILABLE.to_string();
    };
    if !cmp.has_prior() {
        return format!(
            "{} 현재 기간에는 **'{}'** 유형이 {}으로 가장 높은 비중을 차지하고 있습니다.",
            HEADLINE,
            top.category,
            format_count(top.count)
        );
    }

    let mut parts: Vec<String> = Vec::new();
    if let Some(inc) = largest_increase(&cmp.per_category) {
        let pct = match inc.percent_change {
            Some(p) => format!("({}%)", format_number(p, 1)),
            None => "(신규)".to_string(),
        };
        parts.push(format!(
            "주의: 지난 기간 대비 **'{}' 유형이 {}건{} 증가**하여 가장 큰 상승폭을 보였습니다.",
            inc.category,
            format_int(inc.delta.unwrap_or(0)),
            pct
        ));
    }
    if let Some(dec) = largest_decrease(&cmp.per_category) {
        let pct = dec
            .percent_change
            .map(|p| format!("({}%)", format_number(p.abs(), 1)))
            .unwrap_or_default();
        parts.push(format!(
            "긍정: 지난 기간 대비 **'{}' 유형은 {}건{} 감소**하여 가장 뚜렷한 개선 효과를 보였습니다.",
            dec.category,
            format_int(dec.delta.unwrap_or(0).unsigned_abs()),
            pct
        ));
    }

    if parts.is_empty() {
        return NO_SIGNIFICANT_CHANGE.to_string();
    }
    format!("{} 상세 비교 결과입니다.\n\n{}", HEADLINE, parts.join("\n\n"))
}

/// One line about the category the user clicked, if any.
pub fn focus_insight(cmp: &Comparison, highlighted: Option<&str>) -> Option<String> {
    let name = highlighted?;
    let Some(row) = cmp.category(name) else {
        return Some(format!(
            "선택한 유형 **'{}'** 은(는) 현재 기간에 발생 내역이 없습니다.",
            name
        ));
    };
    let mut text = format!("선택한 유형 **'{}'**: 현재 기간 {}", name, format_count(row.current));
    if let (Some(prior), Some(delta)) = (row.prior, row.delta) {
        let change = if row.is_new() {
            "신규".to_string()
        } else {
            match row.percent_change {
                Some(p) => format!("{}%", format_number(p, 1)),
                None => "-".to_string(),
            }
        };
        text.push_str(&format!(
            ", 이전 기간 {} ({}{}건, {})",
            format_count(prior),
            if delta < 0 { "-" } else { "+" },
            format_int(delta.unsigned_abs()),
            change
        ));
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CategoryCount, DeviceRanking};

    fn row(category: &str, current: usize, prior: Option<usize>) -> AggregateRow {
        AggregateRow {
            category: category.to_string(),
            current,
            prior,
            delta: prior.map(|p| current as i64 - p as i64),
            percent_change: prior.and_then(|p| crate::util::percent_change(current, p)),
        }
    }

    fn comparison(rows: Vec<AggregateRow>, with_prior: bool) -> Comparison {
        let total_current: usize = rows.iter().map(|r| r.current).sum();
        let total_prior: usize = rows.iter().filter_map(|r| r.prior).sum();
        let top = rows
            .iter()
            .max_by(|a, b| a.current.cmp(&b.current).then_with(|| b.category.cmp(&a.category)))
            .map(|r| CategoryCount {
                category: r.category.clone(),
                count: r.current,
            });
        Comparison {
            total_current,
            total_prior: with_prior.then_some(total_prior),
            delta_total: with_prior.then(|| total_current as i64 - total_prior as i64),
            per_category: rows,
            top_category: top,
            top_category_delta: None,
            daily_average: 1.0,
        }
    }

    #[test]
    fn empty_current_is_insufficient() {
        let cmp = comparison(vec![], false);
        assert_eq!(comparison_insight(&cmp), INSUFFICIENT_DATA);
    }

    #[test]
    fn no_prior_omits_comparison_language() {
        let cmp = comparison(vec![row("카드 미방출", 4, None), row("지폐 걸림", 1, None)], false);
        let text = comparison_insight(&cmp);
        assert!(text.contains("카드 미방출"));
        for word in ["대비", "증가", "감소", "지난"] {
            assert!(!text.contains(word), "unexpected '{}' in {}", word, text);
        }
    }

    #[test]
    fn reports_increase_and_decrease() {
        let cmp = comparison(
            vec![
                row("카드 미방출", 9, Some(3)),
                row("지폐 걸림", 2, Some(6)),
                row("화면 멈춤", 2, Some(2)),
            ],
            true,
        );
        let text = comparison_insight(&cmp);
        assert!(text.contains("'카드 미방출' 유형이 6건(200.0%) 증가"));
        assert!(text.contains("'지폐 걸림' 유형은 4건(66.7%) 감소"));
    }

    #[test]
    fn new_category_is_tagged() {
        let cmp = comparison(vec![row("영수증 미출력", 3, Some(0)), row("A", 1, Some(1))], true);
        let text = comparison_insight(&cmp);
        assert!(text.contains("3건(신규) 증가"));
        assert!(!text.contains("감소"));
    }

    #[test]
    fn only_decrease_omits_increase_clause() {
        let cmp = comparison(vec![row("A", 1, Some(5))], true);
        let text = comparison_insight(&cmp);
        assert!(text.contains("감소"));
        assert!(!text.contains("증가"));
    }

    #[test]
    fn unchanged_categories_give_single_message() {
        let cmp = comparison(vec![row("A", 2, Some(2)), row("B", 1, Some(1))], true);
        assert_eq!(comparison_insight(&cmp), NO_SIGNIFICANT_CHANGE);
    }

    #[test]
    fn missing_category_column_is_not_available() {
        let mut cmp = comparison(vec![], false);
        cmp.total_current = 3;
        assert_eq!(comparison_insight(&cmp), CATEGORY_NOT_AVAILABLE);
    }

    #[test]
    fn trend_mentions_peak_and_ratio() {
        let stats = TrendStats {
            peak_label: "2025년 03월".to_string(),
            peak_count: 12,
            mean: 8.0,
            ratio_to_mean: 1.5,
        };
        let text = trend_insight(Some(&stats));
        assert!(text.contains("'2025년 03월'"));
        assert!(text.contains("총 12건"));
        assert!(text.contains("약 1.5배"));
        assert_eq!(trend_insight(None), INSUFFICIENT_DATA);
    }

    #[test]
    fn day_time_without_hours() {
        let p = DayTimePattern {
            top_weekday: "토".to_string(),
            top_weekday_count: 3,
            top_hour: None,
            top_hour_count: 0,
            weekday_count: 1,
            weekend_count: 3,
        };
        let text = day_time_insight(Some(&p));
        assert!(text.contains("**주말**"));
        assert!(text.contains("'토요일'"));
    }

    #[test]
    fn device_insight_lists_ranked_devices() {
        let summary = DeviceSummary {
            total_records: 10,
            devices: vec![
                DeviceRanking {
                    device_id: "K-01".to_string(),
                    total: 4,
                    breakdown: vec![CategoryCount { category: "A".to_string(), count: 4 }],
                },
                DeviceRanking {
                    device_id: "K-02".to_string(),
                    total: 3,
                    breakdown: vec![
                        CategoryCount { category: "A".to_string(), count: 2 },
                        CategoryCount { category: "B".to_string(), count: 1 },
                    ],
                },
            ],
            leader_share_pct: 40.0,
            shared_categories: vec!["A".to_string()],
        };
        let text = device_insight(&summary);
        assert!(text.contains("**40.0%(1위 기준)**"));
        assert!(text.contains("**1위. K-01 (총 4건)**"));
        assert!(text.contains("**A(2건)**"));
        assert!(text.contains("B(1건)"));
        assert!(!text.contains("**B(1건)**"));
    }

    #[test]
    fn focus_reports_highlighted_category() {
        let cmp = comparison(vec![row("A", 5, Some(2)), row("B", 2, Some(0))], true);
        assert_eq!(focus_insight(&cmp, None), None);
        let a = focus_insight(&cmp, Some("A")).unwrap();
        assert!(a.contains("현재 기간 5건"));
        assert!(a.contains("+3건, 150.0%"));
        let b = focus_insight(&cmp, Some("B")).unwrap();
        assert!(b.contains("신규"));
        let missing = focus_insight(&cmp, Some("Z")).unwrap();
        assert!(missing.contains("발생 내역이 없습니다"));
    }
}
