use serde::Serialize;
use std::error::Error;
use tabled::{settings::Style, Table, Tabled};

use crate::report::{bucket_rows, category_rows, device_rows, DashboardReport};
use crate::types::Selection;
use crate::util::{format_count, format_delta, format_number};

pub const DATA_UNAVAILABLE: &str = "데이터를 불러올 수 없습니다.";

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    println!("{}", s);
    Ok(())
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    preview_table_rows(rows, max_rows);
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

fn print_insight(text: &str) {
    for line in text.lines() {
        println!("> {}", line);
    }
    println!();
}

/// Render one report as console markdown.
pub fn print_report(report: &DashboardReport, detail_rows: usize) {
    let cmp = &report.comparison;
    println!("# 키오스크 장애 발생 현황: {}", report.selection_label);
    if let Some(t) = &report.fault_filter {
        println!("(장애 유형: {})", t);
    }
    println!();

    let delta = match (cmp.delta_total, &report.comparison_label) {
        (Some(d), Some(label)) => format!(" {} ({})", format_delta(d), label),
        _ => String::new(),
    };
    println!("- 총 발생 건수: {}{}", format_count(cmp.total_current), delta);
    println!("- 일평균 발생: {}건", format_number(cmp.daily_average, 1));
    match &cmp.top_category {
        Some(top) => {
            let d = cmp
                .top_category_delta
                .map(|d| format!(" {}", format_delta(d)))
                .unwrap_or_default();
            println!("- 최다 발생 유형: {} ({}){}", top.category, format_count(top.count), d);
        }
        None => println!("- 최다 발생 유형: -"),
    }

    let trend_title = match report.selection {
        Selection::YearAndQuarter(_, _) => "1. 분기별 장애 발생 추이",
        _ => "1. 월간 장애 발생 추이",
    };
    println!("\n## {}\n", trend_title);
    print_insight(&report.insights.trend);
    preview_table_rows(&bucket_rows(&report.trend), usize::MAX);

    match &report.daily {
        Some(daily) => {
            println!("## 2. 일별 발생 패턴 (이번 주 vs 지난주)\n");
            for d in daily {
                println!("- {}: {} / 지난주 {}", d.weekday, d.current, d.prior);
            }
            println!();
        }
        None => {
            println!("## 2. 주간 장애 발생 추이\n");
            preview_table_rows(&bucket_rows(&report.weekly), usize::MAX);
        }
    }

    println!("## 3. 요일 및 시간대 집중 분석\n");
    print_insight(&report.insights.day_time);
    preview_table_rows(&bucket_rows(&report.weekdays), 7);

    println!("## 4. 장애 다발 기기 Top {}\n", report.devices.devices.len());
    print_insight(&report.insights.devices);
    preview_table_rows(&device_rows(&report.devices), usize::MAX);

    println!("## 5. 장애 유형 상세 비교 분석\n");
    print_insight(&report.insights.comparison);
    if let Some(focus) = &report.insights.focus {
        print_insight(focus);
    }
    preview_table_rows(&category_rows(cmp), usize::MAX);

    match &report.highlighted {
        Some(h) => {
            preview_table(
                &format!("## 6. 상세 데이터 원본 조회: {}", h),
                Some("현재 기간"),
                &report.current_details,
                detail_rows,
            );
            if report.prior_details.is_empty() {
                println!("(이전 기간 데이터 없음)\n");
            } else {
                preview_table("이전 기간", None, &report.prior_details, detail_rows);
            }
        }
        None => preview_table(
            "## 6. 상세 데이터 원본 조회 (전체)",
            None,
            &report.current_details,
            detail_rows,
        ),
    }
}
