// Entry point and high-level CLI flow.
//
// - One-shot mode renders a single dashboard for the period given on the
//   command line.
// - Interactive mode keeps the record cache and the session highlight alive
//   across renders and lets the user pick periods from numbered menus.
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kiosk_report::output::{print_json, print_report, DATA_UNAVAILABLE};
use kiosk_report::period::{
    available_fault_types, available_months, available_years, quarters_in_year, weeks_in_month,
};
use kiosk_report::util::{format_int, quarter_label, year_label};
use kiosk_report::{
    build_report, load_and_normalize, IncidentRecord, MonthLabelStyle, NormalizeConfig,
    RecordCache, Selection, Session,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    MonthWeek,
    Quarter,
}

#[derive(Parser)]
#[command(name = "kiosk_report")]
#[command(about = "Kiosk malfunction analytics with period-over-period comparison", long_about = None)]
struct Cli {
    /// Spreadsheet (.xlsx/.xls/.ods) or CSV files to load
    #[arg(value_name = "FILE", default_values = ["kiosk_data_2025.xlsx", "kiosk_data_2026.xlsx"])]
    files: Vec<String>,

    /// Period selection scheme
    #[arg(long, value_enum, default_value_t = Mode::MonthWeek)]
    mode: Mode,

    /// Month label, e.g. "2025년 01월" (month-week mode)
    #[arg(long)]
    month: Option<String>,

    /// Week label inside the month, e.g. "01/26~02/01" (month-week mode)
    #[arg(long, requires = "month")]
    week: Option<String>,

    /// Year (quarter mode; defaults to the latest year in the data)
    #[arg(long)]
    year: Option<i32>,

    /// Quarter 1-4 (quarter mode; defaults to the first quarter with data)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=4))]
    quarter: Option<u32>,

    /// Only count incidents of this fault type
    #[arg(long)]
    fault_type: Option<String>,

    /// Fault type to highlight and drill into
    #[arg(long)]
    highlight: Option<String>,

    /// Number of devices in the ranking
    #[arg(long, default_value_t = kiosk_report::report::DEFAULT_TOP_N)]
    top_n: usize,

    /// Maximum detail rows printed per table
    #[arg(long, default_value_t = 20)]
    detail_rows: usize,

    /// Seconds a loaded record set stays valid
    #[arg(long, default_value_t = 60)]
    cache_ttl_secs: u64,

    /// Extra column alias, SOURCE=CANONICAL (repeatable)
    #[arg(long = "alias", value_name = "SOURCE=CANONICAL")]
    aliases: Vec<String>,

    /// Use "MM월" month labels (single-year exports)
    #[arg(long, default_value_t = false)]
    legacy_month_labels: bool,

    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Run the interactive menu
    #[arg(short, long, default_value_t = false)]
    interactive: bool,

    /// Debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

struct App {
    files: Vec<String>,
    config: NormalizeConfig,
    cache: RecordCache,
    session: Session,
    fault_type: Option<String>,
    top_n: usize,
    detail_rows: usize,
    json: bool,
}

impl App {
    /// Canonical records, reloaded only when the cache window has passed.
    fn records(&mut self) -> Arc<[IncidentRecord]> {
        let files = &self.files;
        let config = &self.config;
        self.cache.get_or_refresh(Instant::now(), || {
            let (records, load, norm) = load_and_normalize(files.as_slice(), config);
            println!(
                "Processing dataset... ({} files, {} rows read, {} kept)",
                format_int(load.files_read),
                format_int(norm.total_rows),
                format_int(records.len())
            );
            if load.rows_skipped > 0 {
                println!("Note: {} unreadable CSV rows skipped.", format_int(load.rows_skipped));
            }
            if load.files_failed > 0 {
                println!("Note: {} files could not be read.", format_int(load.files_failed));
            }
            if norm.dropped_rows > 0 {
                println!(
                    "Note: {} rows skipped due to unparseable timestamps.",
                    format_int(norm.dropped_rows)
                );
            }
            if norm.unknown_hours > 0 {
                println!(
                    "Info: {} rows kept without an hour of day.",
                    format_int(norm.unknown_hours)
                );
            }
            records
        })
    }

    fn render(&mut self, selection: &Selection) -> Result<()> {
        let records = self.records();
        if records.is_empty() {
            println!("{}", DATA_UNAVAILABLE);
            return Ok(());
        }
        let report = build_report(
            &records,
            selection,
            self.fault_type.as_deref(),
            &self.session,
            self.top_n,
        );
        if self.json {
            print_json(&report).map_err(|e| anyhow!("failed to write JSON: {}", e))?;
        } else {
            print_report(&report, self.detail_rows);
        }
        Ok(())
    }
}

fn parse_alias(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((src, dst)) if !src.trim().is_empty() && !dst.trim().is_empty() => {
            Ok((src.trim().to_string(), dst.trim().to_string()))
        }
        _ => bail!("invalid alias '{}', expected SOURCE=CANONICAL", raw),
    }
}

fn selection_from_cli(cli: &Cli, records: &[IncidentRecord]) -> Selection {
    match cli.mode {
        Mode::MonthWeek => match (&cli.month, &cli.week) {
            (Some(m), Some(w)) => Selection::MonthAndWeek(m.clone(), w.clone()),
            (Some(m), None) => Selection::MonthOnly(m.clone()),
            _ => Selection::Unselected,
        },
        Mode::Quarter => {
            let year = cli
                .year
                .or_else(|| available_years(records).first().copied())
                .unwrap_or(0);
            let quarter = cli
                .quarter
                .or_else(|| quarters_in_year(records, year).first().copied())
                .unwrap_or(1);
            Selection::YearAndQuarter(year, quarter)
        }
    }
}

/// Print a prompt and read one trimmed line.
fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush().context("failed to flush stdout")?;
    next_line(&mut io::stdin().lock())
}

/// One trimmed line from `input`. Fails once the input is closed so menu
/// loops cannot spin on an exhausted stdin.
fn next_line<R: BufRead>(input: &mut R) -> Result<String> {
    let mut buf = String::new();
    let read = input
        .read_line(&mut buf)
        .context("failed to read from stdin")?;
    if read == 0 {
        bail!("input closed");
    }
    Ok(buf.trim().to_string())
}

/// Numbered pick list. `0` means "전체" when `with_all` is set.
/// Returns `None` for "전체".
fn pick(title: &str, options: &[String], with_all: bool) -> Result<Option<String>> {
    println!("{}", title);
    if options.is_empty() && !with_all {
        return Ok(None);
    }
    if with_all {
        println!("[0] 전체");
    }
    for (i, opt) in options.iter().enumerate() {
        println!("[{}] {}", i + 1, opt);
    }
    loop {
        let choice = read_line("Enter choice: ")?;
        match choice.parse::<usize>() {
            Ok(0) if with_all => return Ok(None),
            Ok(n) if n >= 1 && n <= options.len() => return Ok(Some(options[n - 1].clone())),
            _ => println!("Invalid choice. Please try again."),
        }
    }
}

fn choose_month_week(records: &[IncidentRecord]) -> Result<Selection> {
    let months = available_months(records);
    let Some(month) = pick("Month:", &months, true)? else {
        return Ok(Selection::Unselected);
    };
    let weeks = weeks_in_month(records, &month);
    Ok(match pick("Week:", &weeks, true)? {
        Some(week) => Selection::MonthAndWeek(month, week),
        None => Selection::MonthOnly(month),
    })
}

fn choose_quarter(records: &[IncidentRecord]) -> Result<Option<Selection>> {
    let years = available_years(records);
    let labels: Vec<String> = years.iter().map(|y| year_label(*y)).collect();
    let Some(year_choice) = pick("Year:", &labels, false)? else {
        return Ok(None);
    };
    let Some(year) = years
        .iter()
        .copied()
        .find(|y| year_label(*y) == year_choice)
    else {
        return Ok(None);
    };
    let quarters = quarters_in_year(records, year);
    let labels: Vec<String> = quarters.iter().map(|q| quarter_label(*q)).collect();
    let Some(q_choice) = pick("Quarter:", &labels, false)? else {
        return Ok(None);
    };
    Ok(quarters
        .iter()
        .copied()
        .find(|q| quarter_label(*q) == q_choice)
        .map(|q| Selection::YearAndQuarter(year, q)))
}

fn run_interactive(app: &mut App) -> Result<()> {
    let mut selection = Selection::Unselected;
    loop {
        println!("Select View:");
        println!("[1] Reload the files");
        println!("[2] Month/Week view");
        println!("[3] Quarter view");
        println!("[4] Fault type filter");
        println!("[5] Highlight a fault type");
        println!("[6] Clear highlight");
        println!("[0] Exit\n");
        let choice = read_line("Enter choice: ")?;
        let records = app.records();
        match choice.as_str() {
            "1" => {
                app.cache.invalidate();
                app.records();
                continue;
            }
            "2" => selection = choose_month_week(&records)?,
            "3" => match choose_quarter(&records)? {
                Some(s) => selection = s,
                None => {
                    println!("{}\n", DATA_UNAVAILABLE);
                    continue;
                }
            },
            "4" => {
                let types = available_fault_types(&records);
                app.fault_type = pick("Fault type:", &types, true)?;
            }
            "5" => {
                let types = available_fault_types(&records);
                if let Some(t) = pick("Highlight:", &types, false)? {
                    app.session.highlight(&t);
                }
            }
            "6" => {
                app.session.clear();
            }
            "0" => {
                println!("Exiting the program.");
                return Ok(());
            }
            _ => {
                println!("Invalid choice. Please enter 0-6.\n");
                continue;
            }
        }
        println!();
        app.render(&selection)?;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let style = if cli.legacy_month_labels {
        MonthLabelStyle::MonthOnly
    } else {
        MonthLabelStyle::YearMonth
    };
    let mut config = NormalizeConfig::default().with_month_label_style(style);
    for raw in &cli.aliases {
        let (src, dst) = parse_alias(raw)?;
        config = config.with_alias(&src, &dst);
    }

    let mut app = App {
        files: cli.files.clone(),
        config,
        cache: RecordCache::new(Duration::from_secs(cli.cache_ttl_secs)),
        session: Session::new(),
        fault_type: cli.fault_type.clone(),
        top_n: cli.top_n,
        detail_rows: cli.detail_rows,
        json: cli.json,
    };
    if let Some(h) = &cli.highlight {
        app.session.highlight(h);
    }
    info!(
        files = app.files.len(),
        ttl_secs = app.cache.ttl().as_secs(),
        "starting"
    );

    if cli.interactive {
        return run_interactive(&mut app);
    }

    let records = app.records();
    let selection = selection_from_cli(&cli, &records);
    app.render(&selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn closed_input_ends_the_prompt() {
        let mut input = Cursor::new("2\n");
        assert_eq!(next_line(&mut input).unwrap(), "2");
        assert!(next_line(&mut input).is_err());
        assert!(next_line(&mut Cursor::new("")).is_err());
    }

    #[test]
    fn blank_line_is_not_closed_input() {
        let mut input = Cursor::new("\n");
        assert_eq!(next_line(&mut input).unwrap(), "");
    }

    #[test]
    fn aliases_need_both_sides() {
        assert_eq!(
            parse_alias("접수 일시 = 발생일").unwrap(),
            ("접수 일시".to_string(), "발생일".to_string())
        );
        assert!(parse_alias("발생일").is_err());
        assert!(parse_alias("=발생일").is_err());
    }
}
