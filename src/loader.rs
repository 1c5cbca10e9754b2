use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{ReportError, Result};
use crate::normalize::{normalize, NormalizeConfig, NormalizeReport};
use crate::types::{IncidentRecord, RawSheet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub files_read: usize,
    pub files_failed: usize,
    pub sheets_read: usize,
    pub sheets_failed: usize,
    /// CSV records that could not be read at all.
    pub rows_skipped: usize,
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Read every sheet of a workbook. A sheet that cannot be read is skipped.
fn read_workbook(path: &Path, report: &mut LoadReport) -> Result<Vec<RawSheet>> {
    let mut workbook = open_workbook_auto(path)?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = match workbook.worksheet_range(&name) {
            Ok(r) => r,
            Err(e) => {
                warn!(file = %path.display(), sheet = %name, error = %e, "skipping unreadable sheet");
                report.sheets_failed += 1;
                continue;
            }
        };
        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            continue;
        };
        let headers: Vec<String> = header.iter().map(cell_to_string).collect();
        let body: Vec<Vec<String>> = rows
            .map(|r| r.iter().map(cell_to_string).collect())
            .filter(|r: &Vec<String>| r.iter().any(|c| !c.is_empty()))
            .collect();
        sheets.push(RawSheet::new(&name, headers, body));
    }
    Ok(sheets)
}

fn decode(field: &[u8]) -> String {
    String::from_utf8_lossy(field).trim().to_string()
}

/// Read one CSV file. Cells are decoded lossily so a stray non-UTF-8 byte only
/// garbles its own cell; a record the reader cannot parse is skipped.
fn read_csv(path: &Path, report: &mut LoadReport) -> Result<RawSheet> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .map(|h| decode(h).trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (line, result) in rdr.byte_records().enumerate() {
        match result {
            Ok(record) => rows.push(record.iter().map(decode).collect()),
            Err(e) => {
                warn!(file = %path.display(), line, error = %e, "skipping unreadable CSV record");
                report.rows_skipped += 1;
            }
        }
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(RawSheet::new(&name, headers, rows))
}

pub fn read_file(path: &Path, report: &mut LoadReport) -> Result<Vec<RawSheet>> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path, report),
        "csv" => Ok(vec![read_csv(path, report)?]),
        _ => Err(ReportError::UnsupportedFile(path.display().to_string())),
    }
}

/// Load all sheets from `paths`. Files that fail are logged and skipped;
/// this never fails as a whole.
pub fn load_sheets<P: AsRef<Path>>(paths: &[P]) -> (Vec<RawSheet>, LoadReport) {
    let mut report = LoadReport::default();
    let mut sheets: Vec<RawSheet> = Vec::new();
    for path in paths {
        let path = path.as_ref();
        match read_file(path, &mut report) {
            Ok(found) => {
                report.files_read += 1;
                report.sheets_read += found.len();
                sheets.extend(found);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to load file");
                report.files_failed += 1;
            }
        }
    }
    info!(
        files = report.files_read,
        failed = report.files_failed,
        sheets = report.sheets_read,
        "loaded incident sheets"
    );
    (sheets, report)
}

pub fn load_and_normalize<P: AsRef<Path>>(
    paths: &[P],
    config: &NormalizeConfig,
) -> (Vec<IncidentRecord>, LoadReport, NormalizeReport) {
    let (sheets, load_report) = load_sheets(paths);
    let (records, normalize_report) = normalize(&sheets, config);
    (records, load_report, normalize_report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("kiosk_report_{}_{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_csv_with_bom() {
        let path = temp_file(
            "bom.csv",
            "\u{feff}접수일시,기기명,장애유형\n2025-02-03 10:00:00,K-01,카드 미방출\n",
        );
        let (sheets, report) = load_sheets(&[&path]);
        assert_eq!(report.files_read, 1);
        assert_eq!(sheets[0].headers[0], "접수일시");
        assert_eq!(sheets[0].rows.len(), 1);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn invalid_utf8_cell_keeps_the_rest_of_the_file() {
        let path = std::env::temp_dir().join(format!(
            "kiosk_report_{}_latin1.csv",
            std::process::id()
        ));
        let mut bytes = "발생일,기기명,조치 내용\n2025-02-03 10:00:00,K-01,재부팅\n".as_bytes().to_vec();
        bytes.extend_from_slice(b"2025-02-04 11:00:00,K-02,\xC0\xFF\n");
        bytes.extend_from_slice("2025-02-05 12:00:00,K-03,교체\n".as_bytes());
        std::fs::write(&path, bytes).unwrap();

        let (records, load, norm) = load_and_normalize(&[&path], &NormalizeConfig::default());
        std::fs::remove_file(&path).ok();

        assert_eq!(load.files_read, 1);
        assert_eq!(load.files_failed, 0);
        assert_eq!(norm.total_rows, 3);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].device_id.as_deref(), Some("K-02"));
        assert!(records[1].action_taken.as_deref().unwrap().contains('\u{fffd}'));
        assert_eq!(records[2].action_taken.as_deref(), Some("교체"));
    }

    #[test]
    fn missing_and_unsupported_files_are_skipped() {
        let good = temp_file("good.csv", "발생일,장애유형\n2025-02-03,A\n");
        let txt = temp_file("notes.txt", "hello");
        let missing = std::env::temp_dir().join("kiosk_report_does_not_exist.xlsx");
        let (records, load, norm) =
            load_and_normalize(&[&good, &txt, &missing], &NormalizeConfig::default());
        assert_eq!(records.len(), 1);
        assert_eq!(load.files_read, 1);
        assert_eq!(load.files_failed, 2);
        assert_eq!(norm.total_rows, 1);
        std::fs::remove_file(good).ok();
        std::fs::remove_file(txt).ok();
    }

    #[test]
    fn nothing_readable_gives_empty_set() {
        let missing = std::env::temp_dir().join("kiosk_report_nothing_here.csv");
        let (records, load, _) = load_and_normalize(&[missing], &NormalizeConfig::default());
        assert!(records.is_empty());
        assert_eq!(load.files_failed, 1);
    }
}
