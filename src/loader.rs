//! Reads provider maps, import files and holiday lists from CSV or
//! spreadsheet files into normalized records.

use std::collections::BTreeSet;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::{InsightError, Result};
use crate::models::{ImportRecord, Notice};
use crate::resolver::ProviderMap;

pub const COL_PROVIDER_ID: &str = "providerid";
pub const COL_PROVIDER_NAME: &str = "providername";
pub const COL_IMPORT_COUNT: &str = "importcount";
pub const COL_DATE: &str = "date";

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y%m%d", "%Y_%m_%d", "%Y.%m.%d", "%Y/%m/%d"];

/// A sheet of text cells with normalized (trimmed, lowercase) headers.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            headers: headers.iter().map(|h| normalize_header(h)).collect(),
            rows,
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Looks up every required column, reporting all missing ones at once.
    pub fn require(&self, source_name: &str, names: &[&str]) -> Result<Vec<usize>> {
        let mut found = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.column(name) {
                Some(idx) => found.push(idx),
                None => missing.push((*name).to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(InsightError::MissingColumns {
                source_name: source_name.to_string(),
                columns: missing,
            });
        }
        Ok(found)
    }

    pub fn cell<'a>(&'a self, row: &'a [String], idx: usize) -> &'a str {
        row.get(idx).map(|value| value.trim()).unwrap_or("")
    }
}

pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

pub fn read_table(path: &Path) -> Result<Table> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => read_csv_table(path),
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook_table(path),
        _ => Err(InsightError::UnsupportedFormat(path.display().to_string())),
    }
}

fn read_csv_table(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.iter().map(String::from).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(String::from).collect());
    }
    Ok(Table::from_rows(headers, rows))
}

fn read_workbook_table(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| InsightError::EmptyWorkbook(path.display().to_string()))??;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_row.iter().map(cell_text).collect(),
        None => Vec::new(),
    };
    let rows = rows.map(|row| row.iter().map(cell_text).collect()).collect();
    Ok(Table::from_rows(headers, rows))
}

/// Renders a spreadsheet cell as text. Whole floats drop their fraction so
/// numeric provider ids join against their text form.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => value.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        Data::DateTime(value) if value.is_datetime() => match value.as_datetime() {
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => value.to_string(),
        },
        Data::DateTimeIso(value) => value.clone(),
        other => other.to_string(),
    }
}

/// Parses a calendar date, tolerating a trailing time component.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(trimmed);
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// The import date of a file is its name without the extension.
pub fn date_from_file_name(path: &Path) -> Option<NaiveDate> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(parse_calendar_date)
}

/// Accepts non-negative integers, including whole floats written by spreadsheets.
pub fn parse_count(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<u64>() {
        return Some(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value.fract() == 0.0 => {
            Some(value as u64)
        }
        _ => None,
    }
}

pub fn load_provider_map(path: &Path) -> Result<ProviderMap> {
    let table = read_table(path)?;
    let map = provider_map_from_table(&table, &path.display().to_string())?;
    if map.is_empty() {
        warn!(path = %path.display(), "provider map has no rows");
    }
    info!(providers = map.len(), "loaded provider map");
    Ok(map)
}

pub fn provider_map_from_table(table: &Table, source_name: &str) -> Result<ProviderMap> {
    let columns = table.require(source_name, &[COL_PROVIDER_ID, COL_PROVIDER_NAME])?;
    let (id_col, name_col) = (columns[0], columns[1]);

    let mut map = ProviderMap::default();
    for row in &table.rows {
        let id = table.cell(row, id_col);
        if id.is_empty() {
            continue;
        }
        map.insert_first(id, table.cell(row, name_col));
    }
    Ok(map)
}

/// Records read from the import files plus the rows that had to be skipped.
#[derive(Debug, Default)]
pub struct LoadedImports {
    pub records: Vec<ImportRecord>,
    pub notices: Vec<Notice>,
}

pub fn load_imports(
    paths: &[impl AsRef<Path>],
    providers: &ProviderMap,
    excluded_ids: &BTreeSet<String>,
) -> Result<LoadedImports> {
    let mut loaded = LoadedImports::default();
    for path in paths {
        let path = path.as_ref();
        let table = read_table(path)?;
        let date = date_from_file_name(path);
        import_table(
            &table,
            &path.display().to_string(),
            date,
            providers,
            excluded_ids,
            &mut loaded,
        )?;
    }
    info!(
        records = loaded.records.len(),
        files = paths.len(),
        "loaded import files"
    );
    Ok(loaded)
}

fn import_table(
    table: &Table,
    source_name: &str,
    date: Option<NaiveDate>,
    providers: &ProviderMap,
    excluded_ids: &BTreeSet<String>,
    loaded: &mut LoadedImports,
) -> Result<()> {
    let columns = table.require(source_name, &[COL_PROVIDER_ID, COL_IMPORT_COUNT])?;
    let (id_col, count_col) = (columns[0], columns[1]);

    let Some(date) = date else {
        warn!(source = source_name, rows = table.rows.len(), "file name is not a date");
        loaded.notices.push(Notice::warning(format!(
            "Skipped {} row(s) from {}: file name is not a valid date",
            table.rows.len(),
            source_name
        )));
        return Ok(());
    };

    let mut bad_counts = 0usize;
    for row in &table.rows {
        let provider_id = table.cell(row, id_col);
        if provider_id.is_empty() || excluded_ids.contains(provider_id) {
            continue;
        }
        let Some(count) = parse_count(table.cell(row, count_col)) else {
            bad_counts += 1;
            continue;
        };
        let resolved = providers.resolve(provider_id);
        loaded.records.push(ImportRecord {
            provider_id: provider_id.to_string(),
            provider_label: resolved.label,
            provider_name: resolved.name,
            count,
            date,
        });
    }

    if bad_counts > 0 {
        warn!(source = source_name, rows = bad_counts, "unparsable import counts");
        loaded.notices.push(Notice::warning(format!(
            "Skipped {bad_counts} row(s) from {source_name}: import count is not a non-negative integer"
        )));
    }
    debug!(source = source_name, %date, "imported file");
    Ok(())
}

pub fn load_holidays(path: &Path) -> Result<(BTreeSet<NaiveDate>, Vec<Notice>)> {
    let table = read_table(path)?;
    holidays_from_table(&table, &path.display().to_string())
}

pub fn holidays_from_table(
    table: &Table,
    source_name: &str,
) -> Result<(BTreeSet<NaiveDate>, Vec<Notice>)> {
    let date_col = table.require(source_name, &[COL_DATE])?[0];
    let mut holidays = BTreeSet::new();
    let mut malformed = 0usize;
    for row in &table.rows {
        match parse_calendar_date(table.cell(row, date_col)) {
            Some(date) => {
                holidays.insert(date);
            }
            None => malformed += 1,
        }
    }

    let mut notices = Vec::new();
    if malformed > 0 {
        warn!(source = source_name, rows = malformed, "malformed holiday dates");
        notices.push(Notice::warning(format!(
            "Skipped {malformed} malformed holiday row(s) from {source_name}"
        )));
    }
    info!(holidays = holidays.len(), "loaded holiday list");
    Ok((holidays, notices))
}
