//! Single-sheet spreadsheet downloads for each view.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook};
use tracing::info;

use crate::detect::{AlertReport, Baseline, Comparison, DaySummary};
use crate::error::Result;
use crate::pipeline::{SingleDayView, TrendView, View, ViewBody, ViewOutcome};
use crate::report::{display_date, format_ratio};

pub const SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

pub fn write_sheet(path: &Path, headers: &[&str], rows: &[Vec<Cell>]) -> Result<()> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *header, &bold)?;
        }
        for (idx, row) in rows.iter().enumerate() {
            let row_num = idx as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(text) => sheet.write_string(row_num, col as u16, text.as_str())?,
                    Cell::Number(value) => sheet.write_number(row_num, col as u16, *value)?,
                };
            }
        }
    }
    workbook.save(path)?;
    info!(path = %path.display(), rows = rows.len(), "exported spreadsheet");
    Ok(())
}

pub fn file_name(view: View, kind: &str, date: NaiveDate) -> String {
    format!("{}_{kind}_{}.xlsx", view.slug(), date.format("%Y%m%d"))
}

pub fn export_single_day(dir: &Path, day: &SingleDayView) -> Result<PathBuf> {
    let path = dir.join(format!("single_day_imports_{}.xlsx", day.date));
    let rows: Vec<Vec<Cell>> = day
        .providers
        .iter()
        .map(|provider| {
            vec![
                provider.provider_label.as_str().into(),
                provider.count.into(),
            ]
        })
        .collect();
    write_sheet(&path, &["Provider", "ImportCount"], &rows)?;
    Ok(path)
}

pub fn export_alerts(dir: &Path, view: View, report: &AlertReport) -> Result<PathBuf> {
    let path = dir.join(file_name(view, "alerts", report.latest));
    let baseline_dates = match &report.baseline {
        Baseline::PreviousDay { date } => display_date(*date),
        Baseline::HistoricalMean { from, to, .. } => {
            format!("{}-{}", display_date(*from), display_date(*to))
        }
    };
    let latest = display_date(report.latest);
    let rows: Vec<Vec<Cell>> = report
        .alerts
        .iter()
        .map(|alert| {
            vec![
                alert.provider_id.as_str().into(),
                alert.provider_label.as_str().into(),
                baseline_dates.as_str().into(),
                alert.baseline_count.into(),
                latest.as_str().into(),
                alert.latest_count.into(),
                format_ratio(alert.change_ratio).into(),
                alert.direction.as_str().into(),
            ]
        })
        .collect();
    write_sheet(
        &path,
        &[
            "ProviderId",
            "Provider",
            "BaselineDate",
            "BaselineCount",
            "LatestDate",
            "LatestCount",
            "ChangeRatio",
            "Direction",
        ],
        &rows,
    )?;
    Ok(path)
}

pub fn export_summary(dir: &Path, view: View, summary: &DaySummary) -> Result<PathBuf> {
    let path = dir.join(file_name(view, "summary", summary.latest));
    let prev = display_date(summary.prev);
    let latest = display_date(summary.latest);
    let rows: Vec<Vec<Cell>> = summary
        .rows
        .iter()
        .map(|row| {
            vec![
                row.provider_id.as_str().into(),
                row.provider_label.as_str().into(),
                prev.as_str().into(),
                row.prev_count.into(),
                latest.as_str().into(),
                row.latest_count.into(),
                row.change.into(),
                row.direction.as_str().into(),
            ]
        })
        .collect();
    write_sheet(
        &path,
        &[
            "ProviderId",
            "Provider",
            "PreviousDate",
            "PreviousCount",
            "LatestDate",
            "LatestCount",
            "Change",
            "Direction",
        ],
        &rows,
    )?;
    Ok(path)
}

pub fn export_trend(dir: &Path, view: View, trend: &TrendView) -> Result<Option<PathBuf>> {
    let Some(last) = trend.grid.last_date() else {
        return Ok(None);
    };
    let path = dir.join(file_name(view, "trend", last));
    let rows: Vec<Vec<Cell>> = trend
        .grid
        .grouped_cells(&trend.provider_groups)
        .into_iter()
        .map(|(group, cell)| {
            vec![
                (group as u64).into(),
                cell.date.format("%Y-%m-%d").to_string().into(),
                cell.provider_label.as_str().into(),
                cell.count.into(),
            ]
        })
        .collect();
    write_sheet(&path, &["Group", "Date", "Provider", "ImportCount"], &rows)?;
    Ok(Some(path))
}

/// Writes every export the view produced. Empty alert lists are skipped.
pub fn export_outcome(dir: &Path, outcome: &ViewOutcome) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    match &outcome.body {
        ViewBody::Nothing => {}
        ViewBody::SingleDay(day) => written.push(export_single_day(dir, day)?),
        ViewBody::Trend(trend) => {
            if let Comparison::Compared(report) = &trend.comparison {
                if !report.alerts.is_empty() {
                    written.push(export_alerts(dir, outcome.view, report)?);
                }
            }
            if let Some(summary) = &trend.summary {
                written.push(export_summary(dir, outcome.view, summary)?);
            }
            written.extend(export_trend(dir, outcome.view, trend)?);
        }
    }
    Ok(written)
}
