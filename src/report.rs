use std::fmt::Write;

use chrono::NaiveDate;

use crate::detect::{AlertReport, Baseline, Comparison, DaySummary};
use crate::models::{Direction, NoticeLevel};
use crate::pipeline::{SingleDayView, TrendView, View, ViewBody, ViewOutcome};

pub fn format_ratio(ratio: f64) -> String {
    if ratio.is_infinite() {
        "∞".to_string()
    } else {
        format!("{:.2}%", ratio * 100.0)
    }
}

pub fn display_date(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

fn movement(direction: Direction) -> &'static str {
    match direction {
        Direction::Increase => "higher",
        Direction::Decrease => "lower",
        Direction::Flat => "unchanged",
    }
}

pub fn alert_line(label: &str, direction: Direction) -> String {
    format!("ALERT {label}: latest import count unusually {}", movement(direction))
}

pub fn build_report(outcome: &ViewOutcome) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# {}", outcome.view.title());

    for notice in &outcome.notices {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
        };
        let _ = writeln!(output, "[{tag}] {}", notice.message);
    }

    match &outcome.body {
        ViewBody::Nothing => {}
        ViewBody::SingleDay(day) => write_single_day(&mut output, day),
        ViewBody::Trend(trend) => write_trend(&mut output, outcome.view, trend),
    }

    output
}

fn write_single_day(output: &mut String, day: &SingleDayView) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Imports on {}", day.date);
    if day.providers.is_empty() {
        let _ = writeln!(output, "No imports recorded for this day.");
        return;
    }
    for provider in &day.providers {
        let _ = writeln!(output, "- {}: {}", provider.provider_label, provider.count);
    }
    let total: u64 = day.providers.iter().map(|provider| provider.count).sum();
    let _ = writeln!(output, "Total: {total}");
}

fn write_trend(output: &mut String, view: View, trend: &TrendView) {
    let _ = writeln!(output);
    match &trend.comparison {
        Comparison::NoData => {
            let _ = writeln!(output, "No usable dates for comparison.");
        }
        Comparison::InsufficientHistory { dates_seen } => {
            let _ = writeln!(
                output,
                "Only {dates_seen} date(s) of data; cannot compare against a baseline."
            );
        }
        Comparison::Compared(report) => write_alerts(output, view, report),
    }

    if let Some(summary) = &trend.summary {
        write_summary(output, summary);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trend");
    if trend.grid.is_empty() {
        let _ = writeln!(output, "No trend data.");
        return;
    }
    let first = trend.grid.dates.first().copied().map(display_date);
    let last = trend.grid.last_date().map(display_date);
    if let (Some(first), Some(last)) = (first, last) {
        let _ = writeln!(
            output,
            "{} dates from {first} to {last}, {} providers",
            trend.grid.dates.len(),
            trend.grid.providers.len()
        );
    }

    for (idx, group) in trend.provider_groups.iter().enumerate() {
        let _ = writeln!(output, "### Group {}", idx + 1);
        for provider in group {
            let series = trend
                .grid
                .series_for(provider)
                .iter()
                .map(|count| count.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(
                output,
                "- {provider}: total {} [{series}]",
                trend.grid.total_for(provider)
            );
        }
    }
}

fn write_alerts(output: &mut String, view: View, report: &AlertReport) {
    let baseline = match &report.baseline {
        Baseline::PreviousDay { date } => format!("vs {}", display_date(*date)),
        Baseline::HistoricalMean { from, to, days } => format!(
            "vs mean of {days} day(s) {} to {}",
            display_date(*from),
            display_date(*to)
        ),
    };
    let _ = writeln!(
        output,
        "## Alerts ({}: {} {baseline}, threshold {:.1}%)",
        view.latest_day_label(),
        display_date(report.latest),
        report.threshold_pct
    );

    if report.alerts.is_empty() {
        let _ = writeln!(output, "No unusual changes among eligible providers.");
        return;
    }
    for alert in &report.alerts {
        let _ = writeln!(output, "{}", alert_line(&alert.provider_label, alert.direction));
    }
    let _ = writeln!(output);
    for alert in &report.alerts {
        let _ = writeln!(
            output,
            "- {} ({}): baseline {:.0}, latest {}, change {}",
            alert.provider_label,
            alert.provider_id,
            alert.baseline_count,
            alert.latest_count,
            format_ratio(alert.change_ratio)
        );
    }
}

fn write_summary(output: &mut String, summary: &DaySummary) {
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## Latest-day summary ({} vs {})",
        display_date(summary.latest),
        display_date(summary.prev)
    );
    let _ = writeln!(
        output,
        "- Increased providers: {}, total increase: {}",
        summary.increased_count, summary.increased_total
    );
    let _ = writeln!(
        output,
        "- Decreased providers: {}, total decrease: {}",
        summary.decreased_count, summary.decreased_total
    );
    let _ = writeln!(
        output,
        "- Net change: {} {}",
        summary.net_direction.as_str(),
        summary.net_change.unsigned_abs()
    );
}
