//! Threshold alerts on per-provider daily totals.
//!
//! Two strategies share [`AlertStrategy`]:
//!
//! - [`DayOverDay`] compares the latest date against the previous one. A
//!   provider is a candidate when its latest total clears the volume floor,
//!   or when it dropped to zero from a positive value. Alerts are ordered by
//!   the previous day's total, highest first.
//! - [`HistoricalMean`] compares the latest date against the mean of every
//!   earlier date the provider reported on. Only providers whose mean clears
//!   the floor are compared. Alerts are ordered by ratio magnitude.
//!
//! The mean baseline does not zero-fill days a provider is absent from,
//! while trend grids do.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::models::{AlertRecord, DailyTotal, Direction};

/// What the latest totals were compared against.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Baseline {
    PreviousDay {
        date: NaiveDate,
    },
    HistoricalMean {
        from: NaiveDate,
        to: NaiveDate,
        days: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertReport {
    pub strategy: &'static str,
    pub latest: NaiveDate,
    pub baseline: Baseline,
    pub threshold_pct: f64,
    pub candidates: usize,
    pub alerts: Vec<AlertRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Comparison {
    NoData,
    InsufficientHistory { dates_seen: usize },
    Compared(AlertReport),
}

pub trait AlertStrategy {
    fn name(&self) -> &'static str;

    /// Compares provider totals on the latest date against a baseline.
    fn compare(&self, daily: &[DailyTotal], threshold_pct: f64) -> Comparison;
}

#[derive(Debug, Clone, Copy)]
pub struct DayOverDay {
    pub volume_floor: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct HistoricalMean {
    pub eligibility_floor: u64,
}

type ProviderKey = (String, String);

fn distinct_dates(daily: &[DailyTotal]) -> Vec<NaiveDate> {
    daily
        .iter()
        .map(|total| total.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn totals_on(daily: &[DailyTotal], date: NaiveDate) -> BTreeMap<ProviderKey, u64> {
    let mut totals = BTreeMap::new();
    for total in daily.iter().filter(|total| total.date == date) {
        *totals
            .entry((total.provider_id.clone(), total.provider_label.clone()))
            .or_insert(0) += total.count;
    }
    totals
}

/// Latest and previous totals for every provider seen on either day; a
/// provider missing from one day counts 0 there.
fn paired_totals(
    daily: &[DailyTotal],
    latest: NaiveDate,
    prev: NaiveDate,
) -> BTreeMap<ProviderKey, (u64, u64)> {
    let mut pairs: BTreeMap<ProviderKey, (u64, u64)> = BTreeMap::new();
    for (key, count) in totals_on(daily, latest) {
        pairs.entry(key).or_default().0 = count;
    }
    for (key, count) in totals_on(daily, prev) {
        pairs.entry(key).or_default().1 = count;
    }
    pairs
}

fn latest_two(daily: &[DailyTotal]) -> Result<(NaiveDate, NaiveDate), Comparison> {
    let dates = distinct_dates(daily);
    match dates.as_slice() {
        [] => Err(Comparison::NoData),
        [_] => Err(Comparison::InsufficientHistory { dates_seen: 1 }),
        [.., prev, latest] => Ok((*latest, *prev)),
    }
}

pub fn day_over_day_ratio(prev: u64, latest: u64) -> f64 {
    if prev == 0 {
        return if latest > 0 { f64::INFINITY } else { 0.0 };
    }
    (latest as f64 - prev as f64) / prev as f64
}

pub fn exceeds(ratio: f64, threshold_pct: f64) -> bool {
    ratio.abs() >= threshold_pct / 100.0
}

impl AlertStrategy for DayOverDay {
    fn name(&self) -> &'static str {
        "day-over-day"
    }

    fn compare(&self, daily: &[DailyTotal], threshold_pct: f64) -> Comparison {
        let (latest, prev) = match latest_two(daily) {
            Ok(pair) => pair,
            Err(outcome) => return outcome,
        };

        let mut candidates = 0usize;
        let mut alerts = Vec::new();
        for ((provider_id, provider_label), (latest_count, prev_count)) in
            paired_totals(daily, latest, prev)
        {
            let above_floor = latest_count > self.volume_floor;
            let dropped_to_zero = latest_count == 0 && prev_count > 0;
            if !(above_floor || dropped_to_zero) {
                continue;
            }
            candidates += 1;

            let change_ratio = day_over_day_ratio(prev_count, latest_count);
            if !exceeds(change_ratio, threshold_pct) {
                continue;
            }
            alerts.push(AlertRecord {
                provider_id,
                provider_label,
                baseline_count: prev_count as f64,
                latest_count,
                change_ratio,
                direction: if latest_count >= prev_count {
                    Direction::Increase
                } else {
                    Direction::Decrease
                },
            });
        }

        alerts.sort_by(|a, b| {
            b.baseline_count
                .partial_cmp(&a.baseline_count)
                .unwrap_or(Ordering::Equal)
        });
        debug!(%latest, %prev, candidates, alerts = alerts.len(), "day-over-day comparison");

        Comparison::Compared(AlertReport {
            strategy: self.name(),
            latest,
            baseline: Baseline::PreviousDay { date: prev },
            threshold_pct,
            candidates,
            alerts,
        })
    }
}

impl AlertStrategy for HistoricalMean {
    fn name(&self) -> &'static str {
        "historical-mean"
    }

    fn compare(&self, daily: &[DailyTotal], threshold_pct: f64) -> Comparison {
        let dates = distinct_dates(daily);
        let (latest, history) = match dates.split_last() {
            None => return Comparison::NoData,
            Some((_, [])) => return Comparison::InsufficientHistory { dates_seen: 1 },
            Some((latest, history)) => (*latest, history),
        };

        // Per provider: (sum of daily totals, days reported) over the history window.
        let mut history_sums: BTreeMap<ProviderKey, BTreeMap<NaiveDate, u64>> = BTreeMap::new();
        for total in daily.iter().filter(|total| total.date < latest) {
            *history_sums
                .entry((total.provider_id.clone(), total.provider_label.clone()))
                .or_default()
                .entry(total.date)
                .or_insert(0) += total.count;
        }
        let latest_totals = totals_on(daily, latest);

        let mut candidates = 0usize;
        let mut alerts = Vec::new();
        for (key, days) in history_sums {
            let mean = days.values().sum::<u64>() as f64 / days.len() as f64;
            if mean <= self.eligibility_floor as f64 {
                continue;
            }
            candidates += 1;

            let latest_count = latest_totals.get(&key).copied().unwrap_or(0);
            let change_ratio = (latest_count as f64 - mean) / mean;
            if !exceeds(change_ratio, threshold_pct) {
                continue;
            }
            let (provider_id, provider_label) = key;
            alerts.push(AlertRecord {
                provider_id,
                provider_label,
                baseline_count: mean,
                latest_count,
                change_ratio,
                direction: if change_ratio >= 0.0 {
                    Direction::Increase
                } else {
                    Direction::Decrease
                },
            });
        }

        alerts.sort_by(|a, b| {
            b.change_ratio
                .abs()
                .partial_cmp(&a.change_ratio.abs())
                .unwrap_or(Ordering::Equal)
        });
        debug!(%latest, history_days = history.len(), candidates, alerts = alerts.len(), "historical-mean comparison");

        Comparison::Compared(AlertReport {
            strategy: self.name(),
            latest,
            baseline: Baseline::HistoricalMean {
                from: history[0],
                to: history[history.len() - 1],
                days: history.len(),
            },
            threshold_pct,
            candidates,
            alerts,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub provider_id: String,
    pub provider_label: String,
    pub prev_count: u64,
    pub latest_count: u64,
    pub change: i64,
    pub direction: Direction,
}

/// Latest-versus-previous rollup over every provider, independent of alerting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub latest: NaiveDate,
    pub prev: NaiveDate,
    pub increased_count: usize,
    pub increased_total: u64,
    pub decreased_count: usize,
    pub decreased_total: u64,
    pub net_change: i64,
    pub net_direction: Direction,
    pub rows: Vec<SummaryRow>,
}

fn direction_of(change: i64) -> Direction {
    match change.cmp(&0) {
        Ordering::Greater => Direction::Increase,
        Ordering::Less => Direction::Decrease,
        Ordering::Equal => Direction::Flat,
    }
}

/// Returns `None` when fewer than two dates are present. Labels in
/// `excluded` are left out of the rollup only.
pub fn day_over_day_summary(
    daily: &[DailyTotal],
    excluded: &BTreeSet<String>,
) -> Option<DaySummary> {
    let (latest, prev) = latest_two(daily).ok()?;

    let mut rows: Vec<SummaryRow> = paired_totals(daily, latest, prev)
        .into_iter()
        .filter(|((_, label), _)| !excluded.contains(label.trim()))
        .map(|((provider_id, provider_label), (latest_count, prev_count))| {
            let change = latest_count as i64 - prev_count as i64;
            SummaryRow {
                provider_id,
                provider_label,
                prev_count,
                latest_count,
                change,
                direction: direction_of(change),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.latest_count.cmp(&a.latest_count));

    let increased = rows.iter().filter(|row| row.change > 0);
    let decreased = rows.iter().filter(|row| row.change < 0);
    let net_change: i64 = rows.iter().map(|row| row.change).sum();

    Some(DaySummary {
        latest,
        prev,
        increased_count: increased.clone().count(),
        increased_total: increased.map(|row| row.change.unsigned_abs()).sum(),
        decreased_count: decreased.clone().count(),
        decreased_total: decreased.map(|row| row.change.unsigned_abs()).sum(),
        net_change,
        net_direction: direction_of(net_change),
        rows,
    })
}
