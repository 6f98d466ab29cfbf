use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DailyTotal, ImportRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendCell {
    pub date: NaiveDate,
    pub provider_label: String,
    pub count: u64,
}

/// Dense `dates x providers` table, date-major, every pair exactly once.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendGrid {
    pub dates: Vec<NaiveDate>,
    pub providers: Vec<String>,
    pub cells: Vec<TrendCell>,
}

/// Sums observed counts per (date, provider) and lays them over the full
/// cross product, zero-filling pairs with no observation.
pub fn complete_trend(
    records: &[ImportRecord],
    dates: &[NaiveDate],
    providers: &[String],
) -> TrendGrid {
    if dates.is_empty() || providers.is_empty() {
        return TrendGrid::default();
    }

    let mut sums: HashMap<(NaiveDate, &str), u64> = HashMap::new();
    for record in records {
        *sums
            .entry((record.date, record.provider_label.as_str()))
            .or_insert(0) += record.count;
    }

    let mut cells = Vec::with_capacity(dates.len() * providers.len());
    for date in dates {
        for provider in providers {
            let count = sums.get(&(*date, provider.as_str())).copied().unwrap_or(0);
            cells.push(TrendCell {
                date: *date,
                provider_label: provider.clone(),
                count,
            });
        }
    }

    TrendGrid {
        dates: dates.to_vec(),
        providers: providers.to_vec(),
        cells,
    }
}

impl TrendGrid {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn total_for(&self, provider: &str) -> u64 {
        self.cells
            .iter()
            .filter(|cell| cell.provider_label == provider)
            .map(|cell| cell.count)
            .sum()
    }

    pub fn count_on(&self, date: NaiveDate, provider: &str) -> u64 {
        self.cells
            .iter()
            .find(|cell| cell.date == date && cell.provider_label == provider)
            .map(|cell| cell.count)
            .unwrap_or(0)
    }

    pub fn series_for(&self, provider: &str) -> Vec<u64> {
        self.cells
            .iter()
            .filter(|cell| cell.provider_label == provider)
            .map(|cell| cell.count)
            .collect()
    }

    /// Providers by their count on `date`, highest first.
    pub fn order_by_day(&self, date: NaiveDate) -> Vec<String> {
        self.order_by(|provider| self.count_on(date, provider))
    }

    /// Providers by their total over the window, highest first.
    pub fn order_by_total(&self) -> Vec<String> {
        self.order_by(|provider| self.total_for(provider))
    }

    // Stable, so ties keep the grid's alphabetical provider order.
    fn order_by(&self, key: impl Fn(&str) -> u64) -> Vec<String> {
        let mut keyed: Vec<(u64, &String)> = self
            .providers
            .iter()
            .map(|provider| (key(provider.as_str()), provider))
            .collect();
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
        keyed.into_iter().map(|(_, provider)| provider.clone()).collect()
    }

    /// Cells of each provider group, in group order; date-major inside a group.
    pub fn grouped_cells<'a>(&'a self, groups: &[Vec<String>]) -> Vec<(usize, &'a TrendCell)> {
        let mut rows = Vec::with_capacity(self.cells.len());
        for (idx, group) in groups.iter().enumerate() {
            rows.extend(
                self.cells
                    .iter()
                    .filter(|cell| group.contains(&cell.provider_label))
                    .map(|cell| (idx + 1, cell)),
            );
        }
        rows
    }
}

pub fn group_providers(ordered: &[String], group_size: usize) -> Vec<Vec<String>> {
    ordered
        .chunks(group_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Sums records per (provider id, label, date), ordered by id, label, date.
pub fn daily_totals(records: &[ImportRecord]) -> Vec<DailyTotal> {
    let mut sums: BTreeMap<(&str, &str, NaiveDate), u64> = BTreeMap::new();
    for record in records {
        *sums
            .entry((
                record.provider_id.as_str(),
                record.provider_label.as_str(),
                record.date,
            ))
            .or_insert(0) += record.count;
    }
    sums.into_iter()
        .map(|((provider_id, provider_label, date), count)| DailyTotal {
            provider_id: provider_id.to_string(),
            provider_label: provider_label.to_string(),
            date,
            count,
        })
        .collect()
}

pub fn date_bounds(records: &[ImportRecord]) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let min = records.iter().map(|record| record.date).min();
    let max = records.iter().map(|record| record.date).max();
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn record(label: &str, day: u32, count: u64) -> ImportRecord {
        ImportRecord {
            provider_id: format!("id-{label}"),
            provider_label: label.to_string(),
            provider_name: Some(label.to_string()),
            count,
            date: date(day),
        }
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn grid_is_full_cross_product() {
        let records = vec![record("A", 1, 10), record("B", 3, 7)];
        let dates = vec![date(1), date(2), date(3)];
        let grid = complete_trend(&records, &dates, &labels(&["A", "B"]));

        assert_eq!(grid.cells.len(), 6);
        let pairs: std::collections::BTreeSet<_> = grid
            .cells
            .iter()
            .map(|c| (c.date, c.provider_label.clone()))
            .collect();
        assert_eq!(pairs.len(), 6);
        assert_eq!(grid.count_on(date(2), "A"), 0);
        assert_eq!(grid.count_on(date(3), "B"), 7);
    }

    #[test]
    fn same_day_records_are_summed() {
        let records = vec![record("A", 1, 10), record("A", 1, 15)];
        let grid = complete_trend(&records, &[date(1)], &labels(&["A"]));
        assert_eq!(grid.count_on(date(1), "A"), 25);
    }

    #[test]
    fn zero_fill_preserves_provider_totals() {
        let records = vec![
            record("A", 1, 10),
            record("A", 4, 5),
            record("B", 2, 3),
            record("A", 4, 1),
        ];
        let dates: Vec<_> = (1..=5).map(date).collect();
        let grid = complete_trend(&records, &dates, &labels(&["A", "B"]));
        assert_eq!(grid.total_for("A"), 16);
        assert_eq!(grid.total_for("B"), 3);
        assert_eq!(grid.series_for("A"), vec![10, 0, 0, 6, 0]);
    }

    #[test]
    fn observations_outside_window_are_ignored() {
        let records = vec![record("A", 1, 10), record("A", 9, 99), record("C", 1, 4)];
        let grid = complete_trend(&records, &[date(1)], &labels(&["A"]));
        assert_eq!(grid.cells.len(), 1);
        assert_eq!(grid.total_for("A"), 10);
    }

    #[test]
    fn empty_inputs_give_empty_grid() {
        let records = vec![record("A", 1, 10)];
        assert!(complete_trend(&records, &[], &labels(&["A"])).is_empty());
        assert!(complete_trend(&records, &[date(1)], &[]).is_empty());
    }

    #[test]
    fn ordering_is_descending_and_stable() {
        let records = vec![
            record("A", 1, 5),
            record("B", 1, 50),
            record("C", 1, 5),
            record("A", 2, 100),
        ];
        let grid = complete_trend(&records, &[date(1), date(2)], &labels(&["A", "B", "C"]));
        assert_eq!(grid.order_by_day(date(1)), labels(&["B", "A", "C"]));
        assert_eq!(grid.order_by_total(), labels(&["A", "B", "C"]));
    }

    #[test]
    fn groups_chunk_ordered_providers() {
        let ordered = labels(&["A", "B", "C", "D", "E"]);
        let groups = group_providers(&ordered, 2);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[2], labels(&["E"]));

        let records = vec![record("A", 1, 1), record("E", 1, 2)];
        let grid = complete_trend(&records, &[date(1), date(2)], &ordered);
        let rows = grid.grouped_cells(&groups);
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].0, 1);
        assert_eq!(rows[9].0, 3);
        assert_eq!(rows[9].1.provider_label, "E");
    }

    #[test]
    fn daily_totals_collapse_rows() {
        let records = vec![record("A", 1, 10), record("A", 1, 5), record("B", 1, 1)];
        let totals = daily_totals(&records);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].count, 15);
        assert_eq!(date_bounds(&records), (Some(date(1)), Some(date(1))));
    }
}
