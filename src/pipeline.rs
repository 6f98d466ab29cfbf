//! Runs one dashboard view end to end over the loaded records.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::calendar::{make_date_list, CalendarPolicy};
use crate::config::Settings;
use crate::detect::{
    day_over_day_summary, AlertStrategy, Comparison, DaySummary, DayOverDay, HistoricalMean,
};
use crate::models::{ImportRecord, Notice, ProviderCount};
use crate::resolver::{apply_allow_list, named_only, provider_labels};
use crate::trend::{complete_trend, daily_totals, date_bounds, group_providers, TrendGrid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DetectorKind {
    DayOverDay,
    HistoricalMean,
}

impl DetectorKind {
    pub fn strategy(&self, settings: &Settings) -> Box<dyn AlertStrategy> {
        match self {
            DetectorKind::DayOverDay => Box::new(DayOverDay {
                volume_floor: settings.volume_floor,
            }),
            DetectorKind::HistoricalMean => Box::new(HistoricalMean {
                eligibility_floor: settings.volume_floor,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    SingleDay,
    Workdays,
    Weekends,
    All,
}

impl View {
    pub fn slug(&self) -> &'static str {
        match self {
            View::SingleDay => "single_day",
            View::Workdays => "workdays",
            View::Weekends => "weekends",
            View::All => "all_data",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            View::SingleDay => "Single-day analysis",
            View::Workdays => "Workdays only",
            View::Weekends => "Weekends only",
            View::All => "All data",
        }
    }

    /// How the latest compared day is described in alert headings.
    pub fn latest_day_label(&self) -> &'static str {
        match self {
            View::SingleDay => "selected day",
            View::Workdays => "latest workday",
            View::Weekends => "latest weekend day",
            View::All => "latest day",
        }
    }

    fn policy(&self) -> CalendarPolicy {
        match self {
            View::Workdays => CalendarPolicy::Workdays,
            View::Weekends => CalendarPolicy::Weekends,
            View::SingleDay | View::All => CalendarPolicy::All,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrendRequest {
    pub view: View,
    pub detector: DetectorKind,
    pub allow: Vec<String>,
    pub exclude_holidays: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleDayView {
    pub date: NaiveDate,
    pub available_dates: Vec<NaiveDate>,
    pub providers: Vec<ProviderCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendView {
    pub policy: CalendarPolicy,
    pub available_providers: Vec<String>,
    pub comparison: Comparison,
    pub summary: Option<DaySummary>,
    pub grid: TrendGrid,
    pub provider_groups: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ViewBody {
    Nothing,
    SingleDay(SingleDayView),
    Trend(Box<TrendView>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewOutcome {
    pub view: View,
    pub threshold_pct: f64,
    pub notices: Vec<Notice>,
    pub body: ViewBody,
}

impl ViewOutcome {
    fn nothing(view: View, threshold_pct: f64, notices: Vec<Notice>) -> Self {
        Self {
            view,
            threshold_pct,
            notices,
            body: ViewBody::Nothing,
        }
    }
}

/// Per-provider sums for one date, highest first. Defaults to the latest date.
pub fn single_day_view(
    records: &[ImportRecord],
    date: Option<NaiveDate>,
    settings: &Settings,
) -> ViewOutcome {
    let view = View::SingleDay;
    let mut notices = Vec::new();
    if records.is_empty() {
        notices.push(Notice::info("Upload import files to start"));
        return ViewOutcome::nothing(view, settings.threshold_pct, notices);
    }

    let available_dates: Vec<NaiveDate> = records
        .iter()
        .map(|record| record.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let Some(selected) = date.or_else(|| available_dates.last().copied()) else {
        notices.push(Notice::info("No valid dates"));
        return ViewOutcome::nothing(view, settings.threshold_pct, notices);
    };
    if !available_dates.contains(&selected) {
        notices.push(Notice::info(format!("No import data for {selected}")));
        return ViewOutcome::nothing(view, settings.threshold_pct, notices);
    }

    let day_records: Vec<ImportRecord> = records
        .iter()
        .filter(|record| record.date == selected)
        .cloned()
        .collect();
    let labels = provider_labels(&day_records);
    let grid = complete_trend(&day_records, &[selected], &labels);
    let providers = grid
        .order_by_day(selected)
        .into_iter()
        .map(|provider_label| ProviderCount {
            count: grid.count_on(selected, &provider_label),
            provider_label,
        })
        .collect();

    ViewOutcome {
        view,
        threshold_pct: settings.threshold_pct,
        notices,
        body: ViewBody::SingleDay(SingleDayView {
            date: selected,
            available_dates,
            providers,
        }),
    }
}

/// Filters records for the view, runs the configured detector and builds the
/// zero-filled trend grid.
pub fn trend_view(
    records: &[ImportRecord],
    request: &TrendRequest,
    holidays: &BTreeSet<NaiveDate>,
    settings: &Settings,
) -> ViewOutcome {
    let view = request.view;
    let threshold_pct = settings.threshold_pct;
    let mut notices = Vec::new();
    if records.is_empty() {
        notices.push(Notice::info("Upload import files to start"));
        return ViewOutcome::nothing(view, threshold_pct, notices);
    }

    let policy = view.policy();
    let use_holidays = view == View::Workdays && request.exclude_holidays;
    let mut filtered: Vec<ImportRecord> = records
        .iter()
        .filter(|record| policy.keeps(record.date))
        .cloned()
        .collect();
    if use_holidays {
        if holidays.is_empty() {
            notices.push(Notice::info("No holiday file provided"));
        } else {
            filtered.retain(|record| !holidays.contains(&record.date));
        }
    }

    let filtered = named_only(filtered);
    if filtered.is_empty() {
        notices.push(Notice::info("No data"));
        return ViewOutcome::nothing(view, threshold_pct, notices);
    }
    let available_providers = provider_labels(&filtered);
    let filtered = apply_allow_list(filtered, &request.allow);
    if filtered.is_empty() {
        notices.push(Notice::info("No data"));
        return ViewOutcome::nothing(view, threshold_pct, notices);
    }

    let daily = daily_totals(&filtered);
    let comparison = request.detector.strategy(settings).compare(&daily, threshold_pct);
    let summary = (view == View::Workdays)
        .then(|| day_over_day_summary(&daily, &settings.summary_excluded_providers))
        .flatten();

    let (min, max) = date_bounds(&filtered);
    let dates = make_date_list(min, max, policy, use_holidays, holidays);
    let providers = provider_labels(&filtered);
    let grid = complete_trend(&filtered, &dates, &providers);
    let ordered = match (view, grid.last_date()) {
        (View::Workdays, Some(last)) => grid.order_by_day(last),
        (View::Workdays, None) => providers.clone(),
        _ => grid.order_by_total(),
    };
    let provider_groups = group_providers(&ordered, settings.group_size());

    info!(
        view = view.slug(),
        records = filtered.len(),
        dates = dates.len(),
        providers = providers.len(),
        "view evaluated"
    );

    ViewOutcome {
        view,
        threshold_pct,
        notices,
        body: ViewBody::Trend(Box::new(TrendView {
            policy,
            available_providers,
            comparison,
            summary,
            grid,
            provider_groups,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Baseline;
    use crate::models::Direction;

    // 2024-01-01 is a Monday.
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

    fn unnamed(id: &str, day: u32, count: u64) -> ImportRecord {
        ImportRecord {
            provider_id: id.to_string(),
            provider_label: id.to_string(),
            provider_name: None,
            count,
            date: date(day),
        }
    }

    fn request(view: View) -> TrendRequest {
        TrendRequest {
            view,
            detector: DetectorKind::DayOverDay,
            allow: Vec::new(),
            exclude_holidays: true,
        }
    }

    fn trend(outcome: &ViewOutcome) -> &TrendView {
        match &outcome.body {
            ViewBody::Trend(trend) => trend,
            other => panic!("expected trend view, got {other:?}"),
        }
    }

    fn sample() -> Vec<ImportRecord> {
        vec![
            record("News", 1, 900),
            record("News", 2, 2000),
            record("News", 3, 800),
            record("News", 6, 5000),
            record("Sports", 2, 700),
            record("Sports", 3, 600),
            record("Sports", 7, 40),
            unnamed("4242", 3, 10_000),
        ]
    }

    #[test]
    fn empty_upload_renders_nothing() {
        let outcome = trend_view(&[], &request(View::All), &BTreeSet::new(), &Settings::default());
        assert_eq!(outcome.body, ViewBody::Nothing);
        assert_eq!(outcome.notices, vec![Notice::info("Upload import files to start")]);
    }

    #[test]
    fn workdays_view_skips_weekends_and_holidays() {
        let holidays: BTreeSet<NaiveDate> = [date(2)].into_iter().collect();
        let outcome = trend_view(&sample(), &request(View::Workdays), &holidays, &Settings::default());
        let view = trend(&outcome);

        assert_eq!(view.grid.dates, vec![date(1), date(3)]);
        assert_eq!(view.grid.providers, vec!["News", "Sports"]);
        assert_eq!(view.grid.cells.len(), 4);
        match &view.comparison {
            Comparison::Compared(report) => {
                assert_eq!(report.latest, date(3));
                assert_eq!(report.baseline, Baseline::PreviousDay { date: date(1) });
                assert!(report.alerts.iter().any(|a| a.provider_label == "Sports"
                    && a.change_ratio.is_infinite()));
            }
            other => panic!("unexpected comparison {other:?}"),
        }
        let summary = view.summary.as_ref().unwrap();
        assert_eq!(summary.latest, date(3));
        assert_eq!(view.provider_groups, vec![vec!["News".to_string(), "Sports".to_string()]]);
    }

    #[test]
    fn workdays_without_holiday_file_notes_it() {
        let outcome = trend_view(&sample(), &request(View::Workdays), &BTreeSet::new(), &Settings::default());
        assert!(outcome.notices.contains(&Notice::info("No holiday file provided")));
        assert_eq!(trend(&outcome).grid.dates, vec![date(1), date(2), date(3)]);
    }

    #[test]
    fn weekends_view_orders_by_total() {
        let outcome = trend_view(&sample(), &request(View::Weekends), &BTreeSet::new(), &Settings::default());
        let view = trend(&outcome);
        assert_eq!(view.grid.dates, vec![date(6), date(7)]);
        assert_eq!(view.provider_groups[0], vec!["News".to_string(), "Sports".to_string()]);
        assert!(view.summary.is_none());
    }

    #[test]
    fn id_only_providers_are_left_out_of_trend_views() {
        let outcome = trend_view(&sample(), &request(View::All), &BTreeSet::new(), &Settings::default());
        let view = trend(&outcome);
        assert!(!view.grid.providers.contains(&"4242".to_string()));
        assert_eq!(view.grid.dates.len(), 7);
        assert_eq!(view.grid.cells.len(), 14);
    }

    #[test]
    fn allow_list_narrows_providers() {
        let mut req = request(View::All);
        req.allow = vec!["Sports".to_string()];
        let outcome = trend_view(&sample(), &req, &BTreeSet::new(), &Settings::default());
        let view = trend(&outcome);
        assert_eq!(view.grid.providers, vec!["Sports"]);
        assert_eq!(view.available_providers, vec!["News", "Sports"]);
    }

    #[test]
    fn allow_list_with_no_match_is_empty_state() {
        let mut req = request(View::All);
        req.allow = vec!["Nobody".to_string()];
        let outcome = trend_view(&sample(), &req, &BTreeSet::new(), &Settings::default());
        assert_eq!(outcome.body, ViewBody::Nothing);
        assert_eq!(outcome.notices, vec![Notice::info("No data")]);
    }

    #[test]
    fn single_date_reports_insufficient_history() {
        let records = vec![record("News", 1, 900)];
        let outcome = trend_view(&records, &request(View::All), &BTreeSet::new(), &Settings::default());
        assert_eq!(
            trend(&outcome).comparison,
            Comparison::InsufficientHistory { dates_seen: 1 }
        );
    }

    #[test]
    fn historical_mean_detector_is_selectable() {
        let mut req = request(View::All);
        req.detector = DetectorKind::HistoricalMean;
        let records = vec![
            record("News", 1, 1000),
            record("News", 2, 1000),
            record("News", 3, 100),
        ];
        let outcome = trend_view(&records, &req, &BTreeSet::new(), &Settings::default());
        match &trend(&outcome).comparison {
            Comparison::Compared(report) => {
                assert_eq!(report.strategy, "historical-mean");
                assert_eq!(report.alerts[0].direction, Direction::Decrease);
            }
            other => panic!("unexpected comparison {other:?}"),
        }
    }

    #[test]
    fn single_day_defaults_to_latest_and_keeps_unnamed() {
        let outcome = single_day_view(&sample(), None, &Settings::default());
        match outcome.body {
            ViewBody::SingleDay(day) => {
                assert_eq!(day.date, date(7));
                assert_eq!(day.providers.len(), 1);
                assert_eq!(day.available_dates.len(), 5);
            }
            other => panic!("unexpected body {other:?}"),
        }

        let outcome = single_day_view(&sample(), Some(date(3)), &Settings::default());
        match outcome.body {
            ViewBody::SingleDay(day) => {
                assert_eq!(day.providers[0].provider_label, "4242");
                assert_eq!(day.providers[0].count, 10_000);
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn single_day_unknown_date_is_informational() {
        let outcome = single_day_view(&sample(), Some(date(20)), &Settings::default());
        assert_eq!(outcome.body, ViewBody::Nothing);
        assert_eq!(outcome.notices.len(), 1);
    }

    #[test]
    fn pipeline_is_idempotent() {
        let holidays: BTreeSet<NaiveDate> = [date(2)].into_iter().collect();
        let first = trend_view(&sample(), &request(View::Workdays), &holidays, &Settings::default());
        let second = trend_view(&sample(), &request(View::Workdays), &holidays, &Settings::default());
        assert_eq!(first, second);
    }
}
