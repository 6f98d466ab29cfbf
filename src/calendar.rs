use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

/// Which days a calendar window keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarPolicy {
    Workdays,
    Weekends,
    All,
}

impl CalendarPolicy {
    pub fn keeps(&self, date: NaiveDate) -> bool {
        match self {
            CalendarPolicy::Workdays => is_workday(date),
            CalendarPolicy::Weekends => !is_workday(date),
            CalendarPolicy::All => true,
        }
    }
}

pub fn is_workday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Every date in `[min, max]` the policy keeps, ascending. Holidays are only
/// consulted for the workday policy when `use_holidays` is set.
pub fn make_date_list(
    min: Option<NaiveDate>,
    max: Option<NaiveDate>,
    policy: CalendarPolicy,
    use_holidays: bool,
    holidays: &BTreeSet<NaiveDate>,
) -> Vec<NaiveDate> {
    let (Some(min), Some(max)) = (min, max) else {
        return Vec::new();
    };

    min.iter_days()
        .take_while(|date| *date <= max)
        .filter(|date| policy.keeps(*date))
        .filter(|date| {
            !(policy == CalendarPolicy::Workdays && use_holidays && holidays.contains(date))
        })
        .collect()
}
