use chrono::NaiveDate;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRecord {
    pub provider_id: String,
    pub provider_label: String,
    pub provider_name: Option<String>,
    pub count: u64,
    pub date: NaiveDate,
}

/// Per-provider sum for one day. Several import rows may collapse into one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub provider_id: String,
    pub provider_label: String,
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
    Flat,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Increase => "increase",
            Direction::Decrease => "decrease",
            Direction::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub provider_id: String,
    pub provider_label: String,
    pub baseline_count: f64,
    pub latest_count: u64,
    /// Infinite when the baseline is zero.
    #[serde(serialize_with = "serialize_ratio")]
    pub change_ratio: f64,
    pub direction: Direction,
}

/// JSON has no infinity; a zero baseline is written as `"inf"` rather than `null`.
fn serialize_ratio<S: Serializer>(ratio: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if ratio.is_finite() {
        serializer.serialize_f64(*ratio)
    } else if ratio.is_nan() {
        serializer.serialize_none()
    } else if *ratio > 0.0 {
        serializer.serialize_str("inf")
    } else {
        serializer.serialize_str("-inf")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderCount {
    pub provider_label: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// User-facing message produced while loading or evaluating a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(change_ratio: f64) -> AlertRecord {
        AlertRecord {
            provider_id: "1001".to_string(),
            provider_label: "Daily News".to_string(),
            baseline_count: 0.0,
            latest_count: 40,
            change_ratio,
            direction: Direction::Increase,
        }
    }

    #[test]
    fn zero_baseline_ratio_serializes_as_inf() {
        let json = serde_json::to_value(alert(f64::INFINITY)).unwrap();
        assert_eq!(json["change_ratio"], "inf");
        assert_eq!(json["direction"], "increase");
    }

    #[test]
    fn finite_ratio_serializes_as_number() {
        let json = serde_json::to_value(alert(-0.5)).unwrap();
        assert_eq!(json["change_ratio"], -0.5);
    }
}
