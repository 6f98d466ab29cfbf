use std::collections::BTreeSet;
use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InsightError, Result};

pub const ENV_PREFIX: &str = "INSIGHT_";

/// Runtime settings. Layered as defaults, then an optional TOML file, then
/// `INSIGHT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Relative change, in percent, at which a provider is flagged.
    pub threshold_pct: f64,
    pub min_threshold_pct: f64,
    /// Volume a provider must strictly exceed to be compared.
    pub volume_floor: u64,
    pub group_size: usize,
    /// Raw provider ids dropped while loading imports.
    pub excluded_provider_ids: BTreeSet<String>,
    /// Provider labels dropped from every statistic.
    pub excluded_providers: BTreeSet<String>,
    /// Provider labels dropped from the day-over-day summary only.
    pub summary_excluded_providers: BTreeSet<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold_pct: 50.0,
            min_threshold_pct: 5.0,
            volume_floor: 500,
            group_size: 10,
            excluded_provider_ids: BTreeSet::new(),
            excluded_providers: BTreeSet::new(),
            summary_excluded_providers: BTreeSet::new(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            debug!(path = %path.display(), "merging settings file");
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract().map_err(Box::new)?;
        settings.validate_threshold(settings.threshold_pct)?;
        Ok(settings)
    }

    /// Applies a command-line threshold on top of the layered value.
    pub fn with_threshold(mut self, threshold_pct: Option<f64>) -> Result<Self> {
        if let Some(value) = threshold_pct {
            self.validate_threshold(value)?;
            self.threshold_pct = value;
        }
        Ok(self)
    }

    fn validate_threshold(&self, value: f64) -> Result<()> {
        if !value.is_finite() || value < self.min_threshold_pct {
            return Err(InsightError::InvalidThreshold {
                value,
                min: self.min_threshold_pct,
            });
        }
        Ok(())
    }

    pub fn group_size(&self) -> usize {
        self.group_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_dashboard_behavior() {
        let settings = Settings::default();
        assert_eq!(settings.threshold_pct, 50.0);
        assert_eq!(settings.volume_floor, 500);
        assert_eq!(settings.group_size, 10);
        assert!(settings.excluded_providers.is_empty());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "threshold_pct = 30.0").unwrap();
        writeln!(file, "excluded_providers = [\"Legacy Feed\"]").unwrap();
        writeln!(file, "summary_excluded_providers = [\"Video A\", \"Video B\"]").unwrap();

        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file.path()));
        let settings = Settings::extract(figment).unwrap();

        assert_eq!(settings.threshold_pct, 30.0);
        assert!(settings.excluded_providers.contains("Legacy Feed"));
        assert_eq!(settings.summary_excluded_providers.len(), 2);
        assert_eq!(settings.volume_floor, 500);
    }

    #[test]
    fn rejects_threshold_below_minimum() {
        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Serialized::default("threshold_pct", 2.0));
        assert!(matches!(
            Settings::extract(figment),
            Err(InsightError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn command_line_threshold_overrides_and_validates() {
        let settings = Settings::default().with_threshold(Some(75.0)).unwrap();
        assert_eq!(settings.threshold_pct, 75.0);

        let err = Settings::default().with_threshold(Some(1.0)).unwrap_err();
        assert!(err.to_string().contains("below the minimum"));

        let unchanged = Settings::default().with_threshold(None).unwrap();
        assert_eq!(unchanged.threshold_pct, 50.0);
    }
}
