//! Predictor configuration

use crate::calendar::HolidayCalendar;
use crate::error::LoadError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `FDP_MODEL_PATH`
pub const ENV_PREFIX: &str = "FDP";

pub const DEFAULT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_TOP_N: usize = 10;

/// Predictor configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictorConfig {
    /// Serialized pipeline artifact
    pub model_path: PathBuf,

    /// Serialized historical statistics artifact
    #[serde(default)]
    pub stats_path: Option<PathBuf>,

    /// Minimum delay probability classified as "Delayed"
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Number of factors returned by explanations
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default)]
    pub holiday_calendar: HolidayCalendar,

    /// Expected SHA256 of the pipeline artifact
    #[serde(default)]
    pub model_sha256: Option<String>,

    /// Expected SHA256 of the statistics artifact
    #[serde(default)]
    pub stats_sha256: Option<String>,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

impl PredictorConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            stats_path: None,
            threshold: DEFAULT_THRESHOLD,
            top_n: DEFAULT_TOP_N,
            holiday_calendar: HolidayCalendar::default(),
            model_sha256: None,
            stats_sha256: None,
        }
    }

    pub fn with_stats_path(mut self, stats_path: impl Into<PathBuf>) -> Self {
        self.stats_path = Some(stats_path.into());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_holiday_calendar(mut self, calendar: HolidayCalendar) -> Self {
        self.holiday_calendar = calendar;
        self
    }

    /// Load configuration from an optional file and `FDP_*` environment
    /// variables; the environment wins over the file.
    pub fn load(file: Option<&Path>) -> Result<Self, LoadError> {
        Self::load_with_overrides(file, &ConfigOverrides::default())
    }

    /// Like [`PredictorConfig::load`], with explicit values (usually command
    /// line flags) taking precedence over both file and environment.
    pub fn load_with_overrides(
        file: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, LoadError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("model_path", overrides.model_path.as_deref().map(path_value))?
            .set_override_option("stats_path", overrides.stats_path.as_deref().map(path_value))?
            .set_override_option("threshold", overrides.threshold)?
            .set_override_option("top_n", overrides.top_n.map(|n| n as i64))?
            .set_override_option(
                "holiday_calendar",
                overrides.holiday_calendar.map(|c| c.as_str().to_string()),
            )?
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        validate_threshold(self.threshold)
    }
}

/// Values that override file and environment settings
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model_path: Option<PathBuf>,
    pub stats_path: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub top_n: Option<usize>,
    pub holiday_calendar: Option<HolidayCalendar>,
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Thresholds must lie in (0, 1]
pub fn validate_threshold(threshold: f64) -> Result<(), LoadError> {
    if threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(LoadError::InvalidThreshold(threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_threshold(0.5).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(0.0).is_err());
        assert!(validate_threshold(1.2).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let config = PredictorConfig::new("model.json").with_threshold(0.7);
        assert_eq!(config.threshold, 0.7);
        assert_eq!(config.top_n, DEFAULT_TOP_N);
        assert_eq!(config.holiday_calendar, HolidayCalendar::Brazil);
        assert!(config.stats_path.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "model_path = \"/models/pipeline.json\"\nstats_path = \"/models/stats.json\"\nthreshold = 0.65\nholiday_calendar = \"united_states\""
        )
        .unwrap();

        let config = PredictorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.model_path, PathBuf::from("/models/pipeline.json"));
        assert_eq!(config.stats_path, Some(PathBuf::from("/models/stats.json")));
        assert_eq!(config.threshold, 0.65);
        assert_eq!(config.top_n, DEFAULT_TOP_N);
        assert_eq!(config.holiday_calendar, HolidayCalendar::UnitedStates);
    }

    #[test]
    fn test_load_accepts_calendar_short_name() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "model_path = \"m.json\"\nholiday_calendar = \"us\"").unwrap();

        let config = PredictorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.holiday_calendar, HolidayCalendar::UnitedStates);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "model_path = \"file.json\"\nthreshold = 0.65").unwrap();

        let overrides = ConfigOverrides {
            model_path: Some(PathBuf::from("flag.json")),
            threshold: Some(0.9),
            holiday_calendar: Some(HolidayCalendar::UnitedStates),
            ..Default::default()
        };
        let config = PredictorConfig::load_with_overrides(Some(file.path()), &overrides).unwrap();
        assert_eq!(config.model_path, PathBuf::from("flag.json"));
        assert_eq!(config.threshold, 0.9);
        assert_eq!(config.holiday_calendar, HolidayCalendar::UnitedStates);
    }

    #[test]
    fn test_overrides_without_file() {
        let overrides = ConfigOverrides {
            model_path: Some(PathBuf::from("/models/pipeline.json")),
            top_n: Some(3),
            ..Default::default()
        };
        let config = PredictorConfig::load_with_overrides(None, &overrides).unwrap();
        assert_eq!(config.top_n, 3);
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_load_rejects_bad_threshold() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "model_path = \"m.json\"\nthreshold = 1.5").unwrap();
        assert!(matches!(
            PredictorConfig::load(Some(file.path())),
            Err(LoadError::InvalidThreshold(_))
        ));
    }
}
