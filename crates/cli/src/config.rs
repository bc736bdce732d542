//! Configuration resolution for the CLI

use anyhow::{Context, Result};
use predictor_lib::{ConfigOverrides, PredictorConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::Cli;

/// Resolve the predictor configuration.
///
/// Precedence, lowest first: config file, `FDP_*` environment, flags. The
/// file is `--config` when given, else `~/.config/fdp/config.toml` if present.
pub fn resolve(cli: &Cli) -> Result<PredictorConfig> {
    let file = match &cli.config {
        Some(path) => Some(path.clone()),
        None => default_config_path().filter(|p| p.exists()),
    };
    debug!(config_file = ?file, "Resolving predictor configuration");

    let overrides = ConfigOverrides {
        model_path: cli.model.clone(),
        stats_path: cli.stats.clone(),
        threshold: cli.threshold,
        top_n: None,
        holiday_calendar: cli.calendar,
    };

    PredictorConfig::load_with_overrides(file.as_deref(), &overrides).with_context(|| {
        format!(
            "Failed to load configuration{}",
            file.as_deref().map(describe).unwrap_or_default()
        )
    })
}

fn describe(path: &Path) -> String {
    format!(" from {}", path.display())
}

/// Get the default configuration file path
pub fn default_config_path() -> Option<PathBuf> {
    let home = dirs_next::home_dir()?;
    Some(home.join(".config").join("fdp").join("config.toml"))
}
