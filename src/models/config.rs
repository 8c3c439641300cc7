use crate::error::{MonitorError, Result};
use crate::services::ConfigService;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Monitor configuration, persisted as `config.json` in the data directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Tariff applied to every kW recorded
    #[serde(default = "default_rate_per_kwh")]
    pub rate_per_kwh: f64,
    #[serde(default = "default_alert_threshold_kw")]
    pub alert_threshold_kw: f64,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default = "default_sample_min_kw")]
    pub sample_min_kw: f64,
    #[serde(default = "default_sample_max_kw")]
    pub sample_max_kw: f64,
    #[serde(default = "default_daily_file")]
    pub daily_file: String,
    #[serde(default = "default_archive_file")]
    pub archive_file: String,
}

fn default_rate_per_kwh() -> f64 {
    10.0
}
fn default_alert_threshold_kw() -> f64 {
    15.1
}
fn default_sample_interval_ms() -> u64 {
    1000
}
fn default_sample_min_kw() -> f64 {
    0.5
}
fn default_sample_max_kw() -> f64 {
    2.0
}
fn default_daily_file() -> String {
    "daily_consumption.csv".into()
}
fn default_archive_file() -> String {
    "archived_daily_consumption.csv".into()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rate_per_kwh: default_rate_per_kwh(),
            alert_threshold_kw: default_alert_threshold_kw(),
            sample_interval_ms: default_sample_interval_ms(),
            sample_min_kw: default_sample_min_kw(),
            sample_max_kw: default_sample_max_kw(),
            daily_file: default_daily_file(),
            archive_file: default_archive_file(),
        }
    }
}

impl MonitorConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn daily_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.daily_file)
    }

    pub fn archive_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.archive_file)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rate_per_kwh.is_finite() && self.rate_per_kwh >= 0.0) {
            return Err(MonitorError::Config(format!(
                "rate_per_kwh must be a non-negative number, got {}",
                self.rate_per_kwh
            )));
        }
        if !(self.alert_threshold_kw.is_finite() && self.alert_threshold_kw > 0.0) {
            return Err(MonitorError::Config(format!(
                "alert_threshold_kw must be positive, got {}",
                self.alert_threshold_kw
            )));
        }
        if self.sample_interval_ms == 0 {
            return Err(MonitorError::Config("sample_interval_ms must be at least 1".into()));
        }
        if !(self.sample_min_kw >= 0.0 && self.sample_min_kw < self.sample_max_kw) {
            return Err(MonitorError::Config(format!(
                "sample range [{}, {}) is empty or negative",
                self.sample_min_kw, self.sample_max_kw
            )));
        }
        Ok(())
    }
}

/// Reads and writes `config.json` under a data directory
pub struct FileConfigService {
    data_dir: PathBuf,
}

impl FileConfigService {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Load the config, writing defaults on first run.
    pub fn load_or_create(&self) -> Result<MonitorConfig> {
        let config_path = self.get_config_path()?;
        if config_path.exists() {
            self.load_config()
        } else {
            let config = MonitorConfig::default();
            self.save_config(&config)?;
            Ok(config)
        }
    }
}

impl ConfigService for FileConfigService {
    fn load_config(&self) -> Result<MonitorConfig> {
        let config_path = self.get_config_path()?;
        let content =
            fs::read_to_string(&config_path).map_err(|e| MonitorError::storage(&config_path, e))?;
        let config: MonitorConfig = serde_json::from_str(&content)
            .map_err(|e| MonitorError::Config(format!("{}: {e}", config_path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn save_config(&self, config: &MonitorConfig) -> Result<()> {
        config.validate()?;
        let config_path = self.get_config_path()?;
        fs::create_dir_all(&self.data_dir).map_err(|e| MonitorError::storage(&self.data_dir, e))?;
        let content = serde_json::to_string_pretty(config)
            .map_err(|e| MonitorError::Config(e.to_string()))?;
        fs::write(&config_path, content).map_err(|e| MonitorError::storage(&config_path, e))?;
        log::debug!("Saved configuration to {}", config_path.display());
        Ok(())
    }

    fn get_config_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir.join("config.json"))
    }
}
