use crate::error::AppError;
use crate::models::{Dimension, FilterExpr, Granularity, GroupBy, UsageQuery};
use crate::periods::ReportingPeriod;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "aws-cost-report";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_METRIC: &str = "UnblendedCost";
const MAX_GROUP_BY: usize = 2;

fn app_home_dir() -> Result<PathBuf, AppError> {
    if let Ok(custom) = std::env::var("AWS_COST_REPORT_HOME") {
        return Ok(PathBuf::from(custom));
    }

    if let Some(dirs) = ProjectDirs::from("com", "cost-report", APP_NAME) {
        let candidate = dirs.data_local_dir().to_path_buf();
        if fs::create_dir_all(&candidate).is_ok() {
            return Ok(candidate);
        }
    }

    let cwd = std::env::current_dir()?;
    Ok(cwd.join(".aws-cost-report"))
}

/// Report settings, built once at startup and passed down read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    pub granularity: Granularity,
    pub page_timeout_secs: u64,
    pub run_timeout_secs: u64,
    pub retry_max_elapsed_secs: u64,
    pub metrics: Vec<String>,
    pub group_by: Vec<GroupBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpr>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.into(),
            endpoint_url: None,
            granularity: Granularity::Monthly,
            page_timeout_secs: 30,
            run_timeout_secs: 300,
            retry_max_elapsed_secs: 60,
            metrics: vec![DEFAULT_METRIC.into()],
            group_by: vec![GroupBy::Dimension(Dimension::Service)],
            filter: None,
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub region: Option<String>,
    pub granularity: Option<String>,
    pub metrics: Vec<String>,
    pub group_by: Option<String>,
}

impl ReportConfig {
    pub fn apply_overrides(&mut self, overrides: Overrides) -> Result<(), AppError> {
        if let Some(region) = overrides.region {
            self.region = region;
        }
        if let Some(raw) = overrides.granularity {
            self.granularity = Granularity::parse(&raw).ok_or_else(|| {
                AppError::Config(format!(
                    "Unsupported granularity '{raw}'. Use DAILY or MONTHLY."
                ))
            })?;
        }
        if !overrides.metrics.is_empty() {
            self.metrics = overrides.metrics;
        }
        if let Some(raw) = overrides.group_by {
            self.group_by = GroupBy::from_cli(&raw)
                .map_err(AppError::Config)?
                .into_iter()
                .collect();
        }
        Ok(())
    }

    /// Normalizes in place and rejects settings the billing API cannot serve.
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.region = self.region.trim().to_string();
        if self.region.is_empty() {
            return Err(AppError::Config("Region must not be empty.".into()));
        }

        let mut metrics: Vec<String> = Vec::new();
        for metric in &self.metrics {
            let metric = metric.trim();
            if !metric.is_empty() && !metrics.iter().any(|m| m == metric) {
                metrics.push(metric.to_string());
            }
        }
        if metrics.is_empty() {
            return Err(AppError::Config(
                "At least one metric is required (e.g. UnblendedCost).".into(),
            ));
        }
        self.metrics = metrics;

        if self.group_by.len() > MAX_GROUP_BY {
            return Err(AppError::Config(format!(
                "At most {MAX_GROUP_BY} group-by definitions are supported."
            )));
        }

        if let Some(endpoint) = &self.endpoint_url {
            url::Url::parse(endpoint).map_err(|e| {
                AppError::Config(format!("Invalid endpoint_url '{endpoint}': {e}"))
            })?;
        }

        if self.page_timeout_secs == 0 || self.run_timeout_secs == 0 {
            return Err(AppError::Config("Timeouts must be greater than zero.".into()));
        }
        Ok(())
    }

    /// The metric whose amounts are reported and marked up.
    pub fn report_metric(&self) -> &str {
        self.metrics.first().map_or(DEFAULT_METRIC, String::as_str)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn retry_max_elapsed(&self) -> Duration {
        Duration::from_secs(self.retry_max_elapsed_secs)
    }

    pub fn query_for(&self, period: &ReportingPeriod) -> UsageQuery {
        UsageQuery {
            start: period.start,
            end: period.end,
            granularity: self.granularity,
            metrics: self.metrics.clone(),
            group_by: self.group_by.clone(),
            filter: self.filter.clone(),
        }
    }
}

pub fn config_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("config"))
}

pub fn config_path() -> Result<PathBuf, AppError> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn load_config() -> Result<ReportConfig, AppError> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(ReportConfig::default());
    }
    let raw = fs::read_to_string(&path)?;
    Ok(toml::from_str(&raw)?)
}

pub fn save_config(config: &ReportConfig) -> Result<(), AppError> {
    fs::create_dir_all(config_dir()?)?;
    let raw = toml::to_string_pretty(config)?;
    fs::write(config_path()?, raw)?;
    Ok(())
}

pub fn ensure_initialized() -> Result<PathBuf, AppError> {
    let cfg_path = config_path()?;
    if !Path::new(&cfg_path).exists() {
        save_config(&ReportConfig::default())?;
    }
    Ok(cfg_path)
}
