use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use notification_service::NotificationConfig;

/// Per-asset minimum absolute percent move; assets without an override use the default.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub default: f64,
    pub overrides: HashMap<String, f64>,
}

impl Thresholds {
    pub fn uniform(default: f64) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, asset: &str, threshold: f64) -> Self {
        self.overrides.insert(asset.to_string(), threshold);
        self
    }

    pub fn for_asset(&self, asset: &str) -> f64 {
        self.overrides.get(asset).copied().unwrap_or(self.default)
    }

    /// Parses `Gold=0.8,Bitcoin=2.0`.
    pub fn parse_overrides(list: &str) -> Result<HashMap<String, f64>> {
        let mut overrides = HashMap::new();
        for pair in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((name, value)) = pair.split_once('=') else {
                bail!("threshold override '{}' is not NAME=PERCENT", pair);
            };
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("threshold for '{}' is not a number", name.trim()))?;
            if !value.is_finite() || value < 0.0 {
                bail!("threshold for '{}' must be a non-negative number", name.trim());
            }
            overrides.insert(name.trim().to_string(), value);
        }
        Ok(overrides)
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub check_interval: Duration,
    pub thresholds: Thresholds,
    pub vix_spike_percent: f64,
    pub broad_selloff_ratio: f64,
    pub ma_short_window: usize,
    pub ma_long_window: usize,
    pub alert_state_path: PathBuf,
    pub alert_log_path: PathBuf,
    pub notifications: NotificationConfig,
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let parse_f64 = |key: &str, default: &str| -> Result<f64> {
            get(key)
                .unwrap_or_else(|| default.to_string())
                .parse()
                .with_context(|| format!("{} must be a number", key))
        };
        let parse_usize = |key: &str, default: &str| -> Result<usize> {
            get(key)
                .unwrap_or_else(|| default.to_string())
                .parse()
                .with_context(|| format!("{} must be a positive integer", key))
        };

        let check_interval_secs: u64 = get("CHECK_INTERVAL_SECS")
            .unwrap_or_else(|| "3600".to_string())
            .parse()
            .context("CHECK_INTERVAL_SECS must be a whole number of seconds")?;
        if check_interval_secs == 0 {
            bail!("CHECK_INTERVAL_SECS must be greater than zero");
        }

        let default_threshold = parse_f64("ALERT_THRESHOLD_PERCENT", "0.5")?;
        let overrides = Thresholds::parse_overrides(&get("ALERT_THRESHOLD_OVERRIDES").unwrap_or_default())
            .context("invalid ALERT_THRESHOLD_OVERRIDES")?;

        let broad_selloff_ratio = parse_f64("BROAD_SELLOFF_RATIO", "0.7")?;
        if !(0.0..=1.0).contains(&broad_selloff_ratio) || broad_selloff_ratio == 0.0 {
            bail!("BROAD_SELLOFF_RATIO must be in (0, 1], got {}", broad_selloff_ratio);
        }

        let ma_short_window = parse_usize("MA_SHORT_WINDOW", "50")?;
        let ma_long_window = parse_usize("MA_LONG_WINDOW", "200")?;
        if ma_short_window == 0 || ma_short_window >= ma_long_window {
            bail!(
                "MA_SHORT_WINDOW ({}) must be positive and below MA_LONG_WINDOW ({})",
                ma_short_window,
                ma_long_window
            );
        }

        Ok(Self {
            check_interval: Duration::from_secs(check_interval_secs),
            thresholds: Thresholds {
                default: default_threshold,
                overrides,
            },
            vix_spike_percent: parse_f64("VIX_SPIKE_PERCENT", "10.0")?,
            broad_selloff_ratio,
            ma_short_window,
            ma_long_window,
            alert_state_path: get("ALERT_STATE_PATH")
                .unwrap_or_else(|| "data/alert_state.json".to_string())
                .into(),
            alert_log_path: get("ALERT_LOG_PATH")
                .unwrap_or_else(|| "logs/alerts.log".to_string())
                .into(),
            notifications: NotificationConfig::from_lookup(&lookup),
        })
    }
}
