use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use fundamental_analysis::MissingValuePolicy;

#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    pub ticker_list_path: PathBuf,
    pub results_output_path: PathBuf,
    pub exchange_rates_path: PathBuf,
    pub fixer_api_key: Option<String>,
    /// Pause before every symbol request.
    pub request_delay: Duration,
    pub missing_value_policy: MissingValuePolicy,
    pub target_currency: String,
    /// Process only the first N tickers of the list.
    pub sample_size: Option<usize>,
}

impl ScreenerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let request_delay_ms: u64 = get("REQUEST_DELAY_MS")
            .unwrap_or_else(|| "2000".to_string())
            .parse()
            .context("REQUEST_DELAY_MS must be a whole number of milliseconds")?;

        let missing_value_policy = get("MISSING_VALUE_POLICY")
            .unwrap_or_else(|| "sentinel".to_string())
            .parse::<MissingValuePolicy>()
            .map_err(|e| anyhow!(e))
            .context("invalid MISSING_VALUE_POLICY")?;

        let sample_size = get("SCREENER_SAMPLE_SIZE")
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("SCREENER_SAMPLE_SIZE must be a positive integer")?
            .filter(|n| *n > 0);

        let target_currency = get("TARGET_CURRENCY")
            .unwrap_or_else(|| "USD".to_string())
            .to_ascii_uppercase();
        if target_currency.len() != 3 || !target_currency.chars().all(|c| c.is_ascii_alphabetic()) {
            anyhow::bail!("TARGET_CURRENCY must be a three-letter currency code, got '{}'", target_currency);
        }

        Ok(Self {
            ticker_list_path: get("TICKER_LIST_PATH")
                .unwrap_or_else(|| "data/tickers.csv".to_string())
                .into(),
            results_output_path: get("RESULTS_OUTPUT_PATH")
                .unwrap_or_else(|| "data/ranked_stocks.csv".to_string())
                .into(),
            exchange_rates_path: get("EXCHANGE_RATES_PATH")
                .unwrap_or_else(|| "data/exchange_rates.csv".to_string())
                .into(),
            fixer_api_key: get("FIXER_API_KEY"),
            request_delay: Duration::from_millis(request_delay_ms),
            missing_value_policy,
            target_currency,
            sample_size,
        })
    }
}
