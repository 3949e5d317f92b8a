use std::collections::HashMap;

use async_trait::async_trait;

use crate::{Bar, RawIndicatorSet, ValuationError};

/// Source of per-symbol fundamental field bags.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_indicators(&self, symbol: &str) -> Result<RawIndicatorSet, ValuationError>;
}

/// Source of quotes expressed against a pivot currency.
#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    /// Returns units of each requested currency per one unit of `pivot`.
    async fn latest_rates(
        &self,
        pivot: &str,
        symbols: &[&str],
    ) -> Result<HashMap<String, f64>, ValuationError>;
}

/// Source of OHLCV history for macro assets.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// One-minute bars for the current session.
    async fn intraday_bars(&self, symbol: &str) -> Result<Vec<Bar>, ValuationError>;

    /// Daily bars covering roughly the last `days` calendar days.
    async fn daily_bars(&self, symbol: &str, days: u32) -> Result<Vec<Bar>, ValuationError>;
}
