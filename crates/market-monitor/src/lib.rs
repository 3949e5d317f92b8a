pub mod assets;
pub mod config;
pub mod dedup;
pub mod monitor;
pub mod rules;

pub use assets::{default_basket, Asset, AssetClass};
pub use config::{MonitorConfig, Thresholds};
pub use dedup::{AlertState, AlertStateStore, DailyDedup, JsonFileStateStore, MemoryStateStore};
pub use monitor::{validate_basket, CycleReport, MarketMonitor, ALERT_TITLE};
pub use rules::{AlertRule, MarketSnapshot, RuleEngine, TriggeredAlert};

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("no asset in the basket returned intraday data")]
    NoMarketData,
    #[error("alert state error: {0}")]
    Persistence(String),
}
