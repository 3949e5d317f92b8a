use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use analysis_core::PriceHistoryProvider;
use notification_service::{Alert, AssetMove, EmailTemplate, NotificationService, TriggeredRule};
use technical_analysis::{closes, intraday_change_percent, is_death_cross};

use crate::assets::{Asset, RISK_ASSETS, SAFE_HAVENS, SP500};
use crate::dedup::DailyDedup;
use crate::rules::{MarketSnapshot, RuleEngine, TriggeredAlert};
use crate::MonitorError;

pub const ALERT_TITLE: &str = "Market Alert";

/// Keeps the basket entries whose symbol returns at least one daily bar.
pub async fn validate_basket(provider: &dyn PriceHistoryProvider, basket: Vec<Asset>) -> Vec<Asset> {
    let mut valid = Vec::with_capacity(basket.len());
    for asset in basket {
        match provider.daily_bars(&asset.symbol, 5).await {
            Ok(bars) if !bars.is_empty() => valid.push(asset),
            Ok(_) => tracing::warn!("{} ({}) returned no data, dropping it", asset.name, asset.symbol),
            Err(e) => tracing::warn!("{} ({}) is not usable, dropping it: {}", asset.name, asset.symbol, e),
        }
    }
    valid
}

/// What one cycle observed and did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub changes: BTreeMap<String, f64>,
    pub triggered: Vec<TriggeredAlert>,
    /// Triggered rules that passed the daily dedup.
    pub sent: Vec<TriggeredAlert>,
    /// Channels that accepted the alert.
    pub delivered: usize,
}

pub struct MarketMonitor {
    provider: Arc<dyn PriceHistoryProvider>,
    basket: Vec<Asset>,
    engine: RuleEngine,
    dedup: DailyDedup,
    notifier: NotificationService,
    alert_log_path: Option<PathBuf>,
    ma_short_window: usize,
    ma_long_window: usize,
}

impl MarketMonitor {
    pub fn new(
        provider: Arc<dyn PriceHistoryProvider>,
        basket: Vec<Asset>,
        engine: RuleEngine,
        dedup: DailyDedup,
        notifier: NotificationService,
    ) -> Self {
        Self {
            provider,
            basket,
            engine,
            dedup,
            notifier,
            alert_log_path: None,
            ma_short_window: 50,
            ma_long_window: 200,
        }
    }

    pub fn with_ma_windows(mut self, short: usize, long: usize) -> Self {
        self.ma_short_window = short;
        self.ma_long_window = long;
        self
    }

    pub fn with_alert_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.alert_log_path = Some(path.into());
        self
    }

    pub fn basket(&self) -> &[Asset] {
        &self.basket
    }

    /// Intraday percent change per asset. Assets whose bars cannot be fetched
    /// or are empty are left out.
    pub async fn collect_changes(&self) -> BTreeMap<String, f64> {
        let mut changes = BTreeMap::new();
        for asset in &self.basket {
            match self.provider.intraday_bars(&asset.symbol).await {
                Ok(bars) => match intraday_change_percent(&bars) {
                    Some(change) => {
                        tracing::info!("{}: {:+.2}%", asset.name, change);
                        changes.insert(asset.name.clone(), change);
                    }
                    None => tracing::warn!("{}: no intraday data", asset.name),
                },
                Err(e) => tracing::warn!("{}: failed to fetch intraday bars: {}", asset.name, e),
            }
        }
        changes
    }

    /// Death cross on the S&P500 daily closes. False when the index is not in the
    /// basket or its history cannot be fetched.
    pub async fn sp500_death_cross(&self) -> bool {
        self.check_death_cross().await.unwrap_or(false)
    }

    /// `None` when no S&P500 daily history could be loaded.
    async fn check_death_cross(&self) -> Option<bool> {
        let sp500 = self.basket.iter().find(|a| a.name == SP500)?;
        let days = (self.ma_long_window as u32 * 2).max(365);
        match self.provider.daily_bars(&sp500.symbol, days).await {
            Ok(bars) if !bars.is_empty() => Some(is_death_cross(
                &closes(&bars),
                self.ma_short_window,
                self.ma_long_window,
            )),
            Ok(_) => {
                tracing::warn!("No {} history for the death cross", SP500);
                None
            }
            Err(e) => {
                tracing::warn!("Could not load {} history for the death cross: {}", SP500, e);
                None
            }
        }
    }

    /// One monitoring pass: fetch, evaluate, dedup, notify.
    ///
    /// All rules are evaluated even without intraday data, since the death cross
    /// only needs daily history. The cycle fails only when neither source answered.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, MonitorError> {
        let changes = self.collect_changes().await;
        let death_cross = self.check_death_cross().await;
        if changes.is_empty() {
            if death_cross.is_none() {
                return Err(MonitorError::NoMarketData);
            }
            tracing::warn!("No intraday data this cycle, evaluating daily history only");
        }

        let snapshot = MarketSnapshot::new(changes.clone()).with_death_cross(death_cross.unwrap_or(false));
        let triggered = self.engine.evaluate(&snapshot);

        let sent: Vec<TriggeredAlert> = triggered
            .iter()
            .filter(|alert| self.dedup.should_send(alert.rule.id()))
            .cloned()
            .collect();

        let mut report = CycleReport {
            changes,
            triggered,
            sent,
            delivered: 0,
        };

        if report.sent.is_empty() {
            tracing::info!("No alerts this cycle");
            return Ok(report);
        }

        let alert = self.build_alert(&report);
        for rule in &alert.rules {
            tracing::info!("Alert {}: {}", rule.rule_id, rule.warning);
        }
        report.delivered = self.notifier.send_alert_async(&alert).await;
        tracing::info!(
            "Sent alert with {} rule(s) to {} of {} channel(s)",
            alert.rules.len(),
            report.delivered,
            self.notifier.channel_count()
        );

        if let Some(path) = &self.alert_log_path {
            if let Err(e) = append_alert_log(path, &alert) {
                tracing::error!("Failed to append to alert log {}: {}", path.display(), e);
            }
        }

        Ok(report)
    }

    fn build_alert(&self, report: &CycleReport) -> Alert {
        let rules = report
            .sent
            .iter()
            .map(|a| TriggeredRule {
                rule_id: a.rule.id().to_string(),
                warning: a.warning.clone(),
                recommendation: a.recommendation.clone(),
            })
            .collect();
        let moves = |names: &[&str]| -> Vec<AssetMove> {
            names
                .iter()
                .map(|name| AssetMove {
                    name: name.to_string(),
                    change_percent: report.changes.get(*name).copied(),
                })
                .collect()
        };
        Alert::new(ALERT_TITLE, rules, moves(&SAFE_HAVENS), moves(&RISK_ASSETS))
    }
}

fn append_alert_log(path: &Path, alert: &Alert) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "[{}] {}\n{}",
        alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        alert.title,
        EmailTemplate::render_text(alert)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::default_basket;
    use crate::config::Thresholds;
    use crate::dedup::MemoryStateStore;
    use analysis_core::{Bar, FixedClock, ValuationError};
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use notification_service::{NotificationChannel, NotificationError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn bar(open: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc::now(),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 1_000.0,
        }
    }

    fn flat_history(n: usize) -> Vec<Bar> {
        (0..n).map(|_| bar(100.0, 100.0)).collect()
    }

    #[derive(Default)]
    struct FakeHistory {
        intraday: HashMap<String, Vec<Bar>>,
        daily: HashMap<String, Vec<Bar>>,
        intraday_calls: AtomicUsize,
    }

    impl FakeHistory {
        fn session(mut self, symbol: &str, open: f64, close: f64) -> Self {
            self.intraday
                .insert(symbol.to_string(), vec![bar(open, open), bar(open, close)]);
            self.daily.entry(symbol.to_string()).or_insert_with(|| flat_history(1));
            self
        }

        fn daily(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
            self.daily.insert(symbol.to_string(), bars);
            self
        }
    }

    #[async_trait]
    impl PriceHistoryProvider for FakeHistory {
        async fn intraday_bars(&self, symbol: &str) -> Result<Vec<Bar>, ValuationError> {
            self.intraday_calls.fetch_add(1, Ordering::SeqCst);
            self.intraday
                .get(symbol)
                .cloned()
                .ok_or_else(|| ValuationError::ProviderError(format!("no route to {}", symbol)))
        }

        async fn daily_bars(&self, symbol: &str, _days: u32) -> Result<Vec<Bar>, ValuationError> {
            self.daily
                .get(symbol)
                .cloned()
                .ok_or_else(|| ValuationError::data_unavailable(symbol, "unknown symbol"))
        }
    }

    struct RecordingChannel {
        alerts: Arc<Mutex<Vec<Alert>>>,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    /// Safe havens bid, equities and crypto offered.
    fn flight_to_safety() -> FakeHistory {
        FakeHistory::default()
            .session("GLD", 100.0, 101.5)
            .session("TLT", 100.0, 101.0)
            .session("UUP", 100.0, 100.8)
            .session("^VIX", 20.0, 21.2)
            .session("^GSPC", 5000.0, 4950.0)
            .session("BTC-USD", 60000.0, 58800.0)
    }

    fn monitor(provider: FakeHistory, clock: Arc<FixedClock>) -> (MarketMonitor, Arc<Mutex<Vec<Alert>>>) {
        let alerts = Arc::new(Mutex::new(Vec::new()));
        let notifier = NotificationService::with_channels(vec![Box::new(RecordingChannel {
            alerts: alerts.clone(),
        })]);
        let dedup = DailyDedup::new(Arc::new(MemoryStateStore::default())).with_clock(clock);
        let monitor = MarketMonitor::new(
            Arc::new(provider),
            default_basket(),
            RuleEngine::new(Thresholds::uniform(0.5), 10.0, 0.7),
            dedup,
            notifier,
        );
        (monitor, alerts)
    }

    fn day() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()))
    }

    #[tokio::test]
    async fn test_cycle_sends_one_bundled_alert() {
        let (mut monitor, alerts) = monitor(flight_to_safety(), day());

        let report = monitor.run_cycle().await.unwrap();

        assert_eq!(report.changes["Gold"], 1.5);
        assert_eq!(report.changes["S&P500"], -1.0);
        let ids: Vec<&str> = report.sent.iter().map(|a| a.rule.id()).collect();
        assert_eq!(ids, vec!["safe_havens_rally", "sp500_drop_with_safe_havens"]);
        assert_eq!(report.delivered, 1);

        let alerts = alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, ALERT_TITLE);
        assert_eq!(alerts[0].rules.len(), 2);
        let names: Vec<&str> = alerts[0].safe_havens.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Gold", "Bonds", "Dollar", "VIX"]);
        assert_eq!(alerts[0].risk_assets[1].change_percent, Some(-2.0));
    }

    #[tokio::test]
    async fn test_repeat_rules_are_suppressed_until_next_day() {
        let clock = day();
        let (mut monitor, alerts) = monitor(flight_to_safety(), clock.clone());

        monitor.run_cycle().await.unwrap();
        let second = monitor.run_cycle().await.unwrap();
        assert_eq!(second.triggered.len(), 2);
        assert!(second.sent.is_empty());
        assert_eq!(alerts.lock().unwrap().len(), 1);

        clock.advance_days(1);
        let third = monitor.run_cycle().await.unwrap();
        assert_eq!(third.sent.len(), 2);
        assert_eq!(alerts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_asset_counts_as_unchanged() {
        let mut provider = flight_to_safety();
        provider.intraday.remove("UUP");
        let (mut monitor, alerts) = monitor(provider, day());

        let report = monitor.run_cycle().await.unwrap();

        assert!(!report.changes.contains_key("Dollar"));
        // Dollar now counts as unchanged, so the safe-haven rules no longer hold.
        assert!(report.triggered.is_empty());
        assert!(alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_data_is_cycle_error() {
        let (mut monitor, alerts) = monitor(FakeHistory::default(), day());
        assert!(matches!(monitor.run_cycle().await, Err(MonitorError::NoMarketData)));
        assert!(alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_death_cross_rule_from_daily_history() {
        let mut closes = vec![100.0; 10];
        closes.extend([101.0, 102.0, 103.0, 104.0, 60.0]);
        let history = closes.into_iter().map(|c| bar(c, c)).collect();
        let provider = FakeHistory::default()
            .session("^GSPC", 5000.0, 5001.0)
            .daily("^GSPC", history);
        let (monitor, _) = monitor(provider, day());
        let mut monitor = monitor.with_ma_windows(3, 10);

        let report = monitor.run_cycle().await.unwrap();
        let ids: Vec<&str> = report.sent.iter().map(|a| a.rule.id()).collect();
        assert_eq!(ids, vec!["sp500_death_cross"]);
    }

    #[tokio::test]
    async fn test_death_cross_checked_without_intraday_data() {
        let mut closes = vec![100.0; 10];
        closes.extend([101.0, 102.0, 103.0, 104.0, 60.0]);
        let provider = FakeHistory::default().daily("^GSPC", closes.into_iter().map(|c| bar(c, c)).collect());
        let (monitor, alerts) = monitor(provider, day());
        let mut monitor = monitor.with_ma_windows(3, 10);

        let report = monitor.run_cycle().await.unwrap();

        assert!(report.changes.is_empty());
        let ids: Vec<&str> = report.sent.iter().map(|a| a.rule.id()).collect();
        assert_eq!(ids, vec!["sp500_death_cross"]);
        assert_eq!(report.delivered, 1);
        let alerts = alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].risk_assets.iter().all(|m| m.change_percent.is_none()));
    }

    #[tokio::test]
    async fn test_daily_history_without_cross_is_quiet_cycle() {
        let provider = FakeHistory::default().daily("^GSPC", flat_history(30));
        let (monitor, alerts) = monitor(provider, day());
        let mut monitor = monitor.with_ma_windows(3, 10);

        let report = monitor.run_cycle().await.unwrap();
        assert!(report.triggered.is_empty());
        assert!(alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_alert_log_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("logs").join("alerts.log");
        let (monitor, _) = monitor(flight_to_safety(), day());
        let mut monitor = monitor.with_alert_log(&log);

        monitor.run_cycle().await.unwrap();

        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("Market Alert"));
        assert!(text.contains("WARNING: "));
        assert!(text.contains("  Gold: +1.50%"));
        assert!(text.contains("  Bitcoin: -2.00%"));
    }

    #[tokio::test]
    async fn test_validate_basket_drops_unknown_symbols() {
        let provider = FakeHistory::default()
            .daily("GLD", flat_history(3))
            .daily("TLT", Vec::new());
        let valid = validate_basket(&provider, default_basket()).await;
        let names: Vec<&str> = valid.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Gold"]);
        assert_eq!(provider.intraday_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validate_basket_with_no_usable_symbol_is_empty() {
        let provider = FakeHistory::default()
            .daily("GLD", Vec::new())
            .daily("^GSPC", Vec::new());
        let valid = validate_basket(&provider, default_basket()).await;
        assert!(valid.is_empty());
    }
}
