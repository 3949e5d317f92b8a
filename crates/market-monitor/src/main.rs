use std::sync::Arc;

use anyhow::Result;
use market_data_client::YahooClient;
use market_monitor::{
    default_basket, validate_basket, DailyDedup, JsonFileStateStore, MarketMonitor, MonitorConfig, RuleEngine,
};
use notification_service::NotificationService;
use tokio::signal::unix::SignalKind;
use tokio::time;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    let config = MonitorConfig::from_env()?;
    tracing::info!("Starting market monitor");
    tracing::info!("  Check interval: {} seconds", config.check_interval.as_secs());
    tracing::info!("  Default threshold: {}%", config.thresholds.default);
    tracing::info!("  Alert state: {}", config.alert_state_path.display());

    let provider = Arc::new(YahooClient::new());
    let basket = validate_basket(provider.as_ref(), default_basket()).await;
    if basket.is_empty() {
        tracing::error!("No asset in the basket could be validated, exiting");
        std::process::exit(1);
    }
    tracing::info!(
        "Watching {}",
        basket
            .iter()
            .map(|a| format!("{} ({})", a.name, a.symbol))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let engine = RuleEngine::new(
        config.thresholds.clone(),
        config.vix_spike_percent,
        config.broad_selloff_ratio,
    );
    let dedup = DailyDedup::new(Arc::new(JsonFileStateStore::new(&config.alert_state_path)));
    let notifier = NotificationService::new(&config.notifications);

    let mut monitor = MarketMonitor::new(provider, basket, engine, dedup, notifier)
        .with_ma_windows(config.ma_short_window, config.ma_long_window)
        .with_alert_log(&config.alert_log_path);

    let mut interval = time::interval(config.check_interval);
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = monitor.run_cycle().await {
                    tracing::error!("Error in monitor cycle: {}", e);
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting...");
                break;
            }
        }
    }

    Ok(())
}
