use std::sync::Arc;

use anyhow::{Context, Result};
use currency_cache::{CsvRateStore, CurrencyCache};
use fundamental_analysis::FundamentalAnalysisEngine;
use market_data_client::{FixerClient, YahooClient};
use stock_screener::{load_tickers, rank, round_for_display, write_results, ScreenerConfig, ScreenerPipeline};

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

    let config = ScreenerConfig::from_env()?;
    tracing::info!("Starting stock screener");
    tracing::info!("  Tickers: {}", config.ticker_list_path.display());
    tracing::info!("  Missing values: {}", config.missing_value_policy);
    tracing::info!("  Reporting currency: {}", config.target_currency);
    tracing::info!("  Request delay: {}ms", config.request_delay.as_millis());
    if config.fixer_api_key.is_none() {
        tracing::warn!("FIXER_API_KEY not set; foreign currencies use stored or neutral rates");
    }

    let mut tickers = load_tickers(&config.ticker_list_path)?;
    if let Some(n) = config.sample_size {
        tickers.truncate(n);
    }
    if tickers.is_empty() {
        tracing::warn!("Ticker list is empty, nothing to do");
        return Ok(());
    }
    tracing::info!("Evaluating {} tickers", tickers.len());

    let rates = CurrencyCache::new(
        Arc::new(FixerClient::new(config.fixer_api_key.clone())),
        Arc::new(CsvRateStore::new(&config.exchange_rates_path)),
    );
    let engine = FundamentalAnalysisEngine::new(config.missing_value_policy)
        .with_target_currency(&config.target_currency);

    let mut pipeline = ScreenerPipeline::new(Arc::new(YahooClient::new()), rates, engine)
        .with_delay(config.request_delay)
        .with_progress(true);

    let summary = pipeline.run(&tickers).await;

    let mut results = summary.results;
    rank(&mut results);
    for result in &mut results {
        round_for_display(&mut result.indicators);
    }

    write_results(&config.results_output_path, &results)
        .with_context(|| format!("failed to save {}", config.results_output_path.display()))?;

    tracing::info!(
        "Saved {} ranked companies to {} ({} failed)",
        results.len(),
        config.results_output_path.display(),
        summary.failures.len()
    );
    Ok(())
}
