use std::sync::Arc;
use std::time::Duration;

use analysis_core::{MarketDataProvider, ValuationError};
use currency_cache::CurrencyCache;
use fundamental_analysis::{FundamentalAnalysisEngine, ScoreResult};
use indicatif::{ProgressBar, ProgressStyle};

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub results: Vec<ScoreResult>,
    pub failures: Vec<(String, ValuationError)>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Scores symbols one at a time, sleeping a fixed delay before every request.
pub struct ScreenerPipeline {
    provider: Arc<dyn MarketDataProvider>,
    rates: CurrencyCache,
    engine: FundamentalAnalysisEngine,
    delay: Duration,
    show_progress: bool,
}

impl ScreenerPipeline {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        rates: CurrencyCache,
        engine: FundamentalAnalysisEngine,
    ) -> Self {
        Self {
            provider,
            rates,
            engine,
            delay: Duration::from_secs(2),
            show_progress: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn rates(&self) -> &CurrencyCache {
        &self.rates
    }

    /// Runs the whole list. A failing symbol is logged and counted, never fatal.
    pub async fn run(&mut self, tickers: &[String]) -> BatchSummary {
        let pb = if self.show_progress {
            let pb = ProgressBar::new(tickers.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut summary = BatchSummary::default();
        for ticker in tickers {
            pb.set_message(ticker.clone());

            match self.evaluate(ticker).await {
                Ok(result) => {
                    tracing::debug!("{}: {} ({} points)", ticker, result.rating, result.score_points);
                    summary.results.push(result);
                }
                Err(e) => {
                    tracing::error!("Failed to evaluate {}: {}", ticker, e);
                    summary.failures.push((ticker.clone(), e));
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message("done");

        tracing::info!(
            "Batch finished: {} succeeded, {} failed",
            summary.succeeded(),
            summary.failed()
        );
        summary
    }

    async fn evaluate(&mut self, ticker: &str) -> Result<ScoreResult, ValuationError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let raw = self.provider.fetch_indicators(ticker).await?;
        if raw.is_empty() {
            return Err(ValuationError::data_unavailable(ticker, "provider returned no fields"));
        }
        self.engine.evaluate_with_rates(&raw, &mut self.rates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{ExchangeRateProvider, RawIndicatorSet};
    use async_trait::async_trait;
    use currency_cache::MemoryRateStore;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeMarketData {
        records: HashMap<String, RawIndicatorSet>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataProvider for FakeMarketData {
        async fn fetch_indicators(&self, symbol: &str) -> Result<RawIndicatorSet, ValuationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match symbol {
                "TIMEOUT" => Err(ValuationError::ProviderError("connection reset".into())),
                _ => Ok(self
                    .records
                    .get(symbol)
                    .cloned()
                    .unwrap_or_else(|| RawIndicatorSet::new(symbol))),
            }
        }
    }

    struct FixedRates;

    #[async_trait]
    impl ExchangeRateProvider for FixedRates {
        async fn latest_rates(
            &self,
            _pivot: &str,
            symbols: &[&str],
        ) -> Result<HashMap<String, f64>, ValuationError> {
            let table = HashMap::from([("USD", 1.1), ("MXN", 20.0)]);
            Ok(symbols
                .iter()
                .filter_map(|s| table.get(s).map(|r| (s.to_string(), *r)))
                .collect())
        }
    }

    fn pipeline(records: Vec<RawIndicatorSet>) -> (ScreenerPipeline, Arc<FakeMarketData>) {
        let provider = Arc::new(FakeMarketData {
            records: records.into_iter().map(|r| (r.symbol.clone(), r)).collect(),
            calls: AtomicUsize::new(0),
        });
        let rates = CurrencyCache::new(Arc::new(FixedRates), Arc::new(MemoryRateStore::default()));
        let pipeline = ScreenerPipeline::new(provider.clone(), rates, FundamentalAnalysisEngine::default())
            .with_delay(Duration::ZERO);
        (pipeline, provider)
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_fatal() {
        let (mut pipeline, provider) = pipeline(vec![
            RawIndicatorSet::new("AAA").with("longName", "Alpha").with("trailingPE", 10.0),
            RawIndicatorSet::new("NONAME").with("trailingPE", 10.0),
            RawIndicatorSet::new("ZZZ").with("longName", "Zulu"),
        ]);
        let tickers: Vec<String> = ["AAA", "TIMEOUT", "NONAME", "EMPTY", "ZZZ"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let summary = pipeline.run(&tickers).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 3);
        let failed: Vec<&str> = summary.failures.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(failed, vec!["TIMEOUT", "NONAME", "EMPTY"]);
        assert!(matches!(summary.failures[0].1, ValuationError::ProviderError(_)));
        assert!(matches!(summary.failures[2].1, ValuationError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_foreign_currency_is_converted() {
        let (mut pipeline, _) = pipeline(vec![RawIndicatorSet::new("WALMEX.MX")
            .with("longName", "Walmart de Mexico")
            .with("financialCurrency", "MXN")
            .with("currentPrice", 60.0)]);

        let summary = pipeline.run(&["WALMEX.MX".to_string()]).await;

        // 1.1 / 20 = 0.055
        assert_eq!(summary.results[0].indicators.price, Some(3.3));
        assert_eq!(pipeline.rates().get("MXN", "USD").map(|e| e.rate), Some(0.055));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_precedes_each_request() {
        let (pipeline, _) = pipeline(vec![]);
        let mut pipeline = pipeline.with_delay(Duration::from_millis(500));
        let tickers = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let start = tokio::time::Instant::now();
        pipeline.run(&tickers).await;
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }
}
