use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::{Clock, ExchangeRateProvider, SystemClock, ValuationError};

use crate::store::{ExchangeRateEntry, RateStore};

/// Currency every cross-rate is derived through.
pub const DEFAULT_PIVOT: &str = "EUR";

/// Rate returned when no quote exists by any path.
const NEUTRAL_RATE: f64 = 1.0;

/// How a quote was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    /// `from == to`; no lookup performed.
    Identity,
    /// In-memory entry already refreshed today.
    CachedToday,
    /// Fetched from the provider during this call.
    Fresh,
    /// Provider failed; an older entry was reused.
    Stale,
    /// Provider failed and no entry existed; neutral rate.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateQuote {
    pub rate: f64,
    pub source: RateSource,
}

type PairKey = (String, String);

/// Exchange-rate table with daily refresh and a stale-then-neutral fallback chain.
///
/// The table is loaded from the store lazily on the first lookup that needs it and
/// written back in full after every successful refresh. Access is expected to be
/// sequential; concurrent writers to the same store race (last writer wins).
pub struct CurrencyCache {
    provider: Arc<dyn ExchangeRateProvider>,
    store: Arc<dyn RateStore>,
    clock: Arc<dyn Clock>,
    pivot: String,
    entries: BTreeMap<PairKey, ExchangeRateEntry>,
    loaded: bool,
}

impl CurrencyCache {
    pub fn new(provider: Arc<dyn ExchangeRateProvider>, store: Arc<dyn RateStore>) -> Self {
        Self {
            provider,
            store,
            clock: Arc::new(SystemClock),
            pivot: DEFAULT_PIVOT.to_string(),
            entries: BTreeMap::new(),
            loaded: false,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_pivot(mut self, pivot: &str) -> Self {
        self.pivot = normalize_code(pivot);
        self
    }

    /// Reads the persisted table into memory. Runs once per cache instance; a store
    /// failure leaves the in-memory table empty but usable.
    pub fn load(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        match self.store.load() {
            Ok(rows) => {
                for row in rows {
                    let key = (normalize_code(&row.currency_from), normalize_code(&row.currency_to));
                    self.entries.insert(key, row);
                }
                tracing::debug!("Loaded {} persisted exchange rates", self.entries.len());
            }
            Err(e) => {
                tracing::error!("Could not load exchange-rate table, starting empty: {}", e);
            }
        }
    }

    /// The in-memory entry for a pair, whatever its age.
    pub fn get(&self, from: &str, to: &str) -> Option<&ExchangeRateEntry> {
        self.entries.get(&(normalize_code(from), normalize_code(to)))
    }

    /// Records a rate as refreshed today. Does not persist; see [`flush`](Self::flush).
    pub fn put(&mut self, from: &str, to: &str, rate: f64) {
        let (from, to) = (normalize_code(from), normalize_code(to));
        let entry = ExchangeRateEntry {
            currency_from: from.clone(),
            currency_to: to.clone(),
            rate,
            last_updated: self.clock.today(),
        };
        self.entries.insert((from, to), entry);
    }

    /// Rewrites the backing store with the whole in-memory table.
    pub fn flush(&self) -> Result<(), ValuationError> {
        let rows: Vec<ExchangeRateEntry> = self.entries.values().cloned().collect();
        self.store.save(&rows)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Conversion factor from `from` to `to`. Never fails: see [`quote`](Self::quote).
    pub async fn rate(&mut self, from: &str, to: &str) -> f64 {
        self.quote(from, to).await.rate
    }

    /// Resolves a rate through the full chain: identity, today's entry, provider,
    /// stale entry, neutral 1.0.
    pub async fn quote(&mut self, from: &str, to: &str) -> RateQuote {
        match self.try_quote(from, to).await {
            Ok(quote) => quote,
            Err(e) => {
                tracing::error!(
                    "No exchange rate for {}->{} ({}), using neutral rate {}",
                    from,
                    to,
                    e,
                    NEUTRAL_RATE
                );
                RateQuote {
                    rate: NEUTRAL_RATE,
                    source: RateSource::Fallback,
                }
            }
        }
    }

    /// Like [`quote`](Self::quote) but surfaces `RateUnavailable` instead of the
    /// neutral rate when neither the provider nor the table can answer.
    pub async fn try_quote(&mut self, from: &str, to: &str) -> Result<RateQuote, ValuationError> {
        let (from, to) = (normalize_code(from), normalize_code(to));
        if from == to {
            return Ok(RateQuote {
                rate: 1.0,
                source: RateSource::Identity,
            });
        }

        self.load();
        let today = self.clock.today();
        let key = (from.clone(), to.clone());

        if let Some(entry) = self.entries.get(&key) {
            if entry.last_updated == today {
                return Ok(RateQuote {
                    rate: entry.rate,
                    source: RateSource::CachedToday,
                });
            }
        }

        match self.fetch_cross_rate(&from, &to).await {
            Ok(rate) => {
                self.put(&from, &to, rate);
                if let Err(e) = self.flush() {
                    tracing::error!("Failed to persist exchange-rate table: {}", e);
                }
                tracing::debug!("Refreshed {}->{} = {}", from, to, rate);
                Ok(RateQuote {
                    rate,
                    source: RateSource::Fresh,
                })
            }
            Err(e) => match self.entries.get(&key) {
                Some(entry) => {
                    tracing::warn!(
                        "Exchange-rate refresh for {}->{} failed ({}), reusing rate {} from {}",
                        from,
                        to,
                        e,
                        entry.rate,
                        entry.last_updated
                    );
                    Ok(RateQuote {
                        rate: entry.rate,
                        source: RateSource::Stale,
                    })
                }
                None => Err(ValuationError::RateUnavailable { from, to }),
            },
        }
    }

    /// One provider request for both legs against the pivot; result rounded to 3 decimals.
    async fn fetch_cross_rate(&self, from: &str, to: &str) -> Result<f64, ValuationError> {
        let symbols: Vec<&str> = [from, to]
            .into_iter()
            .filter(|code| *code != self.pivot)
            .collect();

        let quotes = if symbols.is_empty() {
            Default::default()
        } else {
            self.provider.latest_rates(&self.pivot, &symbols).await?
        };

        let leg = |code: &str| -> Result<f64, ValuationError> {
            if code == self.pivot {
                return Ok(1.0);
            }
            quotes
                .get(code)
                .copied()
                .filter(|r| r.is_finite() && *r > 0.0)
                .ok_or_else(|| {
                    ValuationError::ProviderError(format!("no usable quote for {} against {}", code, self.pivot))
                })
        };

        let pivot_to_from = leg(from)?;
        let pivot_to_to = leg(to)?;
        Ok(round_to(pivot_to_to / pivot_to_from, 3))
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRateStore;
    use analysis_core::FixedClock;
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRates {
        quotes: HashMap<String, f64>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeRates {
        fn quoting(pairs: &[(&str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                quotes: pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                quotes: HashMap::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExchangeRateProvider for FakeRates {
        async fn latest_rates(
            &self,
            _pivot: &str,
            symbols: &[&str],
        ) -> Result<HashMap<String, f64>, ValuationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ValuationError::ProviderError("service unreachable".into()));
            }
            Ok(symbols
                .iter()
                .filter_map(|s| self.quotes.get(*s).map(|r| (s.to_string(), *r)))
                .collect())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn entry(from: &str, to: &str, rate: f64, last_updated: NaiveDate) -> ExchangeRateEntry {
        ExchangeRateEntry {
            currency_from: from.to_string(),
            currency_to: to.to_string(),
            rate,
            last_updated,
        }
    }

    fn cache_with(
        provider: Arc<FakeRates>,
        store: Arc<MemoryRateStore>,
        clock: Arc<FixedClock>,
    ) -> CurrencyCache {
        CurrencyCache::new(provider, store).with_clock(clock)
    }

    #[tokio::test]
    async fn test_same_currency_is_identity_without_provider_call() {
        let provider = FakeRates::failing();
        let store = Arc::new(MemoryRateStore::default());
        let mut cache = cache_with(provider.clone(), store, Arc::new(FixedClock::new(day(10))));

        let quote = cache.quote("USD", "usd").await;
        assert_eq!(quote.rate, 1.0);
        assert_eq!(quote.source, RateSource::Identity);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_entry_dated_today_skips_provider() {
        let provider = FakeRates::quoting(&[("GBP", 0.85), ("USD", 1.08)]);
        let store = Arc::new(MemoryRateStore::new(vec![entry("GBP", "USD", 1.271, day(10))]));
        let mut cache = cache_with(provider.clone(), store.clone(), Arc::new(FixedClock::new(day(10))));

        let quote = cache.quote("GBP", "USD").await;
        assert_eq!(quote.rate, 1.271);
        assert_eq!(quote.source, RateSource::CachedToday);
        assert_eq!(provider.calls(), 0);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_entry_refreshes_through_pivot_and_persists() {
        let provider = FakeRates::quoting(&[("MXN", 20.0), ("USD", 1.1)]);
        let store = Arc::new(MemoryRateStore::new(vec![entry("MXN", "USD", 0.05, day(9))]));
        let mut cache = cache_with(provider.clone(), store.clone(), Arc::new(FixedClock::new(day(10))));

        let quote = cache.quote("MXN", "USD").await;
        assert_relative_eq!(quote.rate, 0.055, epsilon = 1e-12);
        assert_eq!(quote.source, RateSource::Fresh);
        assert_eq!(provider.calls(), 1);

        assert_eq!(store.save_count(), 1);
        assert_eq!(store.snapshot(), vec![entry("MXN", "USD", 0.055, day(10))]);

        // Second lookup the same day is served from memory.
        let again = cache.quote("MXN", "USD").await;
        assert_eq!(again.source, RateSource::CachedToday);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_cross_rate_rounds_to_three_decimals() {
        let provider = FakeRates::quoting(&[("JPY", 163.27), ("USD", 1.0843)]);
        let store = Arc::new(MemoryRateStore::default());
        let mut cache = cache_with(provider, store, Arc::new(FixedClock::new(day(10))));

        // 1.0843 / 163.27 = 0.006641... -> 0.007
        assert_eq!(cache.rate("JPY", "USD").await, 0.007);
    }

    #[tokio::test]
    async fn test_pivot_leg_is_not_requested() {
        let provider = FakeRates::quoting(&[("USD", 1.08)]);
        let store = Arc::new(MemoryRateStore::default());
        let mut cache = cache_with(provider.clone(), store, Arc::new(FixedClock::new(day(10))));

        assert_eq!(cache.rate("EUR", "USD").await, 1.08);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_provider_returns_stale_value() {
        let provider = FakeRates::failing();
        let store = Arc::new(MemoryRateStore::new(vec![entry("CHF", "USD", 1.12, day(9))]));
        let mut cache = cache_with(provider.clone(), store.clone(), Arc::new(FixedClock::new(day(10))));

        let quote = cache.quote("CHF", "USD").await;
        assert_eq!(quote.rate, 1.12);
        assert_eq!(quote.source, RateSource::Stale);
        assert_eq!(provider.calls(), 1);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_provider_without_entry_falls_back_to_neutral() {
        let provider = FakeRates::failing();
        let store = Arc::new(MemoryRateStore::default());
        let mut cache = cache_with(provider, store, Arc::new(FixedClock::new(day(10))));

        let quote = cache.quote("BRL", "USD").await;
        assert_eq!(quote.rate, 1.0);
        assert_eq!(quote.source, RateSource::Fallback);

        let err = cache.try_quote("BRL", "USD").await.unwrap_err();
        assert_eq!(
            err,
            ValuationError::RateUnavailable {
                from: "BRL".into(),
                to: "USD".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unquoted_currency_is_a_provider_failure() {
        let provider = FakeRates::quoting(&[("USD", 1.08)]);
        let store = Arc::new(MemoryRateStore::new(vec![entry("XYZ", "USD", 0.5, day(1))]));
        let mut cache = cache_with(provider, store, Arc::new(FixedClock::new(day(10))));

        let quote = cache.quote("XYZ", "USD").await;
        assert_eq!(quote.source, RateSource::Stale);
        assert_eq!(quote.rate, 0.5);
    }

    #[tokio::test]
    async fn test_day_change_triggers_refresh() {
        let provider = FakeRates::quoting(&[("GBP", 0.8), ("USD", 1.0)]);
        let store = Arc::new(MemoryRateStore::default());
        let clock = Arc::new(FixedClock::new(day(10)));
        let mut cache = cache_with(provider.clone(), store, clock.clone());

        cache.rate("GBP", "USD").await;
        cache.rate("GBP", "USD").await;
        assert_eq!(provider.calls(), 1);

        clock.advance_days(1);
        cache.rate("GBP", "USD").await;
        assert_eq!(provider.calls(), 2);
        assert_eq!(cache.get("GBP", "USD").unwrap().last_updated, day(11));
    }

    #[tokio::test]
    async fn test_store_loaded_once_and_other_pairs_survive_flush() {
        let provider = FakeRates::quoting(&[("GBP", 0.8), ("USD", 1.0), ("CAD", 1.5)]);
        let store = Arc::new(MemoryRateStore::new(vec![entry("CAD", "USD", 0.7, day(1))]));
        let mut cache = cache_with(provider, store.clone(), Arc::new(FixedClock::new(day(10))));

        cache.rate("GBP", "USD").await;
        let persisted = store.snapshot();
        assert_eq!(persisted.len(), 2);
        assert!(persisted.contains(&entry("CAD", "USD", 0.7, day(1))));
        assert!(persisted.contains(&entry("GBP", "USD", 1.25, day(10))));
    }

    #[tokio::test]
    async fn test_unwritable_store_keeps_serving_from_memory() {
        let provider = FakeRates::quoting(&[("JPY", 150.0), ("USD", 1.2)]);
        let store = Arc::new(MemoryRateStore::read_only(Vec::new()));
        let mut cache = cache_with(provider.clone(), store.clone(), Arc::new(FixedClock::new(day(10))));

        let first = cache.quote("JPY", "USD").await;
        assert_eq!(first.source, RateSource::Fresh);
        assert_relative_eq!(first.rate, 0.008, epsilon = 1e-12);

        let second = cache.quote("JPY", "USD").await;
        assert_eq!(second.source, RateSource::CachedToday);
        assert_eq!(second.rate, first.rate);
        assert_eq!(provider.calls(), 1);
        assert_eq!(store.save_count(), 0);
        assert!(store.snapshot().is_empty());
    }
}
