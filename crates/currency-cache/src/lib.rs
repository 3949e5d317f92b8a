//! Currency conversion rates with a once-per-day refresh policy.
//!
//! Rates are derived from a single provider call against a pivot currency and kept
//! in an in-memory table that is mirrored, in full, to a backing [`RateStore`].

mod cache;
mod store;

pub use cache::{CurrencyCache, RateQuote, RateSource, DEFAULT_PIVOT};
pub use store::{CsvRateStore, ExchangeRateEntry, MemoryRateStore, RateStore};
