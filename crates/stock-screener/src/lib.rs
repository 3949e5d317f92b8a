//! Batch valuation screener: loads a ticker list, scores every symbol in turn and
//! writes the ranked table to CSV.

pub mod config;
pub mod output;
pub mod pipeline;
pub mod ranking;
pub mod tickers;

pub use config::ScreenerConfig;
pub use output::write_results;
pub use pipeline::{BatchSummary, ScreenerPipeline};
pub use ranking::{rank, round_for_display};
pub use tickers::load_tickers;
