use std::path::Path;

use anyhow::{Context, Result};

const TICKER_COLUMN: &str = "Ticker";

/// Reads the `Ticker` column of a CSV file. Values are trimmed and upper-cased;
/// blank cells are skipped.
pub fn load_tickers(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("cannot open ticker list {}", path.display()))?;

    let column = reader
        .headers()
        .with_context(|| format!("cannot read header of {}", path.display()))?
        .iter()
        .position(|h| h == TICKER_COLUMN)
        .with_context(|| format!("{} has no '{}' column", path.display(), TICKER_COLUMN))?;

    let mut tickers = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping unreadable row {} of {}: {}", line + 2, path.display(), e);
                continue;
            }
        };
        if let Some(ticker) = record.get(column).map(str::trim).filter(|t| !t.is_empty()) {
            tickers.push(ticker.to_ascii_uppercase());
        }
    }

    Ok(tickers)
}
