use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use fundamental_analysis::ScoreResult;

pub const RESULT_COLUMNS: [&str; 22] = [
    "Ticker",
    "Name",
    "Sector",
    "Continent",
    "Country",
    "Rating",
    "Score",
    "Price",
    "Book Value",
    "Intrinsic Value",
    "P/E",
    "PEG",
    "EV/EBITDA",
    "ROE (%)",
    "Net Margin (%)",
    "Operating Margin (%)",
    "FCF",
    "Dividend Yield (%)",
    "Beta",
    "Debt/Equity (%)",
    "Revenue Growth (%)",
    "Market Cap (M)",
];

/// Writes the ranked table, replacing any previous file. Missing values become
/// empty cells.
pub fn write_results(path: &Path, results: &[ScoreResult]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("cannot create {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("cannot write results to {}", path.display()))?;
    writer.write_record(RESULT_COLUMNS)?;
    for result in results {
        writer.write_record(row(result))?;
    }
    writer.flush()?;
    Ok(())
}

fn row(r: &ScoreResult) -> Vec<String> {
    let ind = &r.indicators;
    let mut cells = vec![
        r.ticker.clone(),
        r.company_name.clone(),
        r.sector.clone(),
        r.continent.label().to_string(),
        r.country.clone(),
        r.rating.label().to_string(),
        r.score_points.to_string(),
    ];
    cells.extend(
        [
            ind.price,
            ind.book_value,
            ind.intrinsic_value,
            ind.pe_ratio,
            ind.peg_ratio,
            ind.ev_to_ebitda,
            ind.roe_percent,
            ind.net_margin_percent,
            ind.operating_margin_percent,
            ind.fcf_per_share,
            ind.dividend_yield_percent,
            ind.beta,
            ind.debt_to_equity_percent,
            ind.revenue_growth_percent,
            ind.market_cap_millions,
        ]
        .into_iter()
        .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
    );
    cells
}
