use std::cmp::Ordering;

use fundamental_analysis::{NormalizedIndicators, ScoreResult};

/// Value substituted for a missing ROE or P/E when breaking ties.
///
/// The same stand-in is used for both keys even though one sorts descending and
/// the other ascending: a missing ROE ranks below any real ROE, while a missing
/// P/E ranks ahead of any positive P/E.
const MISSING_TIE_BREAK: f64 = -1.0;

/// Orders results by score (desc), then ROE % (desc), then P/E (asc).
/// The sort is stable and runs on the values as scored, before display rounding.
pub fn rank(results: &mut [ScoreResult]) {
    results.sort_by(compare);
}

fn compare(a: &ScoreResult, b: &ScoreResult) -> Ordering {
    let roe = |r: &ScoreResult| r.indicators.roe_percent.unwrap_or(MISSING_TIE_BREAK);
    let pe = |r: &ScoreResult| r.indicators.pe_ratio.unwrap_or(MISSING_TIE_BREAK);

    b.score_points
        .cmp(&a.score_points)
        .then_with(|| roe(b).total_cmp(&roe(a)))
        .then_with(|| pe(a).total_cmp(&pe(b)))
}

/// Rounds the displayed figures: FCF and market cap to whole units, every other
/// field to two decimals. Missing values stay missing.
pub fn round_for_display(indicators: &mut NormalizedIndicators) {
    let round = |value: &mut Option<f64>, decimals: i32| {
        if let Some(v) = value.as_mut() {
            let factor = 10f64.powi(decimals);
            *v = (*v * factor).round() / factor;
        }
    };

    round(&mut indicators.fcf_per_share, 0);
    round(&mut indicators.market_cap_millions, 0);
    for field in [
        &mut indicators.price,
        &mut indicators.book_value,
        &mut indicators.intrinsic_value,
        &mut indicators.pe_ratio,
        &mut indicators.peg_ratio,
        &mut indicators.ev_to_ebitda,
        &mut indicators.roe_percent,
        &mut indicators.net_margin_percent,
        &mut indicators.operating_margin_percent,
        &mut indicators.dividend_yield_percent,
        &mut indicators.beta,
        &mut indicators.debt_to_equity_percent,
        &mut indicators.revenue_growth_percent,
    ] {
        round(field, 2);
    }
}
