//! Threshold table used by the scoring engine.
//!
//! Each row awards points when an indicator falls inside a band. Bands for the same
//! indicator are disjoint, so at most one row per indicator applies. Missing
//! indicators match no row.

use serde::{Deserialize, Serialize};

use crate::normalizer::NormalizedIndicators;

/// Indicators that carry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indicator {
    Peg,
    EvToEbitda,
    PeRatio,
    DividendYield,
    DebtToEquity,
    RevenueGrowth,
    FreeCashFlow,
    ReturnOnEquity,
    Beta,
}

impl Indicator {
    pub const ALL: [Indicator; 9] = [
        Indicator::Peg,
        Indicator::EvToEbitda,
        Indicator::PeRatio,
        Indicator::DividendYield,
        Indicator::DebtToEquity,
        Indicator::RevenueGrowth,
        Indicator::FreeCashFlow,
        Indicator::ReturnOnEquity,
        Indicator::Beta,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Indicator::Peg => "PEG",
            Indicator::EvToEbitda => "EV/EBITDA",
            Indicator::PeRatio => "P/E",
            Indicator::DividendYield => "Dividend Yield %",
            Indicator::DebtToEquity => "Debt/Equity %",
            Indicator::RevenueGrowth => "Revenue Growth %",
            Indicator::FreeCashFlow => "FCF",
            Indicator::ReturnOnEquity => "ROE %",
            Indicator::Beta => "Beta",
        }
    }

    pub fn value(&self, ind: &NormalizedIndicators) -> Option<f64> {
        match self {
            Indicator::Peg => ind.peg_ratio,
            Indicator::EvToEbitda => ind.ev_to_ebitda,
            Indicator::PeRatio => ind.pe_ratio,
            Indicator::DividendYield => ind.dividend_yield_percent,
            Indicator::DebtToEquity => ind.debt_to_equity_percent,
            Indicator::RevenueGrowth => ind.revenue_growth_percent,
            Indicator::FreeCashFlow => ind.fcf_per_share,
            Indicator::ReturnOnEquity => ind.roe_percent,
            Indicator::Beta => ind.beta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Unbounded,
    Inclusive(f64),
    Exclusive(f64),
}

/// A half-open, closed or open interval on the real line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub lower: Bound,
    pub upper: Bound,
}

impl Band {
    pub const fn new(lower: Bound, upper: Bound) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, value: f64) -> bool {
        let above_lower = match self.lower {
            Bound::Unbounded => true,
            Bound::Inclusive(l) => value >= l,
            Bound::Exclusive(l) => value > l,
        };
        let below_upper = match self.upper {
            Bound::Unbounded => true,
            Bound::Inclusive(u) => value <= u,
            Bound::Exclusive(u) => value < u,
        };
        above_lower && below_upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringRule {
    pub indicator: Indicator,
    pub band: Band,
    pub points: i32,
}

use Bound::{Exclusive as Ex, Inclusive as In, Unbounded as Any};

const fn rule(indicator: Indicator, lower: Bound, upper: Bound, points: i32) -> ScoringRule {
    ScoringRule {
        indicator,
        band: Band::new(lower, upper),
        points,
    }
}

pub const SCORING_RULES: &[ScoringRule] = &[
    rule(Indicator::Peg, Any, Ex(0.0), -1),
    rule(Indicator::Peg, In(0.0), Ex(1.0), 3),
    rule(Indicator::Peg, In(1.0), In(2.0), 2),
    rule(Indicator::Peg, Ex(2.0), Any, 0),
    rule(Indicator::EvToEbitda, Any, Ex(8.0), 3),
    rule(Indicator::EvToEbitda, In(8.0), In(12.0), 2),
    rule(Indicator::EvToEbitda, Ex(12.0), Any, 0),
    rule(Indicator::PeRatio, Any, Ex(15.0), 3),
    rule(Indicator::PeRatio, In(15.0), In(20.0), 2),
    rule(Indicator::PeRatio, Ex(20.0), In(50.0), 0),
    rule(Indicator::PeRatio, Ex(50.0), Any, -1),
    rule(Indicator::DividendYield, Ex(3.0), Any, 2),
    rule(Indicator::DividendYield, In(1.0), In(3.0), 1),
    rule(Indicator::DividendYield, Any, Ex(1.0), 0),
    rule(Indicator::DebtToEquity, Any, Ex(50.0), 2),
    rule(Indicator::DebtToEquity, In(50.0), In(100.0), 1),
    rule(Indicator::DebtToEquity, Ex(100.0), Any, -1),
    rule(Indicator::RevenueGrowth, Ex(10.0), Any, 3),
    rule(Indicator::RevenueGrowth, In(5.0), In(10.0), 2),
    rule(Indicator::RevenueGrowth, In(0.0), Ex(5.0), 1),
    rule(Indicator::RevenueGrowth, Any, Ex(0.0), 0),
    rule(Indicator::FreeCashFlow, Ex(0.0), Any, 2),
    rule(Indicator::FreeCashFlow, Any, In(0.0), 0),
    rule(Indicator::ReturnOnEquity, Ex(15.0), Any, 3),
    rule(Indicator::ReturnOnEquity, In(10.0), In(15.0), 2),
    rule(Indicator::ReturnOnEquity, In(5.0), Ex(10.0), 1),
    rule(Indicator::ReturnOnEquity, Any, Ex(5.0), 0),
    rule(Indicator::Beta, Any, Ex(1.0), 2),
    rule(Indicator::Beta, In(1.0), In(1.5), 1),
    rule(Indicator::Beta, Ex(1.5), Any, 0),
];

/// First row of `rules` for `indicator` whose band contains `value`.
pub fn matching_rule(rules: &[ScoringRule], indicator: Indicator, value: f64) -> Option<&ScoringRule> {
    rules
        .iter()
        .find(|r| r.indicator == indicator && r.band.contains(value))
}
