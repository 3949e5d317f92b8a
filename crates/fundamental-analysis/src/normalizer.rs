//! Extraction of the fixed indicator record from a provider field bag.
//!
//! Every field is looked up by its provider key, transformed, and rounded to two
//! decimals. What happens when a field is absent or non-numeric depends on the
//! [`MissingValuePolicy`]:
//!
//! | Indicator | Source key | Transform | `SentinelDefaults` | `Missing` |
//! |---|---|---|---|---|
//! | price | `currentPrice` | × fx | missing | missing |
//! | book value | `bookValue` | × fx | missing | missing |
//! | P/E | `trailingPE` | as is | missing | missing |
//! | EV/EBITDA | `enterpriseToEbitda` | as is | missing | missing |
//! | ROE % | `returnOnEquity` | × 100 | 0.0 | missing |
//! | net margin % | `profitMargins` | × 100 | 0.0 | missing |
//! | operating margin % | `operatingMargins` | × 100 | 0.0 | missing |
//! | FCF | `freeCashflow` | × fx | 0.0 | missing |
//! | dividend yield % | `dividendYield` | × 100 | 0.0 | missing |
//! | beta | `beta` | as is | 1.0 | missing |
//! | debt/equity % | `debtToEquity` | as is | 0.0 | missing |
//! | revenue growth % | `revenueGrowth` | × 100 | 0.0 | missing |
//! | market cap (M) | `marketCap` | × fx ÷ 1e6 | missing | missing |
//!
//! Intrinsic value and PEG are derived afterwards and are missing whenever their
//! inputs are.

use std::fmt;
use std::str::FromStr;

use analysis_core::RawIndicatorSet;
use serde::{Deserialize, Serialize};

use crate::round_to;

/// How absent or non-numeric provider fields are represented.
///
/// The two policies score the same company differently: under `SentinelDefaults`
/// a company with no debt/equity, growth and beta data still collects
/// 2 + 1 + 1 points, under `Missing` it collects none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Rate, margin, growth, FCF and leverage fields default to 0.0, beta to 1.0.
    #[default]
    SentinelDefaults,
    /// Every absent field is marked missing and contributes nothing to the score.
    Missing,
}

impl FromStr for MissingValuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentinel" | "sentinel_defaults" | "defaults" => Ok(Self::SentinelDefaults),
            "missing" | "nan" | "none" => Ok(Self::Missing),
            other => Err(format!("unknown missing-value policy '{}'", other)),
        }
    }
}

impl fmt::Display for MissingValuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SentinelDefaults => write!(f, "sentinel"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

/// Normalized per-symbol indicators. `None` marks a missing value, which is
/// distinct from zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedIndicators {
    pub price: Option<f64>,
    pub book_value: Option<f64>,
    pub intrinsic_value: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub ev_to_ebitda: Option<f64>,
    pub roe_percent: Option<f64>,
    pub net_margin_percent: Option<f64>,
    pub operating_margin_percent: Option<f64>,
    pub fcf_per_share: Option<f64>,
    pub dividend_yield_percent: Option<f64>,
    pub beta: Option<f64>,
    pub debt_to_equity_percent: Option<f64>,
    pub revenue_growth_percent: Option<f64>,
    pub market_cap_millions: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
enum Transform {
    /// Currency-denominated; multiplied by the conversion factor.
    Money,
    /// Currency-denominated, reported in millions.
    MoneyMillions,
    /// Fraction shown as a percentage.
    Percent,
    Ratio,
}

#[derive(Debug, Clone, Copy)]
struct FieldDef {
    key: &'static str,
    transform: Transform,
    sentinel: Option<f64>,
}

const fn field(key: &'static str, transform: Transform, sentinel: Option<f64>) -> FieldDef {
    FieldDef {
        key,
        transform,
        sentinel,
    }
}

const PRICE: FieldDef = field("currentPrice", Transform::Money, None);
const BOOK_VALUE: FieldDef = field("bookValue", Transform::Money, None);
const PE: FieldDef = field("trailingPE", Transform::Ratio, None);
const EV_EBITDA: FieldDef = field("enterpriseToEbitda", Transform::Ratio, None);
const ROE: FieldDef = field("returnOnEquity", Transform::Percent, Some(0.0));
const NET_MARGIN: FieldDef = field("profitMargins", Transform::Percent, Some(0.0));
const OPERATING_MARGIN: FieldDef = field("operatingMargins", Transform::Percent, Some(0.0));
const FREE_CASH_FLOW: FieldDef = field("freeCashflow", Transform::Money, Some(0.0));
const DIVIDEND_YIELD: FieldDef = field("dividendYield", Transform::Percent, Some(0.0));
const BETA: FieldDef = field("beta", Transform::Ratio, Some(1.0));
const DEBT_TO_EQUITY: FieldDef = field("debtToEquity", Transform::Ratio, Some(0.0));
const REVENUE_GROWTH: FieldDef = field("revenueGrowth", Transform::Percent, Some(0.0));
const MARKET_CAP: FieldDef = field("marketCap", Transform::MoneyMillions, None);

const TRAILING_EPS: &str = "trailingEps";
const EARNINGS_GROWTH: &str = "earningsGrowth";

/// Graham-formula growth bounds, in percent.
const GRAHAM_GROWTH_CAP: f64 = 20.0;
const GRAHAM_BASE_MULTIPLE: f64 = 8.5;

#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorNormalizer {
    policy: MissingValuePolicy,
}

impl IndicatorNormalizer {
    pub fn new(policy: MissingValuePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MissingValuePolicy {
        self.policy
    }

    /// Builds the indicator record. `fx_rate` converts the symbol's financial
    /// currency into the reporting currency.
    pub fn normalize(&self, raw: &RawIndicatorSet, fx_rate: f64) -> NormalizedIndicators {
        let get = |def: FieldDef| self.extract(raw, def, fx_rate);

        let pe_ratio = get(PE);
        let revenue_growth_percent = get(REVENUE_GROWTH);

        NormalizedIndicators {
            price: get(PRICE),
            book_value: get(BOOK_VALUE),
            intrinsic_value: intrinsic_value(raw),
            pe_ratio,
            peg_ratio: peg_ratio(pe_ratio, revenue_growth_percent),
            ev_to_ebitda: get(EV_EBITDA),
            roe_percent: get(ROE),
            net_margin_percent: get(NET_MARGIN),
            operating_margin_percent: get(OPERATING_MARGIN),
            fcf_per_share: get(FREE_CASH_FLOW),
            dividend_yield_percent: get(DIVIDEND_YIELD),
            beta: get(BETA),
            debt_to_equity_percent: get(DEBT_TO_EQUITY),
            revenue_growth_percent,
            market_cap_millions: get(MARKET_CAP),
        }
    }

    fn extract(&self, raw: &RawIndicatorSet, def: FieldDef, fx_rate: f64) -> Option<f64> {
        match raw.number(def.key) {
            Some(value) => {
                let transformed = match def.transform {
                    Transform::Money => value * fx_rate,
                    Transform::MoneyMillions => value * fx_rate / 1e6,
                    Transform::Percent => value * 100.0,
                    Transform::Ratio => value,
                };
                Some(round_to(transformed, 2)).filter(|v| v.is_finite())
            }
            None => match self.policy {
                MissingValuePolicy::SentinelDefaults => def.sentinel,
                MissingValuePolicy::Missing => None,
            },
        }
    }
}

/// EPS × (8.5 + 2g), with g the earnings growth in percent clamped to [0, 20].
fn intrinsic_value(raw: &RawIndicatorSet) -> Option<f64> {
    let eps = raw.number(TRAILING_EPS)?;
    let growth = raw.number(EARNINGS_GROWTH)?;
    let g = (growth * 100.0).clamp(0.0, GRAHAM_GROWTH_CAP);
    Some(round_to(eps * (GRAHAM_BASE_MULTIPLE + 2.0 * g), 2))
}

/// P/E over revenue growth percent; missing when growth is missing or zero.
fn peg_ratio(pe: Option<f64>, revenue_growth_percent: Option<f64>) -> Option<f64> {
    match (pe, revenue_growth_percent) {
        (Some(pe), Some(growth)) if growth != 0.0 => Some(round_to(pe / growth, 2)),
        _ => None,
    }
}
