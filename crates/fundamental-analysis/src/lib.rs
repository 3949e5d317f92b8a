pub mod geography;
pub mod normalizer;
pub mod rules;
pub mod scoring;

pub use geography::Continent;
pub use normalizer::{IndicatorNormalizer, MissingValuePolicy, NormalizedIndicators};
pub use rules::{Band, Bound, Indicator, ScoringRule, SCORING_RULES};
pub use scoring::{Contribution, Rating, ScoreCard, ScoringEngine};

use analysis_core::{RawIndicatorSet, ValuationError};
use currency_cache::CurrencyCache;
use serde::{Deserialize, Serialize};

const DEFAULT_SECTOR: &str = "Unknown sector";
const DEFAULT_COUNTRY: &str = "Unknown";
const DEFAULT_CURRENCY: &str = "USD";

/// Descriptive fields of a company, independent of its metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub country: String,
    pub continent: Continent,
    pub financial_currency: String,
}

impl CompanyProfile {
    /// A record without `longName` is treated as no record at all.
    pub fn from_raw(raw: &RawIndicatorSet) -> Result<Self, ValuationError> {
        let name = raw
            .text("longName")
            .ok_or_else(|| ValuationError::data_unavailable(&raw.symbol, "no company name in provider data"))?;
        let country = raw.text("country").unwrap_or(DEFAULT_COUNTRY);

        Ok(Self {
            ticker: raw.symbol.clone(),
            name: name.to_string(),
            sector: raw.text("sector").unwrap_or(DEFAULT_SECTOR).to_string(),
            country: country.to_string(),
            continent: Continent::from_country(country),
            financial_currency: raw
                .text("financialCurrency")
                .unwrap_or(DEFAULT_CURRENCY)
                .to_ascii_uppercase(),
        })
    }
}

/// Per-symbol outcome consumed by ranking and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub ticker: String,
    pub company_name: String,
    pub sector: String,
    pub continent: Continent,
    pub country: String,
    pub rating: Rating,
    pub score_points: i32,
    pub indicators: NormalizedIndicators,
}

pub struct FundamentalAnalysisEngine {
    normalizer: IndicatorNormalizer,
    scoring: ScoringEngine,
    target_currency: String,
}

impl Default for FundamentalAnalysisEngine {
    fn default() -> Self {
        Self::new(MissingValuePolicy::default())
    }
}

impl FundamentalAnalysisEngine {
    pub fn new(policy: MissingValuePolicy) -> Self {
        Self {
            normalizer: IndicatorNormalizer::new(policy),
            scoring: ScoringEngine::new(),
            target_currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    pub fn with_target_currency(mut self, currency: &str) -> Self {
        self.target_currency = currency.trim().to_ascii_uppercase();
        self
    }

    pub fn target_currency(&self) -> &str {
        &self.target_currency
    }

    pub fn policy(&self) -> MissingValuePolicy {
        self.normalizer.policy()
    }

    /// Scores one symbol with an already-resolved conversion factor.
    pub fn evaluate(&self, raw: &RawIndicatorSet, fx_rate: f64) -> Result<ScoreResult, ValuationError> {
        let profile = CompanyProfile::from_raw(raw)?;
        Ok(self.score_profile(profile, raw, fx_rate))
    }

    /// Scores one symbol, resolving the conversion factor through `rates`.
    pub async fn evaluate_with_rates(
        &self,
        raw: &RawIndicatorSet,
        rates: &mut CurrencyCache,
    ) -> Result<ScoreResult, ValuationError> {
        let profile = CompanyProfile::from_raw(raw)?;
        let fx_rate = rates
            .rate(&profile.financial_currency, &self.target_currency)
            .await;
        Ok(self.score_profile(profile, raw, fx_rate))
    }

    fn score_profile(&self, profile: CompanyProfile, raw: &RawIndicatorSet, fx_rate: f64) -> ScoreResult {
        let indicators = self.normalizer.normalize(raw, fx_rate);
        let card = self.scoring.score_card(&indicators);

        tracing::debug!(
            "{} scored {} ({}): {}",
            profile.ticker,
            card.points,
            card.rating,
            card.reason()
        );

        ScoreResult {
            ticker: profile.ticker,
            company_name: profile.name,
            sector: profile.sector,
            continent: profile.continent,
            country: profile.country,
            rating: card.rating,
            score_points: card.points,
            indicators,
        }
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
