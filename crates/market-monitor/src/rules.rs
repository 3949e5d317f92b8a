//! Cross-asset alert rules.
//!
//! Every rule reads the same snapshot of intraday percent changes keyed by asset
//! display name. An asset absent from the snapshot counts as an unchanged (0%)
//! asset, except where a rule says otherwise.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assets::{BITCOIN, BONDS, DOLLAR, GOLD, RISK_ASSETS, SAFE_HAVENS, SP500, VIX};
use crate::config::Thresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertRule {
    SafeHavensRally,
    Sp500DropWithSafeHavens,
    Sp500DeathCross,
    BitcoinSp500Divergence,
    BroadSelloff,
    VolatilitySpike,
    GoldBitcoinRally,
    DollarBondsDrop,
    RiskAssetsRally,
}

impl AlertRule {
    pub const ALL: [AlertRule; 9] = [
        AlertRule::SafeHavensRally,
        AlertRule::Sp500DropWithSafeHavens,
        AlertRule::Sp500DeathCross,
        AlertRule::BitcoinSp500Divergence,
        AlertRule::BroadSelloff,
        AlertRule::VolatilitySpike,
        AlertRule::GoldBitcoinRally,
        AlertRule::DollarBondsDrop,
        AlertRule::RiskAssetsRally,
    ];

    /// Stable identifier used as the dedup key.
    pub fn id(&self) -> &'static str {
        match self {
            AlertRule::SafeHavensRally => "safe_havens_rally",
            AlertRule::Sp500DropWithSafeHavens => "sp500_drop_with_safe_havens",
            AlertRule::Sp500DeathCross => "sp500_death_cross",
            AlertRule::BitcoinSp500Divergence => "bitcoin_sp500_divergence",
            AlertRule::BroadSelloff => "broad_selloff",
            AlertRule::VolatilitySpike => "volatility_spike",
            AlertRule::GoldBitcoinRally => "gold_bitcoin_rally",
            AlertRule::DollarBondsDrop => "dollar_bonds_drop",
            AlertRule::RiskAssetsRally => "risk_assets_rally",
        }
    }
}

impl fmt::Display for AlertRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Inputs to one evaluation.
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    /// Intraday percent change by asset name; assets without data are absent.
    pub changes: BTreeMap<String, f64>,
    /// Whether the S&P500 daily closes show a death cross on the latest bar.
    pub sp500_death_cross: bool,
}

impl MarketSnapshot {
    pub fn new(changes: BTreeMap<String, f64>) -> Self {
        Self {
            changes,
            sp500_death_cross: false,
        }
    }

    pub fn with_death_cross(mut self, crossed: bool) -> Self {
        self.sp500_death_cross = crossed;
        self
    }

    fn change(&self, asset: &str) -> f64 {
        self.changes.get(asset).copied().unwrap_or(0.0)
    }
}

/// A rule that matched, with its human-readable text.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAlert {
    pub rule: AlertRule,
    pub warning: String,
    pub recommendation: String,
}

impl TriggeredAlert {
    fn new(rule: AlertRule, warning: impl Into<String>, recommendation: impl Into<String>) -> Self {
        Self {
            rule,
            warning: warning.into(),
            recommendation: recommendation.into(),
        }
    }

    /// Warning and recommendation on one line.
    pub fn message(&self) -> String {
        format!("{} {}", self.warning, self.recommendation)
    }
}

#[derive(Debug, Clone)]
pub struct RuleEngine {
    thresholds: Thresholds,
    vix_spike_percent: f64,
    broad_selloff_ratio: f64,
}

impl RuleEngine {
    pub fn new(thresholds: Thresholds, vix_spike_percent: f64, broad_selloff_ratio: f64) -> Self {
        Self {
            thresholds,
            vix_spike_percent,
            broad_selloff_ratio,
        }
    }

    /// Evaluates all nine rules independently, in [`AlertRule::ALL`] order.
    pub fn evaluate(&self, snapshot: &MarketSnapshot) -> Vec<TriggeredAlert> {
        AlertRule::ALL
            .iter()
            .filter_map(|rule| self.check(*rule, snapshot))
            .collect()
    }

    /// Contract form: `(rule id, message)` pairs.
    pub fn evaluate_messages(&self, snapshot: &MarketSnapshot) -> Vec<(String, String)> {
        self.evaluate(snapshot)
            .into_iter()
            .map(|alert| (alert.rule.id().to_string(), alert.message()))
            .collect()
    }

    fn up(&self, snapshot: &MarketSnapshot, asset: &str) -> bool {
        snapshot.change(asset) > self.thresholds.for_asset(asset)
    }

    fn down(&self, snapshot: &MarketSnapshot, asset: &str) -> bool {
        snapshot.change(asset) < -self.thresholds.for_asset(asset)
    }

    fn check(&self, rule: AlertRule, s: &MarketSnapshot) -> Option<TriggeredAlert> {
        let all_safe_havens_up = SAFE_HAVENS.iter().all(|a| self.up(s, a));

        match rule {
            AlertRule::SafeHavensRally => all_safe_havens_up.then(|| {
                TriggeredAlert::new(
                    rule,
                    "All safe-haven assets are rising together: possible flight from global risk.",
                    "Consider reducing equity exposure and increasing cash or safe-haven holdings.",
                )
            }),
            AlertRule::Sp500DropWithSafeHavens => (self.down(s, SP500) && all_safe_havens_up).then(|| {
                TriggeredAlert::new(
                    rule,
                    "The S&P500 is falling while safe havens rise: investors are seeking safety.",
                    "Rebalance toward defensive assets and watch the index's key support levels.",
                )
            }),
            AlertRule::Sp500DeathCross => s.sp500_death_cross.then(|| {
                TriggeredAlert::new(
                    rule,
                    "Death cross on the S&P500: possible shift to a medium-term downtrend.",
                    "Review long-term positions and consider hedges such as put options or inverse ETFs.",
                )
            }),
            AlertRule::BitcoinSp500Divergence => self.divergence(s),
            AlertRule::BroadSelloff => {
                let observed = s.changes.len();
                let falling = s.changes.keys().filter(|a| self.down(s, a)).count();
                (observed > 0 && falling as f64 >= observed as f64 * self.broad_selloff_ratio).then(|| {
                    TriggeredAlert::new(
                        rule,
                        format!(
                            "Broad sell-off: {} of {} assets are falling, a possible wide correction.",
                            falling, observed
                        ),
                        "Avoid impulsive buying and wait for stabilization or technical support.",
                    )
                })
            }
            AlertRule::VolatilitySpike => (s.change(VIX) > self.vix_spike_percent).then(|| {
                TriggeredAlert::new(
                    rule,
                    format!(
                        "Strong volatility spike (VIX {:+.2}%): fear is rising in the market.",
                        s.change(VIX)
                    ),
                    "Review stop-losses and stay conservative until the VIX normalizes.",
                )
            }),
            AlertRule::GoldBitcoinRally => (self.up(s, GOLD) && self.up(s, BITCOIN)).then(|| {
                TriggeredAlert::new(
                    rule,
                    "Gold and Bitcoin are rising together: demand for alternative stores of value amid macro uncertainty.",
                    "Diversify safe-haven exposure; this can signal waning confidence in fiat currencies.",
                )
            }),
            AlertRule::DollarBondsDrop => (self.down(s, DOLLAR) && self.down(s, BONDS)).then(|| {
                TriggeredAlert::new(
                    rule,
                    "The dollar and bonds are falling together: rate or inflation expectations may be shifting.",
                    "Watch central-bank decisions and sovereign yields.",
                )
            }),
            AlertRule::RiskAssetsRally => RISK_ASSETS.iter().all(|a| self.up(s, a)).then(|| {
                TriggeredAlert::new(
                    rule,
                    "Risk assets are rallying (S&P500 and Bitcoin up): risk appetite is growing.",
                    "Keep tactical exposure but prepare an exit plan in case of overbought conditions.",
                )
            }),
        }
    }

    /// Needs both changes present and non-zero.
    fn divergence(&self, s: &MarketSnapshot) -> Option<TriggeredAlert> {
        let btc = s.changes.get(BITCOIN).copied().filter(|c| *c != 0.0)?;
        let spx = s.changes.get(SP500).copied().filter(|c| *c != 0.0)?;
        let (btc_thr, spx_thr) = (self.thresholds.for_asset(BITCOIN), self.thresholds.for_asset(SP500));
        let rule = AlertRule::BitcoinSp500Divergence;

        if btc > btc_thr && spx < -spx_thr {
            Some(TriggeredAlert::new(
                rule,
                "Divergence: Bitcoin is rising while the S&P500 falls, speculative appetite despite equity risk.",
                "Watch whether the crypto rally is sustainable and consider taking profits.",
            ))
        } else if btc < -btc_thr && spx > spx_thr {
            Some(TriggeredAlert::new(
                rule,
                "Divergence: Bitcoin is falling while the S&P500 rises, lower appetite for risk.",
                "Be cautious with volatile assets; the market may rotate toward defensives.",
            ))
        } else {
            None
        }
    }
}
