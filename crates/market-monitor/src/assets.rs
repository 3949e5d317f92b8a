use serde::{Deserialize, Serialize};

pub const GOLD: &str = "Gold";
pub const BONDS: &str = "Bonds";
pub const DOLLAR: &str = "Dollar";
pub const BITCOIN: &str = "Bitcoin";
pub const VIX: &str = "VIX";
pub const SP500: &str = "S&P500";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetClass {
    SafeHaven,
    RiskAsset,
}

/// A watched instrument: display name plus provider symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub symbol: String,
    pub class: AssetClass,
}

impl Asset {
    pub fn new(name: &str, symbol: &str, class: AssetClass) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            class,
        }
    }
}

/// Safe havens in display order.
pub const SAFE_HAVENS: [&str; 4] = [GOLD, BONDS, DOLLAR, VIX];

/// Risk assets in display order.
pub const RISK_ASSETS: [&str; 2] = [SP500, BITCOIN];

/// The default macro basket.
pub fn default_basket() -> Vec<Asset> {
    vec![
        Asset::new(GOLD, "GLD", AssetClass::SafeHaven),
        Asset::new(BONDS, "TLT", AssetClass::SafeHaven),
        Asset::new(DOLLAR, "UUP", AssetClass::SafeHaven),
        Asset::new(BITCOIN, "BTC-USD", AssetClass::RiskAsset),
        Asset::new(VIX, "^VIX", AssetClass::SafeHaven),
        Asset::new(SP500, "^GSPC", AssetClass::RiskAsset),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basket_classes_match_groups() {
        let basket = default_basket();
        assert_eq!(basket.len(), 6);
        for asset in &basket {
            let expected = if SAFE_HAVENS.contains(&asset.name.as_str()) {
                AssetClass::SafeHaven
            } else {
                assert!(RISK_ASSETS.contains(&asset.name.as_str()), "{}", asset.name);
                AssetClass::RiskAsset
            };
            assert_eq!(asset.class, expected, "{}", asset.name);
        }
    }
}
