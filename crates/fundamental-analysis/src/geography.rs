use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Continent {
    NorthAmerica,
    SouthAmerica,
    Europe,
    Africa,
    Asia,
    Oceania,
    Unknown,
}

impl Continent {
    /// Continent for a country name as reported by the market-data provider.
    pub fn from_country(country: &str) -> Self {
        let normalized = country.trim().to_ascii_lowercase();
        COUNTRY_CONTINENTS
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, continent)| *continent)
            .unwrap_or(Continent::Unknown)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Continent::NorthAmerica => "North America",
            Continent::SouthAmerica => "South America",
            Continent::Europe => "Europe",
            Continent::Africa => "Africa",
            Continent::Asia => "Asia",
            Continent::Oceania => "Oceania",
            Continent::Unknown => "Unknown",
        }
    }
}

use Continent::*;

const COUNTRY_CONTINENTS: &[(&str, Continent)] = &[
    // North America (including Central America and the Caribbean)
    ("united states", NorthAmerica),
    ("united states of america", NorthAmerica),
    ("usa", NorthAmerica),
    ("canada", NorthAmerica),
    ("mexico", NorthAmerica),
    ("bermuda", NorthAmerica),
    ("bahamas", NorthAmerica),
    ("cayman islands", NorthAmerica),
    ("british virgin islands", NorthAmerica),
    ("panama", NorthAmerica),
    ("costa rica", NorthAmerica),
    ("puerto rico", NorthAmerica),
    ("guatemala", NorthAmerica),
    ("dominican republic", NorthAmerica),
    ("jamaica", NorthAmerica),
    // South America
    ("brazil", SouthAmerica),
    ("argentina", SouthAmerica),
    ("chile", SouthAmerica),
    ("colombia", SouthAmerica),
    ("peru", SouthAmerica),
    ("uruguay", SouthAmerica),
    ("venezuela", SouthAmerica),
    ("ecuador", SouthAmerica),
    ("paraguay", SouthAmerica),
    ("bolivia", SouthAmerica),
    // Europe
    ("united kingdom", Europe),
    ("ireland", Europe),
    ("germany", Europe),
    ("france", Europe),
    ("spain", Europe),
    ("portugal", Europe),
    ("italy", Europe),
    ("netherlands", Europe),
    ("belgium", Europe),
    ("luxembourg", Europe),
    ("switzerland", Europe),
    ("austria", Europe),
    ("sweden", Europe),
    ("norway", Europe),
    ("denmark", Europe),
    ("finland", Europe),
    ("iceland", Europe),
    ("poland", Europe),
    ("czech republic", Europe),
    ("czechia", Europe),
    ("hungary", Europe),
    ("greece", Europe),
    ("romania", Europe),
    ("bulgaria", Europe),
    ("croatia", Europe),
    ("slovenia", Europe),
    ("slovakia", Europe),
    ("estonia", Europe),
    ("latvia", Europe),
    ("lithuania", Europe),
    ("monaco", Europe),
    ("malta", Europe),
    ("jersey", Europe),
    ("guernsey", Europe),
    ("isle of man", Europe),
    ("russia", Europe),
    ("ukraine", Europe),
    // Africa
    ("south africa", Africa),
    ("egypt", Africa),
    ("nigeria", Africa),
    ("morocco", Africa),
    ("kenya", Africa),
    ("ghana", Africa),
    ("mauritius", Africa),
    ("zambia", Africa),
    // Asia
    ("china", Asia),
    ("hong kong", Asia),
    ("macau", Asia),
    ("taiwan", Asia),
    ("japan", Asia),
    ("south korea", Asia),
    ("korea, republic of", Asia),
    ("india", Asia),
    ("singapore", Asia),
    ("malaysia", Asia),
    ("indonesia", Asia),
    ("thailand", Asia),
    ("philippines", Asia),
    ("vietnam", Asia),
    ("israel", Asia),
    ("turkey", Asia),
    ("united arab emirates", Asia),
    ("saudi arabia", Asia),
    ("qatar", Asia),
    ("kazakhstan", Asia),
    ("cyprus", Asia),
    // Oceania
    ("australia", Oceania),
    ("new zealand", Oceania),
    ("papua new guinea", Oceania),
    ("fiji", Oceania),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_countries() {
        assert_eq!(Continent::from_country("United States"), Continent::NorthAmerica);
        assert_eq!(Continent::from_country("Spain"), Continent::Europe);
        assert_eq!(Continent::from_country(" brazil "), Continent::SouthAmerica);
        assert_eq!(Continent::from_country("Hong Kong"), Continent::Asia);
        assert_eq!(Continent::from_country("Australia").label(), "Oceania");
    }

    #[test]
    fn test_unknown_country() {
        assert_eq!(Continent::from_country("Atlantis"), Continent::Unknown);
        assert_eq!(Continent::from_country("").label(), "Unknown");
    }
}
