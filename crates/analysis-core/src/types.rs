use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Field bag returned by a market-data provider for one symbol.
///
/// Keys follow the provider's camelCase naming (`trailingPE`, `returnOnEquity`, ...).
/// Any field may be absent, null, a string, or a number; callers must not assume a
/// shape beyond that.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawIndicatorSet {
    pub symbol: String,
    pub fields: Map<String, Value>,
}

impl RawIndicatorSet {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style insert, mostly for fakes and tests.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// The field as a finite number. Strings, booleans and non-finite values are not numbers.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.fields
            .get(field)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    /// The field as non-empty text.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_rejects_non_numeric() {
        let raw = RawIndicatorSet::new("ACME")
            .with("trailingPE", 12.5)
            .with("beta", "n/a")
            .with("dividendYield", Value::Null)
            .with("flag", json!(true));

        assert_eq!(raw.number("trailingPE"), Some(12.5));
        assert_eq!(raw.number("beta"), None);
        assert_eq!(raw.number("dividendYield"), None);
        assert_eq!(raw.number("flag"), None);
        assert_eq!(raw.number("absent"), None);
    }

    #[test]
    fn test_integer_fields_are_numbers() {
        let raw = RawIndicatorSet::new("ACME").with("marketCap", 2_500_000_000_i64);
        assert_eq!(raw.number("marketCap"), Some(2_500_000_000.0));
    }

    #[test]
    fn test_text_trims_and_skips_blank() {
        let raw = RawIndicatorSet::new("ACME")
            .with("longName", "  Acme Corp ")
            .with("sector", "   ");
        assert_eq!(raw.text("longName"), Some("Acme Corp"));
        assert_eq!(raw.text("sector"), None);
    }
}
