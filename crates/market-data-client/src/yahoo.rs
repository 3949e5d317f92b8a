use std::time::Duration;

use analysis_core::{Bar, MarketDataProvider, PriceHistoryProvider, RawIndicatorSet, ValuationError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::{ensure_success, provider_error, send_request};

const QUERY_URL: &str = "https://query1.finance.yahoo.com";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Quote-summary modules merged into one field bag, in precedence order.
const SUMMARY_MODULES: [&str; 5] = [
    "price",
    "summaryProfile",
    "financialData",
    "defaultKeyStatistics",
    "summaryDetail",
];

/// Yahoo Finance quote-summary and chart endpoints.
///
/// The quote-summary endpoint needs a session cookie plus a matching crumb; both
/// are obtained on first use and reused for the lifetime of the client.
pub struct YahooClient {
    client: Client,
    crumb: Mutex<Option<String>>,
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            crumb: Mutex::new(None),
        }
    }

    async fn crumb(&self) -> Result<String, ValuationError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // The cookie endpoint answers 404 but still sets the session cookie.
        send_request(&self.client, self.client.get(COOKIE_URL)).await?;

        let url = format!("{}/v1/test/getcrumb", QUERY_URL);
        let response = ensure_success(send_request(&self.client, self.client.get(&url)).await?).await?;
        let crumb = response.text().await.map_err(provider_error)?.trim().to_string();
        if crumb.is_empty() || crumb.contains('<') {
            return Err(ValuationError::ProviderError("Yahoo returned no crumb".to_string()));
        }

        tracing::debug!("Obtained Yahoo crumb");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    async fn chart(&self, symbol: &str, query: &[(&str, String)]) -> Result<Vec<Bar>, ValuationError> {
        let url = format!("{}/v8/finance/chart/{}", QUERY_URL, encode_symbol(symbol));
        let response = send_request(&self.client, self.client.get(&url).query(query)).await?;
        let response = ensure_success(response).await?;
        let body: Value = response.json().await.map_err(provider_error)?;
        parse_chart(symbol, &body)
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn fetch_indicators(&self, symbol: &str) -> Result<RawIndicatorSet, ValuationError> {
        let crumb = self.crumb().await?;
        let url = format!("{}/v10/finance/quoteSummary/{}", QUERY_URL, encode_symbol(symbol));

        let response = send_request(
            &self.client,
            self.client.get(&url).query(&[
                ("modules", SUMMARY_MODULES.join(",")),
                ("crumb", crumb),
            ]),
        )
        .await?;

        if response.status().as_u16() == 404 {
            return Err(ValuationError::data_unavailable(symbol, "unknown symbol"));
        }
        if response.status().as_u16() == 401 {
            // Crumb expired; fetch a fresh one on the next request.
            *self.crumb.lock().await = None;
        }
        let response = ensure_success(response).await?;

        let body: Value = response.json().await.map_err(provider_error)?;
        flatten_quote_summary(symbol, &body)
    }
}

#[async_trait]
impl PriceHistoryProvider for YahooClient {
    async fn intraday_bars(&self, symbol: &str) -> Result<Vec<Bar>, ValuationError> {
        self.chart(
            symbol,
            &[("range", "1d".to_string()), ("interval", "1m".to_string())],
        )
        .await
    }

    async fn daily_bars(&self, symbol: &str, days: u32) -> Result<Vec<Bar>, ValuationError> {
        let now = Utc::now();
        let start = now - chrono::Duration::days(i64::from(days));
        self.chart(
            symbol,
            &[
                ("period1", start.timestamp().to_string()),
                ("period2", now.timestamp().to_string()),
                ("interval", "1d".to_string()),
            ],
        )
        .await
    }
}

fn encode_symbol(symbol: &str) -> String {
    symbol.trim().replace('^', "%5E").replace('=', "%3D")
}

/// Merges the quote-summary modules into one flat field bag.
///
/// Formatted values (`{"raw": 0.12, "fmt": "12%"}`) collapse to their `raw` part,
/// empty objects are dropped, and the first module to define a key wins.
fn flatten_quote_summary(symbol: &str, body: &Value) -> Result<RawIndicatorSet, ValuationError> {
    let summary = &body["quoteSummary"];
    if let Some(description) = summary["error"]["description"].as_str() {
        return Err(ValuationError::data_unavailable(symbol, description));
    }

    let result = summary["result"]
        .get(0)
        .and_then(Value::as_object)
        .ok_or_else(|| ValuationError::data_unavailable(symbol, "empty quote summary"))?;

    let mut fields = Map::new();
    for module in SUMMARY_MODULES {
        let Some(values) = result.get(module).and_then(Value::as_object) else {
            continue;
        };
        for (key, value) in values {
            if fields.contains_key(key) {
                continue;
            }
            if let Some(flat) = flatten_value(value) {
                fields.insert(key.clone(), flat);
            }
        }
    }

    if fields.is_empty() {
        return Err(ValuationError::data_unavailable(symbol, "no fields in quote summary"));
    }

    Ok(RawIndicatorSet {
        symbol: symbol.to_string(),
        fields,
    })
}

fn flatten_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(obj) if obj.is_empty() => None,
        Value::Object(obj) => obj.get("raw").filter(|raw| !raw.is_null()).cloned(),
        Value::Array(_) => None,
        other => Some(other.clone()),
    }
}

/// Converts a chart response into bars, skipping slots without open/close.
fn parse_chart(symbol: &str, body: &Value) -> Result<Vec<Bar>, ValuationError> {
    let chart = &body["chart"];
    if let Some(description) = chart["error"]["description"].as_str() {
        return Err(ValuationError::data_unavailable(symbol, description));
    }

    let result = chart["result"]
        .get(0)
        .ok_or_else(|| ValuationError::data_unavailable(symbol, "empty chart"))?;

    let timestamps = result["timestamp"].as_array().cloned().unwrap_or_default();
    let quote = &result["indicators"]["quote"][0];
    let series = |name: &str| -> Vec<Option<f64>> {
        quote[name]
            .as_array()
            .map(|values| values.iter().map(Value::as_f64).collect())
            .unwrap_or_default()
    };
    let (opens, highs, lows, closes, volumes) = (
        series("open"),
        series("high"),
        series("low"),
        series("close"),
        series("volume"),
    );

    let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let bars = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let timestamp = DateTime::from_timestamp(ts.as_i64()?, 0)?;
            let open = at(&opens, i)?;
            let close = at(&closes, i)?;
            Some(Bar {
                timestamp,
                open,
                high: at(&highs, i).unwrap_or(open.max(close)),
                low: at(&lows, i).unwrap_or(open.min(close)),
                close,
                volume: at(&volumes, i).unwrap_or(0.0),
            })
        })
        .collect();

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_quote_summary() {
        let body = json!({
            "quoteSummary": {
                "result": [{
                    "price": {
                        "longName": "Apple Inc.",
                        "currency": "USD",
                        "marketCap": {"raw": 3.4e12, "fmt": "3.4T"}
                    },
                    "summaryProfile": {"sector": "Technology", "country": "United States"},
                    "financialData": {
                        "currentPrice": {"raw": 227.5, "fmt": "227.50"},
                        "returnOnEquity": {"raw": 1.57, "fmt": "157%"},
                        "freeCashflow": {},
                        "financialCurrency": "USD"
                    },
                    "defaultKeyStatistics": {"beta": {"raw": 1.24}},
                    "summaryDetail": {
                        "beta": {"raw": 9.99},
                        "trailingPE": {"raw": 34.2, "fmt": "34.20"},
                        "dividendYield": {"raw": 0.0044}
                    }
                }],
                "error": null
            }
        });

        let raw = flatten_quote_summary("AAPL", &body).unwrap();
        assert_eq!(raw.symbol, "AAPL");
        assert_eq!(raw.text("longName"), Some("Apple Inc."));
        assert_eq!(raw.text("sector"), Some("Technology"));
        assert_eq!(raw.number("currentPrice"), Some(227.5));
        assert_eq!(raw.number("marketCap"), Some(3.4e12));
        assert_eq!(raw.number("trailingPE"), Some(34.2));
        // defaultKeyStatistics precedes summaryDetail
        assert_eq!(raw.number("beta"), Some(1.24));
        assert_eq!(raw.number("freeCashflow"), None);
        assert!(!raw.fields.contains_key("freeCashflow"));
    }

    #[test]
    fn test_quote_summary_error() {
        let body = json!({
            "quoteSummary": {
                "result": null,
                "error": {"code": "Not Found", "description": "Quote not found for ticker symbol: ZZZZ"}
            }
        });
        let err = flatten_quote_summary("ZZZZ", &body).unwrap_err();
        assert!(matches!(err, ValuationError::DataUnavailable { ref symbol, .. } if symbol == "ZZZZ"));
    }

    #[test]
    fn test_quote_summary_without_fields() {
        let body = json!({"quoteSummary": {"result": [{"price": {}}], "error": null}});
        assert!(flatten_quote_summary("X", &body).is_err());
    }

    #[test]
    fn test_parse_chart_skips_null_slots() {
        let body = json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "GLD"},
                    "timestamp": [1736517000, 1736517060, 1736517120],
                    "indicators": {"quote": [{
                        "open": [240.1, null, 240.5],
                        "high": [240.3, null, 240.9],
                        "low": [239.9, null, 240.4],
                        "close": [240.2, null, 240.8],
                        "volume": [1200, null, null]
                    }]}
                }],
                "error": null
            }
        });

        let bars = parse_chart("GLD", &body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, 240.1);
        assert_eq!(bars[0].volume, 1200.0);
        assert_eq!(bars[1].close, 240.8);
        assert_eq!(bars[1].volume, 0.0);
        assert_eq!(bars[1].timestamp.timestamp(), 1736517120);
    }

    #[test]
    fn test_parse_chart_error() {
        let body = json!({
            "chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}
        });
        assert!(matches!(
            parse_chart("XXX", &body),
            Err(ValuationError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn test_encode_symbol() {
        assert_eq!(encode_symbol("^VIX"), "%5EVIX");
        assert_eq!(encode_symbol("BTC-USD"), "BTC-USD");
        assert_eq!(encode_symbol("EURUSD=X"), "EURUSD%3DX");
    }
}
