use std::collections::HashMap;
use std::time::Duration;

use analysis_core::{ExchangeRateProvider, ValuationError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{ensure_success, provider_error, send_request};

const BASE_URL: &str = "http://data.fixer.io/api";

/// Fixer.io `latest` endpoint. The free plan only quotes against EUR.
#[derive(Clone)]
pub struct FixerClient {
    api_key: Option<String>,
    client: Client,
    base_url: String,
}

impl FixerClient {
    /// Without a key every request fails, which leaves callers on their fallback path.
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ExchangeRateProvider for FixerClient {
    async fn latest_rates(
        &self,
        pivot: &str,
        symbols: &[&str],
    ) -> Result<HashMap<String, f64>, ValuationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ValuationError::ProviderError("FIXER_API_KEY not configured".to_string()))?;

        let url = format!("{}/latest", self.base_url);
        let symbols = symbols.join(",");
        let response = send_request(
            &self.client,
            self.client.get(&url).query(&[
                ("access_key", api_key),
                ("base", pivot),
                ("symbols", symbols.as_str()),
            ]),
        )
        .await?;
        let response = ensure_success(response).await?;

        let body: LatestResponse = response.json().await.map_err(provider_error)?;
        parse_latest(body)
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    success: bool,
    #[serde(default)]
    rates: HashMap<String, f64>,
    error: Option<FixerError>,
}

#[derive(Debug, Deserialize)]
struct FixerError {
    code: Option<i64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    info: Option<String>,
}

/// Fixer reports failures with HTTP 200 and `success: false`.
fn parse_latest(body: LatestResponse) -> Result<HashMap<String, f64>, ValuationError> {
    if body.success {
        return Ok(body.rates);
    }

    let detail = body
        .error
        .map(|e| {
            let text = e.info.or(e.kind).unwrap_or_else(|| "unknown error".to_string());
            match e.code {
                Some(code) => format!("{} ({})", text, code),
                None => text,
            }
        })
        .unwrap_or_else(|| "unknown error".to_string());

    Err(ValuationError::ProviderError(format!("Fixer: {}", detail)))
}
