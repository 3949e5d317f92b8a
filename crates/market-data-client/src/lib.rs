//! HTTP adapters behind the `analysis-core` provider traits.
//!
//! [`YahooClient`] serves fundamentals and OHLCV history, [`FixerClient`] serves
//! EUR-based exchange rates.

mod fixer;
mod yahoo;

pub use fixer::FixerClient;
pub use yahoo::YahooClient;

use std::time::Duration;

use analysis_core::ValuationError;
use reqwest::{Client, RequestBuilder, Response};

const MAX_ATTEMPTS: u32 = 3;
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(15);

/// Sends a request, retrying on HTTP 429 with a fixed back-off.
pub(crate) async fn send_request(client: &Client, builder: RequestBuilder) -> Result<Response, ValuationError> {
    let request = builder.build().map_err(provider_error)?;

    for attempt in 0..MAX_ATTEMPTS {
        let req_clone = request
            .try_clone()
            .ok_or_else(|| ValuationError::ProviderError("Cannot clone request".to_string()))?;
        let response = client.execute(req_clone).await.map_err(provider_error)?;

        if response.status().as_u16() != 429 {
            return Ok(response);
        }

        tracing::warn!(
            "{} rate limited, waiting {}s before retry {}/{}",
            request.url().host_str().unwrap_or("provider"),
            RATE_LIMIT_BACKOFF.as_secs(),
            attempt + 1,
            MAX_ATTEMPTS
        );
        tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
    }

    Err(ValuationError::ProviderError(format!(
        "Rate limited after {} retries",
        MAX_ATTEMPTS
    )))
}

/// Fails with the status and body of a non-2xx response.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, ValuationError> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(ValuationError::ProviderError(format!(
        "HTTP {}: {}",
        response.status(),
        response.text().await.unwrap_or_default()
    )))
}

pub(crate) fn provider_error(e: impl std::fmt::Display) -> ValuationError {
    ValuationError::ProviderError(e.to_string())
}
