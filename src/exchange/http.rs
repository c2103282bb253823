//! HTTP plumbing shared by the REST adapters.

use std::str::FromStr;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;
use crate::error::AdapterError;

/// Build a pooled HTTP client for exchange REST APIs.
pub fn build_client(config: &Config) -> Result<reqwest::Client, AdapterError> {
    let client = reqwest::Client::builder()
        .timeout(config.adapter_timeout())
        .connect_timeout(Duration::from_millis(1_000))
        // Small ticker requests; skip Nagle
        .tcp_nodelay(true)
        .tcp_keepalive(Duration::from_secs(30))
        .pool_max_idle_per_host(config.http_pool_size)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()?;

    Ok(client)
}

/// GET `url` and decode the JSON body as `T`.
///
/// 429 becomes [`AdapterError::RateLimited`] with the `Retry-After` header
/// when present, other non-success statuses go through the usual
/// `reqwest::Error` classification.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T, AdapterError> {
    get_json_with_headers(client, url, query, &[]).await
}

/// [`get_json`] with extra request headers, used for signed endpoints.
pub async fn get_json_with_headers<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
    headers: &[(&'static str, &str)],
) -> Result<T, AdapterError> {
    let request = headers
        .iter()
        .fold(client.get(url).query(query), |req, (name, value)| req.header(*name, *value));
    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(AdapterError::RateLimited { retry_after });
    }

    let response = response.error_for_status()?;
    let body = response.bytes().await?;
    debug!(url, status = %status, bytes = body.len(), "Exchange response");

    Ok(serde_json::from_slice(&body)?)
}

/// Parse a decimal field that exchanges send as a string.
///
/// Missing or empty values read as zero so the quote fails validation
/// instead of aborting the whole batch.
pub fn decimal_or_zero(raw: Option<&str>) -> Decimal {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s)).ok())
        .unwrap_or(Decimal::ZERO)
}

/// Parse an optional fee; unparseable values are unknown rather than zero.
pub fn optional_decimal(raw: Option<&str>) -> Option<Decimal> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| Decimal::from_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decimal_or_zero_handles_missing_and_scientific() {
        assert_eq!(decimal_or_zero(Some("101.25")), dec!(101.25));
        assert_eq!(decimal_or_zero(Some("1e-5")), dec!(0.00001));
        assert_eq!(decimal_or_zero(Some("")), Decimal::ZERO);
        assert_eq!(decimal_or_zero(None), Decimal::ZERO);
        assert_eq!(decimal_or_zero(Some("n/a")), Decimal::ZERO);
    }

    #[test]
    fn optional_decimal_keeps_unknown_as_none() {
        assert_eq!(optional_decimal(Some("0.5")), Some(dec!(0.5)));
        assert_eq!(optional_decimal(Some("garbage")), None);
        assert_eq!(optional_decimal(None), None);
    }

    #[test]
    fn client_builds_from_default_config() {
        assert!(build_client(&Config::default()).is_ok());
    }
}
