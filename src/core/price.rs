// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! ETH/USD price source (Coinbase exchange-rates endpoint).

use serde::Deserialize;
use thiserror::Error;

const EXCHANGE_RATES_URL: &str = "https://api.coinbase.com/v2/exchange-rates?currency=ETH";

/// Price-fetch error.
#[derive(Debug, Error)]
pub enum PriceError {
    /// The HTTP request itself failed.
    #[error("request failed")]
    Request,
    /// The response body did not match the expected shape.
    #[error("malformed response")]
    Malformed,
}

#[derive(Deserialize)]
struct ExchangeRateResponse {
    data: ExchangeRateData,
}

#[derive(Deserialize)]
struct ExchangeRateData {
    rates: std::collections::HashMap<String, String>,
}

/// Fetch the current ETH/USD price. Any error is the caller's signal to
/// skip this tick (spec.md §6 — "any error yields a zero price").
pub async fn fetch_eth_price(client: &reqwest::Client) -> f64 {
    match fetch_eth_price_inner(client).await {
        Ok(price) => price,
        Err(_) => 0.0,
    }
}

async fn fetch_eth_price_inner(client: &reqwest::Client) -> Result<f64, PriceError> {
    let resp = client
        .get(EXCHANGE_RATES_URL)
        .send()
        .await
        .map_err(|_| PriceError::Request)?;
    let body: ExchangeRateResponse = resp.json().await.map_err(|_| PriceError::Malformed)?;
    let usd = body.data.rates.get("USD").ok_or(PriceError::Malformed)?;
    usd.parse::<f64>().map_err(|_| PriceError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_usd_rate_from_response_shape() {
        let raw = r#"{"data":{"currency":"ETH","rates":{"USD":"1800.55","EUR":"1650.00"}}}"#;
        let parsed: ExchangeRateResponse = serde_json::from_str(raw).unwrap();
        let usd: f64 = parsed.data.rates.get("USD").unwrap().parse().unwrap();
        assert!((usd - 1800.55).abs() < f64::EPSILON);
    }
}
