// ===============================
// src/rates_api.rs (exchange-rate lookup over HTTP)
// ===============================
//
// Endpoint default: https://api.exchangerate-api.com/v4/latest/USD
// Payload contoh:
//   {"base":"USD","date":"2025-01-15","rates":{"USD":1,"EUR":0.9234,"GBP":0.79}}
//
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Number;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::exchange::ExchangeRateSet;

#[derive(Debug, Error)]
pub enum RateError {
    #[error("rates request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rates endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed rates payload: {0}")]
    Malformed(String),
    #[error("currency {0} missing from rates payload")]
    MissingCurrency(String),
}

#[derive(Debug, Deserialize)]
struct RatesPayload {
    // arbitrary_precision: Number keeps the literal text ("0.9234", "1e20")
    rates: HashMap<String, Number>,
    #[serde(default)]
    date: Option<String>,
}

/// Full USD-based table as returned by one lookup.
#[derive(Debug, Clone)]
pub struct RateSnapshot {
    pub rates: ExchangeRateSet,
    pub date: Option<String>,
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_usd_rates(&self) -> Result<RateSnapshot, RateError>;
}

pub struct HttpRateProvider {
    http: reqwest::Client,
    url: String,
}

impl HttpRateProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RateError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_usd_rates(&self) -> Result<RateSnapshot, RateError> {
        debug!(url = %self.url, "fetching exchange rates");
        let rsp = self.http.get(&self.url).send().await?;
        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(RateError::Status { status: status.as_u16(), body });
        }
        let body = rsp.text().await?;
        parse_payload(&body)
    }
}

pub fn parse_payload(body: &str) -> Result<RateSnapshot, RateError> {
    let payload: RatesPayload =
        serde_json::from_str(body).map_err(|e| RateError::Malformed(e.to_string()))?;

    // buang rate yang tidak bisa dipakai (<= 0 / di luar range Decimal)
    let pairs = payload
        .rates
        .into_iter()
        .filter_map(|(code, n)| decimal_from_number(&n).map(|d| (code.to_ascii_uppercase(), d)));
    let rates = ExchangeRateSet::from_pairs(pairs);
    if rates.len() <= 1 {
        return Err(RateError::Malformed("rates table is empty".to_string()));
    }

    Ok(RateSnapshot {
        rates,
        date: payload.date,
    })
}

fn decimal_from_number(n: &Number) -> Option<Decimal> {
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
