// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : royalty_estimator — streaming royalty estimator in Rust
Module  : config.rs
Version : 0.5.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
License : MIT (see LICENSE)

Summary : Converts per-platform streaming counts into projected royalty
          earnings, applies a royalty share, converts through live/cached
          exchange rates (fail-open to 1:1), recalculates on debounced
          input, and exposes Prometheus metrics.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use clap::Parser;
use dotenvy::dotenv;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::currency::normalize_code;

pub const DEFAULT_RATES_API_URL: &str = "https://api.exchangerate-api.com/v4/latest/USD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("RATES_API_URL is not a valid URL ({value}): {source}")]
    RatesUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("currency code must be three letters, got {0:?}")]
    Currency(String),
}

#[derive(Clone, Debug)]
pub struct Settings {
    // exchange rates
    pub rates_api_url: String,
    pub http_timeout: Duration,
    pub rate_cache_ttl: Duration,
    pub rate_refresh: Option<Duration>, // None = refresh periodik mati

    // calculator
    pub default_currency: String,
    pub debounce: Duration,

    // metrics / consent
    pub metrics_port: Option<u16>, // None = server metrics mati
    pub consent_cookie: Option<String>,
}

/// Command line; values here override the environment defaults.
#[derive(Parser, Clone, Debug)]
#[command(name = "royalty_estimator", version, about = "Streaming royalty estimator")]
pub struct Cli {
    /// Currency code, e.g. EUR (default: DEFAULT_CURRENCY)
    #[arg(long)]
    pub currency: Option<String>,

    /// Royalty share in percent (blank/invalid = 100)
    #[arg(long)]
    pub share: Option<String>,

    /// Stream count per platform, repeatable: --streams spotify=1000
    #[arg(long = "streams", value_name = "PLATFORM=COUNT")]
    pub streams: Vec<String>,

    /// Calculate once, print, exit
    #[arg(long)]
    pub once: bool,

    /// Print reports as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Reads `.env` (if any) and the process environment.
pub fn load() -> Result<Settings, ConfigError> {
    // Pastikan .env dibaca (agar RATES_API_URL, DEBOUNCE_MS, dll ter-load)
    let _ = dotenv();
    from_map(&env::vars().collect())
}

pub fn from_map(vars: &HashMap<String, String>) -> Result<Settings, ConfigError> {
    let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
    let num = |key: &str, default: u64| -> u64 {
        get(key).and_then(|s| s.parse().ok()).unwrap_or(default)
    };

    // ===== Exchange rates =====
    let rates_api_url = get("RATES_API_URL").unwrap_or(DEFAULT_RATES_API_URL).to_string();
    Url::parse(&rates_api_url).map_err(|source| ConfigError::RatesUrl {
        value: rates_api_url.clone(),
        source,
    })?;
    let http_timeout = Duration::from_millis(num("HTTP_TIMEOUT_MS", 5_000));
    let rate_cache_ttl = Duration::from_secs(num("RATE_CACHE_TTL_SECS", 600));
    let rate_refresh = match num("RATE_REFRESH_SECS", 3_600) {
        0 => None,
        s => Some(Duration::from_secs(s)),
    };

    // ===== Calculator =====
    let raw_currency = get("DEFAULT_CURRENCY").unwrap_or("USD");
    let default_currency =
        normalize_code(raw_currency).ok_or_else(|| ConfigError::Currency(raw_currency.to_string()))?;
    let debounce = Duration::from_millis(num("DEBOUNCE_MS", 150));

    // ===== Metrics / consent =====
    let metrics_port = match get("METRICS_PORT").and_then(|s| s.parse::<u16>().ok()).unwrap_or(9898) {
        0 => None,
        p => Some(p),
    };
    let consent_cookie = get("CONSENT_COOKIE").map(str::to_string);

    Ok(Settings {
        rates_api_url,
        http_timeout,
        rate_cache_ttl,
        rate_refresh,
        default_currency,
        debounce,
        metrics_port,
        consent_cookie,
    })
}
