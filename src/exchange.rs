// ===============================
// src/exchange.rs (ExchangeRateSource)
// ===============================
//
// Resolusi kurs USD -> target:
// - USD           : {USD: 1}, tanpa network
// - cache segar   : tabel terakhir yang sukses (TTL)
// - lookup HTTP   : tabel penuh, cache diperbarui
// - gagal         : fail-open ke {target: 1} + status "unavailable"
//
// The source never decides whether a result is still wanted; the controller
// drops completions for a currency that is no longer selected.
//
use ahash::AHashMap as HashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

use crate::currency::BASE_CURRENCY;
use crate::metrics::RATE_RESOLUTIONS;
use crate::rates_api::{RateError, RateProvider, RateSnapshot};

/// Currency code -> multiplier relative to USD. Always contains USD = 1.
#[derive(Debug, Clone)]
pub struct ExchangeRateSet {
    rates: HashMap<String, Decimal>,
}

impl ExchangeRateSet {
    pub fn usd_base() -> Self {
        let mut rates = HashMap::new();
        rates.insert(BASE_CURRENCY.to_string(), Decimal::ONE);
        Self { rates }
    }

    /// Unresolved currency treated as 1:1 with USD.
    pub fn fallback(code: &str) -> Self {
        let mut set = Self::usd_base();
        set.rates.insert(code.to_string(), Decimal::ONE);
        set
    }

    /// Keeps positive rates only and pins USD to 1.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Decimal)>) -> Self {
        let mut set = Self::usd_base();
        for (code, rate) in pairs {
            if rate > Decimal::ZERO && code != BASE_CURRENCY {
                set.rates.insert(code, rate);
            }
        }
        set
    }

    pub fn get(&self, code: &str) -> Option<Decimal> {
        self.rates.get(code).copied()
    }

    /// Rate for `code`, or 1 when the set has no entry for it.
    pub fn rate_or_one(&self, code: &str) -> Decimal {
        self.get(code).unwrap_or(Decimal::ONE)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }
}


/// Advisory status shown next to the numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateStatus {
    UsdBase,
    Pending { currency: String },
    Live {
        currency: String,
        rate: Decimal,
        date: Option<String>,
        cached: bool,
    },
    Unavailable { currency: String, reason: String },
}

impl RateStatus {
    pub fn message(&self) -> String {
        match self {
            RateStatus::UsdBase => "Rates: USD base".to_string(),
            RateStatus::Pending { .. } => "Updating exchange rates...".to_string(),
            RateStatus::Live { currency, rate, date, .. } => {
                let rate = rate.round_dp(4);
                match date {
                    Some(d) => format!("1 USD = {rate:.4} {currency} ({d})"),
                    None => format!("1 USD = {rate:.4} {currency}"),
                }
            }
            RateStatus::Unavailable { .. } => {
                "Exchange rate unavailable - showing approximate values".to_string()
            }
        }
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self, RateStatus::Unavailable { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            RateStatus::UsdBase => "usd",
            RateStatus::Pending { .. } => "pending",
            RateStatus::Live { cached: true, .. } => "cached",
            RateStatus::Live { cached: false, .. } => "live",
            RateStatus::Unavailable { .. } => "unavailable",
        }
    }
}

/// Outcome of one resolve call for one currency.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub currency: String,
    pub rates: ExchangeRateSet,
    pub status: RateStatus,
}

impl Resolution {
    fn usd() -> Self {
        Self {
            currency: BASE_CURRENCY.to_string(),
            rates: ExchangeRateSet::usd_base(),
            status: RateStatus::UsdBase,
        }
    }

    fn unavailable(code: &str, err: &RateError) -> Self {
        Self {
            currency: code.to_string(),
            rates: ExchangeRateSet::fallback(code),
            status: RateStatus::Unavailable {
                currency: code.to_string(),
                reason: err.to_string(),
            },
        }
    }

    fn from_snapshot(code: &str, snap: &RateSnapshot, cached: bool) -> Result<Self, RateError> {
        let rate = snap
            .rates
            .get(code)
            .ok_or_else(|| RateError::MissingCurrency(code.to_string()))?;
        Ok(Self {
            currency: code.to_string(),
            rates: snap.rates.clone(),
            status: RateStatus::Live {
                currency: code.to_string(),
                rate,
                date: snap.date.clone(),
                cached,
            },
        })
    }

    pub fn exchange_rate(&self) -> Decimal {
        self.rates.rate_or_one(&self.currency)
    }
}

struct CachedSnapshot {
    snapshot: RateSnapshot,
    stored_at: Instant,
}

pub struct ExchangeRateSource {
    provider: Arc<dyn RateProvider>,
    cache_ttl: Duration,
    cache: Mutex<Option<CachedSnapshot>>,
}

impl ExchangeRateSource {
    pub fn new(provider: Arc<dyn RateProvider>, cache_ttl: Duration) -> Self {
        Self {
            provider,
            cache_ttl,
            cache: Mutex::new(None),
        }
    }

    /// Resolution that needs no network: USD, or a currency present in a
    /// cache entry younger than the TTL.
    pub fn resolve_local(&self, code: &str) -> Option<Resolution> {
        if code == BASE_CURRENCY {
            RATE_RESOLUTIONS.with_label_values(&["usd"]).inc();
            return Some(Resolution::usd());
        }
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let entry = cache.as_ref()?;
        if entry.stored_at.elapsed() > self.cache_ttl {
            return None;
        }
        let res = Resolution::from_snapshot(code, &entry.snapshot, true).ok()?;
        RATE_RESOLUTIONS.with_label_values(&["cached"]).inc();
        Some(res)
    }

    /// Always yields a usable rate set; failures degrade to 1:1.
    pub async fn resolve(&self, code: &str) -> Resolution {
        if let Some(res) = self.resolve_local(code) {
            return res;
        }

        let outcome = match self.provider.fetch_usd_rates().await {
            Ok(snap) => {
                let res = Resolution::from_snapshot(code, &snap, false);
                self.store(snap);
                res
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(res) => {
                info!(currency = %code, rate = %res.exchange_rate(), provider = self.provider.name(), "exchange rate resolved");
                RATE_RESOLUTIONS.with_label_values(&["live"]).inc();
                res
            }
            Err(e) => {
                warn!(currency = %code, error = %e, "exchange rate unavailable, using 1:1");
                RATE_RESOLUTIONS.with_label_values(&["unavailable"]).inc();
                Resolution::unavailable(code, &e)
            }
        }
    }

    pub fn invalidate(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        *cache = None;
    }

    fn store(&self, snapshot: RateSnapshot) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        *cache = Some(CachedSnapshot {
            snapshot,
            stored_at: Instant::now(),
        });
    }
}
