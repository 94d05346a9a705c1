// ===============================
// src/domain.rs
// ===============================
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::exchange::RateStatus;

/// One platform row after a calculation pass (only emitted when streams > 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformResult {
    pub id: String,
    pub name: String,
    pub streams: u64,
    pub gross: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub total_gross: Decimal,
    pub total_net: Decimal,
    pub currency_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    pub results: Vec<PlatformResult>,
    pub aggregate: AggregateResult,
}

/// Apa yang dikirim ke presentation layer setiap kali engine jalan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcReport {
    pub seq: u64,
    pub currency: String,
    pub exchange_rate: Decimal,
    pub status: RateStatus,
    pub calculation: Calculation,
    pub computed_at: DateTime<Utc>,
}

/// Input events coming from the presentation side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetStreams { platform: String, raw: String },
    SetRoyaltyShare { raw: String },
    SetCurrency { code: String },
    RefreshRates,
    Shutdown,
}
