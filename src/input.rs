// ===============================
// src/input.rs (InputState)
// ===============================
//
// Normalisasi input user:
// - stream count : integer >= 0, invalid/negatif -> 0
// - royalty share: desimal >= 0, kosong/invalid/negatif -> 100 (full share)
//
// Explicit "0" share is kept as 0; only missing or unparseable input means 100.
//
use ahash::AHashMap as HashMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const DEFAULT_SHARE_PCT: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Default)]
pub struct InputState {
    streams: HashMap<String, u64>,
    // None = unset / invalid
    royalty_share: Option<Decimal>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the normalized count and returns it.
    pub fn set_streams(&mut self, platform_id: &str, raw: &str) -> u64 {
        let value = parse_streams(raw);
        self.streams.insert(platform_id.to_string(), value);
        value
    }

    pub fn set_royalty_share(&mut self, raw: &str) -> Decimal {
        self.royalty_share = parse_share(raw);
        self.royalty_share()
    }

    pub fn streams(&self, platform_id: &str) -> u64 {
        self.streams.get(platform_id).copied().unwrap_or(0)
    }

    /// Effective share percentage used by the engine.
    pub fn royalty_share(&self) -> Decimal {
        self.royalty_share.unwrap_or(DEFAULT_SHARE_PCT)
    }

    pub fn share_fraction(&self) -> Decimal {
        self.royalty_share() / Decimal::ONE_HUNDRED
    }
}

fn parse_streams(raw: &str) -> u64 {
    let s = raw.trim();
    if let Ok(n) = s.parse::<u64>() {
        return n;
    }
    // "1500.0" / "12.7" -> truncate
    match Decimal::from_str(s) {
        Ok(d) if d.is_sign_positive() => d.trunc().to_u64().unwrap_or(0),
        _ => 0,
    }
}

fn parse_share(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s).ok().filter(|d| !d.is_sign_negative())
}
