// ===============================
// src/rates.rs (payout rate table)
// ===============================
//
// Fixed USD payout-per-stream per platform. Order of the table is the order
// of every result list and of the "primary / more platforms" grouping, so it
// must never be iterated through a hash map.
//
use once_cell::sync::Lazy;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct PlatformRate {
    pub id: &'static str,
    pub name: &'static str,
    pub payout_usd: Decimal,
}

// (id, display name, mantissa, scale) -> 0.004 = (4, 3)
const REFERENCE_RATES: [(&str, &str, i64, u32); 8] = [
    ("spotify", "Spotify", 4, 3),
    ("apple", "Apple Music", 8, 3),
    ("amazon", "Amazon Music", 6, 3),
    ("youtube", "YouTube Music", 7, 3),
    ("pandora", "Pandora", 13, 4),
    ("soundcloud", "SoundCloud", 3, 3),
    ("tidal", "Tidal", 13, 3),
    ("deezer", "Deezer", 6, 3),
];

static REFERENCE: Lazy<RateTable> = Lazy::new(|| RateTable {
    entries: REFERENCE_RATES
        .iter()
        .map(|&(id, name, mantissa, scale)| PlatformRate {
            id,
            name,
            payout_usd: Decimal::new(mantissa, scale),
        })
        .collect(),
});

#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    entries: Vec<PlatformRate>,
}

impl RateTable {
    /// The 8-platform table shipped with the estimator.
    pub fn reference() -> &'static RateTable {
        &REFERENCE
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformRate> {
        self.entries.iter()
    }

    pub fn get(&self, id: &str) -> Option<&PlatformRate> {
        self.entries.iter().find(|p| p.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|p| p.id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
