// ===============================
// src/report.rs (terminal presentation)
// ===============================
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Write as _;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::domain::CalcReport;
use crate::rates::RateTable;

/// First N platforms of the table form the primary section.
pub const PRIMARY_PLATFORMS: usize = 4;

/// Two decimals, half away from zero ("12.345" -> "12.35").
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

/// Thousands separators: 1234567 -> "1,234,567".
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn render(report: &CalcReport, table: &RateTable) -> String {
    let agg = &report.calculation.aggregate;
    let sym = &agg.currency_symbol;
    let mut out = String::new();

    let _ = writeln!(out, "[{}] {}", report.seq, report.status.message());
    let _ = writeln!(out, "Total gross : {sym}{}", format_currency(agg.total_gross));
    let _ = writeln!(out, "Total net   : {sym}{}", format_currency(agg.total_net));

    for (i, p) in table.iter().enumerate() {
        if i == 0 {
            let _ = writeln!(out, "-- platforms --");
        } else if i == PRIMARY_PLATFORMS {
            let _ = writeln!(out, "-- more platforms --");
        }
        match report.calculation.results.iter().find(|r| r.id == p.id) {
            Some(r) => {
                let _ = writeln!(
                    out,
                    "  * {:<14} {sym}{:>12}  ({} streams)",
                    r.name,
                    format_currency(r.net),
                    format_count(r.streams)
                );
            }
            None => {
                let _ = writeln!(out, "    {:<14} {sym}{:>12}", p.name, "0.00");
            }
        }
    }
    out
}

/// Prints every new report until the controller goes away.
pub async fn run(mut rx: watch::Receiver<Option<CalcReport>>, json: bool) {
    while rx.changed().await.is_ok() {
        let Some(report) = rx.borrow_and_update().clone() else {
            continue;
        };
        if report.status.is_approximate() {
            warn!(currency = %report.currency, "approximate values (exchange rate unavailable)");
        }
        print(&report, json);
    }
    info!("report: channel closed, stopped");
}

pub fn print(report: &CalcReport, json: bool) {
    if json {
        match serde_json::to_string(report) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(?e, "report serialize failed"),
        }
    } else {
        print!("{}", render(report, RateTable::reference()));
    }
}
