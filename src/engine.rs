// ===============================
// src/engine.rs (CalculationEngine)
// ===============================
use rust_decimal::Decimal;

use crate::currency::symbol_for;
use crate::domain::{AggregateResult, Calculation, PlatformResult};
use crate::exchange::ExchangeRateSet;
use crate::input::InputState;
use crate::rates::RateTable;

/// Pure: no I/O, no errors, inputs are already normalized.
///
/// Totals are summed in USD and converted once at the end; converting each
/// platform first and summing would drift by rounding.
///
/// Every operand is non-negative, so arithmetic saturates at `Decimal::MAX`
/// instead of overflowing.
pub fn compute(
    table: &RateTable,
    input: &InputState,
    rates: &ExchangeRateSet,
    currency: &str,
) -> Calculation {
    let share = input.share_fraction();
    let fx = rates.rate_or_one(currency);

    let mut total_gross_usd = Decimal::ZERO;
    let mut results = Vec::new();

    for p in table.iter() {
        let streams = input.streams(p.id);
        let gross_usd = Decimal::from(streams).saturating_mul(p.payout_usd);
        let net_usd = gross_usd.saturating_mul(share);

        total_gross_usd = total_gross_usd.saturating_add(gross_usd);

        if streams > 0 {
            results.push(PlatformResult {
                id: p.id.to_string(),
                name: p.name.to_string(),
                streams,
                gross: gross_usd.saturating_mul(fx),
                net: net_usd.saturating_mul(fx),
            });
        }
    }

    let total_net_usd = total_gross_usd.saturating_mul(share);

    Calculation {
        results,
        aggregate: AggregateResult {
            total_gross: total_gross_usd.saturating_mul(fx),
            total_net: total_net_usd.saturating_mul(fx),
            currency_symbol: symbol_for(currency).to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd() -> ExchangeRateSet {
        ExchangeRateSet::usd_base()
    }

    #[test]
    fn two_platforms_full_share_usd() {
        let mut input = InputState::new();
        input.set_streams("spotify", "1000");
        input.set_streams("apple", "1000");
        input.set_royalty_share("100");

        let calc = compute(RateTable::reference(), &input, &usd(), "USD");
        assert_eq!(calc.results.len(), 2);
        assert_eq!(calc.results[0].id, "spotify");
        assert_eq!(calc.results[0].gross, dec!(4.00));
        assert_eq!(calc.results[1].id, "apple");
        assert_eq!(calc.results[1].gross, dec!(8.00));
        assert_eq!(calc.aggregate.total_gross, dec!(12.00));
        assert_eq!(calc.aggregate.total_net, dec!(12.00));
        assert_eq!(calc.aggregate.currency_symbol, "$");
    }

    #[test]
    fn tidal_half_share() {
        let mut input = InputState::new();
        input.set_streams("tidal", "10000");
        input.set_royalty_share("50");

        let calc = compute(RateTable::reference(), &input, &usd(), "USD");
        assert_eq!(calc.results.len(), 1);
        let tidal = &calc.results[0];
        assert_eq!(tidal.name, "Tidal");
        assert_eq!(tidal.streams, 10_000);
        assert_eq!(tidal.gross, dec!(130));
        assert_eq!(tidal.net, dec!(65));
        assert_eq!(calc.aggregate.total_gross, dec!(130));
        assert_eq!(calc.aggregate.total_net, dec!(65));
    }

    #[test]
    fn all_zero_inputs_give_empty_list_and_zero_totals() {
        let mut input = InputState::new();
        input.set_royalty_share("37");
        let calc = compute(RateTable::reference(), &input, &usd(), "USD");
        assert!(calc.results.is_empty());
        assert_eq!(calc.aggregate.total_gross, Decimal::ZERO);
        assert_eq!(calc.aggregate.total_net, Decimal::ZERO);
    }

    #[test]
    fn net_is_gross_times_share_for_every_platform() {
        let mut input = InputState::new();
        for (i, id) in RateTable::reference().ids().enumerate() {
            input.set_streams(id, &format!("{}", 1234 * (i + 1)));
        }
        for share in ["0", "12.5", "33.3", "100", "250"] {
            input.set_royalty_share(share);
            let frac = input.share_fraction();
            let calc = compute(RateTable::reference(), &input, &usd(), "USD");
            assert_eq!(calc.results.len(), 8);
            for r in &calc.results {
                assert_eq!(r.net, r.gross * frac);
            }
            assert_eq!(calc.aggregate.total_net, calc.aggregate.total_gross * frac);
        }
    }

    #[test]
    fn explicit_zero_share_yields_zero_net() {
        let mut input = InputState::new();
        input.set_streams("spotify", "1000");
        input.set_royalty_share("0");
        let calc = compute(RateTable::reference(), &input, &usd(), "USD");
        assert_eq!(calc.aggregate.total_gross, dec!(4));
        assert_eq!(calc.aggregate.total_net, Decimal::ZERO);
    }

    #[test]
    fn converts_with_target_rate_and_symbol() {
        let mut input = InputState::new();
        input.set_streams("spotify", "1000");
        let rates = ExchangeRateSet::from_pairs(vec![("EUR".to_string(), dec!(0.9))]);
        let calc = compute(RateTable::reference(), &input, &rates, "EUR");
        assert_eq!(calc.results[0].gross, dec!(3.6));
        assert_eq!(calc.aggregate.total_gross, dec!(3.6));
        assert_eq!(calc.aggregate.currency_symbol, "€");
    }

    #[test]
    fn missing_rate_for_currency_means_one() {
        let mut input = InputState::new();
        input.set_streams("apple", "500");
        let calc = compute(RateTable::reference(), &input, &usd(), "GBP");
        assert_eq!(calc.aggregate.total_gross, dec!(4));
        assert_eq!(calc.aggregate.currency_symbol, "£");
    }

    #[test]
    fn totals_are_converted_once_from_usd_sum() {
        let mut input = InputState::new();
        input.set_streams("pandora", "7");
        input.set_streams("soundcloud", "3");
        input.set_streams("youtube", "11");
        let fx = dec!(0.917321);
        let rates = ExchangeRateSet::from_pairs(vec![("EUR".to_string(), fx)]);
        let calc = compute(RateTable::reference(), &input, &rates, "EUR");

        let usd_sum = dec!(7) * dec!(0.0013) + dec!(3) * dec!(0.003) + dec!(11) * dec!(0.007);
        assert_eq!(calc.aggregate.total_gross, usd_sum * fx);
    }

    #[test]
    fn max_streams_with_huge_share_saturates() {
        let mut input = InputState::new();
        for id in RateTable::reference().ids() {
            input.set_streams(id, &u64::MAX.to_string());
        }
        input.set_royalty_share("100000000000000");

        let calc = compute(RateTable::reference(), &input, &usd(), "USD");
        assert_eq!(calc.results.len(), 8);
        let tidal = calc.results.iter().find(|r| r.id == "tidal").expect("tidal");
        assert_eq!(tidal.gross, Decimal::from(u64::MAX) * dec!(0.013));
        assert_eq!(tidal.net, Decimal::MAX);
        assert_eq!(calc.aggregate.total_net, Decimal::MAX);
        assert!(calc.aggregate.total_gross > Decimal::ZERO);
    }

    #[test]
    fn very_large_exchange_rate_still_yields_numbers() {
        let mut input = InputState::new();
        input.set_streams("spotify", "1000");
        input.set_streams("deezer", &u64::MAX.to_string());
        let snap = crate::rates_api::parse_payload(r#"{"rates":{"USD":1,"XAU":1e20}}"#)
            .expect("parse");
        let calc = compute(RateTable::reference(), &input, &snap.rates, "XAU");

        let spotify = &calc.results[0];
        assert_eq!(spotify.gross, dec!(4) * dec!(100000000000000000000));
        let deezer = calc.results.iter().find(|r| r.id == "deezer").expect("deezer");
        assert_eq!(deezer.gross, Decimal::MAX);
        assert_eq!(calc.aggregate.total_gross, Decimal::MAX);
        assert_eq!(calc.aggregate.total_net, Decimal::MAX);
    }
}
