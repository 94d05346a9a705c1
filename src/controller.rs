// ===============================
// src/controller.rs (ReactiveController)
// ===============================
//
// Satu task memiliki InputState + ExchangeRateSet. Trigger:
// - edit streams/share -> debounce (quiescence window) -> calculate
// - ganti currency     -> resolve (spawn kalau butuh network) -> apply -> calculate
// - refresh periodik   -> invalidate cache -> resolve currency aktif
//
// A resolution is applied only when its generation is still the latest and
// its currency is still the selected one.
//
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use std::cell::Cell;
use std::future::pending;
use std::sync::Arc;
use tokio::{
    select,
    sync::{mpsc, watch},
    time::{interval_at, Duration, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::currency::{normalize_code, BASE_CURRENCY};
use crate::debounce::Debouncer;
use crate::domain::{CalcReport, Command};
use crate::engine;
use crate::exchange::{ExchangeRateSet, ExchangeRateSource, RateStatus, Resolution};
use crate::input::InputState;
use crate::metrics::{
    CALCULATIONS, CALCULATIONS_DROPPED, DEBOUNCE_RESTARTS, EXCHANGE_RATE, INPUT_EVENTS,
    RATE_STALE_DISCARDED, TOTAL_GROSS, TOTAL_NET,
};
use crate::rates::RateTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Calculating,
}

/// Idle/Calculating gate. Entering while Calculating fails; the request is
/// dropped, not queued.
#[derive(Debug)]
pub struct CalcGate {
    phase: Cell<Phase>,
}

pub struct CalcGuard<'a> {
    gate: &'a CalcGate,
}

impl CalcGate {
    pub fn new() -> Self {
        Self { phase: Cell::new(Phase::Idle) }
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn try_enter(&self) -> Option<CalcGuard<'_>> {
        if self.phase.get() == Phase::Calculating {
            return None;
        }
        self.phase.set(Phase::Calculating);
        Some(CalcGuard { gate: self })
    }
}

impl Drop for CalcGuard<'_> {
    fn drop(&mut self) {
        self.gate.phase.set(Phase::Idle);
    }
}

#[derive(Debug, Clone)]
pub struct ControllerCfg {
    pub debounce: Duration,
    /// `None` disables periodic refresh.
    pub refresh_every: Option<Duration>,
    pub initial_currency: String,
}

struct Resolved {
    generation: u64,
    resolution: Resolution,
}

pub struct Controller {
    table: &'static RateTable,
    input: InputState,
    rates: ExchangeRateSet,
    status: RateStatus,
    // selected by the user
    currency: String,
    // currency of the applied rate set; results are labelled with this one
    applied_currency: String,
    generation: u64,
    source: Arc<ExchangeRateSource>,
    gate: CalcGate,
    debounce: Debouncer,
    refresh_every: Option<Duration>,
    seq: u64,
    report_tx: watch::Sender<Option<CalcReport>>,
}

impl Controller {
    pub fn new(
        cfg: ControllerCfg,
        source: Arc<ExchangeRateSource>,
        report_tx: watch::Sender<Option<CalcReport>>,
    ) -> Self {
        Self {
            table: RateTable::reference(),
            input: InputState::new(),
            rates: ExchangeRateSet::usd_base(),
            status: RateStatus::UsdBase,
            currency: cfg.initial_currency,
            applied_currency: BASE_CURRENCY.to_string(),
            generation: 0,
            source,
            gate: CalcGate::new(),
            debounce: Debouncer::new(cfg.debounce),
            refresh_every: cfg.refresh_every,
            seq: 0,
            report_tx,
        }
    }

    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>) {
        let (res_tx, mut res_rx) = mpsc::channel::<Resolved>(16);
        let mut refresh = self.refresh_every.map(|every| {
            let mut t = interval_at(Instant::now() + every, every);
            t.set_missed_tick_behavior(MissedTickBehavior::Delay);
            t
        });

        // Startup: resolve currency awal; kalau belum ada report, hitung sekali.
        let initial = self.currency.clone();
        self.select_currency(initial, &res_tx);
        if self.seq == 0 {
            self.calculate();
        }
        info!(currency = %self.currency, "controller: started");

        loop {
            select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => {
                        info!("controller: stopped");
                        break;
                    }
                    Some(c) => self.on_command(c, &res_tx),
                },
                Some(res) = res_rx.recv() => self.on_resolved(res),
                _ = self.debounce.elapsed() => {
                    self.debounce.cancel();
                    self.calculate();
                }
                _ = next_refresh(&mut refresh) => self.refresh(&res_tx),
            }
        }
    }

    fn on_command(&mut self, cmd: Command, res_tx: &mpsc::Sender<Resolved>) {
        match cmd {
            Command::SetStreams { platform, raw } => {
                if self.table.get(&platform).is_none() {
                    let known: Vec<&str> = self.table.ids().collect();
                    warn!(%platform, ?known, "unknown platform, input ignored");
                    return;
                }
                let streams = self.input.set_streams(&platform, &raw);
                debug!(%platform, %raw, streams, "streams updated");
                INPUT_EVENTS.with_label_values(&["streams"]).inc();
                self.schedule();
            }
            Command::SetRoyaltyShare { raw } => {
                let share = self.input.set_royalty_share(&raw);
                debug!(%raw, %share, "royalty share updated");
                INPUT_EVENTS.with_label_values(&["royalty_share"]).inc();
                self.schedule();
            }
            Command::SetCurrency { code } => match normalize_code(&code) {
                Some(c) => {
                    INPUT_EVENTS.with_label_values(&["currency"]).inc();
                    self.select_currency(c, res_tx);
                }
                None => warn!(%code, "invalid currency code, ignored"),
            },
            Command::RefreshRates => self.refresh(res_tx),
            // handled by run()
            Command::Shutdown => {}
        }
    }

    fn schedule(&mut self) {
        if self.debounce.trigger() {
            DEBOUNCE_RESTARTS.inc();
        }
    }

    fn select_currency(&mut self, code: String, res_tx: &mpsc::Sender<Resolved>) {
        self.currency = code.clone();
        self.generation += 1;
        let generation = self.generation;

        if let Some(res) = self.source.resolve_local(&code) {
            self.apply(res);
            return;
        }

        self.status = RateStatus::Pending { currency: code.clone() };
        info!(currency = %code, generation, "{}", self.status.message());

        let source = self.source.clone();
        let tx = res_tx.clone();
        tokio::spawn(async move {
            let resolution = source.resolve(&code).await;
            let _ = tx.send(Resolved { generation, resolution }).await;
        });
    }

    fn on_resolved(&mut self, res: Resolved) {
        if res.generation != self.generation || res.resolution.currency != self.currency {
            RATE_STALE_DISCARDED.inc();
            debug!(
                stale = %res.resolution.currency,
                selected = %self.currency,
                "discarding superseded exchange-rate resolution"
            );
            return;
        }
        self.apply(res.resolution);
    }

    fn apply(&mut self, res: Resolution) {
        let rate = res.exchange_rate();
        EXCHANGE_RATE
            .with_label_values(&[&res.currency])
            .set(rate.to_f64().unwrap_or(1.0));
        info!(currency = %res.currency, %rate, status = %res.status.message(), "rates applied");

        self.rates = res.rates;
        self.status = res.status;
        self.applied_currency = res.currency;
        self.calculate();
    }

    fn refresh(&mut self, res_tx: &mpsc::Sender<Resolved>) {
        if self.currency == BASE_CURRENCY {
            debug!("refresh skipped, USD base");
            return;
        }
        self.source.invalidate();
        let code = self.currency.clone();
        self.select_currency(code, res_tx);
    }

    fn calculate(&mut self) {
        let Some(_guard) = self.gate.try_enter() else {
            CALCULATIONS_DROPPED.inc();
            debug!("calculation in progress, request dropped");
            return;
        };

        let calculation = engine::compute(self.table, &self.input, &self.rates, &self.applied_currency);
        self.seq += 1;
        CALCULATIONS.inc();
        TOTAL_GROSS.set(calculation.aggregate.total_gross.to_f64().unwrap_or(0.0));
        TOTAL_NET.set(calculation.aggregate.total_net.to_f64().unwrap_or(0.0));

        let report = CalcReport {
            seq: self.seq,
            currency: self.applied_currency.clone(),
            exchange_rate: self.rates.rate_or_one(&self.applied_currency),
            status: self.status.clone(),
            calculation,
            computed_at: Utc::now(),
        };
        self.report_tx.send_replace(Some(report));
    }
}

async fn next_refresh(t: &mut Option<Interval>) {
    match t {
        Some(t) => {
            t.tick().await;
        }
        None => pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::tests::StaticProvider;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio::time::sleep;

    struct Harness {
        cmd_tx: mpsc::Sender<Command>,
        reports: watch::Receiver<Option<CalcReport>>,
        provider: Arc<StaticProvider>,
    }

    impl Harness {
        fn start(provider: StaticProvider, currency: &str, refresh_every: Option<Duration>) -> Self {
            let provider = Arc::new(provider);
            let source = Arc::new(ExchangeRateSource::new(provider.clone(), Duration::from_secs(600)));
            let (report_tx, reports) = watch::channel(None);
            let (cmd_tx, cmd_rx) = mpsc::channel(64);
            let cfg = ControllerCfg {
                debounce: Duration::from_millis(150),
                refresh_every,
                initial_currency: currency.to_string(),
            };
            tokio::spawn(Controller::new(cfg, source, report_tx).run(cmd_rx));
            Self { cmd_tx, reports, provider }
        }

        async fn send(&self, cmd: Command) {
            self.cmd_tx.send(cmd).await.expect("controller alive");
        }

        async fn streams(&self, platform: &str, raw: &str) {
            self.send(Command::SetStreams { platform: platform.into(), raw: raw.into() }).await;
        }

        fn latest(&self) -> CalcReport {
            self.reports.borrow().clone().expect("report published")
        }
    }

    #[test]
    fn gate_drops_reentry_until_guard_released() {
        let gate = CalcGate::new();
        let guard = gate.try_enter().expect("idle gate");
        assert_eq!(gate.phase(), Phase::Calculating);
        assert!(gate.try_enter().is_none());
        drop(guard);
        assert_eq!(gate.phase(), Phase::Idle);
        assert!(gate.try_enter().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn startup_publishes_one_zero_report() {
        let h = Harness::start(StaticProvider::failing(), "USD", None);
        sleep(Duration::from_millis(10)).await;
        let r = h.latest();
        assert_eq!(r.seq, 1);
        assert_eq!(r.currency, "USD");
        assert_eq!(r.status, RateStatus::UsdBase);
        assert!(r.calculation.results.is_empty());
        assert_eq!(r.calculation.aggregate.total_gross, dec!(0));
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_runs_engine_once_with_final_values() {
        let h = Harness::start(StaticProvider::failing(), "USD", None);
        sleep(Duration::from_millis(10)).await;

        for raw in ["1", "10", "100", "1000"] {
            h.streams("spotify", raw).await;
            sleep(Duration::from_millis(50)).await;
        }
        // masih di dalam window
        assert_eq!(h.latest().seq, 1);

        sleep(Duration::from_millis(500)).await;
        let r = h.latest();
        assert_eq!(r.seq, 2);
        assert_eq!(r.calculation.results.len(), 1);
        assert_eq!(r.calculation.results[0].streams, 1000);
        assert_eq!(r.calculation.aggregate.total_gross, dec!(4));
    }

    #[tokio::test(start_paused = true)]
    async fn share_edit_is_debounced_and_applied() {
        let h = Harness::start(StaticProvider::failing(), "USD", None);
        h.streams("tidal", "10000").await;
        h.send(Command::SetRoyaltyShare { raw: "50".into() }).await;
        sleep(Duration::from_millis(300)).await;
        let agg = h.latest().calculation.aggregate;
        assert_eq!(agg.total_gross, dec!(130));
        assert_eq!(agg.total_net, dec!(65));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_share_keeps_the_controller_running() {
        let h = Harness::start(StaticProvider::failing(), "USD", None);
        h.streams("tidal", &u64::MAX.to_string()).await;
        h.send(Command::SetRoyaltyShare { raw: "100000000000000".into() }).await;
        sleep(Duration::from_millis(300)).await;
        let r = h.latest();
        assert_eq!(r.seq, 2);
        assert_eq!(r.calculation.aggregate.total_net, Decimal::MAX);

        // masih menerima perintah
        h.send(Command::SetRoyaltyShare { raw: "50".into() }).await;
        sleep(Duration::from_millis(300)).await;
        let r = h.latest();
        assert_eq!(r.seq, 3);
        assert_eq!(
            r.calculation.aggregate.total_net,
            Decimal::from(u64::MAX) * dec!(0.013) * dec!(0.5)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_platform_is_ignored() {
        let h = Harness::start(StaticProvider::failing(), "USD", None);
        h.streams("napster", "5000").await;
        sleep(Duration::from_millis(300)).await;
        assert_eq!(h.latest().seq, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn currency_change_converts_results() {
        let h = Harness::start(
            StaticProvider::with_rates(vec![("EUR", dec!(0.9))]),
            "USD",
            None,
        );
        h.streams("spotify", "1000").await;
        sleep(Duration::from_millis(300)).await;
        h.send(Command::SetCurrency { code: "eur".into() }).await;
        sleep(Duration::from_millis(10)).await;

        let r = h.latest();
        assert_eq!(r.currency, "EUR");
        assert_eq!(r.exchange_rate, dec!(0.9));
        assert_eq!(r.calculation.aggregate.total_gross, dec!(3.6));
        assert_eq!(r.calculation.aggregate.currency_symbol, "€");
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_back_to_usd_needs_no_lookup() {
        let h = Harness::start(
            StaticProvider::with_rates(vec![("EUR", dec!(0.9))]),
            "EUR",
            None,
        );
        sleep(Duration::from_millis(10)).await;
        assert_eq!(h.provider.calls(), 1);
        h.send(Command::SetCurrency { code: "USD".into() }).await;
        sleep(Duration::from_millis(10)).await;
        let r = h.latest();
        assert_eq!(r.exchange_rate, dec!(1));
        assert_eq!(r.status, RateStatus::UsdBase);
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_failure_still_produces_results() {
        let h = Harness::start(StaticProvider::failing(), "USD", None);
        h.streams("apple", "1000").await;
        h.send(Command::SetCurrency { code: "JPY".into() }).await;
        sleep(Duration::from_millis(300)).await;

        let r = h.latest();
        assert_eq!(r.currency, "JPY");
        assert!(r.status.is_approximate());
        assert_eq!(r.exchange_rate, dec!(1));
        assert_eq!(r.calculation.aggregate.total_gross, dec!(8));
        assert_eq!(r.calculation.aggregate.currency_symbol, "¥");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_resolution_for_old_currency_is_discarded() {
        // call #1 (EUR) lambat, call #2 (GBP) cepat
        let provider = StaticProvider::with_rates(vec![("EUR", dec!(0.9)), ("GBP", dec!(0.8))])
            .delayed(vec![Duration::from_secs(2), Duration::from_millis(100)]);
        let h = Harness::start(provider, "USD", None);
        h.streams("spotify", "1000").await;
        sleep(Duration::from_millis(300)).await;
        let before = h.latest().seq;

        h.send(Command::SetCurrency { code: "EUR".into() }).await;
        sleep(Duration::from_millis(10)).await;
        h.send(Command::SetCurrency { code: "GBP".into() }).await;
        sleep(Duration::from_secs(5)).await;

        let r = h.latest();
        assert_eq!(r.currency, "GBP");
        assert_eq!(r.exchange_rate, dec!(0.8));
        assert_eq!(r.calculation.aggregate.total_gross, dec!(3.2));
        // only the GBP resolution produced a report
        assert_eq!(r.seq, before + 1);
        assert_eq!(h.provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn results_keep_old_currency_while_lookup_is_pending() {
        let provider = StaticProvider::with_rates(vec![("EUR", dec!(0.9))])
            .delayed(vec![Duration::from_secs(2)]);
        let h = Harness::start(provider, "USD", None);
        h.send(Command::SetCurrency { code: "EUR".into() }).await;
        h.streams("spotify", "1000").await;
        sleep(Duration::from_millis(300)).await;

        let pending = h.latest();
        assert_eq!(pending.currency, "USD");
        assert_eq!(pending.status, RateStatus::Pending { currency: "EUR".into() });
        assert_eq!(pending.calculation.aggregate.total_gross, dec!(4));

        sleep(Duration::from_secs(3)).await;
        let done = h.latest();
        assert_eq!(done.currency, "EUR");
        assert_eq!(done.calculation.aggregate.total_gross, dec!(3.6));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_refresh_refetches_selected_currency() {
        let h = Harness::start(
            StaticProvider::with_rates(vec![("EUR", dec!(0.9))]),
            "EUR",
            Some(Duration::from_secs(60)),
        );
        sleep(Duration::from_millis(10)).await;
        assert_eq!(h.provider.calls(), 1);
        sleep(Duration::from_secs(61)).await;
        assert_eq!(h.provider.calls(), 2);
        assert_eq!(h.latest().status.label(), "live");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop() {
        let h = Harness::start(StaticProvider::failing(), "USD", None);
        h.send(Command::Shutdown).await;
        sleep(Duration::from_millis(10)).await;
        assert!(h.cmd_tx.send(Command::RefreshRates).await.is_err());
    }
}
