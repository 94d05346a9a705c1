// ===============================
// src/main.rs
// ===============================
/*
 cd royalty_estimator

 # sekali hitung lalu keluar
 cargo run -- --once --streams spotify=1000 --streams apple=1000 --currency EUR

 # interaktif (stdin): "tidal 10000", "share 50", "currency GBP", "quit"
 cargo run

 # metrics
 curl -s localhost:9898/metrics | egrep '^(royalty_|rate_resolutions)'
*/
/*
=============================================================================
Project : royalty_estimator — streaming royalty estimator in Rust
Module  : main.rs
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
mod config;
mod consent;
mod console;
mod controller;
mod currency;
mod debounce;
mod domain;
mod engine;
mod exchange;
mod input;
mod metrics;
mod rates;
mod rates_api;
mod report;

use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{mpsc, watch},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, ConfigError, Settings};
use crate::console::Line;
use crate::consent::ConsentGate;
use crate::controller::{Controller, ControllerCfg};
use crate::domain::{CalcReport, Command};
use crate::exchange::ExchangeRateSource;
use crate::input::InputState;
use crate::rates::RateTable;
use crate::rates_api::HttpRateProvider;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // ---- Logging (stderr; stdout dipakai untuk report) ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // ---- Load config & CLI ----
    let cli = Cli::parse();
    let settings = config::load()?;
    let currency = match &cli.currency {
        Some(c) => currency::normalize_code(c).ok_or_else(|| ConfigError::Currency(c.clone()))?,
        None => settings.default_currency.clone(),
    };

    // ---- Metrics ----
    metrics::init();
    if let (Some(port), false) = (settings.metrics_port, cli.once) {
        metrics::serve_metrics(port);
    }
    metrics::CONFIG_CURRENCY.with_label_values(&[&currency]).set(1);

    info!(
        currency = %currency,
        rates_api = %settings.rates_api_url,
        debounce_ms = settings.debounce.as_millis() as u64,
        refresh_secs = settings.rate_refresh.map(|d| d.as_secs()),
        cache_ttl_secs = settings.rate_cache_ttl.as_secs(),
        metrics_port = ?settings.metrics_port,
        "startup config"
    );

    // ---- Exchange-rate source ----
    let provider = Arc::new(HttpRateProvider::new(
        settings.rates_api_url.clone(),
        settings.http_timeout,
    )?);
    let source = Arc::new(ExchangeRateSource::new(provider, settings.rate_cache_ttl));

    // Input awal dari CLI
    let mut initial: Vec<Command> = Vec::new();
    for arg in &cli.streams {
        match console::parse_stream_arg(arg) {
            Some(cmd) => initial.push(cmd),
            None => warn!(%arg, "expected PLATFORM=COUNT, ignored"),
        }
    }
    if let Some(raw) = &cli.share {
        initial.push(Command::SetRoyaltyShare { raw: raw.clone() });
    }

    if cli.once {
        let report = calculate_once(&source, &currency, initial).await;
        report::print(&report, cli.json);
        return Ok(());
    }

    run_interactive(settings, source, currency, initial, cli.json).await
}

async fn calculate_once(source: &ExchangeRateSource, currency: &str, initial: Vec<Command>) -> CalcReport {
    let table = RateTable::reference();
    let mut input = InputState::new();
    for cmd in initial {
        match cmd {
            Command::SetStreams { platform, raw } if table.get(&platform).is_some() => {
                input.set_streams(&platform, &raw);
            }
            Command::SetStreams { platform, .. } => warn!(%platform, "unknown platform, input ignored"),
            Command::SetRoyaltyShare { raw } => {
                input.set_royalty_share(&raw);
            }
            _ => {}
        }
    }

    let resolution = source.resolve(currency).await;
    let calculation = engine::compute(table, &input, &resolution.rates, &resolution.currency);
    CalcReport {
        seq: 1,
        currency: resolution.currency.clone(),
        exchange_rate: resolution.exchange_rate(),
        status: resolution.status,
        calculation,
        computed_at: Utc::now(),
    }
}

async fn run_interactive(
    settings: Settings,
    source: Arc<ExchangeRateSource>,
    currency: String,
    initial: Vec<Command>,
    json: bool,
) -> Result<(), BoxError> {
    // ---- Consent gate ----
    let mut consent = ConsentGate::from_cookie_header(settings.consent_cookie.as_deref());
    consent.on_accept(|| info!("cookie consent present: third-party ads may load"));

    // ---- Buses ----
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(256);
    let (report_tx, report_rx) = watch::channel::<Option<CalcReport>>(None);

    let cfg = ControllerCfg {
        debounce: settings.debounce,
        refresh_every: settings.rate_refresh,
        initial_currency: currency,
    };
    let controller = tokio::spawn(Controller::new(cfg, source, report_tx).run(cmd_rx));
    let printer = tokio::spawn(report::run(report_rx, json));

    for cmd in initial {
        cmd_tx.send(cmd).await?;
    }

    // ---- stdin loop ----
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(raw) = lines.next_line().await? {
        match console::parse_line(&raw) {
            Line::Command(cmd) => {
                if cmd_tx.send(cmd).await.is_err() {
                    warn!("controller gone, exiting");
                    break;
                }
            }
            Line::AcceptCookies => {
                let cookie = consent.accept(Utc::now());
                println!("Set-Cookie: {cookie}");
            }
            Line::Quit => break,
            Line::Empty => {}
            Line::Unknown(l) => warn!(line = %l, "unrecognised input"),
        }
    }

    let _ = cmd_tx.send(Command::Shutdown).await;
    controller.await?;
    printer.await?;
    Ok(())
}
