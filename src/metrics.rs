// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use tracing::{debug, error, info};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Engine / controller --------
pub static CALCULATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("royalty_calculations_total", "calculation passes").unwrap()
});

pub static CALCULATIONS_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "royalty_calculations_dropped_total",
        "recalculation requests dropped while a calculation was running",
    )
    .unwrap()
});

pub static INPUT_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("input_events_total", "input edits (label: field)"),
        &["field"],
    )
    .unwrap()
});

pub static DEBOUNCE_RESTARTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "debounce_restarts_total",
        "edits that restarted a pending quiescence window",
    )
    .unwrap()
});

pub static TOTAL_GROSS: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new("royalty_total_gross", "last total gross (selected currency)").unwrap()
});

pub static TOTAL_NET: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new("royalty_total_net", "last total net (selected currency)").unwrap()
});

// -------- Exchange rates --------
pub static RATE_RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "rate_resolutions_total",
            "exchange-rate resolutions (label: outcome = usd|cached|live|unavailable)",
        ),
        &["outcome"],
    )
    .unwrap()
});

pub static RATE_STALE_DISCARDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "rate_resolutions_stale_total",
        "resolutions discarded because another currency was selected meanwhile",
    )
    .unwrap()
});

pub static EXCHANGE_RATE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("exchange_rate", "applied USD multiplier (label: currency)"),
        &["currency"],
    )
    .unwrap()
});

// ---- Config visibility ----
pub static CONFIG_CURRENCY: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_default_currency", "startup currency (label: currency)"),
        &["currency"],
    )
    .unwrap()
});

pub fn init() {
    for m in [
        REGISTRY.register(Box::new(CALCULATIONS.clone())),
        REGISTRY.register(Box::new(CALCULATIONS_DROPPED.clone())),
        REGISTRY.register(Box::new(INPUT_EVENTS.clone())),
        REGISTRY.register(Box::new(DEBOUNCE_RESTARTS.clone())),
        REGISTRY.register(Box::new(TOTAL_GROSS.clone())),
        REGISTRY.register(Box::new(TOTAL_NET.clone())),
        REGISTRY.register(Box::new(RATE_RESOLUTIONS.clone())),
        REGISTRY.register(Box::new(RATE_STALE_DISCARDED.clone())),
        REGISTRY.register(Box::new(EXCHANGE_RATE.clone())),
        REGISTRY.register(Box::new(CONFIG_CURRENCY.clone())),
    ] {
        if let Err(e) = m {
            error!(?e, "metric registration failed");
        }
    }
}

fn encode_metrics() -> Vec<u8> {
    let mut buf = Vec::new();
    match TextEncoder::new().encode(&REGISTRY.gather(), &mut buf) {
        Ok(()) if !buf.is_empty() => buf,
        Ok(()) => b"# royalty_estimator: no samples yet\n".to_vec(),
        Err(e) => {
            error!(?e, "metrics encode failed");
            Vec::new()
        }
    }
}

/// Status line and body for one request line, e.g. `GET /metrics HTTP/1.1`.
fn route(request_line: &str) -> (&'static str, Vec<u8>) {
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some("/metrics")) | (Some("GET"), Some("/")) => ("200 OK", encode_metrics()),
        (Some("GET"), Some(_)) => ("404 Not Found", b"not found\n".to_vec()),
        _ => ("405 Method Not Allowed", b"GET only\n".to_vec()),
    }
}

fn handle_client(mut stream: TcpStream) {
    let mut req = [0u8; 1024];
    let n = stream.read(&mut req).unwrap_or(0);
    let head = String::from_utf8_lossy(&req[..n]);
    let (status, body) = route(head.lines().next().unwrap_or(""));

    let header = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    if let Err(e) = stream.write_all(header.as_bytes()).and_then(|_| stream.write_all(&body)) {
        debug!(?e, "metrics client went away");
    }
}

// Dedicated OS thread so the tokio runtime only runs the controller
pub fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                error!(%addr, ?e, "metrics bind failed, metrics disabled");
                return;
            }
        };
        info!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => error!(?e, "metrics accept error"),
            }
        }
    });
}
