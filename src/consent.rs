// ===============================
// src/consent.rs (cookie-consent gate)
// ===============================
//
// Gate sederhana: ads (atau efek samping pihak ketiga lain) hanya boleh jalan
// setelah cookie `user_cookie_consent=true` ada. Loading ads sendiri di luar
// scope; yang dimodelkan hanya has_consented() + on_accept(callback).
//
use chrono::{DateTime, Duration, Utc};
use tracing::info;

pub const CONSENT_COOKIE_NAME: &str = "user_cookie_consent";
pub const CONSENT_EXPIRY_DAYS: i64 = 365;

type Callback = Box<dyn FnOnce() + Send>;

pub struct ConsentGate {
    consented: bool,
    waiting: Vec<Callback>,
}

impl ConsentGate {
    /// `header` is a raw `Cookie:` value, e.g. `"a=1; user_cookie_consent=true"`.
    pub fn from_cookie_header(header: Option<&str>) -> Self {
        let consented = header
            .and_then(|h| cookie_value(h, CONSENT_COOKIE_NAME))
            .map(|v| v == "true")
            .unwrap_or(false);
        Self { consented, waiting: Vec::new() }
    }

    pub fn has_consented(&self) -> bool {
        self.consented
    }

    /// Runs now when consent already exists, otherwise on `accept()`.
    pub fn on_accept<F>(&mut self, cb: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.consented {
            cb();
        } else {
            self.waiting.push(Box::new(cb));
        }
    }

    /// Records consent, fires queued callbacks once, returns the
    /// `Set-Cookie` value to persist it.
    pub fn accept(&mut self, now: DateTime<Utc>) -> String {
        if !self.consented {
            self.consented = true;
            info!(callbacks = self.waiting.len(), "cookie consent recorded");
            for cb in self.waiting.drain(..) {
                cb();
            }
        }
        set_cookie_value(now)
    }
}

fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k.trim() == name).then(|| v.trim())
    })
}

fn set_cookie_value(now: DateTime<Utc>) -> String {
    let expires = now + Duration::days(CONSENT_EXPIRY_DAYS);
    format!(
        "{CONSENT_COOKIE_NAME}=true; expires={}; path=/; SameSite=Lax",
        expires.format("%a, %d %b %Y %H:%M:%S GMT")
    )
}
