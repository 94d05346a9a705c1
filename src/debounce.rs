// ===============================
// src/debounce.rs
// ===============================
//
// Satu timer pending: trigger() baru membatalkan & menjadwal ulang deadline.
// Dipakai di dalam select! loop controller lewat `elapsed()`.
//
use std::future::pending;
use tokio::time::{sleep_until, Duration, Instant};

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, deadline: None }
    }

    /// (Re)start the quiescence window. Returns true if a pending window was
    /// restarted rather than opened.
    pub fn trigger(&mut self) -> bool {
        let restarted = self.deadline.is_some();
        self.deadline = Some(Instant::now() + self.window);
        restarted
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves when the window has elapsed; never resolves while idle.
    /// Caller must `cancel()` after it fires.
    pub async fn elapsed(&self) {
        match self.deadline {
            Some(d) => sleep_until(d).await,
            None => pending::<()>().await,
        }
    }
}
