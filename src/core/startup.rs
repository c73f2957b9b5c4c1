//! Startup readiness signalling.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

/// Single-assignment readiness latch.
///
/// Gateway callers that arrive before startup completes wait here instead of
/// failing. Once opened the gate never closes and waiters resume without
/// further suspension.
pub struct ReadyGate {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl ReadyGate {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Open the gate. Later calls have no effect.
    pub fn open(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_open(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the gate opens; returns immediately once open.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // Err would mean the sender vanished, which only happens at teardown.
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregated result of the connect-all pass.
#[derive(Debug, Clone, Default)]
pub struct StartupReport {
    pub connected: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<String>,
}

impl StartupReport {
    /// Servers that were attempted; disabled ones are not counted.
    pub fn total(&self) -> usize {
        self.connected.len() + self.failed.len()
    }

    /// One-line summary in "N/M servers connected" form.
    pub fn summary(&self) -> String {
        let mut line = format!("{}/{} servers connected", self.connected.len(), self.total());
        if !self.failed.is_empty() {
            let names: Vec<&str> = self.failed.iter().map(|(name, _)| name.as_str()).collect();
            line.push_str(&format!(" (failed: {})", names.join(", ")));
        }
        line
    }
}

/// Startup bookkeeping shared between the hub and the gateway.
pub struct StartupState {
    pub gate: ReadyGate,
    started: AtomicBool,
    report: Mutex<Option<StartupReport>>,
}

impl StartupState {
    pub fn new() -> Self {
        Self {
            gate: ReadyGate::new(),
            started: AtomicBool::new(false),
            report: Mutex::new(None),
        }
    }

    /// True exactly once, for the caller that runs the connect-all pass.
    pub fn try_begin(&self) -> bool {
        !self.started.swap(true, Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Record the report and open the gate.
    pub fn finish(&self, report: StartupReport) {
        *self.report.lock() = Some(report);
        self.gate.open();
    }

    pub fn report(&self) -> Option<StartupReport> {
        self.report.lock().clone()
    }
}

impl Default for StartupState {
    fn default() -> Self {
        Self::new()
    }
}
