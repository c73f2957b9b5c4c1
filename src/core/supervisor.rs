//! Keep-alive supervision.
//!
//! A background loop health-checks every registered server and drives the
//! close-and-reconnect sequence for unhealthy ones. Each server backs off
//! independently: one failing server never delays the others' checks, and
//! repeated failures double the delay up to a ceiling instead of
//! busy-retrying every tick.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    config::{HubSettings, ServerConfig},
    connection::ConnectionManager,
};

/// Invoked with the server name after every successful reconnect.
pub type ReconnectCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Transient per-server supervision state. Never persisted.
struct KeepAliveEntry {
    definition: ServerConfig,
    consecutive_failures: u32,
    next_attempt: Option<Instant>,
}

pub struct Supervisor {
    manager: Arc<ConnectionManager>,
    registry: DashMap<String, KeepAliveEntry>,
    on_reconnect: RwLock<Option<ReconnectCallback>>,
    cancel: CancellationToken,
    loop_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    settings: HubSettings,
}

impl Supervisor {
    pub fn new(manager: Arc<ConnectionManager>, settings: HubSettings) -> Self {
        Self {
            manager,
            registry: DashMap::new(),
            on_reconnect: RwLock::new(None),
            cancel: CancellationToken::new(),
            loop_handle: Mutex::new(None),
            settings,
        }
    }

    /// Register a server for supervision. Re-registering refreshes the
    /// stored definition but keeps the existing backoff state.
    pub fn mark_keep_alive(&self, definition: &ServerConfig) {
        match self.registry.entry(definition.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                entry.get_mut().definition = definition.clone();
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                debug!("Supervising '{}'", definition.name);
                entry.insert(KeepAliveEntry {
                    definition: definition.clone(),
                    consecutive_failures: 0,
                    next_attempt: None,
                });
            }
        }
    }

    /// Supervised server names, sorted.
    pub fn supervised(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Register the single reconnect callback, replacing any previous one.
    pub fn set_reconnect_callback(&self, callback: ReconnectCallback) {
        *self.on_reconnect.write() = Some(callback);
    }

    /// Spawn the periodic health loop. Subsequent calls are no-ops.
    pub fn start_health_checks(self: &Arc<Self>) {
        let mut slot = self.loop_handle.lock();
        if slot.is_some() {
            return;
        }
        let supervisor = Arc::clone(self);
        *slot = Some(tokio::spawn(async move { supervisor.run_loop().await }));
    }

    async fn run_loop(&self) {
        let mut ticker = tokio::time::interval(self.settings.health_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Health loop stopping");
                    break;
                }
                _ = ticker.tick() => self.sweep().await,
            }
        }
    }

    /// One pass over the registry, strictly one server at a time.
    async fn sweep(&self) {
        let names: Vec<String> = self.registry.iter().map(|e| e.key().clone()).collect();
        for name in names {
            // Clone out; the registry guard must not live across an await.
            let Some((definition, backing_off)) = self.entry_state(&name) else {
                continue;
            };
            if definition.disabled {
                // Disabled by a config reload; close anything still open
                // instead of reconnecting.
                if self.connected(&name) {
                    info!("Server '{}' disabled, closing", name);
                    self.manager.close(&name).await;
                }
                continue;
            }
            if backing_off {
                continue;
            }
            if self.is_healthy(&name).await {
                self.note_healthy(&name);
                continue;
            }
            self.reconnect(&name, &definition).await;
        }
    }

    fn entry_state(&self, name: &str) -> Option<(ServerConfig, bool)> {
        let entry = self.registry.get(name)?;
        let backing_off = entry
            .next_attempt
            .map_or(false, |at| Instant::now() < at);
        Some((entry.definition.clone(), backing_off))
    }

    fn connected(&self, name: &str) -> bool {
        self.manager
            .get_connection(name)
            .map_or(false, |conn| conn.is_connected())
    }

    async fn is_healthy(&self, name: &str) -> bool {
        self.connected(name) && self.manager.health_check(name).await
    }

    fn note_healthy(&self, name: &str) {
        if let Some(mut entry) = self.registry.get_mut(name) {
            if entry.consecutive_failures > 0 {
                debug!("Server '{}' healthy again", name);
            }
            entry.consecutive_failures = 0;
            entry.next_attempt = None;
        }
    }

    /// Close-and-connect for one server. On success the failure state resets
    /// and the reconnect callback fires; on failure the next attempt is
    /// scheduled with exponential backoff. Returns whether the server came
    /// back.
    pub async fn reconnect(&self, name: &str, definition: &ServerConfig) -> bool {
        info!("Reconnecting server '{}'", name);
        self.manager.close(name).await;
        match self.manager.connect(definition).await {
            Ok(_) => {
                self.note_healthy(name);
                let callback = self.on_reconnect.read().clone();
                if let Some(callback) = callback {
                    callback(name);
                }
                info!("Server '{}' reconnected", name);
                true
            }
            Err(e) => {
                let delay = self.schedule_retry(name);
                warn!(
                    "Reconnect of '{}' failed: {} (next attempt in {:?})",
                    name, e, delay
                );
                false
            }
        }
    }

    fn schedule_retry(&self, name: &str) -> Duration {
        let mut delay = self.settings.backoff_base();
        if let Some(mut entry) = self.registry.get_mut(name) {
            entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
            delay = calculate_backoff(
                entry.consecutive_failures,
                self.settings.backoff_base(),
                self.settings.backoff_cap(),
            );
            entry.next_attempt = Some(Instant::now() + delay);
        }
        delay
    }

    /// Stop the loop, then close every connection, awaiting each close.
    pub async fn graceful_shutdown(&self) {
        self.cancel.cancel();
        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Health loop ended abnormally: {}", e);
            }
        }
        self.manager.shutdown_all().await;
        info!("Supervisor shut down");
    }
}

/// Delay before attempt `n` (1-based): `base * 2^(n-1)`, capped.
pub fn calculate_backoff(consecutive_failures: u32, base: Duration, cap: Duration) -> Duration {
    if consecutive_failures == 0 {
        return Duration::ZERO;
    }
    let exponent = consecutive_failures.saturating_sub(1).min(63);
    let factor = 2u64.saturating_pow(exponent);
    let millis = (base.as_millis() as u64).saturating_mul(factor);
    Duration::from_millis(millis.min(cap.as_millis() as u64))
}
