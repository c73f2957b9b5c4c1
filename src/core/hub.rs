//! The hub aggregate.
//!
//! `McpHub` owns every moving part: configuration, the connection manager,
//! the keep-alive supervisor, the tool catalog, and the gateway. Hosts embed
//! it behind three entry points: `dispatch` for the gateway tool,
//! `status_command` and `reconnect_all` for the two textual commands.

use std::{path::PathBuf, sync::Arc};

use futures::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    config::{HubConfig, LifecyclePolicy, ServerConfig},
    connection::{ConnectionManager, ConnectionStatus},
    startup::{StartupReport, StartupState},
    supervisor::Supervisor,
};
use crate::{
    catalog::index::ToolCatalog,
    error::{HubError, HubResult},
    gateway::{Gateway, GatewayParams, GatewayResponse},
};

/// Refresh requests queue here between a list-changed notification and the
/// worker re-listing the server.
const REFRESH_QUEUE: usize = 32;

/// Severity of a host-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warn,
    Error,
}

/// Optional host-supplied channel for human-readable messages. The hub
/// behaves identically with no sink installed.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, level: NotifyLevel, message: &str);
}

type SinkSlot = Arc<RwLock<Option<Arc<dyn NotificationSink>>>>;

fn push_notification(sink: &SinkSlot, level: NotifyLevel, message: &str) {
    // Clone out so the lock is not held across the host callback.
    let sink = sink.read().clone();
    if let Some(sink) = sink {
        sink.notify(level, message);
    }
}

pub struct McpHub {
    config: Arc<RwLock<Arc<HubConfig>>>,
    config_path: Option<PathBuf>,
    catalog: Arc<ToolCatalog>,
    connections: Arc<ConnectionManager>,
    supervisor: Arc<Supervisor>,
    gateway: Gateway,
    startup: Arc<StartupState>,
    refresh_rx: Mutex<Option<mpsc::Receiver<String>>>,
    refresh_worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
    cancel: CancellationToken,
    sink: SinkSlot,
}

impl McpHub {
    pub fn new(config: HubConfig) -> Arc<Self> {
        Self::build(config, None)
    }

    /// Load the YAML config at `path` and build a hub that remembers the
    /// path, so `reconnect_all` can reload it.
    pub async fn from_file(path: impl Into<PathBuf>) -> HubResult<Arc<Self>> {
        let path = path.into();
        let config = HubConfig::from_file(&path).await?;
        Ok(Self::build(config, Some(path)))
    }

    fn build(config: HubConfig, config_path: Option<PathBuf>) -> Arc<Self> {
        let settings = config.settings.clone();
        let (refresh_tx, refresh_rx) = mpsc::channel(REFRESH_QUEUE);
        let connections = Arc::new(ConnectionManager::new(settings.clone(), refresh_tx));
        let supervisor = Arc::new(Supervisor::new(Arc::clone(&connections), settings));
        let catalog = Arc::new(ToolCatalog::new());
        let config = Arc::new(RwLock::new(Arc::new(config)));
        let startup = Arc::new(StartupState::new());
        let gateway = Gateway::new(
            Arc::clone(&catalog),
            Arc::clone(&connections),
            Arc::clone(&config),
            Arc::clone(&startup),
        );

        let hub = Arc::new(Self {
            config,
            config_path,
            catalog,
            connections,
            supervisor,
            gateway,
            startup,
            refresh_rx: Mutex::new(Some(refresh_rx)),
            refresh_worker: Mutex::new(None),
            cancel: CancellationToken::new(),
            sink: Arc::new(RwLock::new(None)),
        });
        hub.register_reconnect_callback();
        hub
    }

    pub fn set_notification_sink(&self, sink: Arc<dyn NotificationSink>) {
        *self.sink.write() = Some(sink);
    }

    /// The reconnect callback rebuilds the reconnected server's catalog
    /// entries from its fresh snapshot. Captures components, not the hub,
    /// so the supervisor holds no cycle back to us.
    fn register_reconnect_callback(&self) {
        let catalog = Arc::clone(&self.catalog);
        let connections = Arc::clone(&self.connections);
        let config = Arc::clone(&self.config);
        let sink = Arc::clone(&self.sink);
        self.supervisor
            .set_reconnect_callback(Arc::new(move |server| {
                let Some(conn) = connections.get_connection(server) else {
                    return;
                };
                let snapshot = config.read().clone();
                let Some(definition) = snapshot.get_server(server) else {
                    return;
                };
                let count = catalog.rebuild_for_server(
                    definition,
                    &conn.tools,
                    &conn.resources,
                    snapshot.settings.prefix_style,
                );
                push_notification(
                    &sink,
                    NotifyLevel::Info,
                    &format!("Server '{}' reconnected ({} tools)", server, count),
                );
            }));
    }

    /// Connect every enabled server with bounded concurrency, then open the
    /// ready gate. Exactly one caller runs the pass; concurrent and later
    /// callers await it and receive the same report.
    pub async fn startup(self: &Arc<Self>) -> StartupReport {
        if !self.startup.try_begin() {
            self.startup.gate.wait().await;
            return self.startup.report().unwrap_or_default();
        }

        self.spawn_refresh_worker();

        let config = self.current_config();
        let mut report = StartupReport::default();
        let mut targets = Vec::new();
        for server in &config.servers {
            if server.disabled {
                debug!("Server '{}' disabled, skipping", server.name);
                report.skipped.push(server.name.clone());
            } else {
                targets.push(server.clone());
            }
        }

        let limit = config.settings.startup_concurrency.max(1);
        let results: Vec<(String, HubResult<usize>)> = stream::iter(targets)
            .map(|definition| async move {
                let name = definition.name.clone();
                (name, self.bring_up(&definition).await)
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        for (name, outcome) in results {
            match outcome {
                Ok(count) => {
                    debug!("Server '{}' up with {} tools", name, count);
                    report.connected.push(name);
                }
                Err(e) => report.failed.push((name, e.to_string())),
            }
        }
        report.connected.sort();
        report.failed.sort();
        report.skipped.sort();

        self.supervisor.start_health_checks();

        let summary = report.summary();
        info!("Startup finished: {}", summary);
        let level = if report.failed.is_empty() {
            NotifyLevel::Info
        } else {
            NotifyLevel::Warn
        };
        push_notification(&self.sink, level, &format!("MCP hub: {}", summary));

        self.startup.finish(report.clone());
        report
    }

    /// Supervision is marked before the connect attempt, so a keep-alive
    /// server that fails its first connect still gets reconnect attempts.
    async fn bring_up(&self, definition: &ServerConfig) -> HubResult<usize> {
        if definition.lifecycle == LifecyclePolicy::KeepAlive {
            self.supervisor.mark_keep_alive(definition);
        }
        let conn = self.connections.connect(definition).await?;
        let count = self.catalog.rebuild_for_server(
            definition,
            &conn.tools,
            &conn.resources,
            self.current_config().settings.prefix_style,
        );
        Ok(count)
    }

    fn spawn_refresh_worker(self: &Arc<Self>) {
        let Some(mut rx) = self.refresh_rx.lock().take() else {
            return;
        };
        let hub = Arc::clone(self);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    request = rx.recv() => {
                        let Some(server) = request else { break };
                        if let Err(e) = hub.refresh_server(&server).await {
                            warn!("Catalog refresh for '{}' failed: {}", server, e);
                        }
                    }
                }
            }
            debug!("Refresh worker stopping");
        });
        *self.refresh_worker.lock() = Some(handle);
    }

    /// Re-list one server and replace its snapshot and catalog entries.
    /// Driven by list-changed notifications from the upstream.
    pub async fn refresh_server(&self, server: &str) -> HubResult<()> {
        let config = self.current_config();
        let definition = config
            .get_server(server)
            .ok_or_else(|| HubError::ServerNotFound(server.to_string()))?;
        let conn = self.connections.refresh_snapshot(definition).await?;
        let count = self.catalog.rebuild_for_server(
            definition,
            &conn.tools,
            &conn.resources,
            config.settings.prefix_style,
        );
        info!("Refreshed '{}' ({} tools)", server, count);
        Ok(())
    }

    /// The single externally callable operation.
    pub async fn dispatch(&self, params: GatewayParams) -> GatewayResponse {
        self.gateway.dispatch(params).await
    }

    /// Text for the host's status command: the per-server summary followed
    /// by every public tool name, grouped by server.
    pub async fn status_command(&self) -> String {
        let mut text = self.gateway.dispatch(GatewayParams::default()).await.text;
        for server in self.catalog.server_names() {
            if let Some(names) = self.catalog.names_for(&server) {
                if !names.is_empty() {
                    text.push_str(&format!("\n{}: {}", server, names.join(", ")));
                }
            }
        }
        text
    }

    /// Reload the config file (when the hub owns one), then close and
    /// reconnect every enabled server. Returns the summary line.
    pub async fn reconnect_all(&self) -> String {
        self.startup.gate.wait().await;

        if let Err(e) = self.reload_config().await {
            warn!("Config reload failed, keeping previous config: {}", e);
            push_notification(
                &self.sink,
                NotifyLevel::Warn,
                &format!("Config reload failed: {}", e),
            );
        }

        let config = self.current_config();

        // Servers disabled by the reload are closed and dropped from the
        // catalog; their registry entries stay, marked disabled, until
        // shutdown.
        for definition in &config.servers {
            if !definition.disabled {
                continue;
            }
            if definition.lifecycle == LifecyclePolicy::KeepAlive {
                self.supervisor.mark_keep_alive(definition);
            }
            let open = self
                .connections
                .get_connection(&definition.name)
                .map_or(false, |conn| conn.status != ConnectionStatus::Disconnected);
            if open {
                info!("Server '{}' disabled, closing", definition.name);
                self.connections.close(&definition.name).await;
            }
            self.catalog.remove_server(&definition.name);
        }

        let mut ok = 0usize;
        let mut total = 0usize;
        // One server at a time; startup is the only concurrent connect path.
        for definition in config.enabled_servers() {
            total += 1;
            if definition.lifecycle == LifecyclePolicy::KeepAlive {
                self.supervisor.mark_keep_alive(definition);
            }
            if self.supervisor.reconnect(&definition.name, definition).await {
                ok += 1;
            }
        }

        let summary = format!("Reconnected {}/{} servers", ok, total);
        info!("{}", summary);
        let level = if ok == total {
            NotifyLevel::Info
        } else {
            NotifyLevel::Warn
        };
        push_notification(&self.sink, level, &summary);
        summary
    }

    /// Settings stay as constructed; only the server list and prefix style
    /// take effect from the reloaded file.
    async fn reload_config(&self) -> HubResult<()> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };
        let loaded = HubConfig::from_file(path).await?;
        *self.config.write() = Arc::new(loaded);
        debug!("Config reloaded from {}", path.display());
        Ok(())
    }

    /// Stop background work and close every connection. If startup is in
    /// flight it finishes first, so a rapid start-then-stop leaks nothing.
    pub async fn shutdown(&self) {
        if self.startup.is_started() {
            self.startup.gate.wait().await;
        }
        self.cancel.cancel();
        let worker = self.refresh_worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("Refresh worker ended abnormally: {}", e);
            }
        }
        self.supervisor.graceful_shutdown().await;
        info!("Hub shut down");
    }

    pub fn is_ready(&self) -> bool {
        self.startup.gate.is_open()
    }

    pub fn startup_report(&self) -> Option<StartupReport> {
        self.startup.report()
    }

    fn current_config(&self) -> Arc<HubConfig> {
        self.config.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{AuthConfig, HubSettings, ServerTransport, ToolPrefixStyle};
    use rmcp::model::Tool;
    use serde_json::json;
    use std::borrow::Cow;
    use std::collections::HashMap;
    use std::io::Write as _;

    struct RecordingSink(Mutex<Vec<(NotifyLevel, String)>>);

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Vec::new())))
        }

        fn messages(&self) -> Vec<(NotifyLevel, String)> {
            self.0.lock().clone()
        }
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, level: NotifyLevel, message: &str) {
            self.0.lock().push((level, message.to_string()));
        }
    }

    fn bad_stdio(name: &str) -> ServerConfig {
        ServerConfig {
            name: name.to_string(),
            transport: ServerTransport::Stdio {
                command: "/nonexistent-mcp-server-binary".to_string(),
                args: vec![],
                env: HashMap::new(),
            },
            auth: AuthConfig::default(),
            lifecycle: LifecyclePolicy::KeepAlive,
            expose_resources: true,
            debug: false,
            disabled: false,
        }
    }

    fn sample_tool(name: &str) -> Tool {
        Tool {
            name: Cow::Owned(name.to_string()),
            title: None,
            description: Some(Cow::Owned(format!("{} tool", name))),
            input_schema: Arc::new(
                json!({"type": "object"}).as_object().unwrap().clone(),
            ),
            output_schema: None,
            annotations: None,
            icons: None,
        }
    }

    #[tokio::test]
    async fn test_startup_with_empty_config() {
        let hub = McpHub::new(HubConfig::default());
        assert!(!hub.is_ready());

        let report = hub.startup().await;
        assert_eq!(report.total(), 0);
        assert_eq!(report.summary(), "0/0 servers connected");
        assert!(hub.is_ready());

        let response = hub.dispatch(GatewayParams::default()).await;
        assert!(response.text.contains("0/0 servers connected"));
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_startup_reports_failures_without_blocking() {
        let config = HubConfig {
            servers: vec![bad_stdio("alpha"), bad_stdio("beta")],
            ..Default::default()
        };
        let hub = McpHub::new(config);
        let sink = RecordingSink::new();
        hub.set_notification_sink(sink.clone());

        let report = hub.startup().await;
        assert!(report.connected.is_empty());
        let failed: Vec<&str> = report.failed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(failed, vec!["alpha", "beta"]);

        // Both supervised despite never connecting.
        assert_eq!(hub.supervisor.supervised(), vec!["alpha", "beta"]);

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, NotifyLevel::Warn);
        assert!(messages[0].1.contains("0/2 servers connected"));

        let response = hub.dispatch(GatewayParams::default()).await;
        assert!(response.text.contains("alpha: not connected (0 tools)"));
        assert!(response.text.contains("beta: not connected (0 tools)"));
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_disabled_server_is_skipped() {
        let mut server = bad_stdio("off");
        server.disabled = true;
        let config = HubConfig {
            servers: vec![server],
            ..Default::default()
        };
        let hub = McpHub::new(config);

        let report = hub.startup().await;
        assert_eq!(report.total(), 0);
        assert_eq!(report.skipped, vec!["off"]);
        assert!(hub.supervisor.supervised().is_empty());

        let response = hub.dispatch(GatewayParams::default()).await;
        assert!(response.text.contains("off: not connected (0 tools) [disabled]"));
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_early_dispatch_waits_for_startup() {
        let hub = McpHub::new(HubConfig::default());

        let early = Arc::clone(&hub);
        let task = tokio::spawn(async move { early.dispatch(GatewayParams::default()).await });

        hub.startup().await;
        let response = task.await.unwrap();
        assert!(response.text.contains("servers connected"));
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_second_startup_returns_cached_report() {
        let config = HubConfig {
            servers: vec![bad_stdio("alpha")],
            ..Default::default()
        };
        let hub = McpHub::new(config);

        let first = hub.startup().await;
        let second = hub.startup().await;
        assert_eq!(first.total(), second.total());
        assert_eq!(first.failed.len(), second.failed.len());
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_before_startup_does_not_hang() {
        let hub = McpHub::new(HubConfig::default());
        hub.shutdown().await;
        assert!(!hub.is_ready());
    }

    #[tokio::test]
    async fn test_shutdown_joins_refresh_worker() {
        let hub = McpHub::new(HubConfig::default());
        hub.startup().await;
        assert!(hub.refresh_worker.lock().is_some());
        hub.shutdown().await;
        assert!(hub.refresh_worker.lock().is_none());
    }

    #[tokio::test]
    async fn test_reconnect_all_with_no_servers() {
        let hub = McpHub::new(HubConfig::default());
        hub.startup().await;
        assert_eq!(hub.reconnect_all().await, "Reconnected 0/0 servers");
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconnect_all_counts_failures() {
        let config = HubConfig {
            servers: vec![bad_stdio("alpha")],
            ..Default::default()
        };
        let hub = McpHub::new(config);
        let sink = RecordingSink::new();
        hub.set_notification_sink(sink.clone());
        hub.startup().await;

        assert_eq!(hub.reconnect_all().await, "Reconnected 0/1 servers");
        let messages = sink.messages();
        assert!(messages
            .iter()
            .any(|(level, text)| *level == NotifyLevel::Warn && text == "Reconnected 0/1 servers"));
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconnect_all_tears_down_newly_disabled_server() {
        let config = HubConfig {
            servers: vec![bad_stdio("fs")],
            ..Default::default()
        };
        let hub = McpHub::new(config);
        hub.startup().await;

        // Catalog entries from an earlier successful period survive the
        // failed record.
        hub.catalog.rebuild_for_server(
            &bad_stdio("fs"),
            &[sample_tool("read_file")],
            &[],
            ToolPrefixStyle::Underscore,
        );
        assert!(hub.catalog.names_for("fs").is_some());

        let mut disabled = bad_stdio("fs");
        disabled.disabled = true;
        *hub.config.write() = Arc::new(HubConfig {
            servers: vec![disabled],
            ..Default::default()
        });

        assert_eq!(hub.reconnect_all().await, "Reconnected 0/0 servers");
        assert!(hub.catalog.names_for("fs").is_none());
        let conn = hub.connections.get_connection("fs").unwrap();
        assert_eq!(conn.status, ConnectionStatus::Disconnected);
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_refresh_server_unknown_name() {
        let hub = McpHub::new(HubConfig::default());
        hub.startup().await;
        let err = hub.refresh_server("ghost").await.unwrap_err();
        assert!(matches!(err, HubError::ServerNotFound(_)));
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_status_command_appends_tool_names() {
        let hub = McpHub::new(HubConfig::default());
        hub.startup().await;

        hub.catalog.rebuild_for_server(
            &bad_stdio("fs"),
            &[sample_tool("read_file"), sample_tool("write_file")],
            &[],
            ToolPrefixStyle::Underscore,
        );

        let text = hub.status_command().await;
        assert!(text.contains("fs: fs_read_file, fs_write_file"));
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_from_file_remembers_path() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        writeln!(
            file,
            "servers:\n  - name: fs\n    protocol: stdio\n    command: mcp-fs"
        )
        .expect("Failed to write config");

        let hub = McpHub::from_file(file.path()).await.expect("Failed to load config");
        assert_eq!(hub.config_path.as_deref(), Some(file.path()));
        assert_eq!(hub.current_config().servers.len(), 1);
    }

    #[tokio::test]
    async fn test_from_file_missing_path_fails() {
        let result = McpHub::from_file("/nonexistent/hub-config.yaml").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_push_notification_without_sink_is_noop() {
        let slot: SinkSlot = Arc::new(RwLock::new(None));
        push_notification(&slot, NotifyLevel::Info, "ignored");
    }

    #[test]
    fn test_settings_flow_into_components() {
        let config = HubConfig {
            settings: HubSettings {
                startup_concurrency: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        // A zero bound still admits one in-flight connect.
        assert_eq!(config.settings.startup_concurrency.max(1), 1);
        let hub = McpHub::new(config);
        assert!(!hub.is_ready());
    }
}
