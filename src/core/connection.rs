//! Connection management for upstream MCP servers.
//!
//! One record per server, replaced wholesale on every state transition.
//! Failed attempts keep the previous tools/resources snapshot so reads keep
//! answering from the last good listing while the supervisor works on
//! getting the server back.

use std::{borrow::Cow, collections::HashMap, process::Stdio, sync::Arc};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, RawResource, ReadResourceRequestParam,
        ReadResourceResult, Tool,
    },
    service::RunningService,
    transport::{
        sse_client::SseClientConfig, streamable_http_client::StreamableHttpClientTransportConfig,
        ConfigureCommandExt, SseClientTransport, StreamableHttpClientTransport, TokioChildProcess,
    },
    RoleClient, ServiceExt,
};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    config::{AuthConfig, HubSettings, ServerConfig, ServerTransport},
    handler::HubClientHandler,
};
use crate::error::{HubError, HubResult};

/// Type alias for the connected MCP client.
pub type McpClient = RunningService<RoleClient, HubClientHandler>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl ConnectionStatus {
    /// Label used in status output.
    pub fn display(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected | ConnectionStatus::Failed => "not connected",
        }
    }
}

/// The transport actually negotiated, which for remote servers can differ
/// from the configured one after fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    StreamableHttp,
    Sse,
}

impl TransportKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransportKind::Stdio => "stdio",
            TransportKind::StreamableHttp => "streamable-http",
            TransportKind::Sse => "sse",
        }
    }
}

/// Immutable record of one server's connection state.
#[derive(Debug)]
pub struct Connection {
    pub server: String,
    pub status: ConnectionStatus,
    pub transport: TransportKind,
    pub last_error: Option<String>,
    pub client: Option<Arc<McpClient>>,
    pub tools: Vec<Tool>,
    pub resources: Vec<RawResource>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected && self.client.is_some()
    }

    fn connecting(server: &str, transport: TransportKind, previous: Option<&Connection>) -> Self {
        Self {
            server: server.to_string(),
            status: ConnectionStatus::Connecting,
            transport,
            last_error: None,
            client: None,
            tools: previous.map(|p| p.tools.clone()).unwrap_or_default(),
            resources: previous.map(|p| p.resources.clone()).unwrap_or_default(),
            connected_at: None,
        }
    }

    fn failed(
        server: &str,
        transport: TransportKind,
        previous: Option<&Connection>,
        error: String,
    ) -> Self {
        Self {
            server: server.to_string(),
            status: ConnectionStatus::Failed,
            transport,
            last_error: Some(error),
            client: None,
            tools: previous.map(|p| p.tools.clone()).unwrap_or_default(),
            resources: previous.map(|p| p.resources.clone()).unwrap_or_default(),
            connected_at: None,
        }
    }

    fn disconnected(server: &str, transport: TransportKind, previous: Option<&Connection>) -> Self {
        Self {
            server: server.to_string(),
            status: ConnectionStatus::Disconnected,
            transport,
            last_error: None,
            client: None,
            tools: previous.map(|p| p.tools.clone()).unwrap_or_default(),
            resources: previous.map(|p| p.resources.clone()).unwrap_or_default(),
            connected_at: None,
        }
    }
}

/// Owns the connection records and everything that touches the wire.
pub struct ConnectionManager {
    connections: DashMap<String, Arc<Connection>>,
    settings: HubSettings,
    refresh_tx: mpsc::Sender<String>,
}

impl ConnectionManager {
    pub fn new(settings: HubSettings, refresh_tx: mpsc::Sender<String>) -> Self {
        Self {
            connections: DashMap::new(),
            settings,
            refresh_tx,
        }
    }

    /// Connect one server: spawn or dial, handshake, list tools and
    /// resources, then publish the connected record. The whole sequence runs
    /// under the configured connect timeout.
    ///
    /// Connecting an already-connected server returns the existing record.
    pub async fn connect(&self, definition: &ServerConfig) -> HubResult<Arc<Connection>> {
        let name = &definition.name;
        if let Some(existing) = self.get_connection(name) {
            if existing.is_connected() {
                debug!("Server '{}' already connected", name);
                return Ok(existing);
            }
        }

        let kind = match &definition.transport {
            ServerTransport::Stdio { .. } => TransportKind::Stdio,
            ServerTransport::Remote { .. } => TransportKind::StreamableHttp,
        };
        let previous = self.previous(name);
        self.publish(Connection::connecting(name, kind, previous.as_deref()));

        let connect_timeout = self.settings.connect_timeout();
        let outcome = tokio::time::timeout(connect_timeout, self.establish(definition)).await;
        match outcome {
            Ok(Ok(conn)) => {
                let conn = Arc::new(conn);
                self.connections.insert(name.clone(), Arc::clone(&conn));
                info!(
                    server = %name,
                    transport = conn.transport.label(),
                    tools = conn.tools.len(),
                    resources = conn.resources.len(),
                    "Connected to MCP server"
                );
                Ok(conn)
            }
            Ok(Err(e)) => {
                let previous = self.previous(name);
                self.publish(Connection::failed(
                    name,
                    kind,
                    previous.as_deref(),
                    e.to_string(),
                ));
                Err(e)
            }
            Err(_) => {
                let e = HubError::Connect(format!(
                    "server '{}': connect timed out after {:?}",
                    name, connect_timeout
                ));
                let previous = self.previous(name);
                self.publish(Connection::failed(
                    name,
                    kind,
                    previous.as_deref(),
                    e.to_string(),
                ));
                Err(e)
            }
        }
    }

    async fn establish(&self, definition: &ServerConfig) -> HubResult<Connection> {
        let (client, kind) = match &definition.transport {
            ServerTransport::Stdio { command, args, env } => {
                let client = self.connect_stdio(definition, command, args, env).await?;
                (client, TransportKind::Stdio)
            }
            ServerTransport::Remote { url } => {
                let token = resolve_token(&definition.auth).await?;
                self.connect_remote(definition, url, token.as_deref()).await?
            }
        };

        let client = Arc::new(client);
        let (tools, resources) = match self.list_inventory(definition, &client).await {
            Ok(pair) => pair,
            Err(e) => {
                Self::teardown(&definition.name, client).await;
                return Err(e);
            }
        };

        Ok(Connection {
            server: definition.name.clone(),
            status: ConnectionStatus::Connected,
            transport: kind,
            last_error: None,
            client: Some(client),
            tools,
            resources,
            connected_at: Some(Utc::now()),
        })
    }

    async fn connect_stdio(
        &self,
        definition: &ServerConfig,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> HubResult<McpClient> {
        if definition.auth != AuthConfig::None {
            warn!("Auth configuration ignored for stdio server '{}'", definition.name);
        }
        let stderr = if definition.debug {
            Stdio::inherit()
        } else {
            Stdio::null()
        };

        let transport = TokioChildProcess::new(tokio::process::Command::new(command).configure(
            |cmd| {
                cmd.args(args).envs(env.iter()).stderr(stderr);
            },
        ))
        .map_err(|e| HubError::Connect(format!("spawn '{}': {}", command, e)))?;

        let handler = self.handler_for(definition);
        handler
            .serve(transport)
            .await
            .map_err(|e| {
                HubError::Connect(format!(
                    "initialize stdio client for '{}': {}",
                    definition.name, e
                ))
            })
    }

    /// Remote connect order: streamable HTTP first, SSE on rejection.
    async fn connect_remote(
        &self,
        definition: &ServerConfig,
        url: &str,
        token: Option<&str>,
    ) -> HubResult<(McpClient, TransportKind)> {
        match self.connect_streamable(definition, url, token).await {
            Ok(client) => Ok((client, TransportKind::StreamableHttp)),
            Err(primary) => {
                warn!(
                    "Streamable transport rejected for '{}' ({}), falling back to SSE",
                    definition.name, primary
                );
                match self.connect_sse(definition, url, token).await {
                    Ok(client) => Ok((client, TransportKind::Sse)),
                    Err(fallback) => Err(HubError::Connect(format!(
                        "server '{}': streamable failed ({}); sse fallback failed ({})",
                        definition.name, primary, fallback
                    ))),
                }
            }
        }
    }

    async fn connect_streamable(
        &self,
        definition: &ServerConfig,
        url: &str,
        token: Option<&str>,
    ) -> HubResult<McpClient> {
        let transport = if let Some(token) = token {
            let mut config = StreamableHttpClientTransportConfig::with_uri(url.to_string());
            config.auth_header = Some(token.to_string());
            StreamableHttpClientTransport::from_config(config)
        } else {
            StreamableHttpClientTransport::from_uri(url.to_string())
        };

        let handler = self.handler_for(definition);
        handler
            .serve(transport)
            .await
            .map_err(|e| HubError::Connect(format!("initialize streamable client: {}", e)))
    }

    async fn connect_sse(
        &self,
        definition: &ServerConfig,
        url: &str,
        token: Option<&str>,
    ) -> HubResult<McpClient> {
        let http_client = build_http_client(token)?;
        let transport = SseClientTransport::start_with_client(
            http_client,
            SseClientConfig {
                sse_endpoint: url.to_string().into(),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| HubError::Connect(format!("create SSE transport: {}", e)))?;

        let handler = self.handler_for(definition);
        handler
            .serve(transport)
            .await
            .map_err(|e| HubError::Connect(format!("initialize SSE client: {}", e)))
    }

    fn handler_for(&self, definition: &ServerConfig) -> HubClientHandler {
        HubClientHandler::new(&definition.name).with_refresh_channel(self.refresh_tx.clone())
    }

    /// List tools and resources after the handshake. A tools failure fails
    /// the connect; a resources failure degrades to an empty list.
    async fn list_inventory(
        &self,
        definition: &ServerConfig,
        client: &Arc<McpClient>,
    ) -> HubResult<(Vec<Tool>, Vec<RawResource>)> {
        let tools = client.peer().list_all_tools().await.map_err(|e| {
            HubError::Connect(format!("list tools from '{}': {}", definition.name, e))
        })?;
        debug!("Discovered {} tools from '{}'", tools.len(), definition.name);

        let resources = if definition.expose_resources {
            match client.peer().list_all_resources().await {
                Ok(resources) => {
                    debug!(
                        "Discovered {} resources from '{}'",
                        resources.len(),
                        definition.name
                    );
                    resources.into_iter().map(|r| r.raw).collect()
                }
                Err(e) => {
                    debug!("No resources on '{}': {}", definition.name, e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok((tools, resources))
    }

    pub fn get_connection(&self, name: &str) -> Option<Arc<Connection>> {
        self.connections.get(name).map(|e| Arc::clone(e.value()))
    }

    pub fn server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn connected_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|e| e.value().is_connected())
            .count()
    }

    /// Close a connection and leave a disconnected record behind. Safe to
    /// call on an unknown or already-closed name.
    pub async fn close(&self, name: &str) {
        let Some((_, conn)) = self.connections.remove(name) else {
            return;
        };
        let record = Connection::disconnected(name, conn.transport, Some(&conn));
        self.connections.insert(name.to_string(), Arc::new(record));

        let client = match Arc::try_unwrap(conn) {
            Ok(conn) => conn.client,
            Err(shared) => shared.client.clone(),
        };
        if let Some(client) = client {
            Self::teardown(name, client).await;
            debug!("Closed connection to '{}'", name);
        }
    }

    async fn teardown(server: &str, client: Arc<McpClient>) {
        match Arc::try_unwrap(client) {
            Ok(client) => {
                if let Err(e) = client.cancel().await {
                    warn!("Error closing connection to '{}': {}", server, e);
                }
            }
            Err(_) => warn!(
                "Could not close connection to '{}': client still in use",
                server
            ),
        }
    }

    /// Probe a connected server by re-listing its tools under a short
    /// timeout. Read-only; the verdict is left to the caller.
    pub async fn health_check(&self, name: &str) -> bool {
        let Some(conn) = self.get_connection(name) else {
            return false;
        };
        let Some(client) = conn.client.clone() else {
            return false;
        };

        match tokio::time::timeout(self.settings.health_timeout(), client.peer().list_all_tools())
            .await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Health check failed for '{}': {}", name, e);
                false
            }
            Err(_) => {
                debug!("Health check timed out for '{}'", name);
                false
            }
        }
    }

    /// Invoke an upstream tool with the caller's raw arguments. The
    /// connected check happens before anything touches the wire.
    pub async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Option<Map<String, Value>>,
    ) -> HubResult<CallToolResult> {
        let client = self.connected_client(server)?;
        let request = CallToolRequestParam {
            name: Cow::Owned(tool.to_string()),
            arguments,
        };
        client
            .call_tool(request)
            .await
            .map_err(|e| HubError::TransportCall(format!("call '{}' on '{}': {}", tool, server, e)))
    }

    /// Read a resource by URI from a connected server.
    pub async fn read_resource(&self, server: &str, uri: &str) -> HubResult<ReadResourceResult> {
        let client = self.connected_client(server)?;
        client
            .read_resource(ReadResourceRequestParam {
                uri: uri.to_string(),
            })
            .await
            .map_err(|e| HubError::TransportCall(format!("read '{}' from '{}': {}", uri, server, e)))
    }

    fn connected_client(&self, server: &str) -> HubResult<Arc<McpClient>> {
        let conn = self
            .get_connection(server)
            .ok_or_else(|| HubError::ServerNotConnected(server.to_string()))?;
        if !conn.is_connected() {
            return Err(HubError::ServerNotConnected(server.to_string()));
        }
        conn.client
            .clone()
            .ok_or_else(|| HubError::ServerNotConnected(server.to_string()))
    }

    /// Re-list a connected server and replace its snapshot wholesale,
    /// keeping the live client.
    pub async fn refresh_snapshot(&self, definition: &ServerConfig) -> HubResult<Arc<Connection>> {
        let name = &definition.name;
        let conn = self
            .get_connection(name)
            .ok_or_else(|| HubError::ServerNotFound(name.clone()))?;
        if !conn.is_connected() {
            return Err(HubError::ServerNotConnected(name.clone()));
        }
        let Some(client) = conn.client.clone() else {
            return Err(HubError::ServerNotConnected(name.clone()));
        };

        let (tools, resources) = self.list_inventory(definition, &client).await?;
        let refreshed = Arc::new(Connection {
            server: name.clone(),
            status: ConnectionStatus::Connected,
            transport: conn.transport,
            last_error: None,
            client: Some(client),
            tools,
            resources,
            connected_at: conn.connected_at,
        });
        self.connections.insert(name.clone(), Arc::clone(&refreshed));
        Ok(refreshed)
    }

    /// Close every connection, awaiting each teardown.
    pub async fn shutdown_all(&self) {
        for name in self.server_names() {
            self.close(&name).await;
        }
    }

    fn previous(&self, name: &str) -> Option<Arc<Connection>> {
        self.connections.get(name).map(|e| Arc::clone(e.value()))
    }

    pub(crate) fn publish(&self, conn: Connection) {
        self.connections.insert(conn.server.clone(), Arc::new(conn));
    }
}

/// Resolve the bearer token for a definition. For the oauth mode only the
/// previously provisioned token file is consumed here; acquisition and
/// refresh happen outside the hub.
async fn resolve_token(auth: &AuthConfig) -> HubResult<Option<String>> {
    match auth {
        AuthConfig::None => Ok(None),
        AuthConfig::Bearer { token } => Ok(Some(token.clone())),
        AuthConfig::Oauth { token_file } => {
            let raw = tokio::fs::read_to_string(token_file)
                .await
                .map_err(|e| HubError::Auth(format!("read token file '{}': {}", token_file, e)))?;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(HubError::Auth(format!(
                    "token file '{}' is empty",
                    token_file
                )));
            }
            if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) {
                return match obj.get("access_token").and_then(Value::as_str) {
                    Some(token) => Ok(Some(token.to_string())),
                    None => Err(HubError::Auth(format!(
                        "token file '{}' has no access_token field",
                        token_file
                    ))),
                };
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

fn build_http_client(token: Option<&str>) -> HubResult<reqwest::Client> {
    let mut builder =
        reqwest::Client::builder().connect_timeout(std::time::Duration::from_secs(10));
    if let Some(token) = token {
        let mut headers = reqwest::header::HeaderMap::new();
        let value: reqwest::header::HeaderValue = format!("Bearer {}", token)
            .parse()
            .map_err(|e| HubError::Auth(format!("bearer token not header-safe: {}", e)))?;
        headers.insert(reqwest::header::AUTHORIZATION, value);
        builder = builder.default_headers(headers);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn stdio_definition(name: &str, command: &str) -> ServerConfig {
        ServerConfig {
            name: name.to_string(),
            transport: ServerTransport::Stdio {
                command: command.to_string(),
                args: vec![],
                env: HashMap::new(),
            },
            auth: AuthConfig::default(),
            lifecycle: Default::default(),
            expose_resources: true,
            debug: false,
            disabled: false,
        }
    }

    fn test_manager() -> ConnectionManager {
        let (tx, _rx) = mpsc::channel(8);
        ConnectionManager::new(HubSettings::default(), tx)
    }

    fn create_test_tool(name: &str) -> Tool {
        Tool {
            name: Cow::Owned(name.to_string()),
            title: None,
            description: None,
            input_schema: Arc::new(serde_json::Map::new()),
            output_schema: None,
            annotations: None,
            icons: None,
        }
    }

    #[tokio::test]
    async fn test_connect_failure_publishes_failed_record() {
        let manager = test_manager();
        let definition = stdio_definition("bad", "/nonexistent-mcp-server-binary");

        let err = manager.connect(&definition).await.unwrap_err();
        assert!(matches!(err, HubError::Connect(_)));

        let conn = manager.get_connection("bad").unwrap();
        assert_eq!(conn.status, ConnectionStatus::Failed);
        assert!(conn.last_error.as_deref().unwrap().contains("spawn"));
        assert!(conn.client.is_none());
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_failed_connect_keeps_previous_snapshot() {
        let manager = test_manager();
        manager.publish(Connection {
            server: "bad".to_string(),
            status: ConnectionStatus::Disconnected,
            transport: TransportKind::Stdio,
            last_error: None,
            client: None,
            tools: vec![create_test_tool("read_file")],
            resources: vec![],
            connected_at: None,
        });

        let definition = stdio_definition("bad", "/nonexistent-mcp-server-binary");
        manager.connect(&definition).await.unwrap_err();

        let conn = manager.get_connection("bad").unwrap();
        assert_eq!(conn.status, ConnectionStatus::Failed);
        assert_eq!(conn.tools.len(), 1);
        assert_eq!(conn.tools[0].name, "read_file");
    }

    #[tokio::test]
    async fn test_close_unknown_server_is_noop() {
        let manager = test_manager();
        manager.close("missing").await;
        assert!(manager.get_connection("missing").is_none());
    }

    #[tokio::test]
    async fn test_close_leaves_disconnected_record() {
        let manager = test_manager();
        let definition = stdio_definition("bad", "/nonexistent-mcp-server-binary");
        manager.connect(&definition).await.unwrap_err();

        manager.close("bad").await;
        let conn = manager.get_connection("bad").unwrap();
        assert_eq!(conn.status, ConnectionStatus::Disconnected);
        assert!(conn.last_error.is_none());

        // A second close is harmless.
        manager.close("bad").await;
        assert_eq!(
            manager.get_connection("bad").unwrap().status,
            ConnectionStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn test_call_tool_checks_connection_first() {
        let manager = test_manager();
        manager.publish(Connection {
            server: "fs".to_string(),
            status: ConnectionStatus::Failed,
            transport: TransportKind::Stdio,
            last_error: Some("boom".to_string()),
            client: None,
            tools: vec![create_test_tool("read_file")],
            resources: vec![],
            connected_at: None,
        });

        let err = manager.call_tool("fs", "read_file", None).await.unwrap_err();
        assert!(matches!(err, HubError::ServerNotConnected(_)));

        let err = manager.read_resource("fs", "file:///tmp").await.unwrap_err();
        assert!(matches!(err, HubError::ServerNotConnected(_)));
    }

    #[tokio::test]
    async fn test_call_tool_unknown_server() {
        let manager = test_manager();
        let err = manager.call_tool("ghost", "x", None).await.unwrap_err();
        assert!(matches!(err, HubError::ServerNotConnected(_)));
    }

    #[tokio::test]
    async fn test_health_check_unknown_server_is_false() {
        let manager = test_manager();
        assert!(!manager.health_check("missing").await);
    }

    #[tokio::test]
    async fn test_connected_count_ignores_dead_records() {
        let manager = test_manager();
        manager.publish(Connection {
            server: "a".to_string(),
            status: ConnectionStatus::Failed,
            transport: TransportKind::Stdio,
            last_error: None,
            client: None,
            tools: vec![],
            resources: vec![],
            connected_at: None,
        });
        manager.publish(Connection {
            server: "b".to_string(),
            status: ConnectionStatus::Connecting,
            transport: TransportKind::Sse,
            last_error: None,
            client: None,
            tools: vec![],
            resources: vec![],
            connected_at: None,
        });

        assert_eq!(manager.connected_count(), 0);
        assert_eq!(manager.server_names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_resolve_token_none_and_bearer() {
        assert_eq!(resolve_token(&AuthConfig::None).await.unwrap(), None);
        assert_eq!(
            resolve_token(&AuthConfig::Bearer {
                token: "sk-abc".to_string()
            })
            .await
            .unwrap(),
            Some("sk-abc".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_token_raw_file_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  sk-raw-token  ").unwrap();

        let auth = AuthConfig::Oauth {
            token_file: file.path().to_string_lossy().to_string(),
        };
        assert_eq!(
            resolve_token(&auth).await.unwrap(),
            Some("sk-raw-token".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_token_json_access_token() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"access_token": "sk-json", "expires_in": 3600}}"#).unwrap();

        let auth = AuthConfig::Oauth {
            token_file: file.path().to_string_lossy().to_string(),
        };
        assert_eq!(
            resolve_token(&auth).await.unwrap(),
            Some("sk-json".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_token_json_without_access_token() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"refresh_token": "r"}}"#).unwrap();

        let auth = AuthConfig::Oauth {
            token_file: file.path().to_string_lossy().to_string(),
        };
        let err = resolve_token(&auth).await.unwrap_err();
        assert!(matches!(err, HubError::Auth(_)));
    }

    #[tokio::test]
    async fn test_resolve_token_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let auth = AuthConfig::Oauth {
            token_file: file.path().to_string_lossy().to_string(),
        };
        let err = resolve_token(&auth).await.unwrap_err();
        assert!(matches!(err, HubError::Auth(_)));
    }

    #[tokio::test]
    async fn test_resolve_token_missing_file() {
        let auth = AuthConfig::Oauth {
            token_file: "/nonexistent/token.json".to_string(),
        };
        let err = resolve_token(&auth).await.unwrap_err();
        assert!(matches!(err, HubError::Auth(_)));
    }

    #[test]
    fn test_status_display_labels() {
        assert_eq!(ConnectionStatus::Connected.display(), "connected");
        assert_eq!(ConnectionStatus::Connecting.display(), "connecting");
        assert_eq!(ConnectionStatus::Failed.display(), "not connected");
        assert_eq!(ConnectionStatus::Disconnected.display(), "not connected");
    }
}
