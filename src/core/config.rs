//! Hub configuration types.
//!
//! The primary file is YAML: a list of server definitions plus hub-wide
//! settings. External JSON files in the conventional `mcpServers` layout can
//! be merged in; the primary file wins on name clashes.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::Path,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{HubError, HubResult};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HubConfig {
    /// Upstream MCP servers, each with a unique name.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    /// Hub-wide tunables.
    #[serde(default)]
    pub settings: HubSettings,

    /// Extra JSON config files in the `mcpServers` layout, merged in after
    /// the primary file. Relative paths resolve against the primary file's
    /// directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merge_sources: Vec<String>,
}

/// One upstream MCP server definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Unique name, also used as the tool prefix.
    pub name: String,

    #[serde(flatten)]
    pub transport: ServerTransport,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub lifecycle: LifecyclePolicy,

    /// Expose the server's resources as read-only pseudo-tools.
    #[serde(default = "default_true")]
    pub expose_resources: bool,

    /// Pass the child process stderr through to the console.
    #[serde(default)]
    pub debug: bool,

    /// Skip this server at startup and on reconnect-all.
    #[serde(default)]
    pub disabled: bool,
}

/// Transport selection for a server.
///
/// Remote servers negotiate streamable HTTP first and fall back to SSE, so
/// the config only distinguishes local processes from URLs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum ServerTransport {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Remote {
        url: String,
    },
}

impl ServerTransport {
    pub fn label(&self) -> &'static str {
        match self {
            ServerTransport::Stdio { .. } => "stdio",
            ServerTransport::Remote { .. } => "remote",
        }
    }
}

/// Authentication for remote servers.
#[derive(Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthConfig {
    #[default]
    None,
    /// Static bearer token attached to every request.
    Bearer { token: String },
    /// Token file provisioned by an external flow; holds either the raw
    /// token or a JSON object with an `access_token` field.
    Oauth { token_file: String },
}

// Tokens must never reach logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::None => f.write_str("None"),
            AuthConfig::Bearer { .. } => f.debug_struct("Bearer").field("token", &"****").finish(),
            AuthConfig::Oauth { token_file } => f
                .debug_struct("Oauth")
                .field("token_file", token_file)
                .finish(),
        }
    }
}

/// Whether the supervisor keeps the server connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePolicy {
    /// Health-checked and reconnected for the life of the hub.
    #[default]
    KeepAlive,
    /// Connected at startup, closed at shutdown, never supervised.
    Ephemeral,
}

/// Public tool naming scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolPrefixStyle {
    /// `fs_read_file`
    #[default]
    Underscore,
    /// `fs__read_file`
    DoubleUnderscore,
    /// Original tool names; cross-server collisions are skipped.
    None,
}

/// Hub-wide tunables, all optional in the file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HubSettings {
    #[serde(default)]
    pub prefix_style: ToolPrefixStyle,

    /// Seconds between health-check sweeps.
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,

    /// Per-probe timeout in milliseconds.
    #[serde(default = "default_health_timeout")]
    pub health_timeout_ms: u64,

    /// Bound on spawn, handshake, and initial listing, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum concurrent connection attempts at startup.
    #[serde(default = "default_startup_concurrency")]
    pub startup_concurrency: usize,

    /// First reconnect delay in milliseconds; doubles per failure.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Ceiling for the reconnect delay, in seconds.
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_secs: u64,
}

impl HubSettings {
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }
}

/// The conventional external config layout shared by MCP clients.
#[derive(Debug, Deserialize)]
struct McpServersFile {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: HashMap<String, McpServersEntry>,
}

#[derive(Debug, Deserialize)]
struct McpServersEntry {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    disabled: bool,
}

impl McpServersEntry {
    fn into_server_config(self, name: String) -> Option<ServerConfig> {
        let transport = match (self.command, self.url) {
            (Some(command), _) => ServerTransport::Stdio {
                command,
                args: self.args,
                env: self.env,
            },
            (None, Some(url)) => ServerTransport::Remote { url },
            (None, None) => return None,
        };
        Some(ServerConfig {
            name,
            transport,
            auth: AuthConfig::default(),
            lifecycle: LifecyclePolicy::default(),
            expose_resources: true,
            debug: false,
            disabled: self.disabled,
        })
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_health_interval() -> u64 {
    30
}

fn default_health_timeout() -> u64 {
    2_000 // 2 seconds
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_startup_concurrency() -> usize {
    10
}

fn default_backoff_base() -> u64 {
    500
}

fn default_backoff_cap() -> u64 {
    30
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            prefix_style: ToolPrefixStyle::default(),
            health_interval_secs: default_health_interval(),
            health_timeout_ms: default_health_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            startup_concurrency: default_startup_concurrency(),
            backoff_base_ms: default_backoff_base(),
            backoff_cap_secs: default_backoff_cap(),
        }
    }
}

impl HubConfig {
    /// Load configuration from a YAML file, then fold in any merge sources.
    pub async fn from_file(path: impl AsRef<Path>) -> HubResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: Self = serde_yaml::from_str(&content)
            .map_err(|e| HubError::Config(format!("parse {}: {}", path.display(), e)))?;

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let sources = std::mem::take(&mut config.merge_sources);
        for source in &sources {
            let resolved = base.join(source);
            match Self::load_merge_source(&resolved).await {
                Ok(servers) => config.merge_servers(servers),
                Err(e) => warn!("Skipping merge source '{}': {}", source, e),
            }
        }
        config.merge_sources = sources;
        config.validate()?;
        Ok(config)
    }

    async fn load_merge_source(path: &Path) -> HubResult<Vec<ServerConfig>> {
        let content = tokio::fs::read_to_string(path).await?;
        let source: McpServersFile = serde_json::from_str(&content)
            .map_err(|e| HubError::Config(format!("parse {}: {}", path.display(), e)))?;

        let mut servers = Vec::new();
        for (name, entry) in source.mcp_servers {
            match entry.into_server_config(name.clone()) {
                Some(server) => servers.push(server),
                None => warn!(
                    "Merge source entry '{}' has neither command nor url, skipped",
                    name
                ),
            }
        }
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(servers)
    }

    /// Append servers from a merge source, skipping names the primary file
    /// already defines.
    fn merge_servers(&mut self, extra: Vec<ServerConfig>) {
        for server in extra {
            if self.servers.iter().any(|s| s.name == server.name) {
                warn!(
                    "Duplicate server '{}' in merge source, keeping the primary definition",
                    server.name
                );
                continue;
            }
            self.servers.push(server);
        }
    }

    pub fn validate(&self) -> HubResult<()> {
        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.name.is_empty() {
                return Err(HubError::Config("server name must not be empty".into()));
            }
            if !seen.insert(server.name.as_str()) {
                return Err(HubError::Config(format!(
                    "duplicate server name '{}'",
                    server.name
                )));
            }
            if let ServerTransport::Remote { url } = &server.transport {
                url::Url::parse(url).map_err(|e| {
                    HubError::Config(format!("invalid url for server '{}': {}", server.name, e))
                })?;
            }
        }
        Ok(())
    }

    pub fn get_server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Servers that participate in startup and reconnect-all.
    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter().filter(|s| !s.disabled)
    }
}
