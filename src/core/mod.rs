//! Connection, lifecycle, and configuration infrastructure.

pub mod config;
pub mod connection;
pub mod handler;
pub mod hub;
pub mod startup;
pub mod supervisor;

pub use config::{
    AuthConfig, HubConfig, HubSettings, LifecyclePolicy, ServerConfig, ServerTransport,
    ToolPrefixStyle,
};
pub use connection::{Connection, ConnectionManager, ConnectionStatus, McpClient, TransportKind};
pub use handler::HubClientHandler;
pub use hub::{McpHub, NotificationSink, NotifyLevel};
pub use startup::{ReadyGate, StartupReport, StartupState};
pub use supervisor::{ReconnectCallback, Supervisor};
