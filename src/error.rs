//! Hub error types.
//!
//! Defines error variants for connecting, routing, searching, and invoking
//! tools across upstream MCP servers.

use thiserror::Error;

pub type HubResult<T> = Result<T, HubError>;

#[derive(Debug, Error)]
pub enum HubError {
    /// Transport, auth, or listing failure while establishing a connection.
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Server not connected: {0}")]
    ServerNotConnected(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid search pattern: {0}")]
    InvalidSearchPattern(String),

    /// The upstream server reported an application-level tool failure.
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Network or process failure mid-call. Surfaced as-is, never retried.
    #[error("Transport call failed: {0}")]
    TransportCall(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
