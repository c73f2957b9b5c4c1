//! Gateway call parameters and structured outcomes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter shape of the single gateway tool. Every field is optional; the
/// populated ones select the mode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayParams {
    /// Public tool name to invoke.
    #[serde(default)]
    pub tool: Option<String>,

    /// Raw arguments forwarded to the upstream tool unchanged.
    #[serde(default, alias = "arguments")]
    pub args: Option<Map<String, Value>>,

    /// Public tool name to document.
    #[serde(default)]
    pub describe: Option<String>,

    /// Search query: whitespace-separated terms, or a regex with `regex`.
    #[serde(default)]
    pub query: Option<String>,

    /// Treat `query` as a regular expression.
    #[serde(default)]
    pub regex: bool,

    /// Include full parameter schemas in search results (default true).
    #[serde(default)]
    pub schemas: Option<bool>,

    /// Server filter for search, or the server to list on its own.
    #[serde(default)]
    pub server: Option<String>,
}

/// The five dispatcher modes, in resolution priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayMode {
    Call { tool: String },
    Describe { tool: String },
    Search { query: String },
    ListServer { server: String },
    Status,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl GatewayParams {
    /// First populated selector wins: call, then describe, then search, then
    /// list-by-server. Nothing populated (or a malformed combination like
    /// args without a tool) falls through to status.
    pub fn mode(&self) -> GatewayMode {
        if let Some(tool) = non_empty(&self.tool) {
            return GatewayMode::Call {
                tool: tool.to_string(),
            };
        }
        if let Some(tool) = non_empty(&self.describe) {
            return GatewayMode::Describe {
                tool: tool.to_string(),
            };
        }
        if let Some(query) = non_empty(&self.query) {
            return GatewayMode::Search {
                query: query.to_string(),
            };
        }
        if let Some(server) = non_empty(&self.server) {
            return GatewayMode::ListServer {
                server: server.to_string(),
            };
        }
        GatewayMode::Status
    }

    pub fn include_schemas(&self) -> bool {
        self.schemas.unwrap_or(true)
    }

    pub fn server_filter(&self) -> Option<&str> {
        non_empty(&self.server)
    }
}

/// Structured outcome carried beside the rendered text so hosts can branch
/// without parsing prose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    ToolNotFound { tool: String },
    ServerNotFound { server: String },
    ServerNotConnected { server: String },
    InvalidSearchPattern { pattern: String },
    ToolExecutionError { tool: String },
    TransportFailure { tool: String },
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        !matches!(self, Outcome::Success)
    }
}

/// What every gateway invocation returns. Failures are responses too; the
/// dispatcher never surfaces an `Err`.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayResponse {
    pub text: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl GatewayResponse {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            outcome: Outcome::Success,
        }
    }

    pub fn with_outcome(text: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            text: text.into(),
            outcome,
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_error()
    }
}
