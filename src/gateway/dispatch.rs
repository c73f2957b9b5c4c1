//! The five gateway modes.
//!
//! One narrow entry point multiplexes every upstream tool: call, describe,
//! search, list-by-server, and status. Failures come back as structured
//! responses, never as transport errors, so the caller can always read the
//! answer and decide what to try next.

use std::sync::Arc;

use parking_lot::RwLock;
use regex::RegexBuilder;
use serde_json::{Map, Value};
use tracing::warn;

use super::{
    params::{GatewayMode, GatewayParams, GatewayResponse, Outcome},
    render,
};
use crate::{
    catalog::{
        index::ToolCatalog,
        types::{Invocation, ToolMetadata},
    },
    core::{config::HubConfig, connection::ConnectionManager, startup::StartupState},
    error::HubError,
};

/// Read side of the hub: resolves one of the five modes and executes it
/// against the catalog and connection records.
pub struct Gateway {
    catalog: Arc<ToolCatalog>,
    connections: Arc<ConnectionManager>,
    config: Arc<RwLock<Arc<HubConfig>>>,
    startup: Arc<StartupState>,
}

impl Gateway {
    pub fn new(
        catalog: Arc<ToolCatalog>,
        connections: Arc<ConnectionManager>,
        config: Arc<RwLock<Arc<HubConfig>>>,
        startup: Arc<StartupState>,
    ) -> Self {
        Self {
            catalog,
            connections,
            config,
            startup,
        }
    }

    /// Resolve the caller's mode and run it. Callers that arrive before
    /// startup completes suspend until the ready gate opens.
    pub async fn dispatch(&self, params: GatewayParams) -> GatewayResponse {
        self.startup.gate.wait().await;
        match params.mode() {
            GatewayMode::Call { tool } => self.call(&tool, params.args.clone()).await,
            GatewayMode::Describe { tool } => self.describe(&tool),
            GatewayMode::Search { query } => self.search(&query, &params),
            GatewayMode::ListServer { server } => self.list_server(&server),
            GatewayMode::Status => self.status(),
        }
    }

    /// Status mode: one line per configured server plus the aggregate count.
    fn status(&self) -> GatewayResponse {
        let config = self.current_config();
        let mut lines = Vec::new();
        let mut connected = 0usize;

        for server in &config.servers {
            let conn = self.connections.get_connection(&server.name);
            let (label, since, detail) = match &conn {
                Some(conn) => {
                    if conn.is_connected() {
                        connected += 1;
                    }
                    (
                        conn.status.display(),
                        conn.connected_at,
                        conn.last_error.clone(),
                    )
                }
                None => ("not connected", None, None),
            };

            let mut line = format!(
                "  {}: {} ({} tools)",
                server.name,
                label,
                self.catalog.tool_count(&server.name)
            );
            if let Some(since) = since {
                line.push_str(&format!(" since {}", since.format("%H:%M:%S")));
            }
            if server.disabled {
                line.push_str(" [disabled]");
            }
            if let Some(detail) = detail {
                line.push_str(&format!(" [{}]", detail));
            }
            lines.push(line);
        }

        let header = format!(
            "MCP hub: {}/{} servers connected",
            connected,
            config.servers.len()
        );
        let text = if lines.is_empty() {
            format!("{}\n  (no servers configured)", header)
        } else {
            format!("{}\n{}", header, lines.join("\n"))
        };
        GatewayResponse::success(text)
    }

    /// List mode: names and truncated descriptions for one server.
    fn list_server(&self, server: &str) -> GatewayResponse {
        if let Some(names) = self.catalog.names_for(server) {
            if names.is_empty() {
                return GatewayResponse::success(format!(
                    "Server '{}' exposes no tools.",
                    server
                ));
            }
            let entries = self.catalog.tools_for(server).unwrap_or_default();
            let mut lines = vec![format!("Tools on '{}' ({}):", server, names.len())];
            for meta in entries.iter() {
                match &meta.description {
                    Some(description) => lines.push(format!(
                        "  {}: {}",
                        meta.public_name,
                        render::truncate_description(description, render::DESCRIPTION_TARGET)
                    )),
                    None => lines.push(format!("  {}", meta.public_name)),
                }
            }
            return GatewayResponse::success(lines.join("\n"));
        }

        self.missing_server_response(server)
    }

    /// Search mode: term matching or regex over public names and
    /// descriptions, case-insensitive either way.
    fn search(&self, query: &str, params: &GatewayParams) -> GatewayResponse {
        let candidates = match params.server_filter() {
            Some(server) => match self.catalog.tools_for(server) {
                Some(list) => list.iter().map(Arc::clone).collect::<Vec<_>>(),
                None => return self.missing_server_response(server),
            },
            None => self.catalog.iter_all(),
        };

        let matches = match filter_candidates(query, params.regex, candidates) {
            Ok(matches) => matches,
            Err(e) => {
                return GatewayResponse::with_outcome(
                    format!("Invalid search pattern '{}': {}", query, e),
                    Outcome::InvalidSearchPattern {
                        pattern: query.to_string(),
                    },
                )
            }
        };

        if matches.is_empty() {
            return GatewayResponse::success(format!(
                "No tools matched '{}'. Try broader terms, or no arguments to see all servers.",
                query
            ));
        }

        let include_schemas = params.include_schemas();
        let mut sections = vec![format!("{} tool(s) matched '{}':", matches.len(), query)];
        for meta in &matches {
            sections.push(render::render_search_hit(meta, include_schemas));
        }
        GatewayResponse::success(sections.join("\n\n"))
    }

    /// Describe mode: full documentation for one public name.
    fn describe(&self, name: &str) -> GatewayResponse {
        match self.catalog.resolve(name) {
            Some(meta) => GatewayResponse::success(render::render_describe(&meta)),
            None => GatewayResponse::with_outcome(
                format!(
                    "Tool '{}' not found. Search with a query to discover tool names.",
                    name
                ),
                Outcome::ToolNotFound {
                    tool: name.to_string(),
                },
            ),
        }
    }

    /// Call mode: resolve, verify the owning server is connected, then
    /// forward. The connected check happens before anything reaches the
    /// network.
    async fn call(&self, name: &str, args: Option<Map<String, Value>>) -> GatewayResponse {
        let Some(meta) = self.catalog.resolve(name) else {
            return GatewayResponse::with_outcome(
                format!(
                    "Tool '{}' not found. Search with a query to discover tool names.",
                    name
                ),
                Outcome::ToolNotFound {
                    tool: name.to_string(),
                },
            );
        };

        let connected = self
            .connections
            .get_connection(&meta.server)
            .map_or(false, |conn| conn.is_connected());
        if !connected {
            return GatewayResponse::with_outcome(
                format!(
                    "Server '{}' (owner of '{}') is not connected. Check status or reconnect.",
                    meta.server, name
                ),
                Outcome::ServerNotConnected {
                    server: meta.server.clone(),
                },
            );
        }

        match &meta.invocation {
            Invocation::ResourceRead { uri } => {
                match self.connections.read_resource(&meta.server, uri).await {
                    Ok(result) => {
                        GatewayResponse::success(render::render_resource_content(&result))
                    }
                    Err(e) => self.call_failure(&meta, &e),
                }
            }
            Invocation::ToolCall => {
                match self
                    .connections
                    .call_tool(&meta.server, &meta.original_name, args)
                    .await
                {
                    Ok(result) => {
                        let text = render::render_call_content(&result);
                        if result.is_error.unwrap_or(false) {
                            GatewayResponse::with_outcome(
                                format!(
                                    "{}\n\n{}",
                                    text,
                                    render::render_param_docs(meta.input_schema.as_deref())
                                ),
                                Outcome::ToolExecutionError {
                                    tool: meta.public_name.clone(),
                                },
                            )
                        } else {
                            GatewayResponse::success(text)
                        }
                    }
                    Err(e) => self.call_failure(&meta, &e),
                }
            }
        }
    }

    /// Transport failures render the same shape as upstream tool errors:
    /// error text with the parameter docs appended.
    fn call_failure(&self, meta: &ToolMetadata, error: &HubError) -> GatewayResponse {
        warn!(
            tool = %meta.public_name,
            server = %meta.server,
            "Tool call failed: {}", error
        );
        let outcome = match error {
            HubError::ServerNotConnected(server) => Outcome::ServerNotConnected {
                server: server.clone(),
            },
            HubError::ToolExecution(_) => Outcome::ToolExecutionError {
                tool: meta.public_name.clone(),
            },
            _ => Outcome::TransportFailure {
                tool: meta.public_name.clone(),
            },
        };
        GatewayResponse::with_outcome(
            format!(
                "{}\n\n{}",
                error,
                render::render_param_docs(meta.input_schema.as_deref())
            ),
            outcome,
        )
    }

    /// Configured-but-not-connected and plain unknown are different answers.
    fn missing_server_response(&self, server: &str) -> GatewayResponse {
        if self.current_config().get_server(server).is_some() {
            return GatewayResponse::with_outcome(
                format!("Server '{}' is configured but not connected.", server),
                Outcome::ServerNotConnected {
                    server: server.to_string(),
                },
            );
        }
        GatewayResponse::with_outcome(
            format!(
                "Server '{}' not found. Call with no arguments to list configured servers.",
                server
            ),
            Outcome::ServerNotFound {
                server: server.to_string(),
            },
        )
    }

    fn current_config(&self) -> Arc<HubConfig> {
        self.config.read().clone()
    }
}

fn filter_candidates(
    query: &str,
    use_regex: bool,
    candidates: Vec<Arc<ToolMetadata>>,
) -> Result<Vec<Arc<ToolMetadata>>, regex::Error> {
    if use_regex {
        let pattern = RegexBuilder::new(query).case_insensitive(true).build()?;
        Ok(candidates
            .into_iter()
            .filter(|meta| {
                pattern.is_match(&meta.public_name)
                    || meta
                        .description
                        .as_deref()
                        .map_or(false, |d| pattern.is_match(d))
            })
            .collect())
    } else {
        // Whitespace-separated terms OR together; a single word degenerates
        // to a plain substring match.
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        Ok(candidates
            .into_iter()
            .filter(|meta| {
                let name = meta.public_name.to_lowercase();
                let description = meta
                    .description
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase();
                terms
                    .iter()
                    .any(|term| name.contains(term) || description.contains(term))
            })
            .collect())
    }
}
