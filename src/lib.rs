//! MCP hub: one gateway tool multiplexing many MCP servers.
//!
//! Upstream tool catalogs are large and verbose; a calling agent gets one
//! narrow entry point instead. The hub connects to every configured server
//! (local processes over stdio, remote endpoints over streamable HTTP with
//! SSE fallback), keeps the keep-alive ones healthy, indexes their tools and
//! resources under collision-safe public names, and routes a single
//! polymorphic call into the right per-server invocation.
//!
//! ## Modules
//!
//! - [`core`]: configuration, connections, supervision, the [`McpHub`] aggregate
//! - [`catalog`]: namespaced tool metadata index with search and describe
//! - [`gateway`]: the single callable operation and its five modes
//!
//! ## Usage
//!
//! ```no_run
//! use mcp_hub::{GatewayParams, McpHub};
//!
//! # async fn run() -> mcp_hub::HubResult<()> {
//! let hub = McpHub::from_file("hub.yaml").await?;
//! hub.startup().await;
//!
//! let response = hub
//!     .dispatch(GatewayParams {
//!         query: Some("read file".to_string()),
//!         ..Default::default()
//!     })
//!     .await;
//! println!("{}", response.text);
//!
//! hub.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod core;
pub mod error;
pub mod gateway;

pub use crate::catalog::{ToolCatalog, ToolMetadata};
pub use crate::core::{
    HubConfig, HubSettings, McpHub, NotificationSink, NotifyLevel, ServerConfig, StartupReport,
};
pub use crate::error::{HubError, HubResult};
pub use crate::gateway::{GatewayParams, GatewayResponse, Outcome};
