//! Catalog metadata types.

use std::sync::Arc;

use serde_json::{Map, Value};

/// How invoking a catalog entry reaches the upstream server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Forward the caller's arguments to a named upstream tool.
    ToolCall,
    /// Read the recorded resource; takes no caller arguments.
    ResourceRead { uri: String },
}

/// One catalog entry: an upstream tool (or resource pseudo-tool) as exposed
/// to callers.
#[derive(Debug, Clone)]
pub struct ToolMetadata {
    pub public_name: String,
    pub original_name: String,
    pub server: String,
    pub description: Option<String>,
    pub input_schema: Option<Arc<Map<String, Value>>>,
    pub invocation: Invocation,
}

impl ToolMetadata {
    pub fn is_resource(&self) -> bool {
        matches!(self.invocation, Invocation::ResourceRead { .. })
    }
}

/// Result of building one server's metadata list.
#[derive(Debug, Default)]
pub struct CatalogBuild {
    pub entries: Vec<Arc<ToolMetadata>>,
    /// Upstream duplicates dropped instead of overwriting earlier entries.
    pub skipped: usize,
}
