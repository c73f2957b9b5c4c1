//! Per-server tool index.
//!
//! Two maps keyed by server name: full metadata lists for resolution and
//! rendering, plus a names-only list for cheap summaries. Both are replaced
//! wholesale per server so readers always observe either the old list or the
//! new one, never a partial mix.

use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;
use rmcp::model::{RawResource, Tool};
use tracing::{debug, warn};

use super::{
    naming,
    types::{CatalogBuild, Invocation, ToolMetadata},
};
use crate::core::config::{ServerConfig, ToolPrefixStyle};

/// Build the metadata list for one server from its listed tools and
/// resources. Tools register first; on a public-name clash the earlier entry
/// wins and the later one is counted as skipped.
pub fn build_for_server(
    definition: &ServerConfig,
    tools: &[Tool],
    resources: &[RawResource],
    style: ToolPrefixStyle,
) -> CatalogBuild {
    let mut build = CatalogBuild::default();
    let mut seen: HashSet<String> = HashSet::new();

    for tool in tools {
        let public = naming::public_name(style, &definition.name, &tool.name);
        if !seen.insert(public.clone()) {
            warn!(
                "Duplicate tool '{}' from server '{}' skipped",
                tool.name, definition.name
            );
            build.skipped += 1;
            continue;
        }
        build.entries.push(Arc::new(ToolMetadata {
            public_name: public,
            original_name: tool.name.to_string(),
            server: definition.name.clone(),
            description: tool.description.as_ref().map(|d| d.to_string()),
            input_schema: Some(Arc::clone(&tool.input_schema)),
            invocation: Invocation::ToolCall,
        }));
    }

    if definition.expose_resources {
        for resource in resources {
            let pseudo = naming::resource_tool_name(&resource.name);
            let public = naming::public_name(style, &definition.name, &pseudo);
            if !seen.insert(public.clone()) {
                warn!(
                    "Duplicate resource pseudo-tool '{}' from server '{}' skipped",
                    pseudo, definition.name
                );
                build.skipped += 1;
                continue;
            }
            build.entries.push(Arc::new(ToolMetadata {
                public_name: public,
                original_name: pseudo,
                server: definition.name.clone(),
                description: resource
                    .description
                    .clone()
                    .or_else(|| Some(format!("Read resource {}", resource.uri))),
                input_schema: None,
                invocation: Invocation::ResourceRead {
                    uri: resource.uri.clone(),
                },
            }));
        }
    }

    build
}

/// The aggregated tool catalog across all servers.
///
/// Entries persist through disconnects so callers get a structured
/// not-connected answer instead of not-found; they drop only on explicit
/// close or shutdown.
pub struct ToolCatalog {
    entries: DashMap<String, Arc<Vec<Arc<ToolMetadata>>>>,
    names: DashMap<String, Arc<Vec<String>>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            names: DashMap::new(),
        }
    }

    /// Build and atomically install the metadata for one server, returning
    /// the number of entries skipped as duplicates.
    pub fn rebuild_for_server(
        &self,
        definition: &ServerConfig,
        tools: &[Tool],
        resources: &[RawResource],
        style: ToolPrefixStyle,
    ) -> usize {
        let build = build_for_server(definition, tools, resources, style);
        let names: Vec<String> = build
            .entries
            .iter()
            .map(|e| e.public_name.clone())
            .collect();
        debug!(
            "Indexed {} tools for server '{}' ({} skipped)",
            names.len(),
            definition.name,
            build.skipped
        );
        self.entries
            .insert(definition.name.clone(), Arc::new(build.entries));
        self.names.insert(definition.name.clone(), Arc::new(names));
        build.skipped
    }

    pub fn remove_server(&self, server: &str) {
        self.entries.remove(server);
        self.names.remove(server);
    }

    /// Servers with an installed list, sorted by name.
    pub fn server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn tools_for(&self, server: &str) -> Option<Arc<Vec<Arc<ToolMetadata>>>> {
        self.entries.get(server).map(|e| Arc::clone(e.value()))
    }

    pub fn names_for(&self, server: &str) -> Option<Arc<Vec<String>>> {
        self.names.get(server).map(|e| Arc::clone(e.value()))
    }

    pub fn tool_count(&self, server: &str) -> usize {
        self.names.get(server).map(|e| e.len()).unwrap_or(0)
    }

    pub fn total_tools(&self) -> usize {
        self.names.iter().map(|e| e.value().len()).sum()
    }

    /// Resolve a public name by scanning servers in sorted order, so an
    /// ambiguous name always lands on the same entry.
    pub fn resolve(&self, public_name: &str) -> Option<Arc<ToolMetadata>> {
        for server in self.server_names() {
            if let Some(list) = self.tools_for(&server) {
                if let Some(found) = list.iter().find(|m| m.public_name == public_name) {
                    return Some(Arc::clone(found));
                }
            }
        }
        None
    }

    /// Every entry across all servers, in sorted server order.
    pub fn iter_all(&self) -> Vec<Arc<ToolMetadata>> {
        let mut all = Vec::new();
        for server in self.server_names() {
            if let Some(list) = self.tools_for(&server) {
                all.extend(list.iter().map(Arc::clone));
            }
        }
        all
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{AuthConfig, LifecyclePolicy, ServerTransport};
    use std::borrow::Cow;
    use std::collections::HashMap;

    fn test_definition(name: &str) -> ServerConfig {
        ServerConfig {
            name: name.to_string(),
            transport: ServerTransport::Stdio {
                command: "mcp-test".to_string(),
                args: vec![],
                env: HashMap::new(),
            },
            auth: AuthConfig::default(),
            lifecycle: LifecyclePolicy::default(),
            expose_resources: true,
            debug: false,
            disabled: false,
        }
    }

    fn create_test_tool(name: &str, description: &str) -> Tool {
        Tool {
            name: Cow::Owned(name.to_string()),
            title: None,
            description: Some(Cow::Owned(description.to_string())),
            input_schema: Arc::new(serde_json::Map::new()),
            output_schema: None,
            annotations: None,
            icons: None,
        }
    }

    fn create_test_resource(uri: &str, name: &str) -> RawResource {
        RawResource {
            uri: uri.to_string(),
            name: name.to_string(),
            title: None,
            description: None,
            mime_type: None,
            size: None,
            icons: None,
        }
    }

    #[test]
    fn test_build_prefixes_tools() {
        let build = build_for_server(
            &test_definition("fs"),
            &[
                create_test_tool("read_file", "Read a file"),
                create_test_tool("write_file", "Write a file"),
            ],
            &[],
            ToolPrefixStyle::Underscore,
        );
        let names: Vec<&str> = build.entries.iter().map(|e| e.public_name.as_str()).collect();
        assert_eq!(names, vec!["fs_read_file", "fs_write_file"]);
        assert_eq!(build.skipped, 0);
        assert_eq!(build.entries[0].original_name, "read_file");
        assert_eq!(build.entries[0].server, "fs");
    }

    #[test]
    fn test_build_skips_duplicate_tools() {
        let build = build_for_server(
            &test_definition("fs"),
            &[
                create_test_tool("read_file", "first"),
                create_test_tool("read_file", "second"),
            ],
            &[],
            ToolPrefixStyle::Underscore,
        );
        assert_eq!(build.entries.len(), 1);
        assert_eq!(build.skipped, 1);
        // The earlier entry wins.
        assert_eq!(build.entries[0].description.as_deref(), Some("first"));
    }

    #[test]
    fn test_build_exposes_resources_as_pseudo_tools() {
        let build = build_for_server(
            &test_definition("cfg"),
            &[],
            &[create_test_resource("config://app", "config/app.json")],
            ToolPrefixStyle::None,
        );
        assert_eq!(build.entries.len(), 1);
        let entry = &build.entries[0];
        assert_eq!(entry.public_name, "get_config_app_json");
        assert!(entry.is_resource());
        assert_eq!(
            entry.invocation,
            Invocation::ResourceRead {
                uri: "config://app".to_string()
            }
        );
        // No upstream description: fall back to the URI.
        assert_eq!(entry.description.as_deref(), Some("Read resource config://app"));
    }

    #[test]
    fn test_build_honors_expose_resources_flag() {
        let mut definition = test_definition("cfg");
        definition.expose_resources = false;
        let build = build_for_server(
            &definition,
            &[],
            &[create_test_resource("config://app", "app")],
            ToolPrefixStyle::Underscore,
        );
        assert!(build.entries.is_empty());
    }

    #[test]
    fn test_build_tools_win_over_resources() {
        let build = build_for_server(
            &test_definition("cfg"),
            &[create_test_tool("get_app", "real tool")],
            &[create_test_resource("config://app", "app")],
            ToolPrefixStyle::None,
        );
        assert_eq!(build.entries.len(), 1);
        assert_eq!(build.skipped, 1);
        assert_eq!(build.entries[0].invocation, Invocation::ToolCall);
    }

    #[test]
    fn test_rebuild_replaces_wholesale() {
        let catalog = ToolCatalog::new();
        let definition = test_definition("fs");

        catalog.rebuild_for_server(
            &definition,
            &[create_test_tool("old_tool", "old")],
            &[],
            ToolPrefixStyle::Underscore,
        );
        assert!(catalog.resolve("fs_old_tool").is_some());

        catalog.rebuild_for_server(
            &definition,
            &[create_test_tool("new_tool", "new")],
            &[],
            ToolPrefixStyle::Underscore,
        );
        assert!(catalog.resolve("fs_old_tool").is_none());
        assert!(catalog.resolve("fs_new_tool").is_some());
        assert_eq!(catalog.tool_count("fs"), 1);
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let catalog = ToolCatalog::new();
        let definition = test_definition("fs");
        catalog.rebuild_for_server(
            &definition,
            &[create_test_tool("old_tool", "old")],
            &[],
            ToolPrefixStyle::Underscore,
        );

        let snapshot = catalog.tools_for("fs").unwrap();
        catalog.rebuild_for_server(
            &definition,
            &[create_test_tool("new_tool", "new")],
            &[],
            ToolPrefixStyle::Underscore,
        );

        // The old list is untouched; fresh reads see only the new one.
        assert_eq!(snapshot[0].public_name, "fs_old_tool");
        assert_eq!(catalog.tools_for("fs").unwrap()[0].public_name, "fs_new_tool");
    }

    #[test]
    fn test_remove_server_clears_both_maps() {
        let catalog = ToolCatalog::new();
        catalog.rebuild_for_server(
            &test_definition("fs"),
            &[create_test_tool("read_file", "")],
            &[],
            ToolPrefixStyle::Underscore,
        );
        catalog.remove_server("fs");
        assert!(catalog.tools_for("fs").is_none());
        assert!(catalog.names_for("fs").is_none());
        assert_eq!(catalog.total_tools(), 0);
    }

    #[test]
    fn test_resolve_scans_servers_in_sorted_order() {
        let catalog = ToolCatalog::new();
        // Same unprefixed name on two servers.
        catalog.rebuild_for_server(
            &test_definition("beta"),
            &[create_test_tool("search", "beta search")],
            &[],
            ToolPrefixStyle::None,
        );
        catalog.rebuild_for_server(
            &test_definition("alpha"),
            &[create_test_tool("search", "alpha search")],
            &[],
            ToolPrefixStyle::None,
        );

        let resolved = catalog.resolve("search").unwrap();
        assert_eq!(resolved.server, "alpha");
    }

    #[test]
    fn test_names_match_entries() {
        let catalog = ToolCatalog::new();
        catalog.rebuild_for_server(
            &test_definition("fs"),
            &[
                create_test_tool("read_file", ""),
                create_test_tool("write_file", ""),
            ],
            &[create_test_resource("file:///tmp", "tmp")],
            ToolPrefixStyle::Underscore,
        );

        let names = catalog.names_for("fs").unwrap();
        let entries = catalog.tools_for("fs").unwrap();
        let from_entries: Vec<String> =
            entries.iter().map(|e| e.public_name.clone()).collect();
        assert_eq!(*names, from_entries);
        assert_eq!(catalog.tool_count("fs"), 3);
        assert_eq!(catalog.total_tools(), 3);
    }
}
