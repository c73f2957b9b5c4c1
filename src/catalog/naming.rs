//! Public tool naming.
//!
//! Every host runtime accepts names limited to `[a-zA-Z0-9_-]`, so public
//! names are computed once at registration and everything outside that set
//! folds to `_`. The same input always produces the same public name.

use crate::core::config::ToolPrefixStyle;

/// Replace characters outside `[a-zA-Z0-9_-]` with underscores.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Compute the public name for a tool under the configured prefix style.
pub fn public_name(style: ToolPrefixStyle, server: &str, original: &str) -> String {
    match style {
        ToolPrefixStyle::Underscore => format!("{}_{}", sanitize(server), sanitize(original)),
        ToolPrefixStyle::DoubleUnderscore => {
            format!("{}__{}", sanitize(server), sanitize(original))
        }
        ToolPrefixStyle::None => sanitize(original),
    }
}

/// Fixed transformation from a resource name to its pseudo-tool name:
/// `config/app.json` becomes `get_config_app_json`.
pub fn resource_tool_name(resource_name: &str) -> String {
    format!("get_{}", sanitize(resource_name))
}
