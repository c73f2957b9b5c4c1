//! Text rendering for gateway responses.
//!
//! Everything callers see comes through here: parameter documentation from
//! JSON schemas, truncated descriptions for listings, and the flattening of
//! upstream content blocks into display text. Binary payloads are never
//! inlined, only labelled.

use rmcp::model::{CallToolResult, ReadResourceResult, ResourceContents};
use serde_json::{Map, Value};

use crate::catalog::types::{Invocation, ToolMetadata};

/// Target length for descriptions in schema-less listings.
pub const DESCRIPTION_TARGET: usize = 100;

const ELLIPSIS: &str = "...";

/// Word-boundary truncation. Output never exceeds `target` characters, and
/// running it twice gives the same string.
pub fn truncate_description(text: &str, target: usize) -> String {
    if text.chars().count() <= target {
        return text.to_string();
    }
    let budget = target.saturating_sub(ELLIPSIS.len());
    let head: String = text.chars().take(budget).collect();
    let cut = match head.rfind(' ') {
        // Break on the word only when the boundary is not unreasonably early.
        Some(idx) if head[..idx].chars().count() * 2 >= budget => head[..idx].trim_end(),
        _ => head.trim_end(),
    };
    format!("{}{}", cut, ELLIPSIS)
}

/// Render parameter documentation from a tool input schema.
///
/// A missing schema, a non-object schema, and an object with no declared
/// properties each get their own fallback line.
pub fn render_param_docs(schema: Option<&Map<String, Value>>) -> String {
    let Some(schema) = schema else {
        return "No input schema provided.".to_string();
    };

    let properties = match schema.get("properties") {
        Some(Value::Object(props)) => props,
        Some(_) => return "Input schema is not an object schema.".to_string(),
        None => match schema.get("type").and_then(Value::as_str) {
            Some("object") | None => return "No parameters.".to_string(),
            Some(other) => {
                return format!("Input schema is not an object (type: {}).", other)
            }
        },
    };
    if properties.is_empty() {
        return "No parameters.".to_string();
    }

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut lines = vec!["Parameters:".to_string()];
    for (name, prop) in properties {
        lines.push(render_property(name, prop, required.contains(&name.as_str())));
    }
    lines.join("\n")
}

fn render_property(name: &str, prop: &Value, required: bool) -> String {
    let mut line = format!("  - {} ({})", name, type_label(prop));
    if required {
        line.push_str(" *required*");
    }
    if let Some(description) = prop.get("description").and_then(Value::as_str) {
        line.push_str(": ");
        line.push_str(description);
    }
    if let Some(default) = prop.get("default") {
        line.push_str(&format!(" [default: {}]", default));
    }
    line
}

/// Type, enum, or union label for one property.
fn type_label(prop: &Value) -> String {
    let Some(obj) = prop.as_object() else {
        return "any".to_string();
    };
    if let Some(values) = obj.get("enum").and_then(Value::as_array) {
        let rendered: Vec<String> = values.iter().map(render_scalar).collect();
        return format!("enum: {}", rendered.join("|"));
    }
    match obj.get("type") {
        Some(Value::String(t)) => t.clone(),
        Some(Value::Array(types)) => {
            let rendered: Vec<String> = types.iter().map(render_scalar).collect();
            rendered.join("|")
        }
        _ => {
            for key in ["anyOf", "oneOf"] {
                if let Some(variants) = obj.get(key).and_then(Value::as_array) {
                    let rendered: Vec<String> = variants.iter().map(type_label).collect();
                    return rendered.join("|");
                }
            }
            "any".to_string()
        }
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Full describe output for one catalog entry.
pub fn render_describe(meta: &ToolMetadata) -> String {
    let mut out = format!("Tool: {}\nServer: {}\n", meta.public_name, meta.server);
    if let Some(description) = &meta.description {
        out.push_str(description);
        out.push('\n');
    }
    match &meta.invocation {
        Invocation::ResourceRead { uri } => {
            out.push_str(&format!("Resource URI: {}\n", uri));
            out.push_str("No parameters (resource read).");
        }
        Invocation::ToolCall => {
            out.push_str(&render_param_docs(meta.input_schema.as_deref()));
        }
    }
    out
}

/// One search hit, with or without the full schema.
pub fn render_search_hit(meta: &ToolMetadata, include_schema: bool) -> String {
    if !include_schema {
        return match &meta.description {
            Some(description) => format!(
                "{}: {}",
                meta.public_name,
                truncate_description(description, DESCRIPTION_TARGET)
            ),
            None => meta.public_name.clone(),
        };
    }

    let mut out = format!("{} (server: {})", meta.public_name, meta.server);
    if let Some(description) = &meta.description {
        out.push_str(&format!("\n  {}", description));
    }
    match &meta.invocation {
        Invocation::ResourceRead { uri } => {
            out.push_str(&format!("\n  Resource URI: {}", uri));
        }
        Invocation::ToolCall => {
            for line in render_param_docs(meta.input_schema.as_deref()).lines() {
                out.push_str("\n  ");
                out.push_str(line);
            }
        }
    }
    out
}

/// Flatten tool result content blocks into display text.
pub fn render_call_content(result: &CallToolResult) -> String {
    let value = serde_json::to_value(&result.content).unwrap_or(Value::Null);
    let Some(blocks) = value.as_array() else {
        return "(no content)".to_string();
    };
    let rendered: Vec<String> = blocks.iter().map(render_block).collect();
    let joined = rendered.join("\n");
    if joined.trim().is_empty() {
        "(no content)".to_string()
    } else {
        joined
    }
}

fn render_block(block: &Value) -> String {
    let Some(obj) = block.as_object() else {
        return block.to_string();
    };
    match obj.get("type").and_then(Value::as_str) {
        Some("text") => obj
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some("image") => format!("[image ({})]", mime_of(obj)),
        Some("audio") => format!("[audio ({})]", mime_of(obj)),
        Some("resource") => match obj.get("resource") {
            Some(Value::Object(resource)) => render_resource_object(resource),
            _ => "[resource]".to_string(),
        },
        Some("resource_link") => {
            let uri = obj.get("uri").and_then(Value::as_str).unwrap_or("unknown");
            format!("[resource link: {}]", uri)
        }
        Some(other) => format!("[{} content]", other),
        None => block.to_string(),
    }
}

fn mime_of(obj: &Map<String, Value>) -> &str {
    obj.get("mimeType")
        .and_then(Value::as_str)
        .unwrap_or("unknown media type")
}

fn render_resource_object(resource: &Map<String, Value>) -> String {
    if let Some(text) = resource.get("text").and_then(Value::as_str) {
        return text.to_string();
    }
    let uri = resource
        .get("uri")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    format!("[binary resource {} ({})]", uri, mime_of(resource))
}

/// Render a resource read into text, labelling binary payloads.
pub fn render_resource_content(result: &ReadResourceResult) -> String {
    if result.contents.is_empty() {
        return "(empty resource)".to_string();
    }
    let rendered: Vec<String> = result
        .contents
        .iter()
        .map(|contents| match contents {
            ResourceContents::TextResourceContents { text, .. } => text.clone(),
            ResourceContents::BlobResourceContents { uri, mime_type, .. } => {
                format!(
                    "[binary resource {} ({})]",
                    uri,
                    mime_type.as_deref().unwrap_or("unknown media type")
                )
            }
        })
        .collect();
    rendered.join("\n")
}
