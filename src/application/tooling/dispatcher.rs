//! Validates tool arguments against their descriptors, runs the handler and
//! normalises every outcome into a [`ToolResult`]. Nothing escapes as an error.

use super::descriptor::ToolDescriptor;
use super::error::{ToolErrorKind, ToolResult};
use super::registry::ToolRegistry;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Dispatch a call whose arguments arrive as raw JSON text (model path).
    pub async fn dispatch(&self, name: &str, raw_arguments: &str) -> ToolResult {
        let trimmed = raw_arguments.trim();
        let arguments = if trimmed.is_empty() {
            Value::Object(Map::new())
        } else {
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => value,
                Err(err) => {
                    // Unknown tools are reported as such even with garbage arguments.
                    if self.registry.resolve(name).is_none() {
                        return unknown_tool(name);
                    }
                    warn!(tool = name, error = %err, "Tool arguments are not valid JSON");
                    return ToolResult::failure(
                        ToolErrorKind::InvalidArguments,
                        format!("arguments are not valid JSON: {err}"),
                    );
                }
            }
        };
        self.dispatch_value(name, arguments).await
    }

    /// Dispatch a call with already-parsed arguments (MCP path).
    pub async fn dispatch_value(&self, name: &str, arguments: Value) -> ToolResult {
        let (Some(handler), Some(descriptor)) =
            (self.registry.resolve(name), self.registry.descriptor(name))
        else {
            return unknown_tool(name);
        };

        let arguments = match prepare_arguments(descriptor, arguments) {
            Ok(arguments) => arguments,
            Err(reason) => {
                warn!(tool = name, %reason, "Rejected tool arguments");
                return ToolResult::failure(ToolErrorKind::InvalidArguments, reason);
            }
        };

        info!(tool = name, "Dispatching tool");
        debug!(tool = name, arguments = %arguments, "Tool arguments");
        let started = Instant::now();
        let result = match handler.call(arguments).await {
            Ok(payload) => ToolResult::success(payload),
            Err(err) => ToolResult::from(err),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result.error_kind {
            None => info!(tool = name, elapsed_ms, "Tool succeeded"),
            Some(kind) => warn!(
                tool = name,
                elapsed_ms,
                kind = kind.as_str(),
                error = result.error_message.as_deref().unwrap_or_default(),
                "Tool failed"
            ),
        }
        result
    }
}

fn unknown_tool(name: &str) -> ToolResult {
    warn!(tool = name, "Model requested an unknown tool");
    ToolResult::failure(ToolErrorKind::UnknownTool, format!("unknown tool: {name}"))
}

/// Fill declared defaults, then check required fields and primitive types.
fn prepare_arguments(descriptor: &ToolDescriptor, arguments: Value) -> Result<Value, String> {
    let mut object = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(format!(
                "arguments must be a JSON object, got {}",
                json_type_name(&other)
            ));
        }
    };

    for param in &descriptor.params {
        // `null` for an optional field means "not provided".
        if !param.required && object.get(&param.name).is_some_and(Value::is_null) {
            object.remove(&param.name);
        }
        match object.get(&param.name) {
            None | Some(Value::Null) if param.required => {
                return Err(format!("missing required argument '{}'", param.name));
            }
            None => {
                if let Some(default) = &param.default {
                    object.insert(param.name.clone(), default.clone());
                }
            }
            Some(value) => {
                if !param.kind.matches(value) {
                    return Err(format!(
                        "argument '{}' must be {}, got {}",
                        param.name,
                        param.kind.as_str(),
                        json_type_name(value)
                    ));
                }
                if let (Some(items), Value::Array(elements)) = (param.items, value) {
                    if let Some(bad) = elements.iter().find(|e| !items.matches(e)) {
                        return Err(format!(
                            "elements of '{}' must be {}, got {}",
                            param.name,
                            items.as_str(),
                            json_type_name(bad)
                        ));
                    }
                }
            }
        }
    }

    Ok(Value::Object(object))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
