use super::types::{RpcRequest, RpcResponse};
use crate::application::tooling::ToolDispatcher;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

pub const MCP_PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "github-agent";

#[derive(Debug, Error)]
pub enum RpcServerError {
    #[error("MCP transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode JSON-RPC response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Exposes the tool registry to MCP clients. No model is involved: each
/// `tools/call` goes straight to the dispatcher.
#[derive(Debug, Clone)]
pub struct McpServer {
    dispatcher: ToolDispatcher,
}

impl McpServer {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Serve line-delimited JSON-RPC until the reader reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<(), RpcServerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(tools = self.dispatcher.registry().len(), "MCP server running on stdio");
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                let encoded = serde_json::to_string(&response)?;
                writer.write_all(encoded.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        info!("MCP input closed, shutting down");
        Ok(())
    }

    /// Handle one raw message. Notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "Malformed JSON-RPC message");
                return Some(RpcResponse::parse_error(format!("Parse error: {err}")));
            }
        };
        let id = value.get("id").cloned().filter(|id| !id.is_null());
        match serde_json::from_value::<RpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(err) => Some(RpcResponse::invalid_request(
                id,
                format!("Invalid request: {err}"),
            )),
        }
    }

    pub async fn handle_request(&self, request: RpcRequest) -> Option<RpcResponse> {
        debug!(method = %request.method, "Received JSON-RPC request");

        if request.jsonrpc != "2.0" {
            return Some(RpcResponse::invalid_request(
                request.id,
                "Unsupported jsonrpc version (expected 2.0)",
            ));
        }

        if request.is_notification() {
            match request.method.as_str() {
                "notifications/initialized" => info!("MCP client initialized"),
                other => debug!(method = other, "Ignoring notification"),
            }
            return None;
        }

        let id = request.id.clone();
        let response = match request.method.as_str() {
            "initialize" => RpcResponse::success(id, initialize_result()),
            "ping" => RpcResponse::success(id, json!({})),
            "tools/list" => RpcResponse::success(
                id,
                json!({ "tools": self.dispatcher.registry().mcp_tools() }),
            ),
            "tools/call" => self.handle_tool_call(id, request.params).await,
            other => {
                error!(method = other, "Unknown JSON-RPC method");
                RpcResponse::method_not_found(id, other)
            }
        };
        Some(response)
    }

    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> RpcResponse {
        let Some(Value::Object(mut params)) = params else {
            return RpcResponse::invalid_params(id, "params must be an object with name");
        };
        let name = match params.remove("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            _ => {
                return RpcResponse::invalid_params(id, "params.name must be a non-empty string");
            }
        };
        let arguments = match params.remove("arguments") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(arguments @ Value::Object(_)) => arguments,
            Some(_) => {
                return RpcResponse::invalid_params(id, "params.arguments must be an object");
            }
        };

        info!(tool = %name, "MCP tool call");
        let result = self.dispatcher.dispatch_value(&name, arguments).await;
        RpcResponse::success(
            id,
            json!({
                "content": [{ "type": "text", "text": result.to_json() }],
                "isError": !result.ok,
            }),
        )
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tooling::{
        HandlerError, ParamType, ToolDescriptor, ToolRegistry,
    };
    use std::sync::Arc;

    fn server() -> McpServer {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolDescriptor::new("echo", "Echo text").required("text", ParamType::String, "Text"),
            |args: Value| async move { Ok::<_, HandlerError>(json!({ "echo": args["text"] })) },
        );
        McpServer::new(ToolDispatcher::new(Arc::new(registry)))
    }

    #[tokio::test]
    async fn initialize_reports_protocol_and_tools_capability() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .expect("response");
        let result = response.result.expect("result");
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert!(result["capabilities"]["tools"].is_object());
        assert_eq!(result["serverInfo"]["name"], "github-agent");
        assert_eq!(response.id, Some(json!(1)));
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let response = server().handle_line("{not json").await.expect("response");
        assert_eq!(response.error.expect("error").code, -32700);
        assert_eq!(response.id, None);
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":"a","method":"resources/list"}"#)
            .await
            .expect("response");
        assert_eq!(response.error.expect("error").code, -32601);
    }

    #[tokio::test]
    async fn tool_call_wraps_result_as_text_content() {
        let response = server()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"echo","arguments":{"text":"hi"}}}"#,
            )
            .await
            .expect("response");
        let result = response.result.expect("result");
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["type"], "text");
        let text = result["content"][0]["text"].as_str().expect("text");
        let decoded: Value = serde_json::from_str(text).expect("json");
        assert_eq!(decoded["payload"]["echo"], "hi");
    }

    #[tokio::test]
    async fn tool_failures_set_is_error() {
        let response = server()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"echo","arguments":{}}}"#,
            )
            .await
            .expect("response");
        assert_eq!(response.result.expect("result")["isError"], true);
    }

    #[tokio::test]
    async fn tool_call_without_name_is_invalid_params() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{}}"#)
            .await
            .expect("response");
        assert_eq!(response.error.expect("error").code, -32602);
    }
}
