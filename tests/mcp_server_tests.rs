// MCP server tests: full sessions over in-memory pipes with the built-in tools.

use github_agent::config::GitHubConfig;
use github_agent::rpc::{MCP_PROTOCOL_VERSION, McpServer};
use github_agent::tooling::{ToolContext, ToolDispatcher, builtin_registry};
use github_agent::workspace::WorkingDirectory;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

fn server(root: &std::path::Path) -> McpServer {
    let workdir = WorkingDirectory::new(root.canonicalize().expect("canonical root"));
    let ctx = ToolContext::new(workdir, &GitHubConfig::default(), 5_000);
    McpServer::new(ToolDispatcher::new(Arc::new(builtin_registry(ctx))))
}

/// Feed `requests` (one per line) to a server and collect every response line.
async fn session(server: McpServer, requests: &[Value]) -> Vec<Value> {
    let (mut client_writer, server_reader) = duplex(64 * 1024);
    let (server_writer, client_reader) = duplex(1024 * 1024);

    let handle = tokio::spawn(async move {
        server
            .serve(BufReader::new(server_reader), server_writer)
            .await
    });

    for request in requests {
        let line = format!("{request}\n");
        client_writer
            .write_all(line.as_bytes())
            .await
            .expect("write request");
    }
    drop(client_writer);

    handle.await.expect("join").expect("server runs");

    let mut responses = Vec::new();
    let mut lines = BufReader::new(client_reader).lines();
    while let Some(line) = lines.next_line().await.expect("read response") {
        responses.push(serde_json::from_str(&line).expect("response is JSON"));
    }
    responses
}

#[tokio::test]
async fn handshake_then_list_tools() {
    let root = tempfile::tempdir().expect("tempdir");
    let responses = session(
        server(root.path()),
        &[
            json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":MCP_PROTOCOL_VERSION,"capabilities":{},"clientInfo":{"name":"test","version":"0"}}}),
            json!({"jsonrpc":"2.0","method":"notifications/initialized"}),
            json!({"jsonrpc":"2.0","id":2,"method":"tools/list"}),
            json!({"jsonrpc":"2.0","id":3,"method":"ping"}),
        ],
    )
    .await;

    assert_eq!(responses.len(), 3, "notification must not be answered");
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);

    let tools = responses[1]["result"]["tools"].as_array().expect("tools");
    assert_eq!(tools.len(), 30);
    let read_file = tools
        .iter()
        .find(|tool| tool["name"] == "read_file")
        .expect("read_file listed");
    assert_eq!(read_file["inputSchema"]["required"], json!(["filePath"]));
    assert_eq!(
        read_file["inputSchema"]["properties"]["maxLines"]["type"],
        "integer"
    );

    assert_eq!(responses[2]["result"], json!({}));
}

#[tokio::test]
async fn tool_call_reads_a_file_from_the_workspace() {
    let root = tempfile::tempdir().expect("tempdir");
    std::fs::write(root.path().join("notes.txt"), "one\ntwo\nthree\n").expect("write");

    let responses = session(
        server(root.path()),
        &[json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": "read_file", "arguments": {"filePath": "notes.txt", "maxLines": 1}}
        })],
    )
    .await;

    let result = &responses[0]["result"];
    assert_eq!(result["isError"], false);
    let text = result["content"][0]["text"].as_str().expect("text content");
    let decoded: Value = serde_json::from_str(text).expect("json");
    assert_eq!(decoded["ok"], true);
    assert!(decoded["payload"]["truncated"].as_bool().unwrap_or(false));
    assert!(
        decoded["payload"]["content"]
            .as_str()
            .unwrap_or_default()
            .starts_with("one")
    );
}

#[tokio::test]
async fn errors_are_reported_per_message() {
    let root = tempfile::tempdir().expect("tempdir");
    let (mut writer, reader) = duplex(4096);
    let (out_writer, out_reader) = duplex(64 * 1024);
    let server = server(root.path());
    let handle = tokio::spawn(async move { server.serve(BufReader::new(reader), out_writer).await });

    writer.write_all(b"{broken\n").await.expect("write");
    writer
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"resources/list\"}\n")
        .await
        .expect("write");
    writer
        .write_all(
            b"{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"tools/call\",\"params\":{\"name\":\"nope\"}}\n",
        )
        .await
        .expect("write");
    drop(writer);
    handle.await.expect("join").expect("server runs");

    let mut lines = BufReader::new(out_reader).lines();
    let mut responses: Vec<Value> = Vec::new();
    while let Some(line) = lines.next_line().await.expect("read") {
        responses.push(serde_json::from_str(&line).expect("json"));
    }

    assert_eq!(responses[0]["error"]["code"], -32700);
    assert_eq!(responses[1]["error"]["code"], -32601);
    assert_eq!(responses[2]["result"]["isError"], true);
    let text = responses[2]["result"]["content"][0]["text"]
        .as_str()
        .expect("text");
    assert!(text.contains("unknown_tool"));
}
