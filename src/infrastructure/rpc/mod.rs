//! MCP server: JSON-RPC 2.0, one message per line over stdio.

mod server;
pub mod types;

pub use server::{MCP_PROTOCOL_VERSION, McpServer, RpcServerError};
pub use types::{RpcError, RpcRequest, RpcResponse};
