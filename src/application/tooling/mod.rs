//! Tool catalog and dispatch.
//!
//! [`ToolRegistry`] holds descriptors and handlers, [`ToolDispatcher`] turns a
//! model or MCP tool call into a [`ToolResult`], and [`builtin`] wires the
//! git, GitHub, filesystem, shell and directory collaborators in.

pub mod builtin;
mod descriptor;
mod dispatcher;
mod error;
mod registry;

pub use builtin::{ToolContext, builtin_registry, register_all};
pub use descriptor::{ParamSpec, ParamType, ToolDescriptor};
pub use dispatcher::ToolDispatcher;
pub use error::{HandlerError, ToolErrorKind, ToolResult};
pub use registry::{HandlerFuture, ToolHandler, ToolRegistry};
