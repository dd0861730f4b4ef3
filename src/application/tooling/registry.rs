//! Tool registry: descriptors in registration order plus name-indexed handlers.

use super::descriptor::ToolDescriptor;
use super::error::HandlerError;
use futures::FutureExt;
use futures::future::{BoxFuture, ready};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

pub type HandlerFuture = BoxFuture<'static, Result<Value, HandlerError>>;

/// Executes one tool with already-validated JSON arguments.
pub trait ToolHandler: Send + Sync {
    fn call(&self, arguments: Value) -> HandlerFuture;
}

impl<F> ToolHandler for F
where
    F: Fn(Value) -> HandlerFuture + Send + Sync,
{
    fn call(&self, arguments: Value) -> HandlerFuture {
        self(arguments)
    }
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool whose arguments deserialize into `A` and whose output
    /// serializes to JSON. A second registration under the same name replaces
    /// the first.
    pub fn register<A, T, F, Fut>(&mut self, descriptor: ToolDescriptor, handler: F) -> &mut Self
    where
        A: DeserializeOwned + Send + 'static,
        T: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HandlerError>> + Send + 'static,
    {
        let erased = move |arguments: Value| -> HandlerFuture {
            match serde_json::from_value::<A>(arguments) {
                Ok(parsed) => handler(parsed)
                    .map(|result| {
                        result.and_then(|output| {
                            serde_json::to_value(output)
                                .map_err(|err| HandlerError::Failed(err.to_string()))
                        })
                    })
                    .boxed(),
                Err(err) => ready(Err(HandlerError::InvalidArguments(err.to_string()))).boxed(),
            }
        };
        self.register_handler(descriptor, Arc::new(erased))
    }

    pub fn register_handler(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> &mut Self {
        let name = descriptor.name.clone();
        match self.descriptors.iter_mut().find(|d| d.name == name) {
            Some(existing) => {
                warn!(tool = name.as_str(), "Replacing previously registered tool");
                *existing = descriptor;
            }
            None => self.descriptors.push(descriptor),
        }
        self.handlers.insert(name, handler);
        self
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Function schemas for the model request.
    pub fn openai_tools(&self) -> Vec<Value> {
        self.descriptors.iter().map(|d| d.openai_function()).collect()
    }

    /// Tool list for MCP clients.
    pub fn mcp_tools(&self) -> Vec<Value> {
        self.descriptors.iter().map(|d| d.mcp_tool()).collect()
    }

    /// Compact catalog printed by `--mode tools`.
    pub fn catalog(&self) -> Vec<Value> {
        self.descriptors.iter().map(|d| d.catalog_entry()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tooling::descriptor::ParamType;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct EchoArgs {
        text: String,
    }

    fn echo_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolDescriptor::new("echo", "Echo text").required("text", ParamType::String, "Text"),
            |args: EchoArgs| async move { Ok::<_, HandlerError>(json!({ "echo": args.text })) },
        );
        registry
    }

    #[tokio::test]
    async fn typed_handler_receives_deserialized_arguments() {
        let registry = echo_registry();
        let handler = registry.resolve("echo").expect("registered");
        let output = handler.call(json!({"text": "hi"})).await.expect("ok");
        assert_eq!(output, json!({"echo": "hi"}));
    }

    #[tokio::test]
    async fn mismatched_arguments_are_invalid() {
        let registry = echo_registry();
        let handler = registry.resolve("echo").expect("registered");
        let err = handler.call(json!({"text": 5})).await.expect_err("invalid");
        assert!(matches!(err, HandlerError::InvalidArguments(_)));
    }

    #[test]
    fn catalog_lists_required_and_optional_parameters() {
        let mut registry = echo_registry();
        registry.register(
            ToolDescriptor::new("repeat", "Repeat text")
                .required("text", ParamType::String, "Text")
                .optional("times", ParamType::Integer, "Repetitions", Some(json!(2))),
            |_: Value| async move { Ok::<_, HandlerError>(Value::Null) },
        );
        let catalog = registry.catalog();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[1]["name"], "repeat");
        assert_eq!(catalog[1]["parameters"]["required"], json!(["text"]));
        assert_eq!(catalog[1]["parameters"]["optional"]["times"]["default"], 2);
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        assert!(echo_registry().resolve("nope").is_none());
    }

    #[test]
    fn re_registration_keeps_position() {
        let mut registry = echo_registry();
        registry.register(
            ToolDescriptor::new("other", "Other"),
            |_: Value| async move { Ok::<_, HandlerError>(Value::Null) },
        );
        registry.register(
            ToolDescriptor::new("echo", "Echo v2"),
            |_: Value| async move { Ok::<_, HandlerError>(Value::Null) },
        );
        assert_eq!(registry.names(), vec!["echo", "other"]);
        assert_eq!(registry.descriptors()[0].description, "Echo v2");
    }
}
