//! Model gateway infrastructure: provider trait, wire types and the
//! OpenAI-compatible HTTP client.

mod base;
mod openai;
mod traits;
mod types;

pub use openai::OpenAIClient;
pub use traits::ModelProvider;
pub use types::{ModelError, ModelRequest, ModelResponse, ToolChoice};
