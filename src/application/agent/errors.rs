use crate::model::ModelError;
use thiserror::Error;

/// Failure that ends a user turn. Tool faults never surface here; they are
/// reported back to the model as tool results.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model gateway failed: {0}")]
    Gateway(#[from] ModelError),
}

impl AgentError {
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Gateway(err) => err.user_message(),
        }
    }
}
