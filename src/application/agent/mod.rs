//! # Agent Module
//!
//! Bounded tool-calling loop over a [`Conversation`](crate::application::conversation::Conversation).
//!
//! 1. Append the user message and send the history to the model
//! 2. No tool requests: the reply is the answer
//! 3. Otherwise record the assistant turn, dispatch every request in order,
//!    append each result and send the history again
//! 4. Stop after `max_iterations` round trips with `ceiling_reached` set

mod errors;
mod models;
mod runner;


pub use errors::AgentError;
pub use models::{AgentOptions, AgentOutcome, AgentStep};
pub use runner::Agent;
