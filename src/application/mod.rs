pub mod agent;
pub mod client;
pub mod conversation;
pub mod stdio;
pub mod tooling;
