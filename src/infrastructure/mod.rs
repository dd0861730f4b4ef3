pub mod files;
pub mod git;
pub mod github;
pub mod model;
pub mod rpc;
pub mod shell;
pub mod workspace;
