use clap::Parser;
use github_agent::Cli;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    github_agent::run(Cli::parse()).await
}
