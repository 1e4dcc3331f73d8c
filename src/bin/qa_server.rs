//! HTTP server binary entry point
//!
//! Run with: cargo run --features server --bin qa-server

use std::path::PathBuf;

use clap::Parser;
use qa_orchestrator::server::{self, AppState};
use qa_orchestrator::{OrchestratorConfig, bootstrap};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "qa-server")]
#[command(about = "Question-answering HTTP API")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("QA Orchestrator server v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = OrchestratorConfig::load(cli.config.as_deref())?;
    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());

    let services = bootstrap(&config).await?;
    server::run(AppState::new(services, &config.server), &bind).await?;

    info!("Server shutting down");
    Ok(())
}
