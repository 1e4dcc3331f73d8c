//! Interactive question-answering console
//!
//! Run with: cargo run --features cli --bin qa-cli

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use qa_orchestrator::{OrchestratorConfig, Services, bootstrap};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const PROMPT: &str = "Ask your question (q to quit): ";

#[derive(Parser, Debug)]
#[command(name = "qa-cli")]
#[command(about = "Ask questions answered from local documents, Wikipedia, the web and arXiv")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Seconds to wait for each answer
    #[arg(long, default_value_t = 100)]
    timeout: u64,

    /// Answer this question and exit
    question: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so answers on stdout stay clean
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = OrchestratorConfig::load(cli.config.as_deref())?;
    let services = bootstrap(&config).await?;
    let timeout = Duration::from_secs(cli.timeout);

    if !cli.question.is_empty() {
        let question = cli.question.join(" ");
        ask(&services, &question, timeout).await;
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{}", PROMPT);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("q") {
            break;
        }
        ask(&services, question, timeout).await;
    }

    info!("Goodbye");
    Ok(())
}

async fn ask(services: &Services, question: &str, timeout: Duration) {
    let cancel = CancellationToken::new();
    let run = services.dispatcher.run_with_cancel(question, &cancel);
    let answer = match tokio::time::timeout(timeout, run).await {
        Ok(answer) => answer,
        Err(_) => {
            cancel.cancel();
            warn!(timeout_secs = timeout.as_secs(), "Question timed out");
            format!(
                "Timed out after {} seconds without an answer.",
                timeout.as_secs()
            )
        }
    };
    println!("\nRESPONSE:\n{}\n", answer);
}
