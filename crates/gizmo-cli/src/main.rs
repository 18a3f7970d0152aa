mod prompt;
mod session;

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;

use crate::prompt::cliclack::CliclackPrompt;
use crate::session::Session;
use gizmo::orchestrator::{Orchestrator, DEFAULT_MAX_ROUNDS};
use gizmo::providers::configs::OpenAiProviderConfig;
use gizmo::providers::openai::OpenAiProvider;
use gizmo::tools::Toolbox;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// OpenAI API Key (can also be set via OPENAI_API_KEY environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// Model to use
    #[arg(short, long, default_value = "gpt-4o")]
    model: String,

    /// Maximum model round trips for a single message
    #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
    max_rounds: usize,

    /// Process a single message and exit instead of starting a session
    #[arg(long)]
    message: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let api_key = cli
        .api_key
        .clone()
        .or_else(|| env::var("OPENAI_API_KEY").ok())
        .context("API key must be provided via --api-key or OPENAI_API_KEY environment variable")?;

    let provider = OpenAiProvider::new(OpenAiProviderConfig::new(api_key, &cli.model))?;
    let toolbox = Toolbox::from_env()?;
    let orchestrator =
        Orchestrator::new(Arc::new(provider), Arc::new(toolbox)).with_max_rounds(cli.max_rounds);

    let mut session = Session::new(orchestrator, Box::new(CliclackPrompt::new()));
    match cli.message {
        Some(message) => session.headless_start(message).await,
        None => session.start().await,
    }
}
