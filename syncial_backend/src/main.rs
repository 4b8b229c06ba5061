use anyhow::Result;
use clap::{Parser, Subcommand};
use syncial_backend::cli;
use syncial_backend::config::SyncialConfig;
use syncial_backend::node::SyncialNode;
use syncial_backend::telemetry;
use syncial_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Syncial upload service and wallet CLI")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP upload service (Axum)
    Serve,
    /// Start the interactive CLI for posts, follows, usernames and polls
    Cli,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();

    let config = SyncialConfig::from_env()?;
    let node = SyncialNode::start(config).await?;
    tracing::info!(
        db_path = %node.config().paths.db_path.display(),
        "bootstrap complete"
    );

    match args.command.unwrap_or(Command::Cli) {
        Command::Serve => node.run_http_server().await,
        Command::Cli => cli::run_cli(&node).await,
    }
}
