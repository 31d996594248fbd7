//! Skillpath CLI entry point.
//!
//! Binary name: `skillpath`
//!
//! Parses CLI arguments, initializes tracing, the database and the engine,
//! then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use console::style;

use skillpath_core::service::curriculum::ServiceError;
use skillpath_observe::tracing_setup::{TracingOptions, default_filter_for, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.quiet && cli.verbose == 0 {
        "error"
    } else {
        default_filter_for(cli.verbose)
    };
    init_tracing(&TracingOptions {
        json: cli.log_json,
        otel: cli.otel,
        default_filter: default_filter.to_string(),
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "skillpath", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    shutdown_tracing();

    if let Err(err) = &result {
        if let Some(service_err) = err.downcast_ref::<ServiceError>() {
            if service_err.is_retryable_later() {
                eprintln!();
                eprintln!(
                    "  {} Progress is saved. Try again shortly.",
                    style("!").yellow().bold()
                );
                eprintln!();
            }
        }
    }
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;
    state.cancel_on_ctrl_c();

    match cli.command {
        Commands::Plan { action } => {
            cli::plan::handle(&state, action, cli.json, cli.quiet).await?;
        }
        Commands::Challenge { action } => {
            cli::challenge::handle(&state, action, cli.json, cli.quiet).await?;
        }
        Commands::Sessions { user_id } => {
            cli::sessions::list_sessions(&state, user_id, cli.json).await?;
        }
        Commands::Stages { action } => {
            cli::stages::handle(&state, action, cli.json)?;
        }
        Commands::Completions { .. } => unreachable!("handled in main"),
    }

    Ok(())
}
