//! CLI command definitions and dispatch for the `skillpath` binary.
//!
//! Uses clap derive macros for argument parsing. Commands are grouped by
//! noun (e.g., `skillpath plan approve`, `skillpath challenge submit`).

pub mod challenge;
pub mod plan;
pub mod sessions;
pub mod stages;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use comfy_table::{Cell, Color};
use console::style;

use skillpath_types::session::SessionKey;
use skillpath_types::workflow::WorkflowStage;

/// Personalized learning paths with resumable challenge sessions.
#[derive(Parser)]
#[command(name = "skillpath", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Approve learning plans and inspect generated roadmaps.
    Plan {
        #[command(subcommand)]
        action: plan::PlanCommand,
    },

    /// Work on a challenge (show, submit, status, advance).
    Challenge {
        #[command(subcommand)]
        action: challenge::ChallengeCommand,
    },

    /// List a user's challenge sessions.
    #[command(alias = "ls")]
    Sessions {
        /// User ID.
        user_id: i64,
    },

    /// Inspect stage contracts.
    Stages {
        #[command(subcommand)]
        action: stages::StagesCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Identifies one challenge session.
#[derive(Args, Debug, Clone, Copy)]
pub struct SessionArgs {
    /// User ID.
    pub user_id: i64,
    /// Module number within the user's plan.
    pub module: u32,
    /// Challenge number within the module roadmap.
    pub challenge: u32,
}

impl SessionArgs {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.user_id, self.module, self.challenge)
    }
}

// ---------------------------------------------------------------------------
// Shared output helpers
// ---------------------------------------------------------------------------

/// Table cell for a workflow stage, colored by where the session stands.
pub(crate) fn stage_cell(stage: WorkflowStage) -> Cell {
    let color = match stage {
        WorkflowStage::Passed => Color::Green,
        WorkflowStage::AwaitingSubmission => Color::Cyan,
        WorkflowStage::Remediating | WorkflowStage::Evaluating => Color::Yellow,
        _ => Color::DarkGrey,
    };
    Cell::new(stage.as_str()).fg(color)
}

pub(crate) fn print_success(quiet: bool, message: &str) {
    if quiet {
        return;
    }
    println!();
    println!("  {} {message}", style("✓").green().bold());
    println!();
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
