//! Challenge session commands: show, submit, status, advance.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use skillpath_types::curriculum::{ChallengeFormat, Submission};
use skillpath_types::workflow::{SubmissionResult, WorkflowStatus};

use super::SessionArgs;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum ChallengeCommand {
    /// Show the lesson and challenge, preparing them on first use.
    Show {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Submit a solution for evaluation.
    Submit {
        #[command(flatten)]
        session: SessionArgs,

        /// Read the solution from a file.
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Pass the solution inline (reads stdin when neither is given).
        #[arg(short, long)]
        text: Option<String>,
    },

    /// Show where a session stands.
    Status {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Continue a session interrupted by a crash or an exhausted stage.
    Advance {
        #[command(flatten)]
        session: SessionArgs,
    },
}

pub async fn handle(
    state: &AppState,
    action: ChallengeCommand,
    json: bool,
    quiet: bool,
) -> Result<()> {
    match action {
        ChallengeCommand::Show { session } => show(state, session, json, quiet).await,
        ChallengeCommand::Submit {
            session,
            file,
            text,
        } => {
            let submission = read_submission(file, text).await?;
            submit(state, session, submission, json, quiet).await
        }
        ChallengeCommand::Status { session } => {
            let status = state.service.status(session.key()).await?;
            print_status(&status, json)
        }
        ChallengeCommand::Advance { session } => {
            let spinner = spinner(json || quiet, "Continuing session...");
            let status = state.service.advance(session.key()).await;
            spinner.finish_and_clear();
            print_status(&status?, json)
        }
    }
}

fn spinner(hidden: bool, message: &'static str) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

async fn read_submission(file: Option<PathBuf>, text: Option<String>) -> Result<Submission> {
    let content = match (file, text) {
        (Some(path), _) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, Some(text)) => text,
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read the solution from stdin")?;
            buf
        }
    };
    if content.trim().is_empty() {
        bail!("the solution is empty");
    }
    Ok(Submission::new(content))
}

async fn show(state: &AppState, session: SessionArgs, json: bool, quiet: bool) -> Result<()> {
    let spinner = spinner(json || quiet, "Preparing lesson and challenge...");
    let prepared = state.service.challenge(session.key()).await;
    spinner.finish_and_clear();
    let prepared = prepared?;

    if json {
        return super::print_json(&prepared);
    }

    println!();
    println!("{}", prepared.lesson.markdown.trim_end());
    println!();
    println!("  {}", style("─".repeat(60)).dim());
    println!();

    let format = match prepared.challenge.format {
        ChallengeFormat::Code => "code",
        ChallengeFormat::Conceptual => "conceptual",
    };
    println!(
        "  {} {}",
        style("Challenge").bold().cyan(),
        style(format!("({format})")).dim()
    );
    println!();
    println!("{}", prepared.challenge.prompt.trim_end());
    if let Some(starter) = &prepared.challenge.starter_code {
        println!();
        println!("{}", style("Starter code:").bold());
        println!("{}", style(starter.trim_end()).yellow());
    }
    if !prepared.challenge.success_criteria.is_empty() {
        println!();
        println!("{}", style("You pass when:").bold());
        for criterion in &prepared.challenge.success_criteria {
            println!("  {} {criterion}", style("•").dim());
        }
    }
    println!();
    println!(
        "  {} {}",
        style("Submit with:").dim(),
        style(format!(
            "skillpath challenge submit {} {} {} --file <solution>",
            session.user_id, session.module, session.challenge
        ))
        .yellow()
    );
    println!();
    Ok(())
}

async fn submit(
    state: &AppState,
    session: SessionArgs,
    submission: Submission,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let spinner = spinner(json || quiet, "Evaluating your solution...");
    let result = state.service.submit(session.key(), submission).await;
    spinner.finish_and_clear();
    let result = result?;

    if json {
        return super::print_json(&result);
    }
    if quiet {
        return Ok(());
    }
    print_result(&result);
    Ok(())
}

fn print_result(result: &SubmissionResult) {
    let outcome = &result.outcome;
    println!();
    if result.is_complete() {
        println!(
            "  {} Passed with score {} on attempt {}",
            style("✓").green().bold(),
            style(outcome.score).bold(),
            result.attempt_count
        );
    } else {
        println!(
            "  {} Not yet: score {} on attempt {}",
            style("✗").red().bold(),
            style(outcome.score).bold(),
            result.attempt_count
        );
    }

    if !outcome.feedback.is_empty() {
        println!();
        println!("  {}", outcome.feedback);
    }
    for worked in &outcome.what_worked {
        println!("  {} {worked}", style("+").green());
    }
    for error in &outcome.errors {
        println!("  {} {error}", style("-").red());
    }
    for item in &outcome.what_needs_work {
        println!("  {} {item}", style("~").yellow());
    }

    if let Some(hint) = &result.hint {
        println!();
        println!(
            "  {} {}",
            style(format!("Hint {}", hint.hint_level)).bold().yellow(),
            hint.targeted_hint
        );
        if let Some(reminder) = &hint.key_concept_reminder {
            println!("  {} {reminder}", style("Remember:").dim());
        }
        if !hint.encouragement.is_empty() {
            println!("  {}", style(&hint.encouragement).italic());
        }
    }
    println!();
}

fn print_status(status: &WorkflowStatus, json: bool) -> Result<()> {
    if json {
        return super::print_json(status);
    }

    println!();
    println!("  {}  {}", style("Session:").bold(), style(status.key).cyan());
    println!("  {}  {}", style("Stage:").bold(), status.current_stage);
    println!("  {}  {}", style("Attempts:").bold(), status.attempt_count);
    if let Some(level) = status.hint_level {
        println!("  {}  {}", style("Hint level:").bold(), level);
    }
    if let Some(score) = status.last_score {
        println!("  {}  {}", style("Last score:").bold(), score);
    }
    println!(
        "  {}  {}",
        style("Updated:").bold(),
        style(status.updated_at.format("%Y-%m-%d %H:%M:%S UTC")).dim()
    );
    if let Some(completed) = status.completed_at {
        println!(
            "  {}  {}",
            style("Completed:").bold(),
            style(completed.format("%Y-%m-%d %H:%M:%S UTC")).green()
        );
    }
    println!();
    Ok(())
}
