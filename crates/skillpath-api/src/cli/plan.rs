//! Learning plan commands: approve a plan and show generated roadmaps.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use skillpath_core::workflow::batch::BatchEvent;
use skillpath_types::curriculum::LearningPlan;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum PlanCommand {
    /// Approve a learning plan and generate a challenge roadmap per module.
    Approve {
        /// User ID the plan belongs to.
        user_id: i64,
        /// Plan file (JSON, or YAML with a .yaml/.yml extension).
        file: PathBuf,
    },

    /// Show the approved plan and its roadmaps.
    Show {
        /// User ID.
        user_id: i64,
    },
}

pub async fn handle(state: &AppState, action: PlanCommand, json: bool, quiet: bool) -> Result<()> {
    match action {
        PlanCommand::Approve { user_id, file } => approve(state, user_id, &file, json, quiet).await,
        PlanCommand::Show { user_id } => show(state, user_id, json).await,
    }
}

/// Parse a plan file by extension.
pub fn load_plan_file(path: &Path, content: &str) -> Result<LearningPlan> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let plan = if is_yaml {
        serde_yaml_ng::from_str(content)
            .with_context(|| format!("invalid YAML plan in {}", path.display()))?
    } else {
        serde_json::from_str(content)
            .with_context(|| format!("invalid JSON plan in {}", path.display()))?
    };
    Ok(plan)
}

async fn approve(state: &AppState, user_id: i64, file: &Path, json: bool, quiet: bool) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let plan = load_plan_file(file, &content)?;

    let progress = if json || quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(plan.modules.len() as u64)
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress.enable_steady_tick(std::time::Duration::from_millis(120));

    let summary = state
        .service
        .generate_all_roadmaps_with(user_id, &plan, |event| match event {
            BatchEvent::ModuleStarted { module_number, .. } => {
                progress.set_message(format!("module {module_number}"));
            }
            BatchEvent::ModuleCompleted { .. } => progress.inc(1),
            BatchEvent::ModuleFailed {
                module_number,
                error,
            } => {
                progress.println(format!(
                    "  {} module {module_number}: {error}",
                    style("✗").red()
                ));
                progress.inc(1);
            }
        })
        .await?;
    progress.finish_and_clear();

    if json {
        return super::print_json(&summary);
    }
    if quiet {
        return Ok(());
    }

    println!();
    println!(
        "  {} Generated {} challenges across {} modules",
        style("✓").green().bold(),
        style(summary.total_challenges).bold(),
        summary.total_modules - summary.failed_modules.len()
    );
    if !summary.is_complete() {
        let failed: Vec<String> = summary.failed_modules.iter().map(u32::to_string).collect();
        println!(
            "  {} Failed modules: {} (approve the plan again to retry)",
            style("!").yellow().bold(),
            failed.join(", ")
        );
    }
    println!();
    Ok(())
}

async fn show(state: &AppState, user_id: i64, json: bool) -> Result<()> {
    let plan = state.service.plan(user_id).await?;
    let roadmaps = state.service.roadmaps(user_id).await?;

    if json {
        return super::print_json(&serde_json::json!({
            "plan": plan,
            "roadmaps": roadmaps,
        }));
    }

    println!();
    println!("  {}  {}", style("Goal:").bold(), style(&plan.learning_goal).cyan());
    println!(
        "  {}  {} / {:?}",
        style("Level:").bold(),
        plan.experience_level,
        plan.goal_type
    );
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Module").fg(Color::White),
        Cell::new("#").fg(Color::White),
        Cell::new("Challenge").fg(Color::White),
        Cell::new("Objective").fg(Color::White),
    ]);

    for module in &plan.modules {
        match roadmaps.iter().find(|r| r.module_number == module.module_number) {
            Some(roadmap) => {
                for brief in &roadmap.challenges {
                    table.add_row(vec![
                        Cell::new(format!("{}. {}", module.module_number, module.title)).fg(Color::Cyan),
                        Cell::new(brief.challenge_number),
                        Cell::new(&brief.title),
                        Cell::new(&brief.learning_objective).fg(Color::DarkGrey),
                    ]);
                }
            }
            None => {
                table.add_row(vec![
                    Cell::new(format!("{}. {}", module.module_number, module.title)).fg(Color::Cyan),
                    Cell::new("-"),
                    Cell::new("no roadmap yet").fg(Color::Yellow),
                    Cell::new(""),
                ]);
            }
        }
    }

    println!("{table}");
    println!();
    Ok(())
}
