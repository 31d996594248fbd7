//! Session listing.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use crate::state::AppState;

/// List every challenge session of a user in a table.
pub async fn list_sessions(state: &AppState, user_id: i64, json: bool) -> Result<()> {
    let sessions = state.service.sessions(user_id).await?;

    if json {
        return super::print_json(&sessions);
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions for user {user_id}. Start one with: {}",
            style("i").blue().bold(),
            style(format!("skillpath challenge show {user_id} 1 1")).yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Session").fg(Color::White),
        Cell::new("Stage").fg(Color::White),
        Cell::new("Attempts").fg(Color::White),
        Cell::new("Hint").fg(Color::White),
        Cell::new("Last Score").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for status in &sessions {
        table.add_row(vec![
            Cell::new(status.key).fg(Color::Cyan),
            super::stage_cell(status.current_stage),
            Cell::new(status.attempt_count),
            Cell::new(
                status
                    .hint_level
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(
                status
                    .last_score
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(status.updated_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
        ]);
    }

    let passed = sessions.iter().filter(|s| s.terminal).count();
    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}, {} passed",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" },
        style(passed).green()
    );
    println!();
    Ok(())
}
