//! Stage contract inspection.

use anyhow::{Result, anyhow};
use clap::{Subcommand, ValueEnum};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};

use skillpath_types::stage::StageId;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum StagesCommand {
    /// List stages and the backend serving each.
    List,

    /// Print the JSON Schema of a stage's request and/or output record.
    Schema {
        /// Stage identifier (e.g. `evaluation`, `roadmap_planning`).
        stage: String,

        /// Which side of the contract to print.
        #[arg(long, value_enum, default_value_t = SchemaSide::Both)]
        side: SchemaSide,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemaSide {
    Input,
    Output,
    Both,
}

pub fn handle(state: &AppState, action: StagesCommand, json: bool) -> Result<()> {
    match action {
        StagesCommand::List => list(state, json),
        StagesCommand::Schema { stage, side } => {
            let schema = schema(&stage, side)?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

/// Contract schema(s) of `stage` for the requested side.
pub fn schema(stage: &str, side: SchemaSide) -> Result<serde_json::Value> {
    let stage: StageId = stage.parse().map_err(|e| anyhow!("{e}"))?;
    Ok(match side {
        SchemaSide::Input => stage.input_schema(),
        SchemaSide::Output => stage.output_schema(),
        SchemaSide::Both => serde_json::json!({
            "stage": stage.as_str(),
            "input": stage.input_schema(),
            "output": stage.output_schema(),
        }),
    })
}

fn list(state: &AppState, json: bool) -> Result<()> {
    let rows: Vec<(StageId, Option<String>)> = StageId::ALL
        .iter()
        .map(|id| (*id, state.stages.get(*id).map(|h| h.name().to_string())))
        .collect();

    if json {
        let value: Vec<_> = rows
            .iter()
            .map(|(id, handler)| {
                serde_json::json!({
                    "stage": id.as_str(),
                    "handler": handler,
                })
            })
            .collect();
        return super::print_json(&serde_json::json!({
            "endpoint": state.config.stages.endpoint,
            "stages": value,
        }));
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Stage").fg(Color::White),
        Cell::new("Handler").fg(Color::White),
        Cell::new("Route").fg(Color::White),
    ]);
    for (id, handler) in &rows {
        let handler_cell = match handler {
            Some(name) => Cell::new(name).fg(Color::Green),
            None => Cell::new("unregistered").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(id.as_str()).fg(Color::Cyan),
            handler_cell,
            Cell::new(format!(
                "{}/stages/{}",
                state.config.stages.endpoint.trim_end_matches('/'),
                id.as_str()
            ))
            .fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_for_known_stage_has_both_sides() {
        let value = schema("evaluation", SchemaSide::Both).unwrap();
        assert_eq!(value["stage"], "evaluation");
        assert!(value["input"].is_object());
        assert!(value["output"].is_object());
    }

    #[test]
    fn schema_for_unknown_stage_fails() {
        assert!(schema("grading", SchemaSide::Input).is_err());
    }
}
