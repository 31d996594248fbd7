//! SQLite checkpoint store implementation.
//!
//! Implements `CheckpointStore` from `skillpath-core`. The full workflow
//! state is stored as a JSON blob; the key parts, current stage and attempt
//! count are duplicated into columns for listing and ad-hoc inspection.

use chrono::{DateTime, Utc};
use skillpath_core::repository::checkpoint::CheckpointStore;
use skillpath_types::curriculum::{CachedArtifact, ChallengeSpec, LessonContent};
use skillpath_types::error::RepositoryError;
use skillpath_types::session::SessionKey;
use skillpath_types::workflow::WorkflowState;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `CheckpointStore`.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    pool: DatabasePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct StateRow {
    session_key: String,
    state: String,
}

impl StateRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_key: row.try_get("session_key")?,
            state: row.try_get("state")?,
        })
    }

    fn into_state(self) -> Result<WorkflowState, RepositoryError> {
        serde_json::from_str(&self.state).map_err(|e| {
            RepositoryError::Corrupt(format!("workflow state {}: {e}", self.session_key))
        })
    }
}

struct ArtifactRow {
    lesson: String,
    challenge: String,
    created_at: String,
}

impl ArtifactRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            lesson: row.try_get("lesson")?,
            challenge: row.try_get("challenge")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_artifact(self) -> Result<CachedArtifact, RepositoryError> {
        let lesson: LessonContent = serde_json::from_str(&self.lesson)
            .map_err(|e| RepositoryError::Corrupt(format!("cached lesson: {e}")))?;
        let challenge: ChallengeSpec = serde_json::from_str(&self.challenge)
            .map_err(|e| RepositoryError::Corrupt(format!("cached challenge: {e}")))?;
        Ok(CachedArtifact {
            lesson,
            challenge,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Corrupt(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn state_json(state: &WorkflowState) -> Result<String, RepositoryError> {
    serde_json::to_string(state)
        .map_err(|e| RepositoryError::Query(format!("serialize workflow state: {e}")))
}

// ---------------------------------------------------------------------------
// CheckpointStore impl
// ---------------------------------------------------------------------------

impl CheckpointStore for SqliteCheckpointStore {
    async fn save_state(&self, state: &WorkflowState) -> Result<(), RepositoryError> {
        let json = state_json(state)?;

        sqlx::query(
            r#"INSERT INTO workflow_sessions
               (session_key, user_id, module_number, challenge_number, current_stage,
                attempt_count, terminal, state, started_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(session_key) DO UPDATE SET
                 current_stage = excluded.current_stage,
                 attempt_count = excluded.attempt_count,
                 terminal = excluded.terminal,
                 state = excluded.state,
                 updated_at = excluded.updated_at"#,
        )
        .bind(state.key.to_string())
        .bind(state.key.user_id)
        .bind(state.key.module_number as i64)
        .bind(state.key.challenge_number as i64)
        .bind(state.current_stage.as_str())
        .bind(state.attempt_count as i64)
        .bind(state.terminal)
        .bind(&json)
        .bind(format_datetime(&state.started_at))
        .bind(format_datetime(&state.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn create_state_if_absent(&self, state: &WorkflowState) -> Result<bool, RepositoryError> {
        let json = state_json(state)?;

        let result = sqlx::query(
            r#"INSERT INTO workflow_sessions
               (session_key, user_id, module_number, challenge_number, current_stage,
                attempt_count, terminal, state, started_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(session_key) DO NOTHING"#,
        )
        .bind(state.key.to_string())
        .bind(state.key.user_id)
        .bind(state.key.module_number as i64)
        .bind(state.key.challenge_number as i64)
        .bind(state.current_stage.as_str())
        .bind(state.attempt_count as i64)
        .bind(state.terminal)
        .bind(&json)
        .bind(format_datetime(&state.started_at))
        .bind(format_datetime(&state.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn load_state(&self, key: &SessionKey) -> Result<Option<WorkflowState>, RepositoryError> {
        let row = sqlx::query("SELECT session_key, state FROM workflow_sessions WHERE session_key = ?")
            .bind(key.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = StateRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_state()?))
            }
            None => Ok(None),
        }
    }

    async fn list_states(&self, user_id: i64) -> Result<Vec<WorkflowState>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT session_key, state FROM workflow_sessions WHERE user_id = ? ORDER BY module_number ASC, challenge_number ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut states = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = StateRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            states.push(r.into_state()?);
        }
        Ok(states)
    }

    async fn save_artifact(
        &self,
        key: &SessionKey,
        artifact: &CachedArtifact,
    ) -> Result<(), RepositoryError> {
        let lesson = serde_json::to_string(&artifact.lesson)
            .map_err(|e| RepositoryError::Query(format!("serialize lesson: {e}")))?;
        let challenge = serde_json::to_string(&artifact.challenge)
            .map_err(|e| RepositoryError::Query(format!("serialize challenge: {e}")))?;

        sqlx::query(
            r#"INSERT INTO challenge_artifacts (session_key, lesson, challenge, created_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(session_key) DO UPDATE SET
                 lesson = excluded.lesson,
                 challenge = excluded.challenge,
                 created_at = excluded.created_at"#,
        )
        .bind(key.to_string())
        .bind(&lesson)
        .bind(&challenge)
        .bind(format_datetime(&artifact.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn load_artifact(&self, key: &SessionKey) -> Result<Option<CachedArtifact>, RepositoryError> {
        let row = sqlx::query(
            "SELECT lesson, challenge, created_at FROM challenge_artifacts WHERE session_key = ?",
        )
        .bind(key.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = ArtifactRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_artifact()?))
            }
            None => Ok(None),
        }
    }
}
