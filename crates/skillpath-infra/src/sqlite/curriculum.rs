//! SQLite curriculum store implementation.
//!
//! Approved learning plans (one per user) and generated module roadmaps are
//! stored as JSON blobs.

use chrono::Utc;
use skillpath_core::repository::curriculum::CurriculumStore;
use skillpath_types::curriculum::{ChallengeRoadmap, LearningPlan};
use skillpath_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `CurriculumStore`.
#[derive(Clone)]
pub struct SqliteCurriculumStore {
    pool: DatabasePool,
}

impl SqliteCurriculumStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn decode_roadmap(row: &sqlx::sqlite::SqliteRow) -> Result<ChallengeRoadmap, RepositoryError> {
    let json: String = row
        .try_get("roadmap")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    serde_json::from_str(&json).map_err(|e| RepositoryError::Corrupt(format!("roadmap: {e}")))
}

impl CurriculumStore for SqliteCurriculumStore {
    async fn save_plan(&self, user_id: i64, plan: &LearningPlan) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(plan)
            .map_err(|e| RepositoryError::Query(format!("serialize plan: {e}")))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO learning_plans (user_id, plan, created_at, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(user_id) DO UPDATE SET
                 plan = excluded.plan,
                 updated_at = excluded.updated_at"#,
        )
        .bind(user_id)
        .bind(&json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn load_plan(&self, user_id: i64) -> Result<Option<LearningPlan>, RepositoryError> {
        let row = sqlx::query("SELECT plan FROM learning_plans WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let json: String = row
                    .try_get("plan")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                let plan = serde_json::from_str(&json)
                    .map_err(|e| RepositoryError::Corrupt(format!("learning plan: {e}")))?;
                Ok(Some(plan))
            }
            None => Ok(None),
        }
    }

    async fn save_roadmap(
        &self,
        user_id: i64,
        roadmap: &ChallengeRoadmap,
    ) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(roadmap)
            .map_err(|e| RepositoryError::Query(format!("serialize roadmap: {e}")))?;

        sqlx::query(
            r#"INSERT INTO module_roadmaps (user_id, module_number, roadmap, created_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(user_id, module_number) DO UPDATE SET
                 roadmap = excluded.roadmap,
                 created_at = excluded.created_at"#,
        )
        .bind(user_id)
        .bind(roadmap.module_number as i64)
        .bind(&json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn load_roadmap(
        &self,
        user_id: i64,
        module_number: u32,
    ) -> Result<Option<ChallengeRoadmap>, RepositoryError> {
        let row = sqlx::query(
            "SELECT roadmap FROM module_roadmaps WHERE user_id = ? AND module_number = ?",
        )
        .bind(user_id)
        .bind(module_number as i64)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(decode_roadmap).transpose()
    }

    async fn list_roadmaps(&self, user_id: i64) -> Result<Vec<ChallengeRoadmap>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT roadmap FROM module_roadmaps WHERE user_id = ? ORDER BY module_number ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(decode_roadmap).collect()
    }

    async fn delete_roadmaps(&self, user_id: i64) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM module_roadmaps WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{sample_plan, sample_roadmap};

    async fn test_store() -> (SqliteCurriculumStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open_in(dir.path()).await.unwrap();
        (SqliteCurriculumStore::new(pool), dir)
    }

    #[tokio::test]
    async fn test_plan_roundtrip_and_replace() {
        let (store, _dir) = test_store().await;
        assert!(store.load_plan(1).await.unwrap().is_none());

        let plan = sample_plan();
        store.save_plan(1, &plan).await.unwrap();
        assert_eq!(store.load_plan(1).await.unwrap(), Some(plan.clone()));

        let mut revised = plan;
        revised.learning_goal = "Ship a vector search service".to_string();
        store.save_plan(1, &revised).await.unwrap();
        assert_eq!(
            store.load_plan(1).await.unwrap().unwrap().learning_goal,
            "Ship a vector search service"
        );
    }

    #[tokio::test]
    async fn test_roadmaps_by_module() {
        let (store, _dir) = test_store().await;
        store.save_plan(4, &sample_plan()).await.unwrap();
        store.save_roadmap(4, &sample_roadmap(2)).await.unwrap();
        store.save_roadmap(4, &sample_roadmap(1)).await.unwrap();

        let loaded = store.load_roadmap(4, 2).await.unwrap().unwrap();
        assert_eq!(loaded.module_number, 2);
        assert!(store.load_roadmap(4, 3).await.unwrap().is_none());

        let numbers: Vec<u32> = store
            .list_roadmaps(4)
            .await
            .unwrap()
            .iter()
            .map(|r| r.module_number)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(store.list_roadmaps(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_roadmaps_scoped_to_user() {
        let (store, _dir) = test_store().await;
        for user in [1, 2] {
            store.save_plan(user, &sample_plan()).await.unwrap();
            store.save_roadmap(user, &sample_roadmap(1)).await.unwrap();
        }
        store.save_roadmap(1, &sample_roadmap(2)).await.unwrap();

        assert_eq!(store.delete_roadmaps(1).await.unwrap(), 2);
        assert!(store.list_roadmaps(1).await.unwrap().is_empty());
        assert_eq!(store.list_roadmaps(2).await.unwrap().len(), 1);
        assert_eq!(store.delete_roadmaps(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_roadmap_requires_plan() {
        let (store, _dir) = test_store().await;
        let result = store.save_roadmap(9, &sample_roadmap(1)).await;
        assert!(matches!(result, Err(RepositoryError::Query(_))));
    }
}
