//! Application state wiring the engine together.
//!
//! The curriculum service is generic over its storage ports; AppState pins it
//! to the SQLite stores and the HTTP stage backend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use skillpath_core::service::curriculum::CurriculumService;
use skillpath_core::stage::box_handler::BoxStageHandler;
use skillpath_core::stage::registry::StageRegistry;
use skillpath_core::workflow::batch::BatchController;
use skillpath_core::workflow::engine::ChallengeEngine;
use skillpath_core::workflow::retry::RetryController;
use skillpath_infra::config::{load_engine_config, resolve_data_dir};
use skillpath_infra::sqlite::checkpoint::SqliteCheckpointStore;
use skillpath_infra::sqlite::curriculum::SqliteCurriculumStore;
use skillpath_infra::sqlite::pool::DatabasePool;
use skillpath_infra::stages::http::HttpStageBackend;
use skillpath_types::config::EngineConfig;

/// Concrete service type pinned to infra implementations.
pub type ConcreteCurriculumService = CurriculumService<SqliteCheckpointStore, SqliteCurriculumStore>;

/// Shared application state used by every CLI command.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConcreteCurriculumService>,
    pub stages: Arc<StageRegistry>,
    pub config: EngineConfig,
    pub data_dir: PathBuf,
    /// Cancelled on Ctrl+C; stops pending retries and batch pacing.
    pub cancel: CancellationToken,
}

impl AppState {
    /// Initialize the application state: load config, open the DB, wire the engine.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_engine_config(&data_dir).await;

        let pool = DatabasePool::open_in(&data_dir)
            .await
            .context("failed to open the skillpath database")?;

        let backend = HttpStageBackend::from_settings(&config.stages)
            .context("failed to build the HTTP stage backend")?;
        tracing::debug!(endpoint = backend.endpoint(), "stage backend configured");
        let stages = Arc::new(StageRegistry::with_backend(BoxStageHandler::new(backend)));

        let retry = RetryController::new(config.retry.clone()).with_deadline(config.stages.timeout());
        let cancel = CancellationToken::new();

        let engine = ChallengeEngine::new(
            SqliteCheckpointStore::new(pool.clone()),
            stages.clone(),
            retry.clone(),
        )
        .with_cancellation(cancel.clone());

        let batch = BatchController::new(stages.clone(), retry, config.batch.clone())
            .with_cancellation(cancel.clone());

        let service = CurriculumService::new(
            Arc::new(engine),
            batch,
            SqliteCurriculumStore::new(pool),
        );

        Ok(Self {
            service: Arc::new(service),
            stages,
            config,
            data_dir,
            cancel,
        })
    }

    /// Cancel pending work on Ctrl+C.
    pub fn cancel_on_ctrl_c(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling pending stage calls");
                cancel.cancel();
            }
        });
    }
}
