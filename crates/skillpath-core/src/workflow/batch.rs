//! Batch path-generation controller.
//!
//! Produces a challenge roadmap for every module of a learning plan, one
//! module at a time. Generation stages share one external rate budget, so
//! modules are paced with fixed delays instead of fanned out. A module whose
//! generation gives up is recorded as failed and the batch moves on.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use skillpath_types::config::BatchPacing;
use skillpath_types::curriculum::{ChallengeRoadmap, LearningPlan};
use skillpath_types::stage::StageId;
use tokio_util::sync::CancellationToken;

use super::retry::{RetryController, RetryError};
use crate::stage::registry::StageRegistry;

/// Progress notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    ModuleStarted {
        module_number: u32,
        index: usize,
        total: usize,
    },
    ModuleCompleted {
        module_number: u32,
        challenges: usize,
    },
    ModuleFailed {
        module_number: u32,
        error: String,
    },
}

/// Result of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_modules: usize,
    pub total_challenges: usize,
    pub failed_modules: Vec<u32>,
    /// Roadmaps of the modules that succeeded, in plan order.
    pub roadmaps: Vec<ChallengeRoadmap>,
}

impl BatchSummary {
    pub fn is_complete(&self) -> bool {
        self.failed_modules.is_empty()
    }
}

pub struct BatchController {
    stages: Arc<StageRegistry>,
    retry: RetryController,
    pacing: BatchPacing,
    cancel: CancellationToken,
}

impl BatchController {
    pub fn new(stages: Arc<StageRegistry>, retry: RetryController, pacing: BatchPacing) -> Self {
        Self {
            stages,
            retry,
            pacing,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Generate roadmaps for every module of `plan`, in order.
    pub async fn generate_all(&self, plan: &LearningPlan) -> Result<BatchSummary, BatchError> {
        self.generate_all_with(plan, |_| {}).await
    }

    /// Like [`generate_all`](Self::generate_all), reporting progress to `on_event`.
    pub async fn generate_all_with(
        &self,
        plan: &LearningPlan,
        mut on_event: impl FnMut(&BatchEvent),
    ) -> Result<BatchSummary, BatchError> {
        let mut seen = HashSet::new();
        if let Some(dup) = plan
            .modules
            .iter()
            .find(|m| !seen.insert(m.module_number))
        {
            return Err(BatchError::DuplicateModule(dup.module_number));
        }

        let total = plan.modules.len();
        let mut summary = BatchSummary {
            total_modules: total,
            ..BatchSummary::default()
        };
        tracing::info!(modules = total, goal = %plan.learning_goal, "generating module roadmaps");

        for (index, module) in plan.modules.iter().enumerate() {
            self.pause(self.pacing.initial_delay(), &summary).await?;

            on_event(&BatchEvent::ModuleStarted {
                module_number: module.module_number,
                index,
                total,
            });

            let result = self
                .retry
                .invoke(StageId::RoadmapPlanning, &self.cancel, || {
                    self.stages.produce_module_roadmap(plan, module)
                })
                .await;

            match result {
                Ok(roadmap) => {
                    let challenges = roadmap.total_challenges();
                    tracing::info!(
                        module = module.module_number,
                        challenges,
                        "module roadmap generated"
                    );
                    summary.total_challenges += challenges;
                    summary.roadmaps.push(roadmap);
                    on_event(&BatchEvent::ModuleCompleted {
                        module_number: module.module_number,
                        challenges,
                    });
                }
                Err(RetryError::Cancelled { .. }) => {
                    return Err(BatchError::Cancelled {
                        completed: summary.roadmaps.len(),
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        module = module.module_number,
                        error = %err,
                        "module roadmap generation failed"
                    );
                    summary.failed_modules.push(module.module_number);
                    on_event(&BatchEvent::ModuleFailed {
                        module_number: module.module_number,
                        error: err.to_string(),
                    });
                }
            }

            if index + 1 < total {
                self.pause(self.pacing.inter_module_delay(), &summary).await?;
            }
        }

        tracing::info!(
            total_modules = summary.total_modules,
            total_challenges = summary.total_challenges,
            failed = summary.failed_modules.len(),
            "roadmap generation finished"
        );
        Ok(summary)
    }

    async fn pause(&self, delay: Duration, summary: &BatchSummary) -> Result<(), BatchError> {
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(BatchError::Cancelled {
                completed: summary.roadmaps.len(),
            }),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// Errors that stop a batch as a whole. Per-module failures are not errors.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("module {0} appears more than once in the plan")]
    DuplicateModule(u32),

    #[error("batch cancelled after {completed} modules")]
    Cancelled { completed: usize },
}
