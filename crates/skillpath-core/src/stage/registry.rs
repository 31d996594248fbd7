//! Stage registry for runtime handler lookup.
//!
//! Maps each [`StageId`] to the handler that serves it, checks every output
//! against its contract, and exposes one typed method per capability so the
//! state machine never matches on raw stage outputs.

use std::collections::HashMap;

use skillpath_types::curriculum::{
    ChallengeRoadmap, ChallengeSpec, EvaluationOutcome, HintLevel, LearningPlan, LessonContent,
    ModuleDescriptor, RemediationHint, ResourceContext, SeedContext, Submission,
};
use skillpath_types::stage::{
    ChallengeRequest, EvaluationRequest, LessonRequest, RemediationRequest, ResourceRequest,
    RoadmapRequest, StageId, StageInput, StageOutput,
};

use super::StageError;
use super::box_handler::BoxStageHandler;
use super::contract;

/// Registry of stage handlers, indexed by stage.
#[derive(Debug, Default)]
pub struct StageRegistry {
    handlers: HashMap<StageId, BoxStageHandler>,
}

impl StageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry where a single backend serves every stage.
    pub fn with_backend(handler: BoxStageHandler) -> Self {
        let mut registry = Self::new();
        for stage in StageId::ALL {
            registry.register(stage, handler.clone());
        }
        registry
    }

    /// Register a handler for `stage`, replacing any previous one.
    pub fn register(&mut self, stage: StageId, handler: BoxStageHandler) {
        self.handlers.insert(stage, handler);
    }

    pub fn get(&self, stage: StageId) -> Option<&BoxStageHandler> {
        self.handlers.get(&stage)
    }

    /// Stages that currently have a handler, in pipeline order.
    pub fn registered(&self) -> Vec<StageId> {
        StageId::ALL
            .into_iter()
            .filter(|s| self.handlers.contains_key(s))
            .collect()
    }

    /// Invoke the handler for `input`'s stage and check the output contract.
    pub async fn invoke(&self, input: StageInput) -> Result<StageOutput, StageError> {
        let stage = input.stage();
        let handler = self.get(stage).ok_or(StageError::NotRegistered(stage))?;

        tracing::debug!(stage = %stage, handler = handler.name(), "invoking stage");

        let request = input.clone();
        let output = handler.invoke(input).await?;
        contract::validate(&request, &output).map_err(StageError::Contract)?;
        Ok(output)
    }

    // -----------------------------------------------------------------------
    // Typed capabilities
    // -----------------------------------------------------------------------

    pub async fn produce_resource_context(
        &self,
        seed: &SeedContext,
    ) -> Result<ResourceContext, StageError> {
        let input = StageInput::ResourceLookup(ResourceRequest { seed: seed.clone() });
        match self.invoke(input).await? {
            StageOutput::ResourceLookup(resources) => Ok(resources),
            other => Err(unexpected(StageId::ResourceLookup, &other)),
        }
    }

    pub async fn author_lesson(
        &self,
        seed: &SeedContext,
        resources: &ResourceContext,
    ) -> Result<LessonContent, StageError> {
        let input = StageInput::LessonAuthoring(LessonRequest {
            seed: seed.clone(),
            resources: resources.clone(),
        });
        match self.invoke(input).await? {
            StageOutput::LessonAuthoring(lesson) => Ok(lesson),
            other => Err(unexpected(StageId::LessonAuthoring, &other)),
        }
    }

    pub async fn author_challenge(
        &self,
        seed: &SeedContext,
        lesson: &LessonContent,
    ) -> Result<ChallengeSpec, StageError> {
        let input = StageInput::ChallengeAuthoring(ChallengeRequest {
            seed: seed.clone(),
            lesson: lesson.clone(),
        });
        match self.invoke(input).await? {
            StageOutput::ChallengeAuthoring(challenge) => Ok(challenge),
            other => Err(unexpected(StageId::ChallengeAuthoring, &other)),
        }
    }

    pub async fn evaluate_submission(
        &self,
        seed: &SeedContext,
        challenge: &ChallengeSpec,
        submission: &Submission,
    ) -> Result<EvaluationOutcome, StageError> {
        let input = StageInput::Evaluation(EvaluationRequest {
            seed: seed.clone(),
            challenge: challenge.clone(),
            submission: submission.clone(),
        });
        match self.invoke(input).await? {
            StageOutput::Evaluation(outcome) => Ok(outcome),
            other => Err(unexpected(StageId::Evaluation, &other)),
        }
    }

    pub async fn produce_remediation(
        &self,
        seed: &SeedContext,
        challenge: &ChallengeSpec,
        submission: &Submission,
        outcome: &EvaluationOutcome,
        hint_level: HintLevel,
    ) -> Result<RemediationHint, StageError> {
        let input = StageInput::Remediation(RemediationRequest {
            seed: seed.clone(),
            challenge: challenge.clone(),
            submission: submission.clone(),
            outcome: outcome.clone(),
            hint_level,
        });
        match self.invoke(input).await? {
            StageOutput::Remediation(hint) => Ok(hint),
            other => Err(unexpected(StageId::Remediation, &other)),
        }
    }

    pub async fn produce_module_roadmap(
        &self,
        plan: &LearningPlan,
        module: &ModuleDescriptor,
    ) -> Result<ChallengeRoadmap, StageError> {
        let input = StageInput::RoadmapPlanning(RoadmapRequest {
            learning_goal: plan.learning_goal.clone(),
            experience_level: plan.experience_level,
            goal_type: plan.goal_type,
            module: module.clone(),
        });
        match self.invoke(input).await? {
            StageOutput::RoadmapPlanning(roadmap) => Ok(roadmap),
            other => Err(unexpected(StageId::RoadmapPlanning, &other)),
        }
    }
}

fn unexpected(expected: StageId, got: &StageOutput) -> StageError {
    StageError::Contract(format!(
        "expected {expected} output, got {}",
        got.stage()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedStages, sample_seed};

    #[tokio::test]
    async fn test_unregistered_stage_is_fatal() {
        let registry = StageRegistry::new();
        let err = registry
            .produce_resource_context(&sample_seed())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::NotRegistered(StageId::ResourceLookup)));
    }

    #[tokio::test]
    async fn test_with_backend_registers_every_stage() {
        let stages = ScriptedStages::new();
        let registry = stages.registry();
        assert_eq!(registry.registered(), StageId::ALL.to_vec());
        assert_eq!(registry.get(StageId::Evaluation).unwrap().name(), "scripted");
    }

    #[tokio::test]
    async fn test_wrong_stage_output_is_contract_error() {
        let stages = ScriptedStages::new();
        stages.push_output(
            StageId::LessonAuthoring,
            StageOutput::ResourceLookup(ResourceContext {
                summary: "not a lesson".to_string(),
                references: vec![],
            }),
        );
        let registry = stages.registry();
        let resources = ResourceContext {
            summary: "docs".to_string(),
            references: vec![],
        };
        let err = registry
            .author_lesson(&sample_seed(), &resources)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Contract(_)));
        assert_eq!(stages.calls(StageId::LessonAuthoring), 1);
    }

    #[tokio::test]
    async fn test_remediation_echoes_requested_level() {
        let stages = ScriptedStages::new();
        let registry = stages.registry();
        let hint = registry
            .produce_remediation(
                &sample_seed(),
                &crate::test_support::sample_challenge(),
                &Submission::new("return 0"),
                &crate::test_support::sample_outcome(false, 10),
                HintLevel::for_attempts(2),
            )
            .await
            .unwrap();
        assert_eq!(hint.hint_level.get(), 2);

        let Some(StageInput::Remediation(request)) = stages.last_input(StageId::Remediation) else {
            panic!("remediation request not recorded");
        };
        assert_eq!(request.submission, Submission::new("return 0"));
    }
}
