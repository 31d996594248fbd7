//! Output contract checks.
//!
//! Stages are opaque, so the registry checks what comes back before the state
//! machine records it. A violation is a `Fatal` stage error: retrying the same
//! input against the same backend is not expected to fix it.

use skillpath_types::stage::{StageInput, StageOutput};

/// Check that `output` answers `input`.
pub fn validate(input: &StageInput, output: &StageOutput) -> Result<(), String> {
    if input.stage() != output.stage() {
        return Err(format!(
            "asked {} but received output for {}",
            input.stage(),
            output.stage()
        ));
    }

    match (input, output) {
        (_, StageOutput::ResourceLookup(resources)) => {
            non_blank(&resources.summary, "resource summary")
        }
        (_, StageOutput::LessonAuthoring(lesson)) => non_blank(&lesson.markdown, "lesson markdown"),
        (_, StageOutput::ChallengeAuthoring(challenge)) => {
            non_blank(&challenge.prompt, "challenge prompt")
        }
        (_, StageOutput::Evaluation(outcome)) => {
            if outcome.score > 100 {
                Err(format!("score {} is outside 0..=100", outcome.score))
            } else {
                Ok(())
            }
        }
        (StageInput::Remediation(request), StageOutput::Remediation(hint)) => {
            if hint.hint_level != request.hint_level {
                return Err(format!(
                    "requested hint level {} but received {}",
                    request.hint_level.get(),
                    hint.hint_level.get()
                ));
            }
            non_blank(&hint.targeted_hint, "targeted hint")
        }
        (StageInput::RoadmapPlanning(request), StageOutput::RoadmapPlanning(roadmap)) => {
            if roadmap.module_number != request.module.module_number {
                return Err(format!(
                    "roadmap is for module {} but module {} was requested",
                    roadmap.module_number, request.module.module_number
                ));
            }
            if roadmap.challenges.is_empty() {
                return Err("roadmap has no challenges".to_string());
            }
            Ok(())
        }
        // Stage tags already matched above.
        _ => Ok(()),
    }
}

fn non_blank(value: &str, what: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{what} is empty"))
    } else {
        Ok(())
    }
}
