//! The standard analytical pipeline.
//!
//! ```text
//! intake -> parameter_estimation -> [impact_calculation | circularity_calculation]
//!        -> scenario_generation -> visualization -> narrative_explanation
//!        -> compliance_check -> quality_critique
//! ```
//!
//! Only `intake` is required. Quality critique sees the whole run history.

use super::{PipelineBuilder, PipelineDefinition, StageSpec};
use crate::context::InputScope;
use crate::errors::PipelineValidationError;
use crate::retry::RetryConfig;
use crate::stages::StageRunner;

/// Name of the standard pipeline.
pub const STANDARD_PIPELINE_NAME: &str = "circularity_assessment";

/// Stage and group ids of the standard pipeline.
pub mod stage_ids {
    /// Input validation and normalisation.
    pub const INTAKE: &str = "intake";
    /// Estimation of missing parameters.
    pub const PARAMETER_ESTIMATION: &str = "parameter_estimation";
    /// Fan-out group of the two calculators.
    pub const IMPACT_CIRCULARITY: &str = "impact_circularity";
    /// Environmental impact calculation.
    pub const IMPACT_CALCULATION: &str = "impact_calculation";
    /// Circularity indicator calculation.
    pub const CIRCULARITY_CALCULATION: &str = "circularity_calculation";
    /// Alternative scenario generation.
    pub const SCENARIO_GENERATION: &str = "scenario_generation";
    /// Chart data preparation.
    pub const VISUALIZATION: &str = "visualization";
    /// Natural-language explanation.
    pub const NARRATIVE_EXPLANATION: &str = "narrative_explanation";
    /// Regulatory compliance check.
    pub const COMPLIANCE_CHECK: &str = "compliance_check";
    /// Review of the whole run.
    pub const QUALITY_CRITIQUE: &str = "quality_critique";
}

/// Implementations for every stage of the standard pipeline.
#[derive(Debug, Clone)]
pub struct StandardStages {
    /// Required input validation.
    pub intake: StageRunner,
    /// Parameter estimation.
    pub parameter_estimation: StageRunner,
    /// Impact calculator.
    pub impact_calculation: StageRunner,
    /// Circularity calculator.
    pub circularity_calculation: StageRunner,
    /// Scenario generator.
    pub scenario_generation: StageRunner,
    /// Visualization data builder.
    pub visualization: StageRunner,
    /// Narrative writer.
    pub narrative_explanation: StageRunner,
    /// Compliance checker.
    pub compliance_check: StageRunner,
    /// Critic over the whole history.
    pub quality_critique: StageRunner,
}

/// Declares the standard pipeline over `stages`.
///
/// Every stage gets `retry`, since each of them may call a rate-limited
/// collaborator. Pass `None` for single-attempt stages.
pub fn standard_pipeline(
    stages: StandardStages,
    retry: Option<RetryConfig>,
) -> Result<PipelineDefinition, PipelineValidationError> {
    let spec = |id: &str, runner: StageRunner, checkpoint: u8| {
        let spec = StageSpec::new(id, runner).with_checkpoint(checkpoint);
        match &retry {
            Some(config) => spec.with_retry(config.clone()),
            None => spec,
        }
    };

    PipelineBuilder::new(STANDARD_PIPELINE_NAME)
        .stage(spec(stage_ids::INTAKE, stages.intake, 10).required())
        .stage(spec(stage_ids::PARAMETER_ESTIMATION, stages.parameter_estimation, 20))
        .fan_out(
            stage_ids::IMPACT_CIRCULARITY,
            vec![
                spec(stage_ids::IMPACT_CALCULATION, stages.impact_calculation, 35),
                spec(stage_ids::CIRCULARITY_CALCULATION, stages.circularity_calculation, 50),
            ],
        )
        .stage(spec(stage_ids::SCENARIO_GENERATION, stages.scenario_generation, 60))
        .stage(spec(stage_ids::VISUALIZATION, stages.visualization, 70))
        .stage(spec(stage_ids::NARRATIVE_EXPLANATION, stages.narrative_explanation, 80))
        .stage(spec(stage_ids::COMPLIANCE_CHECK, stages.compliance_check, 90))
        .stage(
            spec(stage_ids::QUALITY_CRITIQUE, stages.quality_critique, 95)
                .with_input(InputScope::History),
        )
        .build()
}
