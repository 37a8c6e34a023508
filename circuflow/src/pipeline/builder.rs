//! Pipeline builder with validation.

use super::{PipelineStep, StageSpec};
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use std::collections::HashSet;

/// Builder for creating validated pipelines.
///
/// Steps run in the order they are added. Validation happens once, in
/// [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    steps: Vec<PipelineStep>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Appends a single stage.
    #[must_use]
    pub fn stage(mut self, spec: StageSpec) -> Self {
        self.steps.push(PipelineStep::Single(spec));
        self
    }

    /// Appends a group of stages that run concurrently.
    #[must_use]
    pub fn fan_out(mut self, id: impl Into<String>, members: Vec<StageSpec>) -> Self {
        self.steps.push(PipelineStep::FanOut {
            id: id.into(),
            members,
        });
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates the declaration and produces an immutable definition.
    ///
    /// Stages without a checkpoint get one spread evenly across `(0, 100)`
    /// by their position in the flattened stage order.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty name, no stages, duplicate ids, empty
    /// fan-out groups, or checkpoints above 100.
    pub fn build(mut self) -> Result<PipelineDefinition, PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new("Pipeline name must not be empty")
                .with_error_info(
                    ContractErrorInfo::new("PIPELINE-NAME-EMPTY", "Pipeline has no name")
                        .with_fix_hint("Pass a non-empty name to PipelineBuilder::new."),
                ));
        }

        if self.steps.is_empty() {
            return Err(PipelineValidationError::empty(&self.name));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if let PipelineStep::FanOut { id, members } = step {
                if members.is_empty() {
                    return Err(PipelineValidationError::new(format!(
                        "Fan-out group '{id}' has no members"
                    ))
                    .with_stages(vec![id.clone()])
                    .with_error_info(
                        ContractErrorInfo::new(
                            "PIPELINE-EMPTY-FANOUT",
                            format!("Empty fan-out group: {id}"),
                        )
                        .with_fix_hint("Add at least one stage to the group or remove it."),
                    ));
                }
                if !seen.insert(id.clone()) {
                    return Err(PipelineValidationError::duplicate_stage(id));
                }
            }

            for spec in step.stages() {
                if spec.id.trim().is_empty() {
                    return Err(PipelineValidationError::new("Stage id must not be empty")
                        .with_error_info(ContractErrorInfo::new(
                            "PIPELINE-STAGE-ID-EMPTY",
                            "Stage has no id",
                        )));
                }
                if !seen.insert(spec.id.clone()) {
                    return Err(PipelineValidationError::duplicate_stage(&spec.id));
                }
                if let Some(checkpoint) = spec.checkpoint.filter(|c| *c > 100) {
                    return Err(PipelineValidationError::new(format!(
                        "Stage '{}' has checkpoint {checkpoint}, above 100",
                        spec.id
                    ))
                    .with_stages(vec![spec.id.clone()])
                    .with_error_info(
                        ContractErrorInfo::new(
                            "PIPELINE-CHECKPOINT-RANGE",
                            "Checkpoint out of range",
                        )
                        .with_fix_hint("Checkpoints are percentages from 0 to 100.")
                        .with_context_entry("checkpoint", checkpoint.to_string()),
                    ));
                }
            }
        }

        self.fill_checkpoints();

        Ok(PipelineDefinition {
            name: self.name,
            steps: self.steps,
        })
    }

    fn fill_checkpoints(&mut self) {
        let total: usize = self.steps.iter().map(|s| s.stages().len()).sum();
        let mut position = 0usize;
        for step in &mut self.steps {
            for spec in step.stages_mut() {
                position += 1;
                if spec.checkpoint.is_none() {
                    let spread = position * 100 / (total + 1);
                    spec.checkpoint = Some(u8::try_from(spread).unwrap_or(100));
                }
            }
        }
    }
}

/// A validated, immutable pipeline.
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    name: String,
    steps: Vec<PipelineStep>,
}

impl PipelineDefinition {
    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Returns every stage id in declaration order, fan-out members inlined.
    #[must_use]
    pub fn stage_ids(&self) -> Vec<&str> {
        self.stages().map(|s| s.id.as_str()).collect()
    }

    /// Returns the number of stages, fan-out members included.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages().count()
    }

    /// Looks up a stage by id.
    #[must_use]
    pub fn stage(&self, id: &str) -> Option<&StageSpec> {
        self.stages().find(|s| s.id == id)
    }

    fn stages(&self) -> impl Iterator<Item = &StageSpec> {
        self.steps.iter().flat_map(PipelineStep::stages)
    }
}
