//! Per-invocation view handed to a stage.

use super::PipelineContext;
use crate::core::StageResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which slice of run state a stage receives as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputScope {
    /// The merged pipeline context.
    #[default]
    Context,
    /// The merged context plus every stage result recorded so far, shaped as
    /// `{"current_context": {..}, "history": {stage_id: result}}`.
    History,
}

/// The input of one stage invocation.
#[derive(Debug, Clone)]
pub struct StageContext {
    run_id: String,
    stage_id: String,
    input: PipelineContext,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(run_id: impl Into<String>, stage_id: impl Into<String>, input: PipelineContext) -> Self {
        Self {
            run_id: run_id.into(),
            stage_id: stage_id.into(),
            input,
        }
    }

    /// Builds the input for `scope` from the run's context and history.
    #[must_use]
    pub fn for_scope(
        run_id: &str,
        stage_id: &str,
        scope: InputScope,
        context: &PipelineContext,
        history: &[StageResult],
    ) -> Self {
        let input = match scope {
            InputScope::Context => context.clone(),
            InputScope::History => {
                let history: serde_json::Map<String, Value> = history
                    .iter()
                    .map(|r| {
                        (
                            r.stage_id.clone(),
                            serde_json::to_value(r).unwrap_or(Value::Null),
                        )
                    })
                    .collect();
                [
                    ("current_context", context.to_value()),
                    ("history", Value::Object(history)),
                ]
                .into_iter()
                .collect()
            }
        };
        Self::new(run_id, stage_id, input)
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Returns the id of the stage being invoked.
    #[must_use]
    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    /// Returns the input map.
    #[must_use]
    pub fn input(&self) -> &PipelineContext {
        &self.input
    }

    /// Gets a single input value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.input.get(key)
    }

    /// Gets a string input value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(Value::as_str)
    }
}
