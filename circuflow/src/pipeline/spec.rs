//! Stage declarations and pipeline steps.

use crate::context::InputScope;
use crate::core::StagePolicy;
use crate::retry::RetryConfig;
use crate::stages::StageRunner;

/// Declaration of one stage in a pipeline.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// Unique stage id.
    pub id: String,
    /// The implementation and how it is driven.
    pub runner: StageRunner,
    /// What a failure of this stage does to the run.
    pub policy: StagePolicy,
    /// What the stage receives as input.
    pub input: InputScope,
    /// Retry policy for transient errors. `None` means a single attempt.
    pub retry: Option<RetryConfig>,
    /// Progress percentage reached when the stage succeeds.
    pub checkpoint: Option<u8>,
}

impl StageSpec {
    /// Creates an optional, context-scoped stage with no retry.
    #[must_use]
    pub fn new(id: impl Into<String>, runner: StageRunner) -> Self {
        Self {
            id: id.into(),
            runner,
            policy: StagePolicy::Optional,
            input: InputScope::Context,
            retry: None,
            checkpoint: None,
        }
    }

    /// Creates a spec using the runner's own id.
    #[must_use]
    pub fn from_runner(runner: StageRunner) -> Self {
        let id = runner.id().to_string();
        Self::new(id, runner)
    }

    /// Marks the stage required: its failure fails the run.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.policy = StagePolicy::Required;
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_policy(mut self, policy: StagePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the input scope.
    #[must_use]
    pub fn with_input(mut self, input: InputScope) -> Self {
        self.input = input;
        self
    }

    /// Retries transient errors with `config`.
    #[must_use]
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// Sets the progress checkpoint.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: u8) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Returns true if a failure of this stage fails the run.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.policy == StagePolicy::Required
    }
}

/// One position in the pipeline sequence.
#[derive(Debug, Clone)]
pub enum PipelineStep {
    /// A single stage.
    Single(StageSpec),
    /// Stages run concurrently against the same context snapshot. The next
    /// step starts once every member has finished.
    FanOut {
        /// Group id, used in logs.
        id: String,
        /// Member stages.
        members: Vec<StageSpec>,
    },
}

impl PipelineStep {
    /// Returns the stage id, or the group id for a fan-out.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Single(spec) => &spec.id,
            Self::FanOut { id, .. } => id,
        }
    }

    /// Returns the stages of this step in declaration order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        match self {
            Self::Single(spec) => std::slice::from_ref(spec),
            Self::FanOut { members, .. } => members,
        }
    }

    pub(crate) fn stages_mut(&mut self) -> &mut [StageSpec] {
        match self {
            Self::Single(spec) => std::slice::from_mut(spec),
            Self::FanOut { members, .. } => members,
        }
    }
}
