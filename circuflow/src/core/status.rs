//! Stage status and policy enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome status of a stage execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageStatus {
    /// Stage completed and produced its full output.
    #[serde(rename = "success")]
    Success,
    /// Stage completed but only part of its output is trustworthy.
    #[serde(rename = "partial", alias = "partial_success")]
    PartialSuccess,
    /// Stage could not produce a usable output.
    #[serde(rename = "failure")]
    Failure,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::PartialSuccess => write!(f, "partial"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

impl StageStatus {
    /// Returns true if the stage's data should be merged into the context.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::PartialSuccess)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure)
    }

    /// Parses the status strings collaborators put in their reply envelopes.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "success" | "ok" | "completed" => Some(Self::Success),
            "partial" | "partial_success" => Some(Self::PartialSuccess),
            "failure" | "failed" | "error" => Some(Self::Failure),
            _ => None,
        }
    }
}

/// What a stage's failure means for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePolicy {
    /// A failure halts the run.
    Required,
    /// A failure is logged as a warning and the run continues.
    #[default]
    Optional,
}

impl fmt::Display for StagePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Optional => write!(f, "optional"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Success.to_string(), "success");
        assert_eq!(StageStatus::PartialSuccess.to_string(), "partial");
        assert_eq!(StageStatus::Failure.to_string(), "failure");
    }

    #[test]
    fn test_stage_status_predicates() {
        assert!(StageStatus::Success.is_success());
        assert!(StageStatus::PartialSuccess.is_success());
        assert!(!StageStatus::Failure.is_success());
        assert!(StageStatus::Failure.is_failure());
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::PartialSuccess).unwrap();
        assert_eq!(json, r#""partial""#);

        let parsed: StageStatus = serde_json::from_str(r#""partial_success""#).unwrap();
        assert_eq!(parsed, StageStatus::PartialSuccess);
    }

    #[test]
    fn test_stage_status_parse() {
        assert_eq!(StageStatus::parse(" Success "), Some(StageStatus::Success));
        assert_eq!(StageStatus::parse("failed"), Some(StageStatus::Failure));
        assert_eq!(StageStatus::parse("parse_error"), None);
    }

    #[test]
    fn test_stage_policy_default_is_optional() {
        assert_eq!(StagePolicy::default(), StagePolicy::Optional);
        assert_eq!(StagePolicy::Required.to_string(), "required");
    }
}
