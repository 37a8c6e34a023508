//! Core domain model types for circuflow.
//!
//! This module contains the fundamental types of the stage contract:
//! - Stage status and policy enums
//! - The [`StageResult`] envelope and its provenance records
//! - Lenient parsing of collaborator replies into results

mod envelope;
mod provenance;
mod result;
mod status;

pub use envelope::{ResponseEnvelope, DEFAULT_ENVELOPE_CONFIDENCE};
pub use provenance::ProvenanceRecord;
pub use result::StageResult;
pub use status::{StagePolicy, StageStatus};

/// The JSON object type used for stage data and contexts.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Clamps a score into `[0, 1]`, mapping NaN to 0.
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
