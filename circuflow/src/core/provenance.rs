//! Lightweight audit entries attached to stage results.

use super::clamp_unit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Where a piece of a stage's output came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// The data source (dataset, service, model).
    pub source: String,
    /// Optional citation for the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    /// When the record was created.
    pub timestamp: DateTime<Utc>,
    /// The stage that produced the data.
    pub producing_stage_id: String,
    /// Optional quality score in `[0, 1]`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_quality"
    )]
    pub quality_score: Option<f64>,
}

impl ProvenanceRecord {
    /// Creates a provenance record stamped with the current time.
    #[must_use]
    pub fn new(source: impl Into<String>, producing_stage_id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            citation: None,
            timestamp: Utc::now(),
            producing_stage_id: producing_stage_id.into(),
            quality_score: None,
        }
    }

    /// Sets the citation.
    #[must_use]
    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        self.citation = Some(citation.into());
        self
    }

    /// Sets the quality score, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_quality_score(mut self, score: f64) -> Self {
        self.quality_score = Some(clamp_unit(score));
        self
    }
}

fn deserialize_quality<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.map(clamp_unit))
}
