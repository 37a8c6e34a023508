//! The result envelope every stage returns.

use super::{clamp_unit, JsonMap, ProvenanceRecord, StageStatus};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The outcome of one stage invocation.
///
/// `data` is always present, possibly empty, even on failure. `confidence`
/// is clamped to `[0, 1]` on every construction path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// The status of the stage execution.
    pub status: StageStatus,

    /// Output data merged into the pipeline context on success.
    #[serde(default)]
    pub data: JsonMap,

    /// Human-readable log line; carries the reason on failure.
    #[serde(default)]
    pub log: String,

    /// How much the stage trusts its own output.
    #[serde(default = "default_confidence", deserialize_with = "deserialize_confidence")]
    pub confidence: f64,

    /// Audit trail for the data, append-only.
    #[serde(default)]
    pub provenance: Vec<ProvenanceRecord>,

    /// Wall-clock time spent in the stage, stamped by the orchestrator.
    #[serde(default)]
    pub execution_time_ms: u64,

    /// The producing stage, stamped by the orchestrator.
    #[serde(default)]
    pub stage_id: String,

    /// The owning run, stamped by the orchestrator.
    #[serde(default)]
    pub run_id: String,
}

impl StageResult {
    fn with_status(status: StageStatus, data: JsonMap, log: String, confidence: f64) -> Self {
        Self {
            status,
            data,
            log,
            confidence: clamp_unit(confidence),
            provenance: Vec::new(),
            execution_time_ms: 0,
            stage_id: String::new(),
            run_id: String::new(),
        }
    }

    /// Creates a successful result with data.
    #[must_use]
    pub fn success(data: JsonMap) -> Self {
        Self::with_status(StageStatus::Success, data, String::new(), 1.0)
    }

    /// Creates a successful result with no data.
    #[must_use]
    pub fn success_empty() -> Self {
        Self::success(JsonMap::new())
    }

    /// Creates a successful result with a single value.
    #[must_use]
    pub fn success_value(key: impl Into<String>, value: Value) -> Self {
        let mut data = JsonMap::new();
        data.insert(key.into(), value);
        Self::success(data)
    }

    /// Creates a partially successful result.
    #[must_use]
    pub fn partial(data: JsonMap, log: impl Into<String>) -> Self {
        Self::with_status(StageStatus::PartialSuccess, data, log.into(), 0.5)
    }

    /// Creates a failure result with a reason.
    #[must_use]
    pub fn failure(log: impl Into<String>) -> Self {
        Self::with_status(StageStatus::Failure, JsonMap::new(), log.into(), 0.0)
    }

    /// Sets the log line.
    #[must_use]
    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }

    /// Sets the confidence, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    /// Appends a provenance record.
    #[must_use]
    pub fn with_provenance(mut self, record: ProvenanceRecord) -> Self {
        self.provenance.push(record);
        self
    }

    /// Adds data to the result (shallow extend).
    #[must_use]
    pub fn with_data(mut self, data: JsonMap) -> Self {
        self.data.extend(data);
        self
    }

    /// Returns true if the result's data should be merged.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the result indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Gets a value from the data.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Renders `data` as compact JSON, truncated to `max_chars` characters.
    #[must_use]
    pub fn summary(&self, max_chars: usize) -> String {
        let rendered = serde_json::to_string(&self.data).unwrap_or_default();
        truncate_chars(&rendered, max_chars)
    }
}

impl Default for StageResult {
    fn default() -> Self {
        Self::success_empty()
    }
}

/// Truncates `text` to at most `max_chars` characters, marking the cut.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
    }
}

const fn default_confidence() -> f64 {
    1.0
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(clamp_unit(f64::deserialize(deserializer)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_keeps_empty_data() {
        let result = StageResult::failure("missing field: material");

        assert!(result.is_failure());
        assert!(result.data.is_empty());
        assert_eq!(result.log, "missing field: material");
        assert_eq!(result.confidence, 0.0);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["data"], json!({}));
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(StageResult::success_empty().with_confidence(3.2).confidence, 1.0);
        assert_eq!(StageResult::success_empty().with_confidence(-1.0).confidence, 0.0);
        assert_eq!(StageResult::success_empty().with_confidence(f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_deserialize_clamps_and_defaults() {
        let result: StageResult =
            serde_json::from_value(json!({"status": "partial", "confidence": 7})).unwrap();

        assert_eq!(result.status, StageStatus::PartialSuccess);
        assert_eq!(result.confidence, 1.0);
        assert!(result.data.is_empty());
        assert!(result.provenance.is_empty());
    }

    #[test]
    fn test_provenance_appends() {
        let result = StageResult::success_value("gwp", json!(1800))
            .with_provenance(ProvenanceRecord::new("ecoinvent", "impact"))
            .with_provenance(ProvenanceRecord::new("ipcc ar6", "impact"));

        assert_eq!(result.provenance.len(), 2);
        assert_eq!(result.provenance[1].source, "ipcc ar6");
    }

    #[test]
    fn test_summary_truncates_on_char_boundary() {
        let result = StageResult::success_value("note", json!("ééééééééé"));
        let summary = result.summary(10);

        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), 13);
        assert_eq!(StageResult::success_empty().summary(10), "{}");
    }
}
