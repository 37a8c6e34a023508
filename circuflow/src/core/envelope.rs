//! Parsing of collaborator replies into [`StageResult`]s.
//!
//! Model-backed stages get their answer back as free text that is supposed
//! to hold a JSON object shaped like a stage result. Replies are frequently
//! wrapped in markdown code fences or surrounded by prose, so parsing is
//! lenient: fences are stripped, and if the remainder is not valid JSON the
//! outermost `{...}` block is tried instead.

use super::{clamp_unit, JsonMap, ProvenanceRecord, StageResult, StageStatus};
use crate::core::result::truncate_chars;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Confidence assumed when a reply does not state one.
pub const DEFAULT_ENVELOPE_CONFIDENCE: f64 = 0.8;

/// Maximum characters of an unparseable reply kept for diagnosis.
const RAW_RESPONSE_LIMIT: usize = 1000;

#[allow(clippy::expect_used)]
static OBJECT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("object block pattern is valid"));

/// Parser for collaborator reply envelopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseEnvelope;

impl ResponseEnvelope {
    /// Parses a free-text reply into a stage result.
    ///
    /// Never fails: an unparseable reply becomes a failure result whose
    /// data carries `raw_response` and `parse_error`.
    #[must_use]
    pub fn parse(text: &str) -> StageResult {
        let clean = strip_code_fences(text);

        let parsed = serde_json::from_str::<Value>(clean).or_else(|first_err| {
            OBJECT_BLOCK
                .find(clean)
                .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
                .ok_or(first_err)
        });

        match parsed {
            Ok(value) => Self::from_value(value),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to parse collaborator response");
                let mut data = JsonMap::new();
                data.insert(
                    "raw_response".into(),
                    Value::String(truncate_chars(text, RAW_RESPONSE_LIMIT)),
                );
                data.insert("parse_error".into(), Value::String(err.to_string()));
                StageResult::failure(format!("Failed to parse collaborator response: {err}"))
                    .with_data(data)
            }
        }
    }

    /// Converts an already-decoded reply into a stage result, applying the
    /// envelope defaults (`status=success`, `data={}`, `log=""`,
    /// `confidence=0.8`).
    #[must_use]
    pub fn from_value(value: Value) -> StageResult {
        let Value::Object(mut envelope) = value else {
            return StageResult::failure("Collaborator response is not a JSON object");
        };

        let log = match envelope.remove("log") {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let data = match envelope.remove("data") {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => JsonMap::new(),
            Some(other) => {
                return StageResult::failure(format!(
                    "Collaborator response data must be an object, got: {}",
                    truncate_chars(&other.to_string(), 80)
                ))
                .with_log_suffix(&log);
            }
        };

        let status = match envelope.remove("status") {
            None | Some(Value::Null) => StageStatus::Success,
            Some(Value::String(s)) => match StageStatus::parse(&s) {
                Some(status) => status,
                None => {
                    return StageResult::failure(format!("Unrecognised stage status '{s}'"))
                        .with_log_suffix(&log)
                        .with_data(data);
                }
            },
            Some(other) => {
                return StageResult::failure(format!("Unrecognised stage status {other}"))
                    .with_log_suffix(&log)
                    .with_data(data);
            }
        };

        let confidence = envelope
            .get("confidence")
            .and_then(Value::as_f64)
            .map_or(DEFAULT_ENVELOPE_CONFIDENCE, clamp_unit);

        let provenance = match envelope.remove("provenance") {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<ProvenanceRecord>(item) {
                    Ok(record) => Some(record),
                    Err(err) => {
                        tracing::debug!(error = %err, "Dropping malformed provenance record");
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        let mut result = match status {
            StageStatus::Success => StageResult::success(data),
            StageStatus::PartialSuccess => StageResult::partial(data, String::new()),
            StageStatus::Failure => StageResult::failure(String::new()).with_data(data),
        }
        .with_log(log)
        .with_confidence(confidence);
        result.provenance = provenance;
        result
    }
}

impl StageResult {
    fn with_log_suffix(mut self, extra: &str) -> Self {
        if !extra.is_empty() {
            self.log = format!("{} ({extra})", self.log);
        }
        self
    }
}

fn strip_code_fences(text: &str) -> &str {
    let mut clean = text.trim();
    if let Some(rest) = clean.strip_prefix("```json") {
        clean = rest;
    } else if let Some(rest) = clean.strip_prefix("```") {
        clean = rest;
    }
    if let Some(rest) = clean.strip_suffix("```") {
        clean = rest;
    }
    clean.trim()
}
