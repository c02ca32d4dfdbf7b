//! Emergency fail-closed filter.
//!
//! Any failure while assembling features or running a model most often means
//! the transaction looks like nothing the models were trained on, so it is
//! flagged rather than passed through unexamined.

use crate::error::{AssemblyError, DetectionError, InferenceError};
use crate::types::verdict::{Confidence, ModelUsed, Verdict};

/// Conservative verdict for a failed detection
pub fn emergency_verdict(error: &DetectionError) -> Verdict {
    Verdict {
        is_fraud: true,
        confidence: Confidence::Anomaly,
        model_used: ModelUsed::EmergencyFilter,
        details: None,
        reason: Some(reason(error).to_string()),
    }
}

/// Human-readable anomaly class for the failure
fn reason(error: &DetectionError) -> &'static str {
    match error {
        DetectionError::Assembly(AssemblyError::MissingField(_)) => {
            "Incomplete Transaction Record Detected"
        }
        DetectionError::Assembly(AssemblyError::MalformedField(_)) => {
            "Malformed Transaction Record Detected"
        }
        DetectionError::Assembly(
            AssemblyError::NonNumericAmount(_)
            | AssemblyError::NegativeAmount(_)
            | AssemblyError::NonFiniteAmount,
        ) => "Malformed Transaction Amount Detected",
        DetectionError::Inference(InferenceError::Timeout(_)) => "Inference Deadline Exceeded",
        DetectionError::Inference(_) => "Unknown Location/Pattern Detected",
    }
}
