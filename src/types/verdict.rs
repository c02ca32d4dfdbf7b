//! Verdict data structures shared by the API response and the broadcast feed

use crate::types::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Confidence label attached to a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Normal,
    High,
    #[serde(rename = "High Risk")]
    HighRisk,
    Anomaly,
}

/// Which strategy drove the final call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelUsed {
    Supervised,
    Unsupervised,
    EmergencyFilter,
}

impl ModelUsed {
    /// All variants, in reporting order
    pub const ALL: [ModelUsed; 3] = [
        ModelUsed::Supervised,
        ModelUsed::Unsupervised,
        ModelUsed::EmergencyFilter,
    ];

    /// Wire name of the variant
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelUsed::Supervised => "supervised",
            ModelUsed::Unsupervised => "unsupervised",
            ModelUsed::EmergencyFilter => "emergency_filter",
        }
    }

    /// Human-readable strategy label for observers
    pub fn strategy_label(&self) -> &'static str {
        match self {
            ModelUsed::Supervised => "Known Fraud Pattern (Supervised)",
            ModelUsed::Unsupervised => "Statistical Anomaly (Unsupervised)",
            ModelUsed::EmergencyFilter => "Fail-Closed Emergency Filter",
        }
    }
}

/// Per-model flags behind a fused verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictDetails {
    /// Supervised classifier flagged the transaction
    pub xgboost_flag: bool,

    /// Unsupervised outlier detector flagged the transaction
    pub iso_forest_flag: bool,

    /// Categorical fields whose value was outside the training vocabulary
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unseen_fields: Vec<String>,
}

/// Final decision for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_fraud: bool,

    pub confidence: Confidence,

    pub model_used: ModelUsed,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<VerdictDetails>,

    /// Set only by the emergency filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Verdict {
    /// Whether any categorical value fell back to the sentinel code
    pub fn has_unseen_categories(&self) -> bool {
        self.details
            .as_ref()
            .map(|d| !d.unseen_fields.is_empty())
            .unwrap_or(false)
    }
}

/// Verdict as seen by observers, augmented with the strategy label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(flatten)]
    pub verdict: Verdict,

    pub strategy: String,
}

/// Message pushed to every connected observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastPayload {
    pub tx: Transaction,
    pub analysis: Analysis,
}

impl BroadcastPayload {
    pub fn new(tx: Transaction, verdict: Verdict) -> Self {
        let strategy = verdict.model_used.strategy_label().to_string();
        Self {
            tx,
            analysis: Analysis { verdict, strategy },
        }
    }
}
