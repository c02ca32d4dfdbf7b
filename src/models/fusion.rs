//! Fusion of the two model votes into one decision

use crate::types::verdict::{Confidence, ModelUsed};

/// Normalized votes from both model slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Votes {
    pub supervised: bool,
    pub unsupervised: bool,
}

/// Outcome of fusing the votes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fusion {
    pub is_fraud: bool,
    pub model_used: ModelUsed,
    pub confidence: Confidence,
}

/// OR-dominant fusion with supervised-first attribution.
///
/// The supervised model is credited whenever it flags and for clean verdicts;
/// the outlier model only when it alone flags.
pub fn fuse(votes: Votes) -> Fusion {
    let is_fraud = votes.supervised || votes.unsupervised;

    let model_used = if votes.unsupervised && !votes.supervised {
        ModelUsed::Unsupervised
    } else {
        ModelUsed::Supervised
    };

    let confidence = match (votes.supervised, votes.unsupervised) {
        (true, true) => Confidence::HighRisk,
        (true, false) | (false, true) => Confidence::High,
        (false, false) => Confidence::Normal,
    };

    Fusion {
        is_fraud,
        model_used,
        confidence,
    }
}
