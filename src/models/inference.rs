//! Hybrid decision engine: supervised classifier + unsupervised outlier detector

use crate::error::InferenceError;
use crate::feature_assembler::FeatureVector;
use crate::models::detector::ModelSlot;
use crate::models::fusion::{fuse, Votes};
use crate::types::verdict::{Verdict, VerdictDetails};
use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

/// Which model slots are active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorMode {
    Hybrid,
    SupervisedOnly,
    UnsupervisedOnly,
}

/// Queries both model slots and fuses their flags into one verdict
#[derive(Debug, Clone)]
pub struct HybridEngine {
    supervised: ModelSlot,
    unsupervised: ModelSlot,
    mode: DetectorMode,
}

impl HybridEngine {
    /// Create an engine; at least one slot must be loaded
    pub fn new(supervised: ModelSlot, unsupervised: ModelSlot) -> Result<Self> {
        let mode = match (supervised.is_loaded(), unsupervised.is_loaded()) {
            (true, true) => DetectorMode::Hybrid,
            (true, false) => DetectorMode::SupervisedOnly,
            (false, true) => DetectorMode::UnsupervisedOnly,
            (false, false) => anyhow::bail!("No trained model available for either slot"),
        };

        info!(
            mode = ?mode,
            supervised = ?supervised.name(),
            unsupervised = ?unsupervised.name(),
            "Hybrid engine initialized"
        );

        Ok(Self {
            supervised,
            unsupervised,
            mode,
        })
    }

    pub fn mode(&self) -> DetectorMode {
        self.mode
    }

    /// Evaluate one feature vector
    pub fn evaluate(&self, features: &FeatureVector) -> Result<Verdict, InferenceError> {
        let votes = Votes {
            supervised: self.supervised.vote(features)?,
            unsupervised: self.unsupervised.vote(features)?,
        };
        let fusion = fuse(votes);

        debug!(
            supervised_flag = votes.supervised,
            unsupervised_flag = votes.unsupervised,
            model_used = ?fusion.model_used,
            "Hybrid evaluation complete"
        );

        Ok(Verdict {
            is_fraud: fusion.is_fraud,
            confidence: fusion.confidence,
            model_used: fusion.model_used,
            details: Some(VerdictDetails {
                xgboost_flag: votes.supervised,
                iso_forest_flag: votes.unsupervised,
                unseen_fields: features
                    .unseen_fields
                    .iter()
                    .map(|f| f.column().to_string())
                    .collect(),
            }),
            reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{CategoricalField, SENTINEL_CODE};
    use crate::models::detector::testing::{failing, fixed, RuleDetector};
    use crate::types::verdict::{Confidence, ModelUsed};
    use std::sync::Arc;

    fn features() -> FeatureVector {
        FeatureVector {
            amount: -0.4,
            merchant_category_code: 2,
            location_code: 3,
            unseen_fields: Vec::new(),
        }
    }

    fn engine(supervised: bool, unsupervised: bool) -> HybridEngine {
        HybridEngine::new(fixed("xgboost", supervised), fixed("iso_forest", unsupervised)).unwrap()
    }

    #[test]
    fn test_both_clean() {
        let verdict = engine(false, false).evaluate(&features()).unwrap();

        assert!(!verdict.is_fraud);
        assert_eq!(verdict.model_used, ModelUsed::Supervised);
        assert_eq!(verdict.confidence, Confidence::Normal);
        let details = verdict.details.unwrap();
        assert!(!details.xgboost_flag);
        assert!(!details.iso_forest_flag);
    }

    #[test]
    fn test_attribution_follows_flags() {
        let supervised = engine(true, false).evaluate(&features()).unwrap();
        assert!(supervised.is_fraud);
        assert_eq!(supervised.model_used, ModelUsed::Supervised);

        let unsupervised = engine(false, true).evaluate(&features()).unwrap();
        assert!(unsupervised.is_fraud);
        assert_eq!(unsupervised.model_used, ModelUsed::Unsupervised);

        let both = engine(true, true).evaluate(&features()).unwrap();
        assert_eq!(both.model_used, ModelUsed::Supervised);
        assert_eq!(both.confidence, Confidence::HighRisk);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let engine = engine(false, true);
        let first = engine.evaluate(&features()).unwrap();

        for _ in 0..10 {
            assert_eq!(engine.evaluate(&features()).unwrap(), first);
        }
    }

    #[test]
    fn test_absent_slot_abstains() {
        let supervised_only =
            HybridEngine::new(fixed("xgboost", false), ModelSlot::empty()).unwrap();
        assert_eq!(supervised_only.mode(), DetectorMode::SupervisedOnly);
        assert!(!supervised_only.evaluate(&features()).unwrap().is_fraud);

        let unsupervised_only =
            HybridEngine::new(ModelSlot::empty(), fixed("iso_forest", true)).unwrap();
        assert_eq!(unsupervised_only.mode(), DetectorMode::UnsupervisedOnly);
        let verdict = unsupervised_only.evaluate(&features()).unwrap();
        assert!(verdict.is_fraud);
        assert_eq!(verdict.model_used, ModelUsed::Unsupervised);

        assert_eq!(engine(false, false).mode(), DetectorMode::Hybrid);
    }

    #[test]
    fn test_no_models_is_rejected() {
        assert!(HybridEngine::new(ModelSlot::empty(), ModelSlot::empty()).is_err());
    }

    #[test]
    fn test_model_failure_propagates() {
        let engine = HybridEngine::new(fixed("xgboost", false), failing()).unwrap();
        assert!(engine.evaluate(&features()).is_err());
    }

    #[test]
    fn test_unseen_fields_reach_verdict() {
        let outlier_on_sentinel = RuleDetector {
            name: "iso_forest",
            rule: |f: &FeatureVector| f.location_code == SENTINEL_CODE && f.amount > 1.0,
        };
        let engine = HybridEngine::new(
            fixed("xgboost", false),
            ModelSlot::filled(Arc::new(outlier_on_sentinel)),
        )
        .unwrap();

        let features = FeatureVector {
            amount: 8.0,
            merchant_category_code: 1,
            location_code: SENTINEL_CODE,
            unseen_fields: vec![CategoricalField::Location],
        };
        let verdict = engine.evaluate(&features).unwrap();

        assert!(verdict.is_fraud);
        assert_eq!(verdict.model_used, ModelUsed::Unsupervised);
        assert!(verdict.has_unseen_categories());
        assert_eq!(verdict.details.unwrap().unseen_fields, vec!["Location"]);
    }
}
