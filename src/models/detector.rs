//! Boolean-normalizing detector seam
//!
//! Each model speaks its own label space (the classifier says `1` for fraud,
//! the isolation forest says `-1` for an outlier). Adapters behind this trait
//! translate those into a single "flagged" boolean so fusion never sees raw
//! model sentinels.

use crate::error::InferenceError;
use crate::feature_assembler::FeatureVector;
use std::sync::Arc;

/// A loaded model that votes on whether a transaction is suspicious
pub trait Detector: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    /// True when the model flags the feature vector
    fn flag(&self, features: &FeatureVector) -> Result<bool, InferenceError>;
}

/// Optional model slot; an empty slot always abstains
#[derive(Clone, Default)]
pub struct ModelSlot {
    detector: Option<Arc<dyn Detector>>,
}

impl ModelSlot {
    pub fn empty() -> Self {
        Self { detector: None }
    }

    pub fn filled(detector: Arc<dyn Detector>) -> Self {
        Self {
            detector: Some(detector),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.detector.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.detector.as_deref().map(|d| d.name())
    }

    /// Run the model, or abstain (`false`) if none is loaded
    pub fn vote(&self, features: &FeatureVector) -> Result<bool, InferenceError> {
        match &self.detector {
            Some(detector) => detector.flag(features),
            None => Ok(false),
        }
    }
}

impl From<Option<Arc<dyn Detector>>> for ModelSlot {
    fn from(detector: Option<Arc<dyn Detector>>) -> Self {
        Self { detector }
    }
}

impl std::fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSlot")
            .field("detector", &self.name())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub detectors standing in for ONNX models

    use super::*;

    /// Always returns the same vote
    pub struct FixedDetector {
        pub name: &'static str,
        pub flagged: bool,
    }

    impl Detector for FixedDetector {
        fn name(&self) -> &str {
            self.name
        }

        fn flag(&self, _features: &FeatureVector) -> Result<bool, InferenceError> {
            Ok(self.flagged)
        }
    }

    /// Always fails
    pub struct FailingDetector;

    impl Detector for FailingDetector {
        fn name(&self) -> &str {
            "failing"
        }

        fn flag(&self, _features: &FeatureVector) -> Result<bool, InferenceError> {
            Err(InferenceError::Session {
                model: "failing".to_string(),
                message: "tensor shape mismatch".to_string(),
            })
        }
    }

    /// Votes according to a rule over the features
    pub struct RuleDetector<F> {
        pub name: &'static str,
        pub rule: F,
    }

    impl<F> Detector for RuleDetector<F>
    where
        F: Fn(&FeatureVector) -> bool + Send + Sync,
    {
        fn name(&self) -> &str {
            self.name
        }

        fn flag(&self, features: &FeatureVector) -> Result<bool, InferenceError> {
            Ok((self.rule)(features))
        }
    }

    pub fn fixed(name: &'static str, flagged: bool) -> ModelSlot {
        ModelSlot::filled(Arc::new(FixedDetector { name, flagged }))
    }

    pub fn failing() -> ModelSlot {
        ModelSlot::filled(Arc::new(FailingDetector))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn features() -> FeatureVector {
        FeatureVector {
            amount: 0.0,
            merchant_category_code: 1,
            location_code: 1,
            unseen_fields: Vec::new(),
        }
    }

    #[test]
    fn test_empty_slot_abstains() {
        let slot = ModelSlot::empty();

        assert!(!slot.is_loaded());
        assert_eq!(slot.vote(&features()), Ok(false));
        assert_eq!(slot.name(), None);
    }

    #[test]
    fn test_filled_slot_delegates() {
        let slot = fixed("xgboost", true);

        assert!(slot.is_loaded());
        assert_eq!(slot.name(), Some("xgboost"));
        assert_eq!(slot.vote(&features()), Ok(true));
    }

    #[test]
    fn test_failures_propagate() {
        assert!(failing().vote(&features()).is_err());
    }
}
