//! ONNX-backed detector adapters

use crate::error::InferenceError;
use crate::feature_assembler::FeatureVector;
use crate::models::detector::Detector;
use ort::session::Session;
use ort::value::Tensor;
use std::sync::Mutex;
use tracing::debug;

/// Supervised classifier label meaning "fraud"
pub const POSITIVE_CLASS: i64 = 1;

/// Isolation forest label meaning "outlier"
pub const OUTLIER_CLASS: i64 = -1;

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session (running needs exclusive access)
    pub session: Mutex<Session>,
    /// Input name for the model
    pub input_name: String,
    /// Output carrying the predicted class, if any
    pub label_output: Option<String>,
    /// Output carrying probabilities or anomaly scores, if any
    pub score_output: Option<String>,
}

/// Raw model outputs before label-space translation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOutput {
    pub label: Option<i64>,
    pub scores: Vec<f32>,
}

impl LoadedModel {
    /// Run the model on a single feature row
    pub fn run(&self, input: &[f32]) -> Result<RawOutput, InferenceError> {
        let shape = vec![1_i64, input.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, input.to_vec())).map_err(|e| self.session_error(e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::LockPoisoned {
                model: self.name.clone(),
            })?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(|e| self.session_error(e))?;

        let mut raw = RawOutput::default();

        if let Some(output) = self
            .label_output
            .as_deref()
            .and_then(|name| outputs.get(name))
        {
            if let Ok((_, data)) = output.try_extract_tensor::<i64>() {
                raw.label = data.first().copied();
            }
        }

        if let Some(output) = self
            .score_output
            .as_deref()
            .and_then(|name| outputs.get(name))
        {
            if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
                raw.scores = data.to_vec();
            }
        }

        debug!(model = %self.name, label = ?raw.label, scores = ?raw.scores, "Model output");
        Ok(raw)
    }

    fn session_error(&self, error: impl std::fmt::Display) -> InferenceError {
        InferenceError::Session {
            model: self.name.clone(),
            message: error.to_string(),
        }
    }
}

/// Translate classifier output into a fraud flag
pub fn classifier_flag(raw: &RawOutput, threshold: f64) -> Option<bool> {
    if let Some(label) = raw.label {
        return Some(label == POSITIVE_CLASS);
    }

    // [p(clean), p(fraud)] or a single p(fraud)
    let probability = match raw.scores.as_slice() {
        [] => return None,
        [p] => *p,
        [_, p, ..] => *p,
    };
    Some(probability as f64 >= threshold)
}

/// Translate isolation forest output into an outlier flag
pub fn outlier_flag(raw: &RawOutput) -> Option<bool> {
    if let Some(label) = raw.label {
        return Some(label == OUTLIER_CLASS);
    }

    // decision function: negative means outlier
    raw.scores.first().map(|&score| score < 0.0)
}

/// Supervised fraud classifier (e.g. XGBoost)
pub struct SupervisedClassifier {
    model: LoadedModel,
    threshold: f64,
}

impl SupervisedClassifier {
    pub fn new(model: LoadedModel, threshold: f64) -> Self {
        Self { model, threshold }
    }
}

impl Detector for SupervisedClassifier {
    fn name(&self) -> &str {
        &self.model.name
    }

    fn flag(&self, features: &FeatureVector) -> Result<bool, InferenceError> {
        let raw = self.model.run(&features.to_model_input())?;
        classifier_flag(&raw, self.threshold).ok_or_else(|| InferenceError::MissingOutput {
            model: self.model.name.clone(),
        })
    }
}

/// Unsupervised outlier detector (e.g. Isolation Forest)
pub struct OutlierDetector {
    model: LoadedModel,
}

impl OutlierDetector {
    pub fn new(model: LoadedModel) -> Self {
        Self { model }
    }
}

impl Detector for OutlierDetector {
    fn name(&self) -> &str {
        &self.model.name
    }

    fn flag(&self, features: &FeatureVector) -> Result<bool, InferenceError> {
        let raw = self.model.run(&features.to_model_input())?;
        outlier_flag(&raw).ok_or_else(|| InferenceError::MissingOutput {
            model: self.model.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(label: i64) -> RawOutput {
        RawOutput {
            label: Some(label),
            scores: Vec::new(),
        }
    }

    fn scored(scores: &[f32]) -> RawOutput {
        RawOutput {
            label: None,
            scores: scores.to_vec(),
        }
    }

    #[test]
    fn test_classifier_label_space() {
        assert_eq!(classifier_flag(&labelled(1), 0.5), Some(true));
        assert_eq!(classifier_flag(&labelled(0), 0.5), Some(false));
        // -1 is an outlier label, not the fraud class
        assert_eq!(classifier_flag(&labelled(-1), 0.5), Some(false));
    }

    #[test]
    fn test_classifier_probability_fallback() {
        assert_eq!(classifier_flag(&scored(&[0.2, 0.8]), 0.5), Some(true));
        assert_eq!(classifier_flag(&scored(&[0.7, 0.3]), 0.5), Some(false));
        assert_eq!(classifier_flag(&scored(&[0.61]), 0.61), Some(true));
        assert_eq!(classifier_flag(&scored(&[]), 0.5), None);
    }

    #[test]
    fn test_outlier_label_space() {
        assert_eq!(outlier_flag(&labelled(-1)), Some(true));
        assert_eq!(outlier_flag(&labelled(1)), Some(false));
    }

    #[test]
    fn test_outlier_score_fallback() {
        assert_eq!(outlier_flag(&scored(&[-0.12])), Some(true));
        assert_eq!(outlier_flag(&scored(&[0.05])), Some(false));
        assert_eq!(outlier_flag(&RawOutput::default()), None);
    }
}
