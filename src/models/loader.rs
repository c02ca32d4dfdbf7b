//! Startup loading of model and preprocessing artifacts

use crate::config::ModelsConfig;
use crate::encoder::{PreprocessingArtifact, Preprocessor};
use crate::models::detector::ModelSlot;
use crate::models::onnx::{LoadedModel, OutlierDetector, SupervisedClassifier};
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load a single ONNX model from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();

        info!(
            model = %name,
            path = %path.display(),
            threads = self.onnx_threads,
            "Loading ONNX model"
        );

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        let score_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob") || o.name.contains("score"))
            .map(|o| o.name.clone());

        info!(
            model = %name,
            input = %input_name,
            label_output = ?label_output,
            score_output = ?score_output,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            label_output,
            score_output,
        })
    }

    /// Load both model slots; a missing file leaves its slot empty.
    ///
    /// Fails only when neither model could be loaded.
    pub fn load_slots(&self, config: &ModelsConfig) -> Result<(ModelSlot, ModelSlot)> {
        let models_dir = Path::new(&config.models_dir);

        let supervised = self
            .load_optional(&models_dir.join(&config.supervised_file), "xgboost")
            .map(|model| {
                ModelSlot::filled(Arc::new(SupervisedClassifier::new(
                    model,
                    config.supervised_threshold,
                )))
            })
            .unwrap_or_default();

        let unsupervised = self
            .load_optional(&models_dir.join(&config.unsupervised_file), "isolation_forest")
            .map(|model| ModelSlot::filled(Arc::new(OutlierDetector::new(model))))
            .unwrap_or_default();

        if !supervised.is_loaded() && !unsupervised.is_loaded() {
            anyhow::bail!("No models loaded from {}", models_dir.display());
        }

        Ok((supervised, unsupervised))
    }

    fn load_optional(&self, path: &Path, name: &str) -> Option<LoadedModel> {
        if !path.exists() {
            warn!(model = %name, path = %path.display(), "Model file not found, slot left empty");
            return None;
        }

        match self.load_model(path, name) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!(model = %name, error = %e, "Failed to load model, slot left empty");
                None
            }
        }
    }
}

/// Load the scaler and encoders saved by the training job
pub fn load_preprocessing<P: AsRef<Path>>(path: P) -> Result<Preprocessor> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read preprocessing artifact {}", path.display()))?;
    let artifact: PreprocessingArtifact = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse preprocessing artifact {}", path.display()))?;
    let preprocessor = Preprocessor::try_from(artifact)?;

    info!(
        path = %path.display(),
        scaler_mean = preprocessor.scaler.mean,
        scaler_scale = preprocessor.scaler.scale,
        "Preprocessing artifact loaded"
    );

    Ok(preprocessor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::CategoricalField;
    use std::io::Write;

    #[test]
    fn test_load_preprocessing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "amount_scaler": {{"mean": 250.0, "scale": 100.0}},
                "encoders": {{
                    "Merchant_Category": ["clothing", "electronics"],
                    "Location": ["Chicago", "New York"]
                }}
            }}"#
        )
        .unwrap();

        let preprocessor = load_preprocessing(file.path()).unwrap();
        assert_eq!(preprocessor.scaler.transform(350.0), 1.0);
        assert_eq!(
            preprocessor
                .encoders
                .encode(CategoricalField::Location, "New York")
                .code,
            1
        );
    }

    #[test]
    fn test_missing_preprocessing_is_fatal() {
        let err = load_preprocessing("/nonexistent/preprocessing.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_malformed_preprocessing_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(load_preprocessing(file.path()).is_err());
    }
}
