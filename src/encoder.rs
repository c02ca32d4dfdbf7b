//! Categorical encoders and amount scaler learned at training time.
//!
//! State here is loaded once at startup and then shared read-only by every
//! inference call. Encoding is total: a value outside the training vocabulary
//! maps to [`SENTINEL_CODE`] and is reported as unseen instead of failing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Code assigned to categorical values never seen during training
pub const SENTINEL_CODE: u32 = 0;

/// Categorical columns the models were trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoricalField {
    MerchantCategory,
    Location,
}

impl CategoricalField {
    /// Column name used in the training data and artifact file
    pub fn column(&self) -> &'static str {
        match self {
            CategoricalField::MerchantCategory => "Merchant_Category",
            CategoricalField::Location => "Location",
        }
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Result of encoding one categorical value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    pub code: u32,
    /// False when the value was outside the vocabulary and got the sentinel
    pub seen: bool,
}

/// Fixed vocabulary for one categorical column
#[derive(Debug, Clone)]
pub struct CategoryEncoder {
    vocabulary: HashMap<String, u32>,
    classes: usize,
}

impl CategoryEncoder {
    /// Build an encoder from the training classes; code = position.
    ///
    /// Classes are normalized the same way lookups are. If two classes
    /// collapse to the same key the first code is kept.
    pub fn from_classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocabulary = HashMap::new();
        let mut count = 0usize;
        for (code, class) in classes.into_iter().enumerate() {
            vocabulary
                .entry(normalize(class.as_ref()))
                .or_insert(code as u32);
            count += 1;
        }

        Self {
            vocabulary,
            classes: count,
        }
    }

    /// Map a raw value to its training code, never failing
    pub fn encode(&self, raw: &str) -> Encoding {
        match self.vocabulary.get(&normalize(raw)) {
            Some(&code) => Encoding { code, seen: true },
            None => Encoding {
                code: SENTINEL_CODE,
                seen: false,
            },
        }
    }

    /// Number of training classes
    pub fn len(&self) -> usize {
        self.classes
    }

    pub fn is_empty(&self) -> bool {
        self.classes == 0
    }
}

/// Trim and lowercase a categorical value before lookup
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Standard scaler parameters for the amount column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountScaler {
    pub mean: f64,
    pub scale: f64,
}

impl AmountScaler {
    pub fn new(mean: f64, scale: f64) -> Self {
        Self { mean, scale }
    }

    /// `(amount - mean) / scale`; a zero scale means a constant column
    pub fn transform(&self, amount: f64) -> f64 {
        let scale = if self.scale == 0.0 { 1.0 } else { self.scale };
        (amount - self.mean) / scale
    }
}

/// Encoders for every categorical column
#[derive(Debug, Clone)]
pub struct EncoderBank {
    merchant_category: CategoryEncoder,
    location: CategoryEncoder,
}

impl EncoderBank {
    pub fn new(merchant_category: CategoryEncoder, location: CategoryEncoder) -> Self {
        Self {
            merchant_category,
            location,
        }
    }

    /// Encode a raw value for the given column
    pub fn encode(&self, field: CategoricalField, raw: &str) -> Encoding {
        self.encoder(field).encode(raw)
    }

    pub fn encoder(&self, field: CategoricalField) -> &CategoryEncoder {
        match field {
            CategoricalField::MerchantCategory => &self.merchant_category,
            CategoricalField::Location => &self.location,
        }
    }
}

/// On-disk preprocessing artifact produced by the training job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingArtifact {
    pub amount_scaler: AmountScaler,
    pub encoders: HashMap<String, Vec<String>>,
}

/// Everything the feature assembler needs besides the transaction
#[derive(Debug, Clone)]
pub struct Preprocessor {
    pub scaler: AmountScaler,
    pub encoders: EncoderBank,
}

impl Preprocessor {
    pub fn new(scaler: AmountScaler, encoders: EncoderBank) -> Self {
        Self { scaler, encoders }
    }
}

impl TryFrom<PreprocessingArtifact> for Preprocessor {
    type Error = anyhow::Error;

    fn try_from(artifact: PreprocessingArtifact) -> anyhow::Result<Self> {
        let mut encoders = artifact.encoders;
        let mut take = |field: CategoricalField| {
            encoders
                .remove(field.column())
                .map(CategoryEncoder::from_classes)
                .ok_or_else(|| anyhow::anyhow!("No encoder for column {}", field))
        };

        let merchant_category = take(CategoricalField::MerchantCategory)?;
        let location = take(CategoricalField::Location)?;

        if !artifact.amount_scaler.mean.is_finite() || !artifact.amount_scaler.scale.is_finite() {
            anyhow::bail!("Amount scaler parameters must be finite");
        }

        Ok(Self::new(
            artifact.amount_scaler,
            EncoderBank::new(merchant_category, location),
        ))
    }
}
