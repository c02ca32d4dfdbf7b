//! Feature assembly for model inference.
//!
//! Turns one raw transaction into the numeric vector the models were trained
//! on: identifiers and timestamp are dropped, categoricals are encoded and the
//! amount is standard-scaled with the training-time parameters.

use crate::encoder::{CategoricalField, Preprocessor};
use crate::error::AssemblyError;
use crate::types::transaction::Transaction;
use serde_json::Value;
use std::sync::Arc;

/// Number of model input features
pub const FEATURE_COUNT: usize = 3;

/// Model input for one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Scaled transaction amount
    pub amount: f64,
    pub merchant_category_code: u32,
    pub location_code: u32,
    /// Categorical fields that fell back to the sentinel code
    pub unseen_fields: Vec<CategoricalField>,
}

impl FeatureVector {
    /// Features in training column order
    pub fn to_model_input(&self) -> [f32; FEATURE_COUNT] {
        [
            self.amount as f32,
            self.merchant_category_code as f32,
            self.location_code as f32,
        ]
    }
}

/// Stateless assembler over shared, read-only preprocessing state
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    preprocessor: Arc<Preprocessor>,
}

impl FeatureAssembler {
    pub fn new(preprocessor: Arc<Preprocessor>) -> Self {
        Self { preprocessor }
    }

    /// Assemble the feature vector for a transaction
    pub fn assemble(&self, tx: &Transaction) -> Result<FeatureVector, AssemblyError> {
        let amount = parse_amount(tx.transaction_amount.as_ref())?;
        let merchant_category = categorical(
            CategoricalField::MerchantCategory,
            tx.merchant_category.as_ref(),
        )?;
        let location = categorical(CategoricalField::Location, tx.location.as_ref())?;

        let encoders = &self.preprocessor.encoders;
        let mut unseen_fields = Vec::new();

        let merchant = encoders.encode(CategoricalField::MerchantCategory, merchant_category);
        if !merchant.seen {
            unseen_fields.push(CategoricalField::MerchantCategory);
        }

        let place = encoders.encode(CategoricalField::Location, location);
        if !place.seen {
            unseen_fields.push(CategoricalField::Location);
        }

        Ok(FeatureVector {
            amount: self.preprocessor.scaler.transform(amount),
            merchant_category_code: merchant.code,
            location_code: place.code,
            unseen_fields,
        })
    }

    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Feature names in model input order
    pub fn feature_names(&self) -> [&'static str; FEATURE_COUNT] {
        [
            "Transaction_Amount",
            CategoricalField::MerchantCategory.column(),
            CategoricalField::Location.column(),
        ]
    }
}

/// Read a categorical value, which must be a JSON string
fn categorical(field: CategoricalField, raw: Option<&Value>) -> Result<&str, AssemblyError> {
    match raw {
        None | Some(Value::Null) => Err(AssemblyError::MissingField(field.column())),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(AssemblyError::MalformedField(field.column())),
    }
}

/// Read a non-negative finite amount from a raw JSON value.
///
/// Numeric strings are accepted the way a lax request validator would.
fn parse_amount(raw: Option<&Value>) -> Result<f64, AssemblyError> {
    let amount = match raw {
        None | Some(Value::Null) => return Err(AssemblyError::MissingField("Transaction_Amount")),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| AssemblyError::NonNumericAmount(n.to_string()))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| AssemblyError::NonNumericAmount(s.clone()))?,
        Some(other) => return Err(AssemblyError::NonNumericAmount(other.to_string())),
    };

    if !amount.is_finite() {
        return Err(AssemblyError::NonFiniteAmount);
    }
    if amount < 0.0 {
        return Err(AssemblyError::NegativeAmount(amount));
    }

    Ok(amount)
}
