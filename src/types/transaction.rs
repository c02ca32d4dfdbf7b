//! Inbound transaction record

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single payment transaction as received from the caller.
///
/// Field names follow the wire format used by the training dataset. Any JSON
/// object deserializes: amount and categoricals are kept as raw JSON values so
/// that a wrongly typed field reaches the feature assembler (and the emergency
/// filter) instead of being rejected at the transport boundary. Identifiers
/// and the timestamp are opaque and coerced to text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Opaque transaction identifier
    #[serde(rename = "Transaction_ID", default, deserialize_with = "opaque_text")]
    pub transaction_id: String,

    /// Opaque user identifier (never used as a feature)
    #[serde(rename = "User_ID", default, deserialize_with = "opaque_text")]
    pub user_id: String,

    /// Transaction amount, expected to be a non-negative number
    #[serde(
        rename = "Transaction_Amount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_amount: Option<Value>,

    /// Merchant category (open vocabulary), expected to be a string
    #[serde(
        rename = "Merchant_Category",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub merchant_category: Option<Value>,

    /// Location (open vocabulary), expected to be a string
    #[serde(rename = "Location", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,

    /// Timestamp string (never used as a feature)
    #[serde(
        rename = "Timestamp",
        default,
        deserialize_with = "opaque_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
}

impl Transaction {
    /// Create a well-formed transaction stamped with the current time
    pub fn new(
        transaction_id: impl Into<String>,
        user_id: impl Into<String>,
        amount: f64,
        merchant_category: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            user_id: user_id.into(),
            transaction_amount: Some(serde_json::json!(amount)),
            merchant_category: Some(Value::String(merchant_category.into())),
            location: Some(Value::String(location.into())),
            timestamp: Some(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// Replace the amount with an arbitrary raw value
    pub fn with_raw_amount(mut self, amount: Value) -> Self {
        self.transaction_amount = Some(amount);
        self
    }

    /// Replace the location with an arbitrary raw value
    pub fn with_raw_location(mut self, location: Value) -> Self {
        self.location = Some(location);
        self
    }
}

/// Render any JSON value as text; null becomes `None`
fn text_of(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn opaque_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_of(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn opaque_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_of(Value::deserialize(deserializer)?))
}
