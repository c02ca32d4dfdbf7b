//! Error taxonomy for the decision and delivery paths
//!
//! Nothing here ever reaches an HTTP caller as a failure: detection errors are
//! turned into emergency verdicts and delivery errors into observer removal.

use std::time::Duration;
use thiserror::Error;

/// A transaction could not be turned into a feature vector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
    #[error("required field {0} is missing")]
    MissingField(&'static str),

    #[error("field {0} has the wrong type")]
    MalformedField(&'static str),

    #[error("transaction amount is not numeric: {0}")]
    NonNumericAmount(String),

    #[error("transaction amount is negative: {0}")]
    NegativeAmount(f64),

    #[error("transaction amount is not finite")]
    NonFiniteAmount,
}

/// A model failed while scoring a feature vector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("model {model} session failed: {message}")]
    Session { model: String, message: String },

    #[error("model {model} produced no usable output")]
    MissingOutput { model: String },

    #[error("model {model} lock poisoned")]
    LockPoisoned { model: String },

    #[error("inference exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("inference worker failed: {0}")]
    Worker(String),
}

/// Any failure on the assemble → evaluate path
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Why a payload could not be handed to one observer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The observer's connection is gone; it is removed from the set
    #[error("observer connection closed")]
    Closed,

    /// The observer's queue is full; this payload is dropped for it
    #[error("observer queue full")]
    Lagging,
}
