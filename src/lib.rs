//! Fraud Shield
//!
//! Hybrid fraud decision engine: a supervised classifier and an unsupervised
//! outlier detector vote on every transaction, failures fail closed, and each
//! verdict is fanned out to live observers.

pub mod api;
pub mod broadcast;
pub mod config;
pub mod consumer;
pub mod encoder;
pub mod error;
pub mod fallback;
pub mod feature_assembler;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod types;

pub use broadcast::{BroadcastHub, ObserverHandle};
pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use feature_assembler::{FeatureAssembler, FeatureVector};
pub use models::inference::HybridEngine;
pub use pipeline::{DetectionCore, FraudShield};
pub use producer::VerdictProducer;
pub use types::{transaction::Transaction, verdict::Verdict};
