//! Type definitions for the fraud shield

pub mod transaction;
pub mod verdict;

pub use transaction::Transaction;
pub use verdict::{BroadcastPayload, Confidence, ModelUsed, Verdict, VerdictDetails};
