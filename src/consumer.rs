//! NATS ingest of incoming transactions

use crate::pipeline::FraudShield;
use crate::types::transaction::Transaction;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Consumer for receiving transactions from NATS
pub struct TransactionConsumer {
    client: Client,
    subject: String,
}

impl TransactionConsumer {
    /// Create a new transaction consumer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the transaction subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to transaction subject");
        Ok(subscriber)
    }

    /// Run every received transaction through the pipeline.
    ///
    /// At most `max_inflight` transactions are processed at once. Messages
    /// that are not a JSON object are logged and skipped; any object becomes a
    /// verdict, wrongly typed fields included.
    pub async fn run(self, shield: Arc<FraudShield>, max_inflight: usize) -> Result<()> {
        let mut subscription = self.subscribe().await?;
        let semaphore = Arc::new(Semaphore::new(max_inflight.max(1)));

        while let Some(message) = subscription.next().await {
            let permit = semaphore.clone().acquire_owned().await?;
            let shield = shield.clone();

            tokio::spawn(async move {
                if let Some(transaction) = decode_transaction(&message.payload) {
                    shield.process(transaction).await;
                }
                drop(permit);
            });
        }

        info!(subject = %self.subject, "Transaction subscription closed");
        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Decode one message payload into a transaction
fn decode_transaction(payload: &[u8]) -> Option<Transaction> {
    match serde_json::from_slice(payload) {
        Ok(transaction) => Some(transaction),
        Err(e) => {
            warn!(error = %e, "Failed to deserialize transaction");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastHub;
    use crate::feature_assembler::tests::preprocessor;
    use crate::feature_assembler::FeatureAssembler;
    use crate::metrics::PipelineMetrics;
    use crate::models::detector::testing::fixed;
    use crate::models::inference::HybridEngine;
    use crate::pipeline::DetectionCore;
    use crate::types::verdict::ModelUsed;
    use std::time::Duration;

    fn shield() -> FraudShield {
        let core = DetectionCore::new(
            FeatureAssembler::new(preprocessor()),
            HybridEngine::new(fixed("xgboost", false), fixed("isolation_forest", false)).unwrap(),
        );
        FraudShield::new(
            core,
            Arc::new(BroadcastHub::new(8)),
            Arc::new(PipelineMetrics::new()),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_decode_well_formed_message() {
        let payload = br#"{"Transaction_ID": "TXN1", "Transaction_Amount": 45.0,
            "Merchant_Category": "groceries", "Location": "Chicago"}"#;

        let tx = decode_transaction(payload).unwrap();
        assert_eq!(tx.transaction_id, "TXN1");
    }

    #[test]
    fn test_non_object_messages_are_skipped() {
        assert!(decode_transaction(b"not json").is_none());
        assert!(decode_transaction(br#""a string""#).is_none());
        assert!(decode_transaction(b"42").is_none());
    }

    #[tokio::test]
    async fn test_wrongly_typed_message_still_gets_a_verdict() {
        let shield = shield();
        let mut observer = shield.hub().subscribe();
        let payload = br#"{"Transaction_ID": null, "Transaction_Amount": 45.0,
            "Merchant_Category": "groceries", "Location": 123}"#;

        let tx = decode_transaction(payload).unwrap();
        let verdict = shield.process(tx).await;

        assert!(verdict.is_fraud);
        assert_eq!(verdict.model_used, ModelUsed::EmergencyFilter);
        assert!(observer.try_recv().is_some());
    }
}
