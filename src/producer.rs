//! NATS publication of broadcast payloads

use crate::broadcast::ObserverHandle;
use anyhow::Result;
use async_nats::Client;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Publishes every broadcast payload to a NATS subject
#[derive(Clone)]
pub struct VerdictProducer {
    client: Client,
    subject: String,
}

impl VerdictProducer {
    /// Create a new verdict producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish one serialized payload
    pub async fn publish(&self, payload: String) -> Result<()> {
        self.client
            .publish(self.subject.clone(), payload.into_bytes().into())
            .await?;

        debug!(subject = %self.subject, "Published verdict payload");
        Ok(())
    }

    /// Drain a hub subscription into NATS until the observer is removed
    pub fn spawn_bridge(self, mut handle: ObserverHandle) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                observer_id = %handle.id(),
                subject = %self.subject,
                "NATS verdict bridge started"
            );

            while let Some(payload) = handle.recv().await {
                if let Err(e) = self.publish(payload).await {
                    error!(
                        subject = %self.subject,
                        error = %e,
                        "Failed to publish verdict payload"
                    );
                }
            }

            info!(observer_id = %handle.id(), "NATS verdict bridge stopped");
        })
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
