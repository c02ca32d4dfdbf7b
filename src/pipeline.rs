//! Per-transaction pipeline: assemble → evaluate → (fallback) → broadcast

use crate::broadcast::BroadcastHub;
use crate::error::{DetectionError, InferenceError};
use crate::fallback::emergency_verdict;
use crate::feature_assembler::FeatureAssembler;
use crate::metrics::PipelineMetrics;
use crate::models::inference::{DetectorMode, HybridEngine};
use crate::types::transaction::Transaction;
use crate::types::verdict::{BroadcastPayload, Verdict};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Read-only decision state shared by every in-flight transaction
pub struct DetectionCore {
    assembler: FeatureAssembler,
    engine: HybridEngine,
}

impl DetectionCore {
    pub fn new(assembler: FeatureAssembler, engine: HybridEngine) -> Self {
        Self { assembler, engine }
    }

    /// Assemble and evaluate, surfacing any failure
    pub fn try_detect(&self, tx: &Transaction) -> Result<Verdict, DetectionError> {
        let features = self.assembler.assemble(tx)?;
        Ok(self.engine.evaluate(&features)?)
    }

    /// Assemble and evaluate, failing closed on any error
    pub fn detect(&self, tx: &Transaction) -> Verdict {
        resolve(tx, self.try_detect(tx))
    }

    pub fn mode(&self) -> DetectorMode {
        self.engine.mode()
    }
}

/// The decision engine wired to the broadcast hub
pub struct FraudShield {
    core: Arc<DetectionCore>,
    hub: Arc<BroadcastHub>,
    metrics: Arc<PipelineMetrics>,
    deadline: Duration,
}

impl FraudShield {
    pub fn new(
        core: DetectionCore,
        hub: Arc<BroadcastHub>,
        metrics: Arc<PipelineMetrics>,
        deadline: Duration,
    ) -> Self {
        Self {
            core: Arc::new(core),
            hub,
            metrics,
            deadline,
        }
    }

    /// Decide on a transaction without broadcasting
    pub fn detect(&self, tx: &Transaction) -> Verdict {
        self.core.detect(tx)
    }

    /// Decide on a transaction and broadcast the verdict.
    ///
    /// Assembly and inference run on the blocking pool under the configured
    /// deadline. Dropping this future before it resolves broadcasts nothing.
    pub async fn process(&self, tx: Transaction) -> Verdict {
        let start = Instant::now();

        let core = self.core.clone();
        let job_tx = tx.clone();
        let job = tokio::task::spawn_blocking(move || core.try_detect(&job_tx));

        let outcome = match tokio::time::timeout(self.deadline, job).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(InferenceError::Worker(join_error.to_string()).into()),
            Err(_) => Err(InferenceError::Timeout(self.deadline).into()),
        };
        let verdict = resolve(&tx, outcome);

        self.metrics.record_verdict(&verdict, start.elapsed());

        let report = self
            .hub
            .broadcast(&BroadcastPayload::new(tx, verdict.clone()));
        self.metrics.record_broadcast(&report);

        verdict
    }

    pub fn mode(&self) -> DetectorMode {
        self.core.mode()
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }
}

/// Turn a detection outcome into a verdict, logging the call
fn resolve(tx: &Transaction, outcome: Result<Verdict, DetectionError>) -> Verdict {
    match outcome {
        Ok(verdict) => {
            let status = if verdict.is_fraud { "FRAUD" } else { "CLEAN" };
            info!(
                transaction_id = %tx.transaction_id,
                unseen = ?verdict.details.as_ref().map(|d| &d.unseen_fields),
                "[{}] ID: {} | Result: {}",
                verdict.model_used.as_str().to_uppercase(),
                tx.transaction_id,
                status
            );
            verdict
        }
        Err(e) => {
            warn!(
                transaction_id = %tx.transaction_id,
                location = ?tx.location,
                error = %e,
                "Detection failed, emergency filter engaged"
            );
            emergency_verdict(&e)
        }
    }
}
