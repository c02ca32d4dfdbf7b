//! Pipeline statistics: verdict counts, latency and observer delivery.

use crate::broadcast::{BroadcastReport, DeliveryStats};
use crate::types::verdict::{ModelUsed, Verdict};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept before the oldest half is discarded
const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for the decision pipeline
pub struct PipelineMetrics {
    transactions_processed: AtomicU64,
    fraud_flagged: AtomicU64,
    unseen_categories: AtomicU64,
    supervised: AtomicU64,
    unsupervised: AtomicU64,
    emergency: AtomicU64,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    observers_removed: AtomicU64,
    payloads_dropped: AtomicU64,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            transactions_processed: AtomicU64::new(0),
            fraud_flagged: AtomicU64::new(0),
            unseen_categories: AtomicU64::new(0),
            supervised: AtomicU64::new(0),
            unsupervised: AtomicU64::new(0),
            emergency: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            observers_removed: AtomicU64::new(0),
            payloads_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a finished verdict
    pub fn record_verdict(&self, verdict: &Verdict, processing_time: Duration) {
        self.transactions_processed.fetch_add(1, Ordering::Relaxed);
        if verdict.is_fraud {
            self.fraud_flagged.fetch_add(1, Ordering::Relaxed);
        }
        if verdict.has_unseen_categories() {
            self.unseen_categories.fetch_add(1, Ordering::Relaxed);
        }
        self.counter(verdict.model_used)
            .fetch_add(1, Ordering::Relaxed);

        let mut times = self
            .processing_times
            .write()
            .unwrap_or_else(|e| e.into_inner());
        times.push(processing_time.as_micros() as u64);
        if times.len() > MAX_SAMPLES {
            times.drain(0..MAX_SAMPLES / 2);
        }
    }

    /// Record the outcome of one broadcast
    pub fn record_broadcast(&self, report: &BroadcastReport) {
        self.observers_removed
            .fetch_add(report.removed.len() as u64, Ordering::Relaxed);
        self.payloads_dropped
            .fetch_add(report.dropped.len() as u64, Ordering::Relaxed);
    }

    pub fn transactions_processed(&self) -> u64 {
        self.transactions_processed.load(Ordering::Relaxed)
    }

    pub fn verdicts_by_model(&self, model_used: ModelUsed) -> u64 {
        self.counter(model_used).load(Ordering::Relaxed)
    }

    fn counter(&self, model_used: ModelUsed) -> &AtomicU64 {
        match model_used {
            ModelUsed::Supervised => &self.supervised,
            ModelUsed::Unsupervised => &self.unsupervised,
            ModelUsed::EmergencyFilter => &self.emergency,
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = self
            .processing_times
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if sorted.is_empty() {
            return ProcessingStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_processed() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Serializable view for the metrics endpoint
    pub fn snapshot(&self, delivery: DeliveryStats, observers: usize) -> MetricsSnapshot {
        let by_model = ModelUsed::ALL
            .iter()
            .map(|m| (m.as_str(), self.verdicts_by_model(*m)))
            .collect();

        MetricsSnapshot {
            transactions_processed: self.transactions_processed(),
            fraud_flagged: self.fraud_flagged.load(Ordering::Relaxed),
            unseen_categories: self.unseen_categories.load(Ordering::Relaxed),
            verdicts_by_model: by_model,
            throughput_tps: self.get_throughput(),
            processing: self.get_processing_stats(),
            observers,
            delivery,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let tx_count = self.transactions_processed();
        let fraud_count = self.fraud_flagged.load(Ordering::Relaxed);
        let fraud_rate = if tx_count > 0 {
            (fraud_count as f64 / tx_count as f64) * 100.0
        } else {
            0.0
        };
        let processing = self.get_processing_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║                FRAUD SHIELD - METRICS SUMMARY                ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Processed: {:>8}  │  Throughput: {:>6.1} tx/s ║",
            tx_count,
            self.get_throughput()
        );
        info!(
            "║ Flagged as Fraud:       {:>8}  │  Fraud Rate: {:>6.1}%     ║",
            fraud_count, fraud_rate
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Verdicts by Strategy:                                        ║");
        for model in ModelUsed::ALL {
            info!(
                "║   {:16}: {:>8}                                  ║",
                model.as_str(),
                self.verdicts_by_model(model)
            );
        }
        info!(
            "║ Unseen categories: {:>6} │ Observers removed: {:>6}        ║",
            self.unseen_categories.load(Ordering::Relaxed),
            self.observers_removed.load(Ordering::Relaxed)
        );
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Metrics endpoint payload
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub transactions_processed: u64,
    pub fraud_flagged: u64,
    pub unseen_categories: u64,
    pub verdicts_by_model: BTreeMap<&'static str, u64>,
    pub throughput_tps: f64,
    pub processing: ProcessingStats,
    pub observers: usize,
    pub delivery: DeliveryStats,
    pub uptime_secs: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::verdict::Confidence;

    fn verdict(is_fraud: bool, model_used: ModelUsed) -> Verdict {
        Verdict {
            is_fraud,
            confidence: if is_fraud {
                Confidence::High
            } else {
                Confidence::Normal
            },
            model_used,
            details: None,
            reason: None,
        }
    }

    #[test]
    fn test_verdict_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_verdict(
            &verdict(false, ModelUsed::Supervised),
            Duration::from_micros(100),
        );
        metrics.record_verdict(
            &verdict(true, ModelUsed::Unsupervised),
            Duration::from_micros(200),
        );
        metrics.record_verdict(
            &verdict(true, ModelUsed::EmergencyFilter),
            Duration::from_micros(300),
        );

        assert_eq!(metrics.transactions_processed(), 3);
        assert_eq!(metrics.verdicts_by_model(ModelUsed::Supervised), 1);
        assert_eq!(metrics.verdicts_by_model(ModelUsed::EmergencyFilter), 1);

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean_us, 200);
        assert_eq!(stats.max_us, 300);
    }

    #[test]
    fn test_snapshot() {
        let metrics = PipelineMetrics::new();
        metrics.record_verdict(&verdict(true, ModelUsed::Supervised), Duration::from_micros(50));
        metrics.record_broadcast(&BroadcastReport {
            delivered: 1,
            dropped: Vec::new(),
            removed: vec![uuid::Uuid::new_v4()],
        });

        let snapshot = metrics.snapshot(DeliveryStats::default(), 2);
        assert_eq!(snapshot.fraud_flagged, 1);
        assert_eq!(snapshot.verdicts_by_model["supervised"], 1);
        assert_eq!(snapshot.verdicts_by_model["emergency_filter"], 0);
        assert_eq!(snapshot.observers, 2);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["verdicts_by_model"]["unsupervised"], 0);
    }

    #[test]
    fn test_empty_stats() {
        let stats = PipelineMetrics::new().get_processing_stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.p99_us, 0);
    }
}
