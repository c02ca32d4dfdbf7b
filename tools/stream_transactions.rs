//! Live Transaction Streamer
//!
//! Generates a mix of normal, high-value and statistically anomalous
//! transactions and sends them to the fraud shield, either over HTTP
//! (printing each verdict) or to the NATS transaction subject.
//!
//! Usage: stream_transactions [http|nats] [target] [count] [delay_ms]

use fraud_shield::Transaction;
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

const CATEGORIES: [&str; 5] = ["groceries", "electronics", "travel", "pharmacy", "gaming"];
const LOCATIONS: [&str; 5] = ["Mumbai", "New York", "London", "Hyderabad", "Dubai"];
const ANOMALOUS_LOCATIONS: [&str; 4] = [
    "Proxy_Server_7",
    "VPN_Tunnel_Alpha",
    "Dark_Net_Relay",
    "Unknown_Origin",
];

/// What the generator was trying to produce
#[derive(Debug, Clone, Copy)]
enum Intent {
    Normal,
    HighValue,
    Anomaly,
}

/// Subset of the verdict the streamer prints
#[derive(Debug, Deserialize)]
struct VerdictSummary {
    is_fraud: bool,
    model_used: String,
    #[serde(default)]
    confidence: String,
}

/// Transaction generator for live testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// 70% normal, 20% high-value attack, 10% statistical anomaly
    fn generate(&mut self) -> (Transaction, Intent) {
        let roll: f64 = self.rng.gen();

        let (amount, location, intent) = if roll < 0.70 {
            (self.rng.gen_range(10.0..500.0), self.choice(&LOCATIONS), Intent::Normal)
        } else if roll < 0.90 {
            (
                self.rng.gen_range(8000.0..15000.0),
                self.choice(&LOCATIONS),
                Intent::HighValue,
            )
        } else {
            (
                self.rng.gen_range(5.0..50.0),
                self.choice(&ANOMALOUS_LOCATIONS),
                Intent::Anomaly,
            )
        };

        let tx = Transaction::new(
            format!("LIVE_{}", self.rng.gen_range(1000..10000)),
            format!("USER_{}", self.rng.gen_range(10..100)),
            (amount * 100.0_f64).round() / 100.0,
            self.choice(&CATEGORIES),
            location,
        );

        (tx, intent)
    }

    fn choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stream_transactions=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mode = args.get(1).map(|s| s.as_str()).unwrap_or("http");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(2000);

    info!("FRAUD SHIELD LIVE MONITORING STARTED");

    match mode {
        "nats" => {
            let url = args.get(2).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
            stream_nats(url, "transactions", count, delay_ms).await
        }
        _ => {
            let url = args
                .get(2)
                .map(|s| s.as_str())
                .unwrap_or("http://127.0.0.1:8000/predict");
            stream_http(url, count, delay_ms).await
        }
    }
}

async fn stream_http(url: &str, count: u64, delay_ms: u64) -> anyhow::Result<()> {
    info!(target_url = %url, count = count, delay_ms = delay_ms, "Streaming over HTTP");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let mut generator = TransactionGenerator::new();

    for _ in 0..count {
        let (tx, intent) = generator.generate();

        match client.post(url).json(&tx).send().await {
            Ok(response) if response.status().is_success() => {
                let verdict: VerdictSummary = response.json().await?;
                let status = if verdict.is_fraud { "[FRAUD]" } else { "[CLEAN]" };
                info!(
                    "{} ID: {} | Intent: {:<10} | Model: {:<16} | Confidence: {}",
                    status,
                    tx.transaction_id,
                    format!("{:?}", intent),
                    verdict.model_used,
                    verdict.confidence
                );
            }
            Ok(response) => {
                warn!(status = %response.status(), "Unexpected response from API");
            }
            Err(e) => {
                warn!(error = %e, "API unreachable. Running in dry-run mode.");
                return run_dry_mode(count, delay_ms).await;
            }
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Stopping live monitor");
    Ok(())
}

async fn stream_nats(url: &str, subject: &str, count: u64, delay_ms: u64) -> anyhow::Result<()> {
    let client = match async_nats::connect(url).await {
        Ok(c) => {
            info!(nats_url = %url, "Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, delay_ms).await;
        }
    };

    let mut generator = TransactionGenerator::new();

    for i in 0..count {
        let (tx, _) = generator.generate();
        let payload = serde_json::to_vec(&tx)?;

        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!("Published {}/{} transactions", i + 1, count);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    client.flush().await?;
    info!("Completed! Published {} transactions", count);
    Ok(())
}

async fn run_dry_mode(count: u64, delay_ms: u64) -> anyhow::Result<()> {
    let mut generator = TransactionGenerator::new();

    for i in 0..count {
        let (tx, intent) = generator.generate();

        if (i + 1) % 10 == 0 || i == 0 {
            info!(
                "Sample transaction {} ({:?}):\n{}",
                i + 1,
                intent,
                serde_json::to_string_pretty(&tx)?
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
