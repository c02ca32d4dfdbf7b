//! Fraud Shield - Main Entry Point
//!
//! Loads the trained artifacts, serves the decision API and verdict feed over
//! HTTP/WebSocket, and optionally bridges transactions and verdicts over NATS.

use anyhow::{Context, Result};
use fraud_shield::{
    api::{create_router, AppState},
    broadcast::BroadcastHub,
    config::{AppConfig, LoggingConfig},
    consumer::TransactionConsumer,
    feature_assembler::FeatureAssembler,
    metrics::{MetricsReporter, PipelineMetrics},
    models::{inference::HybridEngine, loader::load_preprocessing, ModelLoader},
    pipeline::{DetectionCore, FraudShield},
    producer::VerdictProducer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Fraud Shield");
    info!(
        models_dir = %config.models.models_dir,
        timeout_ms = config.pipeline.timeout_ms,
        "Configuration loaded successfully"
    );

    // Preprocessing state is required; model slots may be partially empty
    let preprocessor = Arc::new(load_preprocessing(
        config.model_path(&config.models.preprocessing_file),
    )?);
    let assembler = FeatureAssembler::new(preprocessor);
    info!(
        "Feature assembler initialized ({} features: {:?})",
        assembler.feature_count(),
        assembler.feature_names()
    );

    let loader = ModelLoader::with_threads(config.models.onnx_threads)?;
    let (supervised, unsupervised) = loader.load_slots(&config.models)?;
    let engine = HybridEngine::new(supervised, unsupervised)?;

    let hub = Arc::new(BroadcastHub::new(config.pipeline.observer_buffer));
    let metrics = Arc::new(PipelineMetrics::new());
    let shield = Arc::new(FraudShield::new(
        DetectionCore::new(assembler, engine),
        hub.clone(),
        metrics.clone(),
        Duration::from_millis(config.pipeline.timeout_ms),
    ));
    info!(mode = ?shield.mode(), "Decision engine ready");

    // Periodic summary every 30 seconds
    let reporter_metrics = metrics.clone();
    tokio::spawn(async move {
        MetricsReporter::new(reporter_metrics, 30).start().await;
    });

    if config.nats.enabled {
        let client = async_nats::connect(&config.nats.url)
            .await
            .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
        info!("Connected to NATS at {}", config.nats.url);

        VerdictProducer::new(client.clone(), &config.nats.verdict_subject)
            .spawn_bridge(hub.subscribe());
        info!("Publishing verdicts to: {}", config.nats.verdict_subject);

        let consumer = TransactionConsumer::new(client, &config.nats.transaction_subject);
        let ingest_shield = shield.clone();
        let max_inflight = config.pipeline.max_inflight;
        tokio::spawn(async move {
            if let Err(e) = consumer.run(ingest_shield, max_inflight).await {
                error!(error = %e, "NATS transaction ingest stopped");
            }
        });
    }

    let app = create_router(AppState::new(shield));
    let listener = TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    info!("Fraud Shield listening on {}", config.server.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Fraud Shield shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!(
            "fraud_shield={level},tower_http={level}",
            level = config.level
        ))
        .context("Invalid logging level")?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
