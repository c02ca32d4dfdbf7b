//! HTTP and WebSocket surface

use crate::broadcast::{BroadcastHub, ObserverHandle};
use crate::metrics::MetricsSnapshot;
use crate::pipeline::FraudShield;
use crate::types::transaction::Transaction;
use crate::types::verdict::Verdict;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub shield: Arc<FraudShield>,
}

impl AppState {
    pub fn new(shield: Arc<FraudShield>) -> Self {
        Self { shield }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/predict", post(predict))
        .route("/metrics", get(metrics))
        .route("/ws", get(subscribe))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "Fraud Detection API is Online",
        "model_mode": state.shield.mode(),
        "observers": state.shield.hub().observer_count(),
    }))
}

async fn predict(State(state): State<AppState>, Json(tx): Json<Transaction>) -> Json<Verdict> {
    Json(state.shield.process(tx).await)
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    let hub = state.shield.hub();
    Json(
        state
            .shield
            .metrics()
            .snapshot(hub.stats(), hub.observer_count()),
    )
}

async fn subscribe(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| observe(socket, state))
}

async fn observe(socket: WebSocket, state: AppState) {
    let hub = state.shield.hub().clone();
    let handle = hub.subscribe();
    let (sink, stream) = socket.split();
    pump(hub, handle, sink, stream).await;
}

/// Pump broadcast payloads into one connection until either side goes away,
/// then unsubscribe it
async fn pump<S, R>(hub: Arc<BroadcastHub>, mut handle: ObserverHandle, mut sink: S, mut stream: R)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let observer_id = handle.id();
    info!(observer_id = %observer_id, observers = hub.observer_count(), "Observer connected");

    loop {
        tokio::select! {
            payload = handle.recv() => match payload {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        debug!(observer_id = %observer_id, error = %e, "Observer send failed");
                        break;
                    }
                }
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    hub.unsubscribe(observer_id);
    info!(observer_id = %observer_id, "Observer disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_assembler::tests::preprocessor;
    use crate::feature_assembler::FeatureAssembler;
    use crate::metrics::PipelineMetrics;
    use crate::models::detector::testing::fixed;
    use crate::models::inference::HybridEngine;
    use crate::pipeline::DetectionCore;
    use crate::types::verdict::BroadcastPayload;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use futures::channel::mpsc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state() -> AppState {
        let core = DetectionCore::new(
            FeatureAssembler::new(preprocessor()),
            HybridEngine::new(fixed("xgboost", false), fixed("isolation_forest", false)).unwrap(),
        );
        AppState::new(Arc::new(FraudShield::new(
            core,
            Arc::new(BroadcastHub::new(8)),
            Arc::new(PipelineMetrics::new()),
            Duration::from_secs(5),
        )))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_predict(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_status_reports_mode() {
        let response = create_router(state())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["model_mode"], "hybrid");
        assert_eq!(body["observers"], 0);
    }

    #[tokio::test]
    async fn test_predict_clean_transaction() {
        let response = create_router(state())
            .oneshot(post_predict(json!({
                "Transaction_ID": "TXN1",
                "User_ID": "USER1",
                "Transaction_Amount": 45.0,
                "Merchant_Category": "groceries",
                "Location": "New York",
                "Timestamp": "2026-02-14 12:00:00"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["is_fraud"], false);
        assert_eq!(body["model_used"], "supervised");
        assert_eq!(body["confidence"], "Normal");
        assert_eq!(body["details"]["iso_forest_flag"], false);
    }

    #[tokio::test]
    async fn test_predict_malformed_amount_is_still_ok() {
        let response = create_router(state())
            .oneshot(post_predict(json!({
                "Transaction_ID": "TXN2",
                "User_ID": "USER1",
                "Transaction_Amount": "NaN-ish",
                "Merchant_Category": "electronics",
                "Location": "Mars_Base_1",
                "Timestamp": "2026-02-14 12:00:00"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["is_fraud"], true);
        assert_eq!(body["model_used"], "emergency_filter");
        assert_eq!(body["confidence"], "Anomaly");
        assert!(body["reason"].is_string());
    }

    #[tokio::test]
    async fn test_predict_wrongly_typed_fields_is_still_ok() {
        let response = create_router(state())
            .oneshot(post_predict(json!({
                "Transaction_ID": null,
                "User_ID": 42,
                "Transaction_Amount": 45.0,
                "Merchant_Category": "groceries",
                "Location": 123,
                "Timestamp": "2026-02-14 12:00:00"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["is_fraud"], true);
        assert_eq!(body["model_used"], "emergency_filter");
        assert_eq!(body["reason"], "Malformed Transaction Record Detected");
    }

    #[tokio::test]
    async fn test_observer_receives_payload_and_leaves_on_close() {
        let state = state();
        let hub = state.shield.hub().clone();
        let (outgoing, mut client_inbox) = mpsc::channel::<Message>(8);
        let (mut client_outbox, incoming) = mpsc::channel::<Result<Message, axum::Error>>(8);

        let pumping = tokio::spawn(pump(hub.clone(), hub.subscribe(), outgoing, incoming));
        assert_eq!(hub.observer_count(), 1);

        let tx = Transaction::new("TXN4", "USER1", 45.0, "groceries", "Chicago");
        let verdict = state.shield.process(tx.clone()).await;

        match client_inbox.next().await {
            Some(Message::Text(text)) => {
                let payload: BroadcastPayload = serde_json::from_str(&text).unwrap();
                assert_eq!(payload.tx, tx);
                assert_eq!(payload.analysis.verdict, verdict);
            }
            other => panic!("expected a text frame, got {other:?}"),
        }

        client_outbox.send(Ok(Message::Close(None))).await.unwrap();
        pumping.await.unwrap();
        assert_eq!(hub.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_observer_leaves_when_send_fails() {
        let state = state();
        let hub = state.shield.hub().clone();
        let (outgoing, client_inbox) = mpsc::channel::<Message>(8);
        let (_client_outbox, incoming) = mpsc::channel::<Result<Message, axum::Error>>(8);

        let pumping = tokio::spawn(pump(hub.clone(), hub.subscribe(), outgoing, incoming));
        drop(client_inbox);

        let tx = Transaction::new("TXN5", "USER1", 45.0, "groceries", "Chicago");
        state.shield.process(tx).await;

        pumping.await.unwrap();
        assert_eq!(hub.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_observer_leaves_when_stream_ends() {
        let state = state();
        let hub = state.shield.hub().clone();
        let (outgoing, _client_inbox) = mpsc::channel::<Message>(8);
        let (client_outbox, incoming) = mpsc::channel::<Result<Message, axum::Error>>(8);

        let pumping = tokio::spawn(pump(hub.clone(), hub.subscribe(), outgoing, incoming));
        drop(client_outbox);

        pumping.await.unwrap();
        assert_eq!(hub.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_metrics_after_predict() {
        let state = state();
        let router = create_router(state.clone());

        router
            .clone()
            .oneshot(post_predict(json!({
                "Transaction_ID": "TXN3",
                "Transaction_Amount": 10.0,
                "Merchant_Category": "groceries",
                "Location": "Chicago"
            })))
            .await
            .unwrap();

        let response = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["transactions_processed"], 1);
        assert_eq!(body["verdicts_by_model"]["supervised"], 1);
    }
}
