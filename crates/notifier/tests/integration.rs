//! Integration tests for the delivery pipeline.
//!
//! Fake transports drive the retry and handoff behaviour; the HTTP transport
//! is exercised against a `wiremock` sink.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use runcast_common::types::{DeliveryState, Envelope, ObjectReference, Severity, WorkItem};
use runcast_notifier::retry::{RetryResult, send_with_retries};
use runcast_notifier::{
    DeliveryPipeline, DiagnosticSink, HttpTransport, Outcome, RetryPolicy, Transport,
};

// ============================================================
// Shared helpers
// ============================================================

fn pipeline_run(status: &str, reason: &str) -> WorkItem {
    serde_json::from_value(serde_json::json!({
        "apiVersion": "tekton.dev/v1beta1",
        "kind": "PipelineRun",
        "metadata": {
            "uid": "pr-7",
            "name": "release-42",
            "namespace": "ci",
            "selfLink": "/apis/tekton.dev/v1beta1/namespaces/ci/pipelineruns/release-42"
        },
        "spec": { "pipelineRef": { "name": "release" } },
        "status": {
            "conditions": [{ "type": "Succeeded", "status": status, "reason": reason }]
        }
    }))
    .unwrap()
}

fn envelope() -> Envelope {
    runcast_engine::envelope_for(&pipeline_run("Unknown", "Running")).unwrap()
}

/// Rejects the first `reject_first` attempts, then acknowledges.
struct FlakyTransport {
    reject_first: u32,
    retryable: bool,
    attempts: Arc<AtomicU32>,
    attempted: Arc<Notify>,
}

impl FlakyTransport {
    fn new(reject_first: u32) -> Self {
        Self {
            reject_first,
            retryable: true,
            attempts: Arc::new(AtomicU32::new(0)),
            attempted: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn send(&self, _envelope: &Envelope) -> Outcome {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.attempted.notify_one();
        if attempt <= self.reject_first {
            Outcome::Rejected {
                reason: format!("sink unavailable ({})", attempt),
                retryable: self.retryable,
            }
        } else {
            Outcome::Acknowledged
        }
    }
}

/// Blocks every send until the gate is opened.
struct GatedTransport {
    gate: Arc<Notify>,
    started: Arc<AtomicU32>,
}

#[async_trait]
impl Transport for GatedTransport {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn send(&self, _envelope: &Envelope) -> Outcome {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Outcome::Acknowledged
    }
}

#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<(ObjectReference, Severity, String, String)>>,
}

impl RecordingSink {
    fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, subject: &ObjectReference, severity: Severity, reason: &str, message: &str) {
        self.records.lock().unwrap().push((
            subject.clone(),
            severity,
            reason.to_string(),
            message.to_string(),
        ));
    }
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::exponential(Duration::from_millis(1), max_attempts)
}

// ============================================================
// Retry loop
// ============================================================

#[tokio::test]
async fn test_retry_acknowledged_on_last_attempt() {
    let transport = FlakyTransport::new(4);
    let result = send_with_retries(
        &transport,
        &envelope(),
        &fast_policy(5),
        &CancellationToken::new(),
    )
    .await;
    assert_eq!(result, RetryResult::Acknowledged { attempts: 5 });
}

#[tokio::test]
async fn test_retry_exhausted() {
    let transport = FlakyTransport::new(u32::MAX);
    let result = send_with_retries(
        &transport,
        &envelope(),
        &fast_policy(4),
        &CancellationToken::new(),
    )
    .await;
    assert_eq!(
        result,
        RetryResult::Exhausted {
            attempts: 4,
            last_error: "sink unavailable (4)".to_string(),
        }
    );
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_non_retryable_rejection_stops_immediately() {
    let mut transport = FlakyTransport::new(u32::MAX);
    transport.retryable = false;
    let result = send_with_retries(
        &transport,
        &envelope(),
        &fast_policy(10),
        &CancellationToken::new(),
    )
    .await;
    assert!(matches!(result, RetryResult::Exhausted { attempts: 1, .. }));
}

#[tokio::test]
async fn test_cancelled_before_first_attempt() {
    let transport = FlakyTransport::new(0);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = send_with_retries(&transport, &envelope(), &fast_policy(3), &cancel).await;
    assert_eq!(result, RetryResult::Cancelled { attempts: 0 });
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 0);
}

// ============================================================
// Pipeline handoff and terminal states
// ============================================================

#[tokio::test]
async fn test_deliver_returns_before_send_completes() {
    let gate = Arc::new(Notify::new());
    let started = Arc::new(AtomicU32::new(0));
    let pipeline = DeliveryPipeline::new(fast_policy(3)).with_transport(Arc::new(GatedTransport {
        gate: gate.clone(),
        started: started.clone(),
    }));

    let handle = tokio::time::timeout(
        Duration::from_secs(1),
        pipeline.send_with_retries(&pipeline_run("Unknown", "Started")),
    )
    .await
    .expect("caller must not wait for the transport")
    .unwrap();
    assert!(!handle.is_finished());

    gate.notify_one();
    assert_eq!(handle.wait().await, Some(DeliveryState::Acknowledged));
    assert_eq!(started.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_eventual_ack_records_nothing() {
    let transport = Arc::new(FlakyTransport::new(2));
    let sink = Arc::new(RecordingSink::default());
    let pipeline = DeliveryPipeline::new(fast_policy(3))
        .with_transport(transport.clone())
        .with_diagnostic_sink(sink.clone());

    let handle = pipeline
        .send_with_retries(&pipeline_run("True", "Succeeded"))
        .await
        .unwrap();
    assert_eq!(handle.wait().await, Some(DeliveryState::Acknowledged));
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(sink.len(), 0);
}

#[tokio::test]
async fn test_exhaustion_records_one_warning() {
    let transport = Arc::new(FlakyTransport::new(u32::MAX));
    let sink = Arc::new(RecordingSink::default());
    let pipeline = DeliveryPipeline::new(fast_policy(3))
        .with_transport(transport.clone())
        .with_diagnostic_sink(sink.clone());

    let handle = pipeline
        .send_with_retries(&pipeline_run("False", "Failed"))
        .await
        .unwrap();
    assert_eq!(handle.wait().await, Some(DeliveryState::Failed));

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);

    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    let (subject, severity, reason, message) = &records[0];
    assert_eq!(subject.kind, "PipelineRun");
    assert_eq!(subject.name, "release-42");
    assert_eq!(*severity, Severity::Warning);
    assert_eq!(reason, "delivery failure");
    assert_eq!(message, "sink unavailable (3)");
}

#[tokio::test]
async fn test_cancel_during_backoff() {
    let transport = Arc::new(FlakyTransport::new(u32::MAX));
    let sink = Arc::new(RecordingSink::default());
    let token = CancellationToken::new();
    let pipeline = DeliveryPipeline::new(RetryPolicy::exponential(Duration::from_secs(5), 10))
        .with_transport(transport.clone())
        .with_diagnostic_sink(sink.clone())
        .with_cancellation(token.clone());

    let handle = pipeline
        .send_with_retries(&pipeline_run("Unknown", "Running"))
        .await
        .unwrap();

    transport.attempted.notified().await;
    token.cancel();

    let state = tokio::time::timeout(Duration::from_secs(1), handle.wait())
        .await
        .expect("cancelled delivery must exit promptly");
    assert_eq!(state, Some(DeliveryState::Cancelled));
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(sink.len(), 0);
}

#[tokio::test]
async fn test_cancel_in_flight_send() {
    let gate = Arc::new(Notify::new());
    let started = Arc::new(AtomicU32::new(0));
    let sink = Arc::new(RecordingSink::default());
    let pipeline = DeliveryPipeline::new(fast_policy(3))
        .with_transport(Arc::new(GatedTransport {
            gate,
            started: started.clone(),
        }))
        .with_diagnostic_sink(sink.clone());

    let handle = pipeline
        .send_with_retries(&pipeline_run("Unknown", "Running"))
        .await
        .unwrap();
    pipeline.cancellation_token().cancel();

    assert_eq!(handle.wait().await, Some(DeliveryState::Cancelled));
    assert_eq!(sink.len(), 0);
}

#[tokio::test]
async fn test_concurrent_deliveries_are_independent() {
    let transport = Arc::new(FlakyTransport::new(0));
    let pipeline = DeliveryPipeline::new(fast_policy(3)).with_transport(transport.clone());

    let mut handles = Vec::new();
    for (status, reason) in [("Unknown", "Started"), ("Unknown", "Running"), ("True", "Succeeded")] {
        handles.push(
            pipeline
                .send_with_retries(&pipeline_run(status, reason))
                .await
                .unwrap(),
        );
    }

    let mut ids: Vec<_> = handles.iter().map(|h| h.envelope_id()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    for handle in handles {
        assert_eq!(handle.wait().await, Some(DeliveryState::Acknowledged));
    }
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
}

// ============================================================
// HTTP transport
// ============================================================

#[tokio::test]
async fn test_http_binary_mode_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(header("ce-specversion", "1.0"))
        .and(header("ce-type", "cd.pipelinerun.started.v1"))
        .and(header("ce-subject", "release-42"))
        .and(header(
            "ce-source",
            "/apis/tekton.dev/v1beta1/namespaces/ci/pipelineruns/release-42",
        ))
        .and(header("ce-status", "Running"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let transport =
        HttpTransport::new(format!("{}/events", server.uri()), Duration::from_secs(2)).unwrap();
    let pipeline = DeliveryPipeline::new(fast_policy(3)).with_transport(Arc::new(transport));

    let handle = pipeline
        .send_with_retries(&pipeline_run("Unknown", "Running"))
        .await
        .unwrap();
    assert_eq!(handle.wait().await, Some(DeliveryState::Acknowledged));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let embedded = body["pipelinerun"].as_str().unwrap();
    assert!(embedded.contains("\"release-42\""));
}

#[tokio::test]
async fn test_http_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let transport = HttpTransport::new(server.uri(), Duration::from_secs(2)).unwrap();
    let pipeline = DeliveryPipeline::new(fast_policy(3))
        .with_transport(Arc::new(transport))
        .with_diagnostic_sink(sink.clone());

    let handle = pipeline
        .send_with_retries(&pipeline_run("False", "Failed"))
        .await
        .unwrap();
    assert_eq!(handle.wait().await, Some(DeliveryState::Failed));
    assert_eq!(sink.len(), 1);
    assert!(sink.records.lock().unwrap()[0].3.contains("503"));
}

#[tokio::test]
async fn test_http_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(server.uri(), Duration::from_secs(2)).unwrap();
    let pipeline = DeliveryPipeline::new(fast_policy(5)).with_transport(Arc::new(transport));

    let handle = pipeline
        .send_with_retries(&pipeline_run("True", "Succeeded"))
        .await
        .unwrap();
    assert_eq!(handle.wait().await, Some(DeliveryState::Failed));
}
