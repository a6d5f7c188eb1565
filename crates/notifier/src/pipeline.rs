//! Delivery pipeline.
//!
//! Each call builds an envelope synchronously, then spawns one short-lived task
//! that owns it. The caller waits on a oneshot that the task fires as its first
//! action, so `send_with_retries` returns once delivery is *scheduled*. The
//! returned [`DeliveryHandle`] says nothing about whether delivery succeeded;
//! callers that do not care simply drop it.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use runcast_common::error::EmitError;
use runcast_common::types::{DeliveryState, Envelope, ObjectReference, Severity, WorkItem};

use crate::diagnostics::{DiagnosticSink, REASON_DELIVERY_FAILURE};
use crate::retry::{self, RetryPolicy, RetryResult};
use crate::transport::Transport;

/// Entry point for emitting lifecycle notifications.
///
/// Collaborators are injected explicitly; a missing transport is checked on
/// every call and reported as [`EmitError::NoTransportConfigured`].
#[derive(Clone)]
pub struct DeliveryPipeline {
    transport: Option<Arc<dyn Transport>>,
    sink: Option<Arc<dyn DiagnosticSink>>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl DeliveryPipeline {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            transport: None,
            sink: None,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Tie all deliveries started by this pipeline to `token`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Send a notification for an untyped resource.
    ///
    /// Resources that are not a supported run kind fail with
    /// [`EmitError::UnsupportedObjectType`] before anything else is checked.
    pub async fn send_resource_with_retries(
        &self,
        resource: serde_json::Value,
    ) -> Result<DeliveryHandle, EmitError> {
        let item: WorkItem = serde_json::from_value(resource)
            .map_err(|e| EmitError::UnsupportedObjectType(e.to_string()))?;
        self.send_with_retries(&item).await
    }

    /// Send a notification describing the current state of `item`.
    pub async fn send_with_retries(&self, item: &WorkItem) -> Result<DeliveryHandle, EmitError> {
        if self.transport.is_none() {
            return Err(EmitError::NoTransportConfigured);
        }
        let envelope = runcast_engine::envelope_for(item)?;
        self.deliver(envelope, item.object_reference()).await
    }

    /// Schedule delivery of an assembled envelope. `subject` is what a failure
    /// record will point at.
    pub async fn deliver(
        &self,
        envelope: Envelope,
        subject: ObjectReference,
    ) -> Result<DeliveryHandle, EmitError> {
        let transport = self
            .transport
            .clone()
            .ok_or(EmitError::NoTransportConfigured)?;
        let sink = self.sink.clone();
        let policy = self.policy;
        let cancel = self.cancel.child_token();
        let task_cancel = cancel.clone();
        let envelope_id = envelope.id;

        let (started_tx, started_rx) = oneshot::channel();
        let join = tokio::spawn(async move {
            let _ = started_tx.send(());
            run_delivery(transport, sink, policy, task_cancel, envelope, subject).await
        });

        started_rx.await.map_err(|_| EmitError::DispatchAborted)?;

        Ok(DeliveryHandle {
            envelope_id,
            cancel,
            join,
        })
    }
}

/// Handle to a background delivery.
///
/// Dropping it detaches the task; delivery continues regardless.
#[derive(Debug)]
pub struct DeliveryHandle {
    envelope_id: Uuid,
    cancel: CancellationToken,
    join: JoinHandle<DeliveryState>,
}

impl DeliveryHandle {
    pub fn envelope_id(&self) -> Uuid {
        self.envelope_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop this delivery only; other deliveries of the pipeline are unaffected.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the terminal state. `None` if the task panicked or was aborted.
    pub async fn wait(self) -> Option<DeliveryState> {
        self.join.await.ok()
    }

    /// Wait for the terminal state, cancelling the delivery if `shutdown`
    /// resolves `Ok` first. A failed shutdown listener is logged and ignored.
    pub async fn wait_or_cancel_on<F>(self, shutdown: F) -> Option<DeliveryState>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let cancel = self.cancel.clone();
        let wait = self.wait();
        tokio::pin!(wait);

        tokio::select! {
            state = &mut wait => state,
            signal = shutdown => {
                match signal {
                    Ok(()) => {
                        tracing::info!("Received shutdown signal, cancelling delivery");
                        cancel.cancel();
                    }
                    Err(e) => {
                        warn!(error = %e, "Cannot listen for shutdown signal, waiting for delivery");
                    }
                }
                wait.await
            }
        }
    }
}

async fn run_delivery(
    transport: Arc<dyn Transport>,
    sink: Option<Arc<dyn DiagnosticSink>>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    envelope: Envelope,
    subject: ObjectReference,
) -> DeliveryState {
    debug!(
        event_id = %envelope.id,
        event_type = %envelope.kind,
        transport = transport.name(),
        "Sending cloud event"
    );

    match retry::send_with_retries(transport.as_ref(), &envelope, &policy, &cancel).await {
        RetryResult::Acknowledged { attempts } => {
            debug!(event_id = %envelope.id, attempts, "Cloud event acknowledged");
            DeliveryState::Acknowledged
        }
        RetryResult::Cancelled { attempts } => {
            debug!(event_id = %envelope.id, attempts, "Cloud event delivery cancelled");
            DeliveryState::Cancelled
        }
        RetryResult::Exhausted {
            attempts,
            last_error,
        } => {
            warn!(
                event_id = %envelope.id,
                event_type = %envelope.kind,
                subject = %envelope.subject,
                attempts,
                error = %last_error,
                "Failed to send cloud event"
            );
            match sink {
                Some(sink) => sink.record(
                    &subject,
                    Severity::Warning,
                    REASON_DELIVERY_FAILURE,
                    &last_error,
                ),
                None => warn!(
                    event_id = %envelope.id,
                    "No diagnostic sink configured, cannot record delivery failure"
                ),
            }
            DeliveryState::Failed
        }
    }
}
