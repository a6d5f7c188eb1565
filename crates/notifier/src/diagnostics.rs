//! Fallback reporting for notifications that could not be delivered.

use runcast_common::types::{ObjectReference, Severity};

/// Reason attached to every record about an undeliverable notification.
pub const REASON_DELIVERY_FAILURE: &str = "delivery failure";

/// Side channel for operator-visible failure reports. Best effort, never fails.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, subject: &ObjectReference, severity: Severity, reason: &str, message: &str);
}

/// Sink that writes each record as a structured tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, subject: &ObjectReference, severity: Severity, reason: &str, message: &str) {
        match severity {
            Severity::Warning => tracing::warn!(
                kind = %subject.kind,
                namespace = %subject.namespace,
                name = %subject.name,
                uid = %subject.uid,
                reason,
                message,
                "Diagnostic record"
            ),
            Severity::Normal => tracing::info!(
                kind = %subject.kind,
                namespace = %subject.namespace,
                name = %subject.name,
                uid = %subject.uid,
                reason,
                message,
                "Diagnostic record"
            ),
        }
    }
}
