use async_trait::async_trait;

use runcast_common::types::Envelope;

/// Result of a single send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Acknowledged,
    /// The transport decides whether another attempt may succeed.
    Rejected { reason: String, retryable: bool },
}

impl Outcome {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Outcome::Rejected {
            reason: reason.into(),
            retryable: true,
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Outcome::Rejected {
            reason: reason.into(),
            retryable: false,
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Outcome::Acknowledged)
    }
}

/// Something that can put an envelope on the wire.
///
/// Implementations must be safe to share across concurrent deliveries.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs (e.g. "http").
    fn name(&self) -> &'static str;

    /// Make one delivery attempt. Retries are driven by the caller.
    async fn send(&self, envelope: &Envelope) -> Outcome;
}
