use thiserror::Error;

use crate::types::{ConditionStatus, WorkItemKind};

/// Errors surfaced synchronously to the caller of an emission.
///
/// Transport failures never show up here: they happen after the caller has
/// returned and are reported through logs and the diagnostic sink instead.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("no Succeeded condition on {kind}")]
    MissingCondition { kind: WorkItemKind },

    #[error("{kind} has unknown status with unrecognized reason {reason:?}")]
    UnrecognizedReason { kind: WorkItemKind, reason: String },

    #[error("{kind} has condition in unknown state {status:?}")]
    UnknownConditionState {
        kind: WorkItemKind,
        status: ConditionStatus,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no notification transport configured")]
    NoTransportConfigured,

    #[error("object does not expose a condition: {0}")]
    UnsupportedObjectType(String),

    #[error("delivery task exited before signalling start")]
    DispatchAborted,
}
