//! Pure notification building: classification, payload and envelope assembly.
//!
//! Nothing here performs I/O. The notifier crate feeds the resulting
//! [`Envelope`](runcast_common::types::Envelope) into its delivery pipeline.

pub mod classifier;
pub mod envelope;
pub mod payload;

use runcast_common::error::EmitError;
use runcast_common::types::{Envelope, WorkItem};

/// Build the envelope for a work item: payload, classification, then assembly.
///
/// Any failure aborts the whole emission; no partial envelope is produced.
pub fn envelope_for(item: &WorkItem) -> Result<Envelope, EmitError> {
    let data = payload::build_payload(item)?;
    let (kind, status) = classifier::classify(item)?;
    tracing::debug!(
        run_kind = %item.kind(),
        name = %item.metadata().name,
        event_type = %kind,
        status = %status,
        "Classified work item"
    );
    Ok(envelope::assemble(item, kind, status, data))
}
