//! Payload builder: the whole work item serialized under its kind's key.

use runcast_common::error::EmitError;
use runcast_common::types::{DataBundle, WorkItem};

/// Serialize `item` into a single-entry data bundle.
pub fn build_payload(item: &WorkItem) -> Result<DataBundle, EmitError> {
    let body = serde_json::to_string(item)?;
    let mut data = DataBundle::new();
    data.insert(item.kind().payload_key().to_string(), body);
    Ok(data)
}
