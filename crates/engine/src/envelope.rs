//! Envelope assembly. Total: every valid input yields an envelope.

use chrono::Utc;
use uuid::Uuid;

use runcast_common::types::{DataBundle, Envelope, LifecycleStatus, NotificationKind, WorkItem};

/// CloudEvents spec version stamped on every envelope.
pub const SPEC_VERSION: &str = "1.0";

pub fn assemble(
    item: &WorkItem,
    kind: NotificationKind,
    status: LifecycleStatus,
    data: DataBundle,
) -> Envelope {
    let meta = item.metadata();
    Envelope {
        id: Uuid::new_v4(),
        spec_version: SPEC_VERSION,
        kind,
        status,
        subject: meta.name.clone(),
        source: source_for(item),
        run_uid: meta.uid.clone(),
        data,
        time: Utc::now(),
    }
}

/// The item's self-locator, or a locator synthesized from its identity.
pub fn source_for(item: &WorkItem) -> String {
    let meta = item.metadata();
    match meta.self_link.as_deref() {
        Some(link) if !link.is_empty() => link.to_string(),
        _ => {
            let (group, version) = item.group_version();
            format!(
                "/apis/{}/{}/namespaces/{}/{}/{}",
                group,
                version,
                meta.namespace,
                item.kind(),
                meta.name
            )
        }
    }
}
