//! Condition classifier.
//!
//! Maps a work item's `Succeeded` condition to a notification kind and a
//! lifecycle status. Finished and failed runs deliberately share the same
//! notification kind; only [`LifecycleStatus`] tells them apart.

use runcast_common::error::EmitError;
use runcast_common::types::{
    CONDITION_SUCCEEDED, ConditionStatus, LifecycleStatus, NotificationKind, WorkItem, WorkItemKind,
};

/// Reason written by the controller when a run has been accepted.
pub const REASON_STARTED: &str = "Started";
/// Reason written by the controller while a run executes.
pub const REASON_RUNNING: &str = "Running";

/// Derive `(kind, status)` for a work item.
pub fn classify(item: &WorkItem) -> Result<(NotificationKind, LifecycleStatus), EmitError> {
    let kind = item.kind();
    let condition = item
        .condition(CONDITION_SUCCEEDED)
        .ok_or(EmitError::MissingCondition { kind })?;

    match &condition.status {
        ConditionStatus::Unknown => {
            let notification = in_progress_kind(kind, &condition.reason)?;
            Ok((notification, LifecycleStatus::Running))
        }
        ConditionStatus::True => Ok((finished_kind(kind), LifecycleStatus::Finished)),
        ConditionStatus::False => Ok((finished_kind(kind), LifecycleStatus::Error)),
        ConditionStatus::Other(_) => Err(EmitError::UnknownConditionState {
            kind,
            status: condition.status.clone(),
        }),
    }
}

/// Notification kind for an in-progress run. Reason matching is exact and case-sensitive.
fn in_progress_kind(kind: WorkItemKind, reason: &str) -> Result<NotificationKind, EmitError> {
    let notification = match (kind, reason) {
        (WorkItemKind::TaskRun, REASON_STARTED) => NotificationKind::TaskRunStarted,
        (WorkItemKind::TaskRun, REASON_RUNNING) => NotificationKind::TaskRunStarted,
        (WorkItemKind::PipelineRun, REASON_STARTED) => NotificationKind::PipelineRunQueued,
        (WorkItemKind::PipelineRun, REASON_RUNNING) => NotificationKind::PipelineRunStarted,
        _ => {
            return Err(EmitError::UnrecognizedReason {
                kind,
                reason: reason.to_string(),
            });
        }
    };
    Ok(notification)
}

fn finished_kind(kind: WorkItemKind) -> NotificationKind {
    match kind {
        WorkItemKind::TaskRun => NotificationKind::TaskRunFinished,
        WorkItemKind::PipelineRun => NotificationKind::PipelineRunFinished,
    }
}
