use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Condition type the classifier reads.
pub const CONDITION_SUCCEEDED: &str = "Succeeded";

/// Tri-state value of a condition.
///
/// Anything outside `True` / `False` / `Unknown` is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
    Other(String),
}

impl From<String> for ConditionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "True" => ConditionStatus::True,
            "False" => ConditionStatus::False,
            "Unknown" => ConditionStatus::Unknown,
            _ => ConditionStatus::Other(value),
        }
    }
}

impl From<ConditionStatus> for String {
    fn from(value: ConditionStatus) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
            ConditionStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A single status condition, as written by the run's own controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Identity metadata of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// Self-locator; empty or absent for runs that were never assigned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    /// Labels, annotations and anything else the controller wrote.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Observed status of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    /// Pod name, results and other kind-specific status fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body shared by every run kind. The `spec` is opaque to the notifier.
///
/// Fields not modelled here are kept in `extra` so the run serializes back whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Kinds of work item the notifier understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkItemKind {
    /// Leaf run: a single task execution.
    TaskRun,
    /// Composite run: a pipeline of task runs.
    PipelineRun,
}

impl WorkItemKind {
    /// Resolve a resource `kind` string. Matching is exact.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "TaskRun" => Some(WorkItemKind::TaskRun),
            "PipelineRun" => Some(WorkItemKind::PipelineRun),
            _ => None,
        }
    }

    /// Key under which the serialized item is stored in the envelope data.
    pub fn payload_key(&self) -> &'static str {
        match self {
            WorkItemKind::TaskRun => "taskrun",
            WorkItemKind::PipelineRun => "pipelinerun",
        }
    }
}

impl std::fmt::Display for WorkItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkItemKind::TaskRun => write!(f, "TaskRun"),
            WorkItemKind::PipelineRun => write!(f, "PipelineRun"),
        }
    }
}

/// A long-running work item observed by the notifier. Read-only here.
///
/// The variant is authoritative for the kind: it decides classification, the
/// payload key and the `kind` written when the item is serialized.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    TaskRun(Run),
    PipelineRun(Run),
}

/// Borrowed view of a run with its kind taken from the `WorkItem` variant.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunView<'a> {
    api_version: &'a str,
    kind: WorkItemKind,
    metadata: &'a ObjectMeta,
    spec: &'a serde_json::Value,
    status: &'a RunStatus,
    #[serde(flatten)]
    extra: &'a serde_json::Map<String, serde_json::Value>,
}

impl Serialize for WorkItem {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let run = self.run();
        RunView {
            api_version: &run.api_version,
            kind: self.kind(),
            metadata: &run.metadata,
            spec: &run.spec,
            status: &run.status,
            extra: &run.extra,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WorkItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let run = Run::deserialize(deserializer)?;
        WorkItem::from_run(run).map_err(|run| {
            serde::de::Error::custom(format!("unsupported work item kind {:?}", run.kind))
        })
    }
}

impl WorkItem {
    /// Wrap a run in the variant named by its `kind`, handing it back if unsupported.
    pub fn from_run(run: Run) -> Result<Self, Run> {
        match WorkItemKind::from_kind(&run.kind) {
            Some(WorkItemKind::TaskRun) => Ok(WorkItem::TaskRun(run)),
            Some(WorkItemKind::PipelineRun) => Ok(WorkItem::PipelineRun(run)),
            None => Err(run),
        }
    }

    pub fn kind(&self) -> WorkItemKind {
        match self {
            WorkItem::TaskRun(_) => WorkItemKind::TaskRun,
            WorkItem::PipelineRun(_) => WorkItemKind::PipelineRun,
        }
    }

    pub fn run(&self) -> &Run {
        match self {
            WorkItem::TaskRun(run) | WorkItem::PipelineRun(run) => run,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        &self.run().metadata
    }

    /// Look up a condition by type.
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.run()
            .status
            .conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    /// Split `apiVersion` into `(group, version)`. Core resources have an empty group.
    pub fn group_version(&self) -> (&str, &str) {
        let api_version = self.run().api_version.as_str();
        match api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version),
        }
    }

    /// Reference handed to the diagnostic sink.
    pub fn object_reference(&self) -> ObjectReference {
        let run = self.run();
        ObjectReference {
            api_version: run.api_version.clone(),
            kind: self.kind().to_string(),
            namespace: run.metadata.namespace.clone(),
            name: run.metadata.name.clone(),
            uid: run.metadata.uid.clone(),
        }
    }
}

/// Pointer to the object a diagnostic record is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

/// Notification vocabulary, versioned per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    TaskRunStarted,
    TaskRunFinished,
    PipelineRunQueued,
    PipelineRunStarted,
    PipelineRunFinished,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TaskRunStarted => "cd.taskrun.started.v1",
            NotificationKind::TaskRunFinished => "cd.taskrun.finished.v1",
            NotificationKind::PipelineRunQueued => "cd.pipelinerun.queued.v1",
            NotificationKind::PipelineRunStarted => "cd.pipelinerun.started.v1",
            NotificationKind::PipelineRunFinished => "cd.pipelinerun.finished.v1",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status carried alongside the notification kind.
///
/// Finished and failed runs share a notification kind; this is what tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleStatus {
    Running,
    Finished,
    Error,
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleStatus::Running => write!(f, "Running"),
            LifecycleStatus::Finished => write!(f, "Finished"),
            LifecycleStatus::Error => write!(f, "Error"),
        }
    }
}

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Normal => write!(f, "Normal"),
            Severity::Warning => write!(f, "Warning"),
        }
    }
}

/// Envelope data: kind-specific key to serialized item.
pub type DataBundle = BTreeMap<String, String>;

/// Fully assembled notification, consumed once by the delivery pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub id: Uuid,
    pub spec_version: &'static str,
    pub kind: NotificationKind,
    pub status: LifecycleStatus,
    pub subject: String,
    pub source: String,
    pub run_uid: String,
    pub data: DataBundle,
    pub time: DateTime<Utc>,
}

/// Terminal state of a background delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryState {
    Acknowledged,
    Failed,
    Cancelled,
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryState::Acknowledged => write!(f, "acknowledged"),
            DeliveryState::Failed => write!(f, "failed"),
            DeliveryState::Cancelled => write!(f, "cancelled"),
        }
    }
}
