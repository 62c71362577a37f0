//! Invocation and instance data model.
//!
//! `InvocationRequest` is the immutable product of the builder;
//! `ExecutionInstance` is the persisted record the dispatcher creates from it
//! and the tracker mutates through the status state machine.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TriggerReason
// ---------------------------------------------------------------------------

/// Why an instance was created, and (optionally) which instance caused it.
///
/// `parent_id` is a weak back-reference forming a causality forest: it is an
/// identifier only, resolved through the status tracker, never a traversable
/// owning pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerReason {
    /// Human-readable cause description (display only).
    pub message: String,
    /// Instance that caused this one, if any.
    pub parent_id: Option<Uuid>,
}

impl TriggerReason {
    /// Reason for an explicit API invocation.
    pub fn invoked(parent_id: Option<Uuid>) -> Self {
        Self {
            message: "Explicitly invoked via POST WebAPI.".into(),
            parent_id,
        }
    }

    /// Reason for a blob trigger firing on a new/updated input object.
    pub fn new_blob(path: &str) -> Self {
        Self {
            message: format!("New blob input detected: {path}"),
            parent_id: None,
        }
    }

    /// Reason for a queue/service-bus message trigger.
    pub fn new_message(entity: &str) -> Self {
        Self {
            message: format!("New message on '{entity}'."),
            parent_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// InvocationRequest
// ---------------------------------------------------------------------------

/// A fully validated request to invoke a function.
///
/// Fields are private: the only way to obtain one is
/// [`InvocationRequest::build`], and it cannot be mutated afterwards. The
/// dispatcher consumes it by value, so a recorded instance can never be
/// affected by anything the caller does later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub(crate) function_id: String,
    pub(crate) parameters: BTreeMap<String, String>,
    pub(crate) prerequisites: BTreeSet<Uuid>,
    pub(crate) reason: TriggerReason,
}

impl InvocationRequest {
    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Instances that must reach terminal success before this one is
    /// eligible to run. An ordering guarantee, not an ownership relation.
    pub fn prerequisites(&self) -> &BTreeSet<Uuid> {
        &self.prerequisites
    }

    pub fn reason(&self) -> &TriggerReason {
        &self.reason
    }
}

// ---------------------------------------------------------------------------
// InstanceStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of an execution instance.
///
/// Legal transitions: `Queued -> Running -> {Completed, Failed}` and
/// `Queued -> Failed`. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl InstanceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the state machine permits `self -> to`.
    pub fn can_transition_to(self, to: InstanceStatus) -> bool {
        matches!(
            (self, to),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for InstanceStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown instance status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// ExceptionInfo
// ---------------------------------------------------------------------------

/// Failure details, write-once at the `Failed` transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub exception_type: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// ExecutionInstance
// ---------------------------------------------------------------------------

/// One concrete, uniquely identified execution of a function.
///
/// Created by the dispatcher (which is the only assigner of `id`), persisted
/// for the lifetime of the job history, and mutated only through the status
/// tracker's transition checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionInstance {
    pub id: Uuid,
    pub function_id: String,
    pub parameters: BTreeMap<String, String>,
    pub prerequisites: BTreeSet<Uuid>,
    pub reason: TriggerReason,
    pub status: InstanceStatus,
    /// Incrementally updated console/log output location. May be set
    /// repeatedly while the instance is live, never cleared.
    pub output_url: Option<String>,
    /// Set exactly once, on the `Failed` transition.
    pub exception: Option<ExceptionInfo>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionInstance {
    /// Create the initial `Queued` record for a consumed request.
    pub(crate) fn queued(id: Uuid, request: InvocationRequest) -> Self {
        Self {
            id,
            function_id: request.function_id,
            parameters: request.parameters,
            prerequisites: request.prerequisites,
            reason: request.reason,
            status: InstanceStatus::Queued,
            output_url: None,
            exception: None,
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// StatusUpdate
// ---------------------------------------------------------------------------

/// Partial update applied by a worker (or watchdog) through the tracker.
///
/// Every field is optional; the tracker rejects combinations the state
/// machine forbids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<InstanceStatus>,
    pub output_url: Option<String>,
    /// Only legal together with `status: Some(Failed)`.
    pub exception: Option<ExceptionInfo>,
}

impl StatusUpdate {
    pub fn running() -> Self {
        Self {
            status: Some(InstanceStatus::Running),
            ..Self::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            status: Some(InstanceStatus::Completed),
            ..Self::default()
        }
    }

    pub fn failed(exception_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(InstanceStatus::Failed),
            exception: Some(ExceptionInfo {
                exception_type: exception_type.into(),
                message: message.into(),
            }),
            ..Self::default()
        }
    }

    pub fn output_url(url: impl Into<String>) -> Self {
        Self {
            output_url: Some(url.into()),
            ..Self::default()
        }
    }
}
