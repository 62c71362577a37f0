//! Status tracker — instance records and the lifecycle state machine.
//!
//! [`StatusStore`] is an explicitly passed dependency (never a singleton) so
//! the core stays testable in isolation and alternative backends can be
//! swapped in behind the trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::TrackerError;
use crate::models::{ExecutionInstance, InstanceStatus, StatusUpdate};

/// Storage contract for execution instance records.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Record a freshly dispatched instance. Fails on id collision.
    async fn insert(&self, instance: ExecutionInstance) -> Result<(), TrackerError>;

    /// Fetch a snapshot of an instance. `Ok(None)` is the normal "not found"
    /// outcome; `Err` means the store itself failed.
    async fn get(&self, id: Uuid) -> Result<Option<ExecutionInstance>, TrackerError>;

    /// Apply a partial update, enforcing the status state machine. Returns
    /// the updated snapshot.
    async fn update(
        &self,
        id: Uuid,
        update: StatusUpdate,
    ) -> Result<ExecutionInstance, TrackerError>;

    /// Remove a record. Used only by the dispatcher's publish-failure
    /// compensation; instances are otherwise never deleted by this core.
    async fn remove(&self, id: Uuid) -> Result<(), TrackerError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Tracker over a `RwLock`-guarded map.
///
/// Updates are read-modify-write under the write guard, so concurrent
/// updates to the same instance serialize; a transition that raced against a
/// newer terminal state is rejected, never overwritten.
#[derive(Debug, Default)]
pub struct InMemoryStatusTracker {
    instances: RwLock<HashMap<Uuid, ExecutionInstance>>,
}

impl InMemoryStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded instances.
    pub fn len(&self) -> usize {
        self.instances
            .read()
            .map(|m| m.len())
            .unwrap_or_else(|e| e.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> TrackerError {
    TrackerError::Backend("status store lock poisoned".into())
}

#[async_trait]
impl StatusStore for InMemoryStatusTracker {
    async fn insert(&self, instance: ExecutionInstance) -> Result<(), TrackerError> {
        let mut instances = self.instances.write().map_err(|_| poisoned())?;
        if instances.contains_key(&instance.id) {
            return Err(TrackerError::DuplicateId { id: instance.id });
        }
        instances.insert(instance.id, instance);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ExecutionInstance>, TrackerError> {
        let instances = self.instances.read().map_err(|_| poisoned())?;
        Ok(instances.get(&id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        update: StatusUpdate,
    ) -> Result<ExecutionInstance, TrackerError> {
        let mut instances = self.instances.write().map_err(|_| poisoned())?;
        let instance = instances
            .get_mut(&id)
            .ok_or(TrackerError::NotFound { id })?;

        // Terminal states are final: everything on a finished instance is
        // frozen, output_url and exception included.
        if instance.status.is_terminal() {
            if let Some(to) = update.status {
                return Err(TrackerError::InvalidTransition {
                    id,
                    from: instance.status,
                    to,
                });
            }
            return Err(TrackerError::Terminal {
                id,
                status: instance.status,
            });
        }

        if update.exception.is_some() && update.status != Some(InstanceStatus::Failed) {
            return Err(TrackerError::ExceptionOutsideFailure { id });
        }

        if let Some(to) = update.status {
            if !instance.status.can_transition_to(to) {
                return Err(TrackerError::InvalidTransition {
                    id,
                    from: instance.status,
                    to,
                });
            }
        }

        // Checks passed; apply. output_url may land together with the
        // terminal transition, but not after it.
        if let Some(url) = update.output_url {
            instance.output_url = Some(url);
        }
        if let Some(to) = update.status {
            match to {
                InstanceStatus::Running => instance.started_at = Some(Utc::now()),
                InstanceStatus::Completed | InstanceStatus::Failed => {
                    instance.finished_at = Some(Utc::now())
                }
                InstanceStatus::Queued => {}
            }
            instance.status = to;
        }
        if let Some(exception) = update.exception {
            instance.exception = Some(exception);
        }

        Ok(instance.clone())
    }

    async fn remove(&self, id: Uuid) -> Result<(), TrackerError> {
        let mut instances = self.instances.write().map_err(|_| poisoned())?;
        instances
            .remove(&id)
            .map(|_| ())
            .ok_or(TrackerError::NotFound { id })
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvocationRequest, TriggerReason};
    use std::collections::{BTreeMap, BTreeSet};

    fn queued_instance() -> ExecutionInstance {
        let request = InvocationRequest {
            function_id: "fn".into(),
            parameters: BTreeMap::new(),
            prerequisites: BTreeSet::new(),
            reason: TriggerReason::invoked(None),
        };
        ExecutionInstance::queued(Uuid::new_v4(), request)
    }

    async fn tracked() -> (InMemoryStatusTracker, Uuid) {
        let tracker = InMemoryStatusTracker::new();
        let instance = queued_instance();
        let id = instance.id;
        tracker.insert(instance).await.unwrap();
        (tracker, id)
    }

    #[tokio::test]
    async fn happy_path_queued_running_completed() {
        let (tracker, id) = tracked().await;

        let running = tracker.update(id, StatusUpdate::running()).await.unwrap();
        assert_eq!(running.status, InstanceStatus::Running);
        assert!(running.started_at.is_some());

        let done = tracker.update(id, StatusUpdate::completed()).await.unwrap();
        assert_eq!(done.status, InstanceStatus::Completed);
        assert!(done.finished_at.is_some());
    }

    #[tokio::test]
    async fn queued_to_failed_is_legal() {
        let (tracker, id) = tracked().await;
        let failed = tracker
            .update(id, StatusUpdate::failed("PrerequisiteTimeout", "prereq never completed"))
            .await
            .unwrap();
        assert_eq!(failed.status, InstanceStatus::Failed);
        assert_eq!(
            failed.exception.unwrap().exception_type,
            "PrerequisiteTimeout"
        );
    }

    #[tokio::test]
    async fn running_to_failed_is_legal() {
        let (tracker, id) = tracked().await;
        tracker.update(id, StatusUpdate::running()).await.unwrap();

        let failed = tracker
            .update(id, StatusUpdate::failed("InvalidOperationException", "boom"))
            .await
            .unwrap();
        assert_eq!(failed.status, InstanceStatus::Failed);
        assert!(failed.finished_at.is_some());
        assert_eq!(
            failed.exception.unwrap().exception_type,
            "InvalidOperationException"
        );
    }

    #[tokio::test]
    async fn queued_to_completed_is_illegal() {
        let (tracker, id) = tracked().await;
        let err = tracker
            .update(id, StatusUpdate::completed())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TrackerError::InvalidTransition {
                from: InstanceStatus::Queued,
                to: InstanceStatus::Completed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn terminal_states_are_final() {
        let (tracker, id) = tracked().await;
        tracker.update(id, StatusUpdate::running()).await.unwrap();
        tracker.update(id, StatusUpdate::completed()).await.unwrap();

        // Completed -> Running
        assert!(matches!(
            tracker.update(id, StatusUpdate::running()).await,
            Err(TrackerError::InvalidTransition { .. })
        ));
        // No output_url rewrites after the terminal transition either.
        assert!(matches!(
            tracker.update(id, StatusUpdate::output_url("late")).await,
            Err(TrackerError::Terminal { .. })
        ));
    }

    #[tokio::test]
    async fn failed_never_goes_back_to_queued() {
        let (tracker, id) = tracked().await;
        tracker
            .update(id, StatusUpdate::failed("Boom", "broke"))
            .await
            .unwrap();

        let err = tracker
            .update(
                id,
                StatusUpdate {
                    status: Some(InstanceStatus::Queued),
                    ..StatusUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn output_url_updates_repeatedly_until_terminal() {
        let (tracker, id) = tracked().await;
        tracker.update(id, StatusUpdate::running()).await.unwrap();
        tracker
            .update(id, StatusUpdate::output_url("http://logs/1"))
            .await
            .unwrap();
        let updated = tracker
            .update(id, StatusUpdate::output_url("http://logs/2"))
            .await
            .unwrap();
        assert_eq!(updated.output_url.as_deref(), Some("http://logs/2"));

        // Allowed in the same update as the terminal transition.
        let done = tracker
            .update(
                id,
                StatusUpdate {
                    status: Some(InstanceStatus::Completed),
                    output_url: Some("http://logs/final".into()),
                    exception: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(done.output_url.as_deref(), Some("http://logs/final"));
    }

    #[tokio::test]
    async fn exception_requires_failed_transition() {
        let (tracker, id) = tracked().await;
        let err = tracker
            .update(
                id,
                StatusUpdate {
                    status: Some(InstanceStatus::Running),
                    exception: Some(crate::models::ExceptionInfo {
                        exception_type: "Sneaky".into(),
                        message: "not failing".into(),
                    }),
                    output_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::ExceptionOutsideFailure { .. }));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let tracker = InMemoryStatusTracker::new();
        let ghost = Uuid::new_v4();

        assert!(tracker.get(ghost).await.unwrap().is_none());
        assert!(matches!(
            tracker.update(ghost, StatusUpdate::running()).await,
            Err(TrackerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let tracker = InMemoryStatusTracker::new();
        let instance = queued_instance();
        tracker.insert(instance.clone()).await.unwrap();
        assert!(matches!(
            tracker.insert(instance).await,
            Err(TrackerError::DuplicateId { .. })
        ));
    }
}
