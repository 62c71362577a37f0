//! Execution dispatcher — the only component permitted to enqueue an
//! invocation.
//!
//! `dispatch` is record-then-publish: the instance is written to the status
//! store first, so any caller holding the returned instance can immediately
//! query it. If the publish fails, the record is rolled back (removed) so no
//! orphan `Queued` record survives, and the caller gets a single
//! human-readable error with no instance identifier.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use capabilities::InvocationSink;

use crate::error::DispatchError;
use crate::models::{ExecutionInstance, InvocationRequest};
use crate::tracker::StatusStore;

pub struct Dispatcher {
    tracker: Arc<dyn StatusStore>,
    sink: Arc<dyn InvocationSink>,
}

impl Dispatcher {
    pub fn new(tracker: Arc<dyn StatusStore>, sink: Arc<dyn InvocationSink>) -> Self {
        Self { tracker, sink }
    }

    /// Dispatch a request: allocate a fresh instance id, record the instance
    /// as `Queued`, and publish it to the execution queue.
    ///
    /// Every call creates a distinct instance — deduplication per trigger
    /// event is the evaluator's job, not the dispatcher's. Prerequisite ids
    /// are recorded as given; resolving them is a worker concern.
    ///
    /// # Errors
    /// [`DispatchError::QueueUnavailable`] if the publish step fails; the
    /// status record created for this call is removed before returning, so a
    /// subsequent `get` finds nothing.
    #[instrument(skip(self, request), fields(function_id = %request.function_id()))]
    pub async fn dispatch(
        &self,
        request: InvocationRequest,
    ) -> Result<ExecutionInstance, DispatchError> {
        let id = self.fresh_id(&request);
        let instance = ExecutionInstance::queued(id, request);

        self.tracker.insert(instance.clone()).await?;

        let payload = serde_json::to_string(&instance)?;
        if let Err(publish_err) = self.sink.enqueue(payload).await {
            // Compensate: take the record back out so no instance is left
            // permanently Queued with no corresponding queued work.
            if let Err(remove_err) = self.tracker.remove(id).await {
                error!(%id, %remove_err, "failed to roll back status record after publish failure");
            } else {
                warn!(%id, "publish failed; status record rolled back");
            }
            return Err(DispatchError::QueueUnavailable(publish_err.to_string()));
        }

        info!(%id, function_id = %instance.function_id, "invocation queued");
        Ok(instance)
    }

    /// Draw an instance id that is not in the request's prerequisite set.
    ///
    /// A collision would make the instance a prerequisite of itself, which
    /// the builder cannot rule out because the id does not exist yet.
    fn fresh_id(&self, request: &InvocationRequest) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if !request.prerequisites().contains(&id) {
                return id;
            }
        }
    }
}
