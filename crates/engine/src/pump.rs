//! The trigger pump — drives evaluate → build → dispatch → commit.
//!
//! One pass walks every subscription, collects fire decisions, and turns each
//! into a dispatched instance. Commit ordering is what makes the delivery
//! contract hold:
//! - blob fires are marked in the ledger only after dispatch succeeds, so a
//!   failed dispatch is retried on the next pass;
//! - queue messages are deleted only after dispatch succeeds, so a failed
//!   dispatch leaves the message deliverable (at-least-once). A failed
//!   deletion after a successful dispatch can double-process the message;
//!   that edge is logged loudly, never swallowed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use capabilities::{BlobStore, FiredLedger, FunctionRegistry, MessageSource};
use dispatch::{Dispatcher, ExecutionInstance, InvocationRequest, TriggerReason};

use crate::error::EngineError;
use crate::evaluator::{evaluate_blob, evaluate_message};
use crate::models::{Trigger, TriggerSubscription};

/// Parameter name the raw message body is bound under for queue/service-bus
/// fires. Subscribed functions must declare it.
pub const PAYLOAD_PARAMETER: &str = "payload";

// ---------------------------------------------------------------------------
// Fired
// ---------------------------------------------------------------------------

/// One positive fire decision, ready to be built and dispatched.
#[derive(Debug, Clone)]
pub struct Fired {
    pub function_id: String,
    pub bindings: BTreeMap<String, String>,
    pub reason: TriggerReason,
    source: FiredSource,
}

#[derive(Debug, Clone)]
enum FiredSource {
    Blob {
        path: String,
        modified: DateTime<Utc>,
    },
    Message {
        entity: String,
        receipt: String,
    },
}

// ---------------------------------------------------------------------------
// TriggerPump
// ---------------------------------------------------------------------------

/// Evaluates subscriptions and dispatches the resulting invocations.
///
/// Holds no mutable state of its own: every collaborator is an injected
/// capability, and each subscription is evaluated against its own
/// listing/message snapshot, so independent subscriptions never contend.
pub struct TriggerPump {
    blob_store: Arc<dyn BlobStore>,
    /// Message sources keyed by queue/entity name.
    sources: HashMap<String, Arc<dyn MessageSource>>,
    ledger: Arc<dyn FiredLedger>,
    registry: Arc<dyn FunctionRegistry>,
    dispatcher: Arc<Dispatcher>,
}

impl TriggerPump {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        sources: HashMap<String, Arc<dyn MessageSource>>,
        ledger: Arc<dyn FiredLedger>,
        registry: Arc<dyn FunctionRegistry>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            blob_store,
            sources,
            ledger,
            registry,
            dispatcher,
        }
    }

    /// Evaluate every subscription and return the fire decisions, without
    /// dispatching anything.
    pub async fn evaluate_all(
        &self,
        subscriptions: &[TriggerSubscription],
    ) -> Result<Vec<Fired>, EngineError> {
        let mut fired = Vec::new();
        for subscription in subscriptions {
            fired.extend(self.evaluate_one(subscription).await?);
        }
        Ok(fired)
    }

    /// Run one full pass: evaluate, build, dispatch, commit.
    ///
    /// Subscriptions are independent: a failure in one is logged and does
    /// not stop the others. Returns the instances dispatched this pass.
    #[instrument(skip(self, subscriptions), fields(subscriptions = subscriptions.len()))]
    pub async fn run_pass(
        &self,
        subscriptions: &[TriggerSubscription],
    ) -> Vec<ExecutionInstance> {
        let mut dispatched = Vec::new();
        for subscription in subscriptions {
            let fired = match self.evaluate_one(subscription).await {
                Ok(fired) => fired,
                Err(e) => {
                    error!(
                        function_id = %subscription.function_id,
                        error = %e,
                        "trigger evaluation failed; will retry next pass"
                    );
                    continue;
                }
            };
            for fire in fired {
                match self.dispatch_one(&fire).await {
                    Ok(instance) => {
                        self.commit(&fire).await;
                        dispatched.push(instance);
                    }
                    Err(e) => {
                        // No commit: a blob fire re-fires next pass, a
                        // message stays deliverable.
                        error!(
                            function_id = %fire.function_id,
                            error = %e,
                            "dispatch failed; trigger event not committed"
                        );
                    }
                }
            }
        }
        info!(count = dispatched.len(), "trigger pass complete");
        dispatched
    }

    async fn evaluate_one(
        &self,
        subscription: &TriggerSubscription,
    ) -> Result<Vec<Fired>, EngineError> {
        match &subscription.trigger {
            Trigger::Blob { input, outputs } => {
                let fires =
                    evaluate_blob(input, outputs, self.blob_store.as_ref(), self.ledger.as_ref())
                        .await?;
                Ok(fires
                    .into_iter()
                    .map(|fire| Fired {
                        function_id: subscription.function_id.clone(),
                        reason: TriggerReason::new_blob(&fire.path),
                        bindings: fire.bindings,
                        source: FiredSource::Blob {
                            path: fire.path,
                            modified: fire.modified,
                        },
                    })
                    .collect())
            }
            Trigger::Queue { .. } | Trigger::ServiceBus { .. } => {
                // entity() is always Some for these kinds.
                let entity = subscription.trigger.entity().unwrap_or_default();
                let source = self
                    .sources
                    .get(entity)
                    .ok_or_else(|| EngineError::UnknownEntity(entity.to_owned()))?;
                let Some(fire) = evaluate_message(source.as_ref()).await? else {
                    return Ok(Vec::new());
                };
                let mut bindings = BTreeMap::new();
                bindings.insert(PAYLOAD_PARAMETER.to_owned(), fire.body);
                Ok(vec![Fired {
                    function_id: subscription.function_id.clone(),
                    reason: TriggerReason::new_message(entity),
                    bindings,
                    source: FiredSource::Message {
                        entity: entity.to_owned(),
                        receipt: fire.receipt,
                    },
                }])
            }
        }
    }

    async fn dispatch_one(&self, fire: &Fired) -> Result<ExecutionInstance, EngineError> {
        let function = self
            .registry
            .lookup(&fire.function_id)
            .await?
            .ok_or_else(|| EngineError::UnknownFunction(fire.function_id.clone()))?;

        let request = InvocationRequest::build(
            &function,
            fire.bindings.clone(),
            BTreeSet::new(),
            fire.reason.clone(),
        )?;

        Ok(self.dispatcher.dispatch(request).await?)
    }

    /// Commit the consumed trigger event after a successful dispatch.
    async fn commit(&self, fire: &Fired) {
        match &fire.source {
            FiredSource::Blob { path, modified } => {
                if let Err(e) = self.ledger.mark_fired(path, *modified).await {
                    // The instance exists but the ledger missed it: the next
                    // pass may dispatch this generation again.
                    warn!(%path, error = %e, "failed to record fired blob; event may re-fire");
                }
            }
            FiredSource::Message { entity, receipt } => {
                let Some(source) = self.sources.get(entity) else {
                    return;
                };
                if let Err(e) = source.delete(receipt).await {
                    // At-least-once edge: the invocation is queued but the
                    // message survives and may be processed again.
                    warn!(
                        %entity,
                        %receipt,
                        error = %e,
                        "failed to delete message after dispatch; it may be redelivered"
                    );
                }
            }
        }
    }
}
