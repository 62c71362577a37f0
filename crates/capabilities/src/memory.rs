//! In-memory capability implementations.
//!
//! Test doubles for the unit suites and the backing store for the `serve`
//! dev server. Each one records enough interior state for assertions
//! (payloads seen, messages deleted) and supports failure injection where a
//! test needs to exercise an error path.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::traits::{
    BlobEntry, BlobStore, FiredLedger, FunctionDefinition, FunctionRegistry, InvocationSink,
    Message, MessageSource,
};
use crate::CapabilityError;

fn poisoned() -> CapabilityError {
    CapabilityError::Backend("in-memory lock poisoned".into())
}

// ---------------------------------------------------------------------------
// Blob store
// ---------------------------------------------------------------------------

/// Blob store backed by a map of `container -> path -> last_modified`.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    containers: RwLock<HashMap<String, HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an object with the given last-modified time.
    pub fn put(&self, container: &str, path: &str, modified: DateTime<Utc>) {
        let mut containers = self.containers.write().unwrap_or_else(|e| e.into_inner());
        containers
            .entry(container.to_owned())
            .or_default()
            .insert(path.to_owned(), modified);
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn list(
        &self,
        container: &str,
        prefix: &str,
    ) -> Result<Vec<BlobEntry>, CapabilityError> {
        let containers = self.containers.read().map_err(|_| poisoned())?;
        let mut entries: Vec<BlobEntry> = containers
            .get(container)
            .into_iter()
            .flatten()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, ts)| BlobEntry {
                path: path.clone(),
                last_modified: *ts,
            })
            .collect();
        // Deterministic listing order keeps tests stable.
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn last_modified(
        &self,
        container: &str,
        path: &str,
    ) -> Result<Option<DateTime<Utc>>, CapabilityError> {
        let containers = self.containers.read().map_err(|_| poisoned())?;
        Ok(containers.get(container).and_then(|c| c.get(path)).copied())
    }
}

// ---------------------------------------------------------------------------
// Message source
// ---------------------------------------------------------------------------

/// FIFO message source with optional delete-failure injection.
#[derive(Debug, Default)]
pub struct InMemoryMessageSource {
    messages: Mutex<VecDeque<Message>>,
    next_id: AtomicU64,
    fail_deletes: AtomicBool,
}

impl InMemoryMessageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message; returns the receipt id it was assigned.
    pub fn push(&self, body: impl Into<String>) -> String {
        let id = format!("msg-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        messages.push_back(Message {
            id: id.clone(),
            body: body.into(),
        });
        id
    }

    /// Make every subsequent `delete` fail (at-least-once edge-case tests).
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::Relaxed);
    }

    /// Number of messages still present.
    pub fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageSource for InMemoryMessageSource {
    async fn receive(&self) -> Result<Option<Message>, CapabilityError> {
        let messages = self.messages.lock().map_err(|_| poisoned())?;
        // Peek, don't pop: the message stays deliverable until deleted.
        Ok(messages.front().cloned())
    }

    async fn delete(&self, message_id: &str) -> Result<(), CapabilityError> {
        if self.fail_deletes.load(Ordering::Relaxed) {
            return Err(CapabilityError::Unavailable(
                "injected delete failure".into(),
            ));
        }
        let mut messages = self.messages.lock().map_err(|_| poisoned())?;
        match messages.iter().position(|m| m.id == message_id) {
            Some(idx) => {
                messages.remove(idx);
                Ok(())
            }
            None => Err(CapabilityError::Backend(format!(
                "no message with receipt id '{message_id}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Invocation sink
// ---------------------------------------------------------------------------

/// Sink that records every payload it is handed; can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingSink {
    payloads: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `enqueue` fail with `Unavailable`.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    /// All payloads enqueued so far, in order.
    pub fn payloads(&self) -> Vec<String> {
        self.payloads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.payloads.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InvocationSink for RecordingSink {
    async fn enqueue(&self, payload: String) -> Result<(), CapabilityError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(CapabilityError::Unavailable(
                "injected enqueue failure".into(),
            ));
        }
        self.payloads.lock().map_err(|_| poisoned())?.push(payload);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Function registry
// ---------------------------------------------------------------------------

/// Registry over a plain map; registration happens up front.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    functions: RwLock<HashMap<String, FunctionDefinition>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, function: FunctionDefinition) {
        let mut functions = self.functions.write().unwrap_or_else(|e| e.into_inner());
        functions.insert(function.id.clone(), function);
    }
}

#[async_trait]
impl FunctionRegistry for InMemoryRegistry {
    async fn lookup(
        &self,
        function_id: &str,
    ) -> Result<Option<FunctionDefinition>, CapabilityError> {
        let functions = self.functions.read().map_err(|_| poisoned())?;
        Ok(functions.get(function_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Fired-event ledger
// ---------------------------------------------------------------------------

/// Ledger over a set of `(path, last_modified)` pairs.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    fired: Mutex<HashSet<(String, DateTime<Utc>)>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FiredLedger for InMemoryLedger {
    async fn already_fired(
        &self,
        path: &str,
        modified: DateTime<Utc>,
    ) -> Result<bool, CapabilityError> {
        let fired = self.fired.lock().map_err(|_| poisoned())?;
        Ok(fired.contains(&(path.to_owned(), modified)))
    }

    async fn mark_fired(
        &self,
        path: &str,
        modified: DateTime<Utc>,
    ) -> Result<(), CapabilityError> {
        let mut fired = self.fired.lock().map_err(|_| poisoned())?;
        fired.insert((path.to_owned(), modified));
        Ok(())
    }
}
