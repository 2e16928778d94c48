//! Shared test doubles for the delivery test suites.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use async_trait::async_trait;
use smsward_common::{
    message::{MessageId, MessageRecord},
    state::QueueState,
};
use smsward_delivery::{CredentialSource, Credentials, Notifier, Transport, TransportError};
use smsward_store::{MemoryStateStore, StateStore, StoreError};

/// Build a message record with a fresh id
pub fn record(sender: &str, body: &str) -> MessageRecord {
    MessageRecord {
        id: MessageId::generate(),
        sender: sender.to_string(),
        body: body.to_string(),
        captured_at: SystemTime::UNIX_EPOCH,
        slot: 0,
        receiver: Some("+15559990000".to_string()),
    }
}

/// Transport double with a scripted outcome queue
///
/// Scripted failures are consumed in order; once the script runs dry every
/// further send succeeds.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<(), String>>>,
    sent: Mutex<Vec<MessageId>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_failure(&self, reason: &str) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Err(reason.to_string()));
    }

    pub fn push_success(&self) {
        self.script.lock().expect("script lock").push_back(Ok(()));
    }

    /// Ids of every send attempt, in order
    pub fn sent(&self) -> Vec<MessageId> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.sent.lock().expect("sent lock").len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        message: &MessageRecord,
        _credentials: &Credentials,
    ) -> Result<(), TransportError> {
        self.sent.lock().expect("sent lock").push(message.id);
        match self.script.lock().expect("script lock").pop_front() {
            Some(Err(reason)) => Err(TransportError::new(reason)),
            Some(Ok(())) | None => Ok(()),
        }
    }
}

/// Notifier double recording every exhaustion payload
#[derive(Debug, Default)]
pub struct MockNotifier {
    calls: Mutex<Vec<usize>>,
}

impl MockNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify_exhausted(&self, failed_count: usize) {
        self.calls.lock().expect("calls lock").push(failed_count);
    }
}

/// Credential source that always fails to resolve
#[derive(Debug)]
pub struct BrokenCredentials;

#[async_trait]
impl CredentialSource for BrokenCredentials {
    async fn resolve(&self) -> Result<Credentials, TransportError> {
        Err(TransportError::new("password file unreadable"))
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        username: "forwarder@example.com".to_string(),
        password: "app-password".to_string(),
    }
}

/// State store whose saves can be made to fail on demand
///
/// Loads always pass through to the wrapped memory store, so tests can
/// assert on what actually got persisted.
#[derive(Debug, Default)]
pub struct FlakyStateStore {
    inner: MemoryStateStore,
    fail_saves: AtomicBool,
}

impl FlakyStateStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Option<QueueState> {
        self.inner.snapshot()
    }
}

#[async_trait]
impl StateStore for FlakyStateStore {
    async fn load(&self) -> smsward_store::Result<Option<QueueState>> {
        self.inner.load().await
    }

    async fn save(&self, state: &QueueState) -> smsward_store::Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("injected save failure".to_string()));
        }
        self.inner.save(state).await
    }
}
