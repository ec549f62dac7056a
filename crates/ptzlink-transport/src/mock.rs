//! In-memory [`ViscaLink`] for tests and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ptzlink_core::TransportError;
use ptzlink_visca::{ViscaMessage, ViscaReply};
use tokio::sync::{Notify, Semaphore};

use crate::link::{Delivery, ViscaLink};

/// How a [`RecordingLink`] answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkBehavior {
    Ack,
    Silent,
    Fail(String),
}

/// Records every message it is asked to send.
///
/// A gated link blocks each send until [`release`](Self::release) hands out a
/// permit, which keeps a session worker busy while a test queues commands.
pub struct RecordingLink {
    sent: Mutex<Vec<ViscaMessage>>,
    behavior: Mutex<LinkBehavior>,
    gate: Option<Semaphore>,
    started: AtomicUsize,
    started_notify: Notify,
}

impl Default for RecordingLink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn gated() -> Self {
        Self::build(Some(Semaphore::new(0)))
    }

    fn build(gate: Option<Semaphore>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            behavior: Mutex::new(LinkBehavior::Ack),
            gate,
            started: AtomicUsize::new(0),
            started_notify: Notify::new(),
        }
    }

    fn sent_lock(&self) -> MutexGuard<'_, Vec<ViscaMessage>> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_behavior(&self, behavior: LinkBehavior) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    /// Let `n` more gated sends complete.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Wait until at least `n` sends have begun.
    pub async fn wait_started(&self, n: usize) {
        loop {
            let notified = self.started_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.started.load(Ordering::SeqCst) >= n {
                return;
            }
            notified.await;
        }
    }

    pub fn sent(&self) -> Vec<ViscaMessage> {
        self.sent_lock().clone()
    }

    pub fn sent_hex(&self) -> Vec<String> {
        self.sent_lock().iter().map(ViscaMessage::to_hex).collect()
    }
}

#[async_trait]
impl ViscaLink for RecordingLink {
    async fn send(&self, msg: &ViscaMessage, _timeout: Duration) -> Result<Delivery, TransportError> {
        self.sent_lock().push(msg.clone());
        self.started.fetch_add(1, Ordering::SeqCst);
        self.started_notify.notify_waiters();

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|_| TransportError::Closed)?;
            permit.forget();
        }

        let behavior = self.behavior.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match behavior {
            LinkBehavior::Ack => Ok(Delivery::Acked { reply: ViscaReply::Completion { socket: 1 } }),
            LinkBehavior::Silent => Ok(Delivery::TimedOut),
            LinkBehavior::Fail(reason) => Err(TransportError::Network { reason }),
        }
    }

    fn peer(&self) -> String {
        "recording-link".to_owned()
    }
}
