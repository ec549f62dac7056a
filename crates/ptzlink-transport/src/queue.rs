//! Bounded, coalescing command queue between callers and the sender worker.
//!
//! Motion commands travel in one lane per motor (pan/tilt, zoom, focus). A
//! new motion command replaces the newest pending command of its lane, so a
//! burst of joystick ticks collapses into the latest intent. Everything else
//! (presets, autofocus, home, raw hex) goes in the `Ordered` lane: never
//! coalesced, and a barrier that motion commands are not merged across.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ptzlink_core::TransportError;
use ptzlink_visca::{ViscaCommand, ViscaMessage};
use tokio::sync::{oneshot, Notify};
use tracing::debug;

use crate::link::Delivery;

// ── Lane ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    PanTilt,
    Zoom,
    Focus,
    Ordered,
}

impl Lane {
    pub fn for_command(cmd: &ViscaCommand) -> Self {
        match cmd {
            ViscaCommand::PanTilt(_) => Lane::PanTilt,
            ViscaCommand::Zoom(_) => Lane::Zoom,
            ViscaCommand::Focus(_) => Lane::Focus,
            ViscaCommand::Home
            | ViscaCommand::Autofocus { .. }
            | ViscaCommand::Preset { .. } => Lane::Ordered,
        }
    }

    pub fn is_motion(&self) -> bool {
        !matches!(self, Lane::Ordered)
    }
}

// ── Dispatch / Ticket ─────────────────────────────────────────────────────────

/// Final fate of a submitted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Reached the socket; `Delivery` says whether the camera answered.
    Delivered(Delivery),
    /// Replaced by a newer command of the same lane, or cancelled by a stop.
    Superseded,
    Failed(TransportError),
}

/// Handle returned by a submit; resolves once the worker is done with it.
#[derive(Debug)]
pub struct Ticket {
    order: u64,
    rx: oneshot::Receiver<Dispatch>,
}

impl Ticket {
    /// Position in enqueue order, assigned under the queue lock. Within a
    /// lane, a higher order is always dispatched later.
    pub fn order(&self) -> u64 {
        self.order
    }

    pub async fn outcome(self) -> Dispatch {
        self.rx
            .await
            .unwrap_or(Dispatch::Failed(TransportError::Closed))
    }
}

pub(crate) struct Pending {
    pub(crate) lane: Lane,
    coalesce: bool,
    pub(crate) msg: ViscaMessage,
    ticket: oneshot::Sender<Dispatch>,
}

impl Pending {
    pub(crate) fn new(lane: Lane, order: u64, coalesce: bool, msg: ViscaMessage) -> (Self, Ticket) {
        let (tx, rx) = oneshot::channel();
        (Self { lane, coalesce, msg, ticket: tx }, Ticket { order, rx })
    }

    pub(crate) fn resolve(self, dispatch: Dispatch) {
        // The caller may have stopped waiting; nothing to do then.
        let _ = self.ticket.send(dispatch);
    }
}

// ── CommandQueue ──────────────────────────────────────────────────────────────

struct QueueState {
    entries: VecDeque<Pending>,
    closed: bool,
    issued: u64,
}

impl QueueState {
    /// Index of the entry a new `lane` command may replace.
    fn coalesce_target(&self, lane: Lane) -> Option<usize> {
        for (idx, entry) in self.entries.iter().enumerate().rev() {
            if entry.lane == Lane::Ordered {
                return None;
            }
            if entry.lane == lane {
                return entry.coalesce.then_some(idx);
            }
        }
        None
    }

    fn next_order(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn accepts(&self, lane: Lane, coalesce: bool, capacity: usize) -> bool {
        (coalesce && self.coalesce_target(lane).is_some()) || self.entries.len() < capacity
    }

    /// Caller checks [`accepts`](Self::accepts) first.
    fn insert(&mut self, entry: Pending) {
        if entry.coalesce {
            if let Some(idx) = self.coalesce_target(entry.lane) {
                let old = std::mem::replace(&mut self.entries[idx], entry);
                debug!("Coalesced {:?} command {}", old.lane, old.msg);
                old.resolve(Dispatch::Superseded);
                return;
            }
        }
        self.entries.push_back(entry);
    }
}

pub struct CommandQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    item_ready: Notify,
    space_ready: Notify,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: VecDeque::with_capacity(capacity),
                closed: false,
                issued: 0,
            }),
            capacity: capacity.max(1),
            item_ready: Notify::new(),
            space_ready: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue `msg` in `lane`. Waits while the queue is full, unless the
    /// command can coalesce into a pending one.
    pub async fn push(&self, lane: Lane, msg: ViscaMessage) -> Result<Ticket, TransportError> {
        let coalesce = lane.is_motion();
        loop {
            let space = self.space_ready.notified();
            tokio::pin!(space);
            space.as_mut().enable();
            {
                let mut state = self.lock();
                if state.closed {
                    return Err(TransportError::Closed);
                }
                if state.accepts(lane, coalesce, self.capacity) {
                    let order = state.next_order();
                    let (entry, ticket) = Pending::new(lane, order, coalesce, msg);
                    state.insert(entry);
                    drop(state);
                    self.item_ready.notify_one();
                    return Ok(ticket);
                }
            }
            space.await;
        }
    }

    /// Put a stop batch at the head of the queue, cancelling every pending
    /// motion command. Never waits for space.
    pub fn preempt(&self, batch: Vec<(Lane, ViscaMessage)>) -> Result<Vec<Ticket>, TransportError> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }

        let (cancelled, kept): (VecDeque<_>, VecDeque<_>) =
            state.entries.drain(..).partition(|p| p.lane.is_motion());
        state.entries = kept;
        if !cancelled.is_empty() {
            debug!("Stop cancelled {} pending motion command(s)", cancelled.len());
        }
        for pending in cancelled {
            pending.resolve(Dispatch::Superseded);
        }

        let mut tickets = Vec::with_capacity(batch.len());
        let mut entries = Vec::with_capacity(batch.len());
        for (lane, msg) in batch {
            let order = state.next_order();
            let (entry, ticket) = Pending::new(lane, order, false, msg);
            entries.push(entry);
            tickets.push(ticket);
        }
        for entry in entries.into_iter().rev() {
            state.entries.push_front(entry);
        }
        drop(state);

        self.item_ready.notify_one();
        self.space_ready.notify_waiters();
        Ok(tickets)
    }

    /// Next message for the worker. `None` once closed.
    pub(crate) async fn pop(&self) -> Option<Pending> {
        loop {
            let ready = self.item_ready.notified();
            tokio::pin!(ready);
            ready.as_mut().enable();
            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(entry) = state.entries.pop_front() {
                    drop(state);
                    self.space_ready.notify_one();
                    return Some(entry);
                }
            }
            ready.await;
        }
    }

    /// Refuse further submissions and fail everything still pending.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        let pending: Vec<_> = state.entries.drain(..).collect();
        drop(state);
        for entry in pending {
            entry.resolve(Dispatch::Failed(TransportError::Closed));
        }
        self.item_ready.notify_waiters();
        self.space_ready.notify_waiters();
    }
}
