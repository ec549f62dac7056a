use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use ptzlink_core::config::ControlConfig;
use ptzlink_core::TransportError;
use ptzlink_visca::ViscaMessage;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::link::{Delivery, ViscaLink};
use crate::queue::{CommandQueue, Dispatch, Lane, Pending, Ticket};

// ── LinkHealth ────────────────────────────────────────────────────────────────

/// What the last exchanges with the camera tell us about the link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkHealth {
    /// `None` until something conclusive happened.
    pub reachable: Option<bool>,
    pub last_error: Option<String>,
    pub last_rtt_ms: Option<u64>,
    pub last_command: Option<String>,
}

impl LinkHealth {
    fn record(&mut self, hex: String, result: &Result<Delivery, TransportError>, elapsed: Duration) {
        self.last_command = Some(hex);
        match result {
            Ok(Delivery::Acked { .. }) => {
                self.reachable = Some(true);
                self.last_error = None;
                self.last_rtt_ms = Some(elapsed.as_millis() as u64);
            }
            Ok(Delivery::TimedOut) => {
                // The datagram left; without a reply we only know the socket works.
                if self.reachable == Some(false) {
                    self.reachable = None;
                }
                self.last_error = None;
            }
            Err(e) => {
                self.reachable = Some(false);
                self.last_error = Some(e.to_string());
            }
        }
    }
}

/// Result of a reachability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PingReport {
    pub reachable: bool,
    pub rtt_ms: Option<u64>,
    pub udp_sent: bool,
    pub last_error: Option<String>,
}

// ── SessionManager ────────────────────────────────────────────────────────────

/// Owns the link to one camera and the single worker that feeds it.
pub struct SessionManager {
    link: Arc<dyn ViscaLink>,
    queue: Arc<CommandQueue>,
    health: Arc<Mutex<LinkHealth>>,
    timeout: Duration,
    stop_tx: mpsc::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn lock_health(health: &Mutex<LinkHealth>) -> MutexGuard<'_, LinkHealth> {
    health.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionManager {
    /// Start the sender worker. Must be called inside a tokio runtime.
    pub fn spawn(link: Arc<dyn ViscaLink>, config: &ControlConfig) -> Self {
        let queue = Arc::new(CommandQueue::new(config.queue_depth));
        let health = Arc::new(Mutex::new(LinkHealth::default()));
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);

        let worker = tokio::spawn(run_worker(
            Arc::clone(&link),
            Arc::clone(&queue),
            Arc::clone(&health),
            config.timeout(),
            stop_rx,
        ));
        info!(
            "VISCA session started → {} (timeout {:?}, queue depth {})",
            link.peer(),
            config.timeout(),
            queue.capacity()
        );

        Self {
            link,
            queue,
            health,
            timeout: config.timeout(),
            stop_tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn peer(&self) -> String {
        self.link.peer()
    }

    /// Queue `msg` in `lane`; the ticket resolves once the worker is done.
    pub async fn submit(&self, lane: Lane, msg: ViscaMessage) -> Result<Ticket, TransportError> {
        self.queue.push(lane, msg).await
    }

    /// Submit and wait for the outcome.
    pub async fn send(&self, lane: Lane, msg: ViscaMessage) -> Dispatch {
        match self.submit(lane, msg).await {
            Ok(ticket) => ticket.outcome().await,
            Err(e) => Dispatch::Failed(e),
        }
    }

    /// Queue a stop batch ahead of everything else and cancel pending motion.
    pub fn preempt(&self, batch: Vec<(Lane, ViscaMessage)>) -> Result<Vec<Ticket>, TransportError> {
        self.queue.preempt(batch)
    }

    /// Probe the camera with a version inquiry.
    ///
    /// Goes straight to the link, so it waits for the socket like any other
    /// send but never takes a place in the command queue.
    pub async fn ping(&self) -> PingReport {
        let probe = ViscaMessage::version_inquiry();
        let started = Instant::now();
        let result = self.link.send(&probe, self.timeout).await;
        let elapsed = started.elapsed();
        lock_health(&self.health).record(probe.to_hex(), &result, elapsed);

        match result {
            Ok(Delivery::Acked { reply }) => {
                debug!("Ping {} answered: {}", self.link.peer(), reply);
                PingReport {
                    reachable: true,
                    rtt_ms: Some(elapsed.as_millis() as u64),
                    udp_sent: true,
                    last_error: None,
                }
            }
            Ok(Delivery::TimedOut) => PingReport {
                reachable: false,
                rtt_ms: None,
                udp_sent: true,
                last_error: Some(format!("no reply within {} ms", self.timeout.as_millis())),
            },
            Err(e) => PingReport {
                reachable: false,
                rtt_ms: None,
                udp_sent: false,
                last_error: Some(e.to_string()),
            },
        }
    }

    pub fn health(&self) -> LinkHealth {
        lock_health(&self.health).clone()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Stop the worker and fail whatever is still queued.
    pub async fn shutdown(&self) {
        self.queue.close();
        let _ = self.stop_tx.try_send(());
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("VISCA session to {} closed", self.link.peer());
    }
}

async fn run_worker(
    link: Arc<dyn ViscaLink>,
    queue: Arc<CommandQueue>,
    health: Arc<Mutex<LinkHealth>>,
    timeout: Duration,
    mut stop_rx: mpsc::Receiver<()>,
) {
    loop {
        let pending: Pending = tokio::select! {
            _ = stop_rx.recv() => break,
            next = queue.pop() => match next {
                Some(p) => p,
                None => break,
            },
        };

        let hex = pending.msg.to_hex();
        let started = Instant::now();
        let result = link.send(&pending.msg, timeout).await;
        lock_health(&health).record(hex.clone(), &result, started.elapsed());

        let dispatch = match result {
            Ok(delivery) => Dispatch::Delivered(delivery),
            Err(e) => {
                warn!("VISCA send failed ({}): {}", hex, e);
                Dispatch::Failed(e)
            }
        };
        pending.resolve(dispatch);
    }
    debug!("VISCA session worker stopped");
}

#[cfg(test)]
mod tests {
    use ptzlink_core::{FocusDirection, PanDirection, TiltDirection, ZoomDirection};
    use ptzlink_visca::ViscaCommand;

    use super::*;
    use crate::mock::{LinkBehavior, RecordingLink};

    fn control(depth: usize) -> ControlConfig {
        ControlConfig { timeout_ms: 50, queue_depth: depth }
    }

    fn pan(dir: PanDirection, speed: u8) -> ViscaMessage {
        ViscaCommand::pan_tilt(dir, TiltDirection::Stop, speed, 0).unwrap().encode()
    }

    fn stop_batch() -> Vec<(Lane, ViscaMessage)> {
        vec![
            (Lane::PanTilt, ViscaCommand::pan_tilt_stop().encode()),
            (Lane::Zoom, ViscaCommand::zoom(ZoomDirection::Stop, 0).unwrap().encode()),
            (Lane::Focus, ViscaCommand::focus(FocusDirection::Stop, 0).unwrap().encode()),
        ]
    }

    #[tokio::test]
    async fn burst_collapses_to_latest_pan_command() {
        let link = Arc::new(RecordingLink::gated());
        let session = SessionManager::spawn(link.clone(), &control(8));

        let busy = session.submit(Lane::Ordered, ViscaCommand::Home.encode()).await.unwrap();
        link.wait_started(1).await;

        let a = session.submit(Lane::PanTilt, pan(PanDirection::Right, 10)).await.unwrap();
        let b = session.submit(Lane::PanTilt, pan(PanDirection::Right, 15)).await.unwrap();
        let c = session.submit(Lane::PanTilt, pan(PanDirection::Left, 5)).await.unwrap();
        link.release(2);

        assert_eq!(a.outcome().await, Dispatch::Superseded);
        assert_eq!(b.outcome().await, Dispatch::Superseded);
        assert!(matches!(c.outcome().await, Dispatch::Delivered(Delivery::Acked { .. })));
        assert!(matches!(busy.outcome().await, Dispatch::Delivered(_)));
        assert_eq!(link.sent(), vec![ViscaCommand::Home.encode(), pan(PanDirection::Left, 5)]);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn stop_mid_burst_is_delivered_first() {
        let link = Arc::new(RecordingLink::gated());
        let session = SessionManager::spawn(link.clone(), &control(8));

        let busy = session.submit(Lane::Ordered, ViscaCommand::Home.encode()).await.unwrap();
        link.wait_started(1).await;

        let moving = session.submit(Lane::PanTilt, pan(PanDirection::Right, 10)).await.unwrap();
        let zooming = session
            .submit(Lane::Zoom, ViscaCommand::zoom(ZoomDirection::In, 3).unwrap().encode())
            .await
            .unwrap();
        let stops = session.preempt(stop_batch()).unwrap();
        let after = session.submit(Lane::PanTilt, pan(PanDirection::Left, 5)).await.unwrap();
        link.release(5);

        assert_eq!(moving.outcome().await, Dispatch::Superseded);
        assert_eq!(zooming.outcome().await, Dispatch::Superseded);
        for ticket in stops {
            assert!(matches!(ticket.outcome().await, Dispatch::Delivered(_)));
        }
        assert!(matches!(after.outcome().await, Dispatch::Delivered(_)));
        assert!(matches!(busy.outcome().await, Dispatch::Delivered(_)));

        let mut expected = vec![ViscaCommand::Home.encode()];
        expected.extend(stop_batch().into_iter().map(|(_, msg)| msg));
        expected.push(pan(PanDirection::Left, 5));
        assert_eq!(link.sent(), expected);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn presets_are_delivered_individually_in_order() {
        let link = Arc::new(RecordingLink::gated());
        let session = SessionManager::spawn(link.clone(), &control(8));

        let busy = session.submit(Lane::Ordered, ViscaCommand::Home.encode()).await.unwrap();
        link.wait_started(1).await;
        let mut tickets = Vec::new();
        for slot in 0..4 {
            let slot = ptzlink_core::DeviceSlot::new(slot).unwrap();
            let msg = ViscaCommand::preset_recall(slot).encode();
            tickets.push(session.submit(Lane::Ordered, msg).await.unwrap());
        }
        link.release(5);

        for ticket in tickets {
            assert!(matches!(ticket.outcome().await, Dispatch::Delivered(_)));
        }
        busy.outcome().await;
        let slots: Vec<u8> = link.sent()[1..].iter().map(|m| m.as_bytes()[5]).collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn failures_are_reported_and_session_keeps_going() {
        let link = Arc::new(RecordingLink::new());
        let session = SessionManager::spawn(link.clone(), &control(8));

        link.set_behavior(LinkBehavior::Fail("host unreachable".into()));
        let failed = session.send(Lane::Ordered, ViscaCommand::Home.encode()).await;
        assert!(matches!(failed, Dispatch::Failed(TransportError::Network { .. })));
        assert_eq!(session.health().reachable, Some(false));
        assert!(session.health().last_error.unwrap().contains("host unreachable"));

        link.set_behavior(LinkBehavior::Silent);
        let silent = session.send(Lane::Ordered, ViscaCommand::Home.encode()).await;
        assert_eq!(silent, Dispatch::Delivered(Delivery::TimedOut));
        assert_eq!(session.health().reachable, None);

        link.set_behavior(LinkBehavior::Ack);
        let zoom_in = ViscaCommand::zoom(ZoomDirection::In, 5).unwrap().encode();
        let acked = session.send(Lane::Zoom, zoom_in).await;
        assert!(matches!(acked, Dispatch::Delivered(Delivery::Acked { .. })));
        let health = session.health();
        assert_eq!(health.reachable, Some(true));
        assert_eq!(health.last_command.as_deref(), Some("81 01 04 07 25 FF"));

        session.shutdown().await;
    }

    #[tokio::test]
    async fn ping_bypasses_the_queue() {
        let link = Arc::new(RecordingLink::new());
        let session = SessionManager::spawn(link.clone(), &control(8));

        let report = session.ping().await;
        assert!(report.reachable && report.udp_sent);
        assert!(report.rtt_ms.is_some());
        assert_eq!(link.sent_hex(), vec!["81 09 00 02 FF".to_owned()]);
        assert_eq!(session.pending(), 0);

        link.set_behavior(LinkBehavior::Silent);
        let report = session.ping().await;
        assert!(!report.reachable && report.udp_sent);
        assert!(report.last_error.is_some());

        session.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_rejects_new_commands() {
        let link = Arc::new(RecordingLink::new());
        let session = SessionManager::spawn(link, &control(2));
        session.shutdown().await;

        assert_eq!(
            session.send(Lane::Ordered, ViscaCommand::Home.encode()).await,
            Dispatch::Failed(TransportError::Closed)
        );
        assert!(session.preempt(stop_batch()).is_err());
    }
}
