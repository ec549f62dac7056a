use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ptzlink_core::config::VideoConfig;
use ptzlink_core::VideoFrame;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::source::FrameSource;
use crate::stats::{FrameCounter, RelayState, StreamStats};

/// Log relay stats every this many frames.
const STATS_EVERY: u64 = 300;

// ── Options ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOptions {
    /// Frames older than this are never returned.
    pub staleness: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self::from(&VideoConfig::default())
    }
}

impl From<&VideoConfig> for RelayOptions {
    fn from(config: &VideoConfig) -> Self {
        Self {
            staleness: config.staleness(),
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
        }
    }
}

// ── Slot ──────────────────────────────────────────────────────────────────────

/// Contents of the single-slot buffer: newest frame plus loop state.
#[derive(Debug, Clone)]
pub struct RelaySlot {
    pub frame: Option<Arc<VideoFrame>>,
    pub state: RelayState,
}

/// Why [`VideoRelay::latest_frame`] has nothing to hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameUnavailable {
    #[error("no frame received yet")]
    NotYetAvailable,
    #[error("video source disconnected")]
    SourceDisconnected,
    #[error("latest frame is older than the staleness threshold")]
    Stale,
    #[error("video relay stopped")]
    Stopped,
}

// ── VideoRelay ────────────────────────────────────────────────────────────────

/// Pulls frames from a [`FrameSource`] and keeps only the newest one.
///
/// One pull loop writes; any number of viewers read. Readers clone an `Arc`
/// out of a `watch` channel, so a slow viewer never holds up ingestion and
/// never sees a backlog.
pub struct VideoRelay {
    source: Arc<dyn FrameSource>,
    options: RelayOptions,
    slot: Arc<watch::Sender<RelaySlot>>,
    counter: Arc<Mutex<FrameCounter>>,
    worker: Mutex<Option<(JoinHandle<()>, mpsc::Sender<()>)>>,
}

impl VideoRelay {
    pub fn new(source: Arc<dyn FrameSource>, options: RelayOptions) -> Self {
        let (slot, _) = watch::channel(RelaySlot { frame: None, state: RelayState::Starting });
        Self {
            source,
            options,
            slot: Arc::new(slot),
            counter: Arc::new(Mutex::new(FrameCounter::default())),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the pull loop. A second call while running does nothing.
    pub fn start(&self) {
        let mut worker = lock(&self.worker);
        if worker.as_ref().map_or(false, |(handle, _)| !handle.is_finished()) {
            return;
        }
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
        self.slot.send_modify(|slot| slot.state = RelayState::Starting);
        let handle = tokio::spawn(run_pull_loop(
            Arc::clone(&self.source),
            self.options,
            Arc::clone(&self.slot),
            Arc::clone(&self.counter),
            stop_rx,
        ));
        info!("Video relay started for {}", self.source.describe());
        *worker = Some((handle, stop_tx));
    }

    /// End the pull loop and release the source.
    pub async fn stop(&self) {
        let worker = lock(&self.worker).take();
        if let Some((handle, stop_tx)) = worker {
            let _ = stop_tx.send(()).await;
            let _ = handle.await;
            info!("Video relay stopped");
        }
        self.slot.send_modify(|slot| slot.state = RelayState::Stopped);
    }

    /// Newest frame, or why there is none. Never returns a frame older than
    /// the staleness threshold.
    pub fn latest_frame(&self) -> Result<Arc<VideoFrame>, FrameUnavailable> {
        let slot = self.slot.borrow();
        pick_frame(&slot, self.options.staleness)
    }

    /// Receiver that wakes on every new frame or state change.
    pub fn subscribe(&self) -> watch::Receiver<RelaySlot> {
        self.slot.subscribe()
    }

    pub fn staleness(&self) -> Duration {
        self.options.staleness
    }

    pub fn state(&self) -> RelayState {
        self.slot.borrow().state
    }

    pub fn stats(&self) -> StreamStats {
        let (state, last_frame_age_ms) = {
            let slot = self.slot.borrow();
            let age = slot.frame.as_ref().map(|f| f.age().as_millis() as u64);
            (slot.state, age)
        };
        let mut counter = lock(&self.counter);
        StreamStats {
            state,
            source: self.source.describe(),
            fps: counter.fps(),
            frames_total: counter.frames_total,
            reconnects: counter.reconnects,
            last_frame_age_ms,
        }
    }
}

/// Apply the staleness rule to a slot snapshot.
pub fn pick_frame(slot: &RelaySlot, staleness: Duration) -> Result<Arc<VideoFrame>, FrameUnavailable> {
    match (&slot.frame, slot.state) {
        (_, RelayState::Stopped) => Err(FrameUnavailable::Stopped),
        (Some(frame), _) if frame.age() <= staleness => Ok(Arc::clone(frame)),
        (_, RelayState::Reconnecting) => Err(FrameUnavailable::SourceDisconnected),
        (Some(_), _) => Err(FrameUnavailable::Stale),
        (None, _) => Err(FrameUnavailable::NotYetAvailable),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Pull loop ─────────────────────────────────────────────────────────────────

async fn run_pull_loop(
    source: Arc<dyn FrameSource>,
    options: RelayOptions,
    slot: Arc<watch::Sender<RelaySlot>>,
    counter: Arc<Mutex<FrameCounter>>,
    mut stop_rx: mpsc::Receiver<()>,
) {
    let mut delay = options.initial_backoff;
    let mut attempt: u32 = 0;
    let mut sequence: u64 = 0;
    let name = source.describe();

    'relay: loop {
        let opened = tokio::select! {
            _ = stop_rx.recv() => break 'relay,
            opened = source.open() => opened,
        };

        match opened {
            Ok(mut stream) => {
                let mut live = false;
                loop {
                    let next = tokio::select! {
                        _ = stop_rx.recv() => break 'relay,
                        next = stream.next_frame() => next,
                    };
                    match next {
                        Ok(Some(data)) => {
                            if !live {
                                info!("First frame from {} ({} bytes)", name, data.len());
                                live = true;
                                delay = options.initial_backoff;
                                attempt = 0;
                            }
                            sequence += 1;
                            let frame = Arc::new(VideoFrame::new(data, sequence));
                            slot.send_modify(|s| {
                                s.frame = Some(frame);
                                s.state = RelayState::Live;
                            });
                            let mut stats = lock(&counter);
                            stats.tick_frame();
                            if stats.frames_total % STATS_EVERY == 0 {
                                let fps = stats.fps();
                                debug!(
                                    "Relay {}: {} frames, {:.0} fps, {} reconnects",
                                    name, stats.frames_total, fps, stats.reconnects
                                );
                            }
                        }
                        Ok(None) => {
                            warn!("Video source {} ended the stream", name);
                            break;
                        }
                        Err(e) => {
                            warn!("Video source {} failed: {}", name, e);
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!("Cannot open video source {}: {}", name, e),
        }

        attempt += 1;
        slot.send_modify(|s| s.state = RelayState::Reconnecting);
        lock(&counter).reconnects += 1;
        warn!("Reconnecting to {} in {:?} (attempt {})", name, delay, attempt);

        tokio::select! {
            _ = stop_rx.recv() => break 'relay,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(options.max_backoff);
    }

    slot.send_modify(|s| s.state = RelayState::Stopped);
    debug!("Pull loop for {} exited", name);
}
