use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Where the pull loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    Starting,
    Live,
    Reconnecting,
    Stopped,
}

/// Snapshot reported by `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamStats {
    pub state: RelayState,
    pub source: String,
    pub fps: f64,
    pub frames_total: u64,
    pub reconnects: u64,
    pub last_frame_age_ms: Option<u64>,
}

/// Rolling one-second frame counter.
#[derive(Debug, Default)]
pub(crate) struct FrameCounter {
    pub(crate) frames_total: u64,
    pub(crate) reconnects: u64,
    recent: VecDeque<Instant>,
}

impl FrameCounter {
    /// Call once per published frame.
    pub(crate) fn tick_frame(&mut self) {
        let now = Instant::now();
        self.frames_total += 1;
        self.recent.push_back(now);
        self.evict(now);
    }

    pub(crate) fn fps(&mut self) -> f64 {
        self.evict(Instant::now());
        self.recent.len() as f64
    }

    fn evict(&mut self, now: Instant) {
        while self
            .recent
            .front()
            .map_or(false, |t| now.duration_since(*t) > Duration::from_secs(1))
        {
            self.recent.pop_front();
        }
    }
}
