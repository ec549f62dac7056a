use std::sync::{PoisonError, RwLock};

use ptzlink_core::{Axis, MotionCommand};
use serde::Serialize;

/// Last commanded motion per axis plus the focus mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraState {
    pub pan: MotionCommand,
    pub tilt: MotionCommand,
    pub zoom: MotionCommand,
    pub focus: MotionCommand,
    pub autofocus: bool,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            pan: MotionCommand::stopped(Axis::Pan),
            tilt: MotionCommand::stopped(Axis::Tilt),
            zoom: MotionCommand::stopped(Axis::Zoom),
            focus: MotionCommand::stopped(Axis::Focus),
            // Cameras power up in autofocus.
            autofocus: true,
        }
    }
}

impl CameraState {
    fn slot_mut(&mut self, axis: Axis) -> &mut MotionCommand {
        match axis {
            Axis::Pan => &mut self.pan,
            Axis::Tilt => &mut self.tilt,
            Axis::Zoom => &mut self.zoom,
            Axis::Focus => &mut self.focus,
        }
    }

    pub fn motion(&self, axis: Axis) -> MotionCommand {
        match axis {
            Axis::Pan => self.pan,
            Axis::Tilt => self.tilt,
            Axis::Zoom => self.zoom,
            Axis::Focus => self.focus,
        }
    }

    pub fn is_moving(&self) -> bool {
        Axis::ALL.iter().any(|axis| !self.motion(*axis).is_stopped())
    }
}

/// Thread-safe owner of the [`CameraState`].
///
/// Every write takes the lock once, so readers see either all or none of an
/// update. No I/O happens under the lock.
///
/// The `*_at` writers take the command's dispatch order. Each axis remembers
/// the newest order it applied and ignores anything older, so a move that
/// completes after a later stop cannot bring the motion back.
#[derive(Debug, Default)]
pub struct CameraStateTracker {
    inner: RwLock<Tracked>,
}

#[derive(Debug, Default)]
struct Tracked {
    state: CameraState,
    applied: [u64; 4],
}

impl Tracked {
    /// Claim `axis` for `order`. False if a newer command already landed.
    fn claim(&mut self, axis: Axis, order: u64) -> bool {
        let applied = &mut self.applied[axis_index(axis)];
        if order < *applied {
            return false;
        }
        *applied = order;
        true
    }
}

fn axis_index(axis: Axis) -> usize {
    match axis {
        Axis::Pan => 0,
        Axis::Tilt => 1,
        Axis::Zoom => 2,
        Axis::Focus => 3,
    }
}

impl CameraStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tracked) -> R) -> R {
        let mut tracked = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut tracked)
    }

    pub fn record_motion(&self, motion: MotionCommand) {
        self.record_motions(&[motion]);
    }

    /// Apply several axis updates as one change (pan and tilt move together).
    pub fn record_motions(&self, motions: &[MotionCommand]) {
        self.write(|tracked| {
            for motion in motions {
                *tracked.state.slot_mut(motion.axis()) = *motion;
            }
        });
    }

    /// Like [`record_motions`](Self::record_motions), but an axis that
    /// already applied a newer command keeps it.
    pub fn record_motions_at(&self, order: u64, motions: &[MotionCommand]) {
        self.write(|tracked| {
            for motion in motions {
                if tracked.claim(motion.axis(), order) {
                    *tracked.state.slot_mut(motion.axis()) = *motion;
                }
            }
        });
    }

    pub fn set_autofocus(&self, enabled: bool) {
        self.write(|tracked| tracked.state.autofocus = enabled);
    }

    /// Every axis to stop, speed 0. Safe to call at any time, any number of times.
    pub fn stop_all(&self) {
        self.write(|tracked| {
            for axis in Axis::ALL {
                *tracked.state.slot_mut(axis) = MotionCommand::stopped(axis);
            }
        });
    }

    /// Stop every axis and discard later-arriving updates older than `order`.
    pub fn stop_all_at(&self, order: u64) {
        self.write(|tracked| {
            for axis in Axis::ALL {
                tracked.applied[axis_index(axis)] = tracked.applied[axis_index(axis)].max(order);
                *tracked.state.slot_mut(axis) = MotionCommand::stopped(axis);
            }
        });
    }

    pub fn snapshot(&self) -> CameraState {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).state.clone()
    }
}

#[cfg(test)]
mod tests {
    use ptzlink_core::{PanDirection, TiltDirection, ZoomDirection};

    use super::*;

    #[test]
    fn starts_all_stopped() {
        let tracker = CameraStateTracker::new();
        let state = tracker.snapshot();
        assert!(!state.is_moving());
        assert_eq!(state.pan.speed(), 0);
    }

    #[test]
    fn stop_all_is_idempotent() {
        let tracker = CameraStateTracker::new();
        tracker.stop_all();
        let first = tracker.snapshot();
        tracker.stop_all();
        assert_eq!(tracker.snapshot(), first);
        assert_eq!(first, CameraState::default());
    }

    #[test]
    fn records_then_stops() {
        let tracker = CameraStateTracker::new();
        tracker.record_motions(&[
            MotionCommand::pan(PanDirection::Left, 12),
            MotionCommand::tilt(TiltDirection::Up, 12),
        ]);
        tracker.record_motion(MotionCommand::zoom(ZoomDirection::In, 5));
        tracker.set_autofocus(false);

        let state = tracker.snapshot();
        assert_eq!(state.pan, MotionCommand::pan(PanDirection::Left, 12));
        assert_eq!(state.tilt.speed(), 12);
        assert_eq!(state.zoom.speed(), 5);
        assert!(state.is_moving());

        tracker.stop_all();
        let state = tracker.snapshot();
        assert!(!state.is_moving());
        assert!(!state.autofocus, "stop leaves the focus mode alone");
    }

    #[test]
    fn older_updates_lose_to_newer_ones() {
        let tracker = CameraStateTracker::new();
        tracker.record_motions_at(5, &[MotionCommand::pan(PanDirection::Right, 10)]);
        tracker.record_motions_at(3, &[MotionCommand::pan(PanDirection::Left, 4)]);
        assert_eq!(tracker.snapshot().pan, MotionCommand::pan(PanDirection::Right, 10));

        // A zoom update is independent of the pan history.
        tracker.record_motions_at(4, &[MotionCommand::zoom(ZoomDirection::Out, 2)]);
        assert_eq!(tracker.snapshot().zoom.speed(), 2);
    }

    #[test]
    fn move_resolving_after_stop_is_ignored() {
        let tracker = CameraStateTracker::new();
        tracker.stop_all_at(7);
        tracker.record_motions_at(6, &[
            MotionCommand::pan(PanDirection::Right, 12),
            MotionCommand::tilt(TiltDirection::Up, 12),
        ]);
        assert!(!tracker.snapshot().is_moving());

        tracker.record_motions_at(8, &[MotionCommand::tilt(TiltDirection::Down, 3)]);
        assert!(tracker.snapshot().is_moving());
    }

    #[test]
    fn concurrent_writers_never_tear_a_record() {
        let tracker = std::sync::Arc::new(CameraStateTracker::new());
        let handles: Vec<_> = (1..=8u8)
            .map(|speed| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        tracker.record_motions(&[
                            MotionCommand::pan(PanDirection::Right, speed),
                            MotionCommand::tilt(TiltDirection::Down, speed),
                        ]);
                        let state = tracker.snapshot();
                        assert_eq!(state.pan.speed(), state.tilt.speed());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
