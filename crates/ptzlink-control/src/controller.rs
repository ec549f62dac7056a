use std::ops::RangeInclusive;
use std::sync::Arc;

use ptzlink_core::config::CameraConfig;
use ptzlink_core::{
    ControlError, FocusDirection, MotionCommand, PanDirection, PresetSlot, TiltDirection,
    ZoomDirection, PAN_TILT_SPEED,
};
use ptzlink_transport::{Delivery, Dispatch, Lane, LinkHealth, PingReport, SessionManager};
use ptzlink_visca::{parse_hex, ViscaCommand, ViscaMessage, ViscaReply};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::presets::{PresetRecord, PresetStore};
use crate::state::{CameraState, CameraStateTracker};

/// Speeds offered to the operator for a moving zoom.
pub const ZOOM_UI_SPEED: RangeInclusive<u8> = 1..=7;
/// Speeds offered to the operator for a moving focus.
pub const FOCUS_UI_SPEED: RangeInclusive<u8> = 1..=8;

// MARK: - Results

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The camera answered with an ack or completion.
    Acked,
    /// Sent, no answer within the timeout. Usually still executed.
    TimedOut,
    /// The camera answered with a VISCA error.
    Rejected,
    /// Replaced by a newer command before it was sent.
    Superseded,
}

impl Outcome {
    /// Whether the command should be treated as in effect.
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Acked | Outcome::TimedOut)
    }
}

/// What happened to one control operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReport {
    pub outcome: Outcome,
    /// Hex of the VISCA message(s) issued.
    pub command: String,
    pub reply: Option<String>,
    /// Dispatch order of the (last) message, for ordering state updates.
    #[serde(skip)]
    pub order: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub firmware: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    pub camera: CameraState,
    pub presets: Vec<PresetRecord>,
    pub link: LinkHealth,
    pub device: DeviceIdentity,
    pub pending_commands: usize,
}

// MARK: - CameraController

pub struct CameraController {
    session: Arc<SessionManager>,
    state: CameraStateTracker,
    presets: PresetStore,
    identity: DeviceIdentity,
}

impl CameraController {
    pub fn new(session: Arc<SessionManager>, camera: &CameraConfig) -> Self {
        Self {
            session,
            state: CameraStateTracker::new(),
            presets: PresetStore::new(),
            identity: DeviceIdentity {
                device_id: camera.device_id.clone(),
                firmware: camera.firmware_version.clone(),
                address: camera.socket_addr(),
            },
        }
    }

    pub fn state(&self) -> &CameraStateTracker {
        &self.state
    }

    pub fn presets(&self) -> &PresetStore {
        &self.presets
    }

    // ── Motion ──────────────────────────────────────────────────────────────

    /// Drive pan and tilt together at `speed`. A stopped axis ignores it.
    pub async fn move_camera(
        &self,
        pan: PanDirection,
        tilt: TiltDirection,
        speed: u8,
    ) -> Result<CommandReport, ControlError> {
        if !(pan.is_stop() && tilt.is_stop()) {
            check_speed("pan/tilt", speed, &PAN_TILT_SPEED)?;
        }
        let cmd = ViscaCommand::pan_tilt(pan, tilt, speed, speed)?;
        let report = self.dispatch(cmd).await?;
        if report.outcome.is_applied() {
            self.state.record_motions_at(
                report.order,
                &[MotionCommand::pan(pan, speed), MotionCommand::tilt(tilt, speed)],
            );
        }
        Ok(report)
    }

    pub async fn zoom(&self, direction: ZoomDirection, speed: u8) -> Result<CommandReport, ControlError> {
        if !direction.is_stop() {
            check_speed("zoom", speed, &ZOOM_UI_SPEED)?;
        }
        let report = self.dispatch(ViscaCommand::zoom(direction, speed)?).await?;
        if report.outcome.is_applied() {
            self.state.record_motions_at(report.order, &[MotionCommand::zoom(direction, speed)]);
        }
        Ok(report)
    }

    pub async fn focus(&self, direction: FocusDirection, speed: u8) -> Result<CommandReport, ControlError> {
        if !direction.is_stop() {
            check_speed("focus", speed, &FOCUS_UI_SPEED)?;
        }
        let report = self.dispatch(ViscaCommand::focus(direction, speed)?).await?;
        if report.outcome.is_applied() {
            self.state.record_motions_at(report.order, &[MotionCommand::focus(direction, speed)]);
        }
        Ok(report)
    }

    pub async fn set_autofocus(&self, enabled: bool) -> Result<CommandReport, ControlError> {
        let report = self.dispatch(ViscaCommand::autofocus(enabled)).await?;
        if report.outcome.is_applied() {
            self.state.set_autofocus(enabled);
        }
        Ok(report)
    }

    /// Return pan/tilt to the home position.
    pub async fn home(&self) -> Result<CommandReport, ControlError> {
        let report = self.dispatch(ViscaCommand::Home).await?;
        if report.outcome.is_applied() {
            let parked = [
                MotionCommand::pan(PanDirection::Stop, 0),
                MotionCommand::tilt(TiltDirection::Stop, 0),
            ];
            self.state.record_motions_at(report.order, &parked);
        }
        Ok(report)
    }

    /// Stop every motor.
    ///
    /// Local state is cleared first, so it reads "stopped" even when the
    /// camera cannot be reached. The stop messages jump the queue and cancel
    /// pending motion; a move already on the wire that completes afterwards
    /// is older than the stop and leaves the state alone.
    pub async fn stop(&self) -> Result<CommandReport, ControlError> {
        self.state.stop_all();

        let batch: Vec<(Lane, ViscaMessage)> = [
            ViscaCommand::pan_tilt_stop(),
            ViscaCommand::zoom(ZoomDirection::Stop, 0)?,
            ViscaCommand::focus(FocusDirection::Stop, 0)?,
        ]
        .iter()
        .map(|cmd| (Lane::for_command(cmd), cmd.encode()))
        .collect();

        let command = batch
            .iter()
            .map(|(_, msg)| msg.to_hex())
            .collect::<Vec<_>>()
            .join(", ");
        let tickets = self.session.preempt(batch)?;
        let order = tickets.last().map_or(0, |ticket| ticket.order());
        self.state.stop_all_at(order);

        let mut outcome = Outcome::Acked;
        let mut reply = None;
        for ticket in tickets {
            let (this, this_reply) = classify(ticket.outcome().await)?;
            outcome = worst(outcome, this);
            reply = reply.or(this_reply);
        }
        info!("Stop issued ({:?})", outcome);
        Ok(CommandReport { outcome, command, reply, order })
    }

    // ── Presets ─────────────────────────────────────────────────────────────

    /// Save the current position into UI slot `slot` (1..=5).
    pub async fn save_preset(&self, slot: u8) -> Result<CommandReport, ControlError> {
        let slot = PresetSlot::new(slot)?;
        let report = self.dispatch(ViscaCommand::preset_save(slot.device_slot())).await?;
        if report.outcome.is_applied() {
            self.presets.mark_occupied(slot, report.command.clone());
            info!("Preset {} saved", slot.index());
        }
        Ok(report)
    }

    pub async fn recall_preset(&self, slot: u8) -> Result<CommandReport, ControlError> {
        let slot = PresetSlot::new(slot)?;
        let report = self.dispatch(ViscaCommand::preset_recall(slot.device_slot())).await?;
        info!("Preset {} recalled ({:?})", slot.index(), report.outcome);
        Ok(report)
    }

    // ── Diagnostics ─────────────────────────────────────────────────────────

    /// Send operator-typed hex. Does not touch camera state.
    pub async fn send_raw_hex(&self, text: &str) -> Result<CommandReport, ControlError> {
        let msg = parse_hex(text)?;
        info!("Raw VISCA: {}", msg);
        self.send_message(Lane::Ordered, msg).await
    }

    pub async fn test_connection(&self) -> PingReport {
        self.session.ping().await
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            camera: self.state.snapshot(),
            presets: self.presets.snapshot(),
            link: self.session.health(),
            device: self.identity.clone(),
            pending_commands: self.session.pending(),
        }
    }

    // ── Internals ───────────────────────────────────────────────────────────

    async fn dispatch(&self, cmd: ViscaCommand) -> Result<CommandReport, ControlError> {
        self.send_message(Lane::for_command(&cmd), cmd.encode()).await
    }

    async fn send_message(&self, lane: Lane, msg: ViscaMessage) -> Result<CommandReport, ControlError> {
        let command = msg.to_hex();
        debug!("Dispatching {} on {:?}", command, lane);
        let ticket = self.session.submit(lane, msg).await?;
        let order = ticket.order();
        let (outcome, reply) = classify(ticket.outcome().await)?;
        if outcome == Outcome::Rejected {
            warn!("Camera rejected {}: {}", command, reply.as_deref().unwrap_or("?"));
        }
        Ok(CommandReport { outcome, command, reply, order })
    }
}

fn check_speed(what: &str, speed: u8, range: &RangeInclusive<u8>) -> Result<(), ControlError> {
    if range.contains(&speed) {
        Ok(())
    } else {
        Err(ControlError::InvalidParameter {
            reason: format!("{what} speed {speed} outside {}..={}", range.start(), range.end()),
        })
    }
}

fn classify(dispatch: Dispatch) -> Result<(Outcome, Option<String>), ControlError> {
    match dispatch {
        Dispatch::Delivered(Delivery::Acked { reply }) => {
            let outcome = match reply {
                ViscaReply::Error { .. } => Outcome::Rejected,
                _ => Outcome::Acked,
            };
            Ok((outcome, Some(reply.to_string())))
        }
        Dispatch::Delivered(Delivery::TimedOut) => Ok((Outcome::TimedOut, None)),
        Dispatch::Superseded => Ok((Outcome::Superseded, None)),
        Dispatch::Failed(e) => Err(e.into()),
    }
}

/// Combine outcomes of a batch: the least certain one wins.
fn worst(a: Outcome, b: Outcome) -> Outcome {
    fn rank(o: Outcome) -> u8 {
        match o {
            Outcome::Acked => 0,
            Outcome::TimedOut => 1,
            Outcome::Superseded => 2,
            Outcome::Rejected => 3,
        }
    }
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use ptzlink_core::config::ControlConfig;
    use ptzlink_transport::{LinkBehavior, RecordingLink};

    use super::*;

    fn controller_on(link: Arc<RecordingLink>) -> CameraController {
        let session = SessionManager::spawn(link, &ControlConfig { timeout_ms: 50, queue_depth: 8 });
        CameraController::new(Arc::new(session), &CameraConfig::default())
    }

    fn controller() -> (CameraController, Arc<RecordingLink>) {
        let link = Arc::new(RecordingLink::new());
        (controller_on(link.clone()), link)
    }

    #[tokio::test]
    async fn end_to_end_wire_bytes() {
        let (ctl, link) = controller();

        ctl.move_camera(PanDirection::Right, TiltDirection::Stop, 10).await.unwrap();
        ctl.zoom(ZoomDirection::In, 5).await.unwrap();
        ctl.save_preset(3).await.unwrap();
        ctl.recall_preset(3).await.unwrap();

        assert_eq!(
            link.sent_hex(),
            vec![
                "81 01 06 01 0A 00 01 03 FF",
                "81 01 04 07 25 FF",
                "81 01 04 3F 01 02 FF",
                "81 01 04 3F 02 02 FF",
            ]
        );
    }

    #[tokio::test]
    async fn invalid_parameters_never_reach_the_camera() {
        let (ctl, link) = controller();

        for result in [
            ctl.move_camera(PanDirection::Left, TiltDirection::Up, 0).await,
            ctl.move_camera(PanDirection::Left, TiltDirection::Up, 25).await,
            ctl.zoom(ZoomDirection::Out, 0).await,
            ctl.zoom(ZoomDirection::In, 8).await,
            ctl.focus(FocusDirection::Near, 9).await,
            ctl.save_preset(0).await,
            ctl.recall_preset(6).await,
        ] {
            assert!(matches!(result, Err(ControlError::InvalidParameter { .. })), "{result:?}");
        }
        assert!(matches!(
            ctl.send_raw_hex("81 01 04").await,
            Err(ControlError::MalformedCommand { .. })
        ));
        assert!(link.sent().is_empty());
    }

    #[tokio::test]
    async fn stopped_axes_accept_any_speed() {
        let (ctl, link) = controller();
        ctl.move_camera(PanDirection::Stop, TiltDirection::Stop, 0).await.unwrap();
        ctl.zoom(ZoomDirection::Stop, 0).await.unwrap();
        assert_eq!(link.sent_hex(), vec!["81 01 06 01 00 00 03 03 FF", "81 01 04 07 00 FF"]);
    }

    #[tokio::test]
    async fn state_follows_applied_commands() {
        let (ctl, _link) = controller();

        ctl.move_camera(PanDirection::Left, TiltDirection::Down, 7).await.unwrap();
        ctl.focus(FocusDirection::Far, 2).await.unwrap();
        ctl.set_autofocus(false).await.unwrap();

        let status = ctl.status();
        assert_eq!(status.camera.pan, MotionCommand::pan(PanDirection::Left, 7));
        assert_eq!(status.camera.tilt, MotionCommand::tilt(TiltDirection::Down, 7));
        assert_eq!(status.camera.focus.speed(), 2);
        assert!(!status.camera.autofocus);
        assert_eq!(status.device.device_id, "3301432581P2107");
        assert_eq!(status.link.reachable, Some(true));
    }

    #[tokio::test]
    async fn stop_clears_state_even_when_camera_is_unreachable() {
        let (ctl, link) = controller();
        ctl.move_camera(PanDirection::Right, TiltDirection::Up, 12).await.unwrap();
        ctl.zoom(ZoomDirection::In, 3).await.unwrap();

        link.set_behavior(LinkBehavior::Fail("host unreachable".into()));
        let result = ctl.stop().await;
        assert!(matches!(result, Err(ControlError::Network { .. })));
        assert!(!ctl.status().camera.is_moving());

        link.set_behavior(LinkBehavior::Ack);
        let first = ctl.stop().await.unwrap();
        let state = ctl.status().camera;
        let second = ctl.stop().await.unwrap();
        assert_eq!(ctl.status().camera, state);
        assert_eq!(first.outcome, Outcome::Acked);
        assert_eq!(second.command, first.command);
        assert!(first.command.starts_with("81 01 06 01 00 00 03 03 FF"));
    }

    #[tokio::test]
    async fn move_completing_after_stop_leaves_camera_stopped() {
        let link = Arc::new(RecordingLink::gated());
        let ctl = Arc::new(controller_on(link.clone()));

        let mover = {
            let ctl = Arc::clone(&ctl);
            tokio::spawn(async move { ctl.move_camera(PanDirection::Right, TiltDirection::Up, 12).await })
        };
        link.wait_started(1).await;

        let stopper = {
            let ctl = Arc::clone(&ctl);
            tokio::spawn(async move { ctl.stop().await })
        };
        while ctl.status().pending_commands < 3 {
            tokio::task::yield_now().await;
        }
        link.release(4);

        let moved = mover.await.unwrap().unwrap();
        assert_eq!(moved.outcome, Outcome::Acked);
        stopper.await.unwrap().unwrap();

        assert_eq!(
            link.sent_hex(),
            vec![
                "81 01 06 01 0C 0C 01 01 FF",
                "81 01 06 01 00 00 03 03 FF",
                "81 01 04 07 00 FF",
                "81 01 04 08 00 FF",
            ]
        );
        assert!(!ctl.status().camera.is_moving());

        // Motion issued after the stop is tracked again.
        link.release(1);
        ctl.zoom(ZoomDirection::Out, 2).await.unwrap();
        assert!(ctl.status().camera.is_moving());
    }

    #[tokio::test]
    async fn timed_out_commands_still_count_but_presets_track_saves_only() {
        let (ctl, link) = controller();
        link.set_behavior(LinkBehavior::Silent);

        let report = ctl.save_preset(1).await.unwrap();
        assert_eq!(report.outcome, Outcome::TimedOut);
        assert!(ctl.presets().is_occupied(PresetSlot::new(1).unwrap()));

        ctl.recall_preset(2).await.unwrap();
        assert!(!ctl.presets().is_occupied(PresetSlot::new(2).unwrap()));

        let status = serde_json::to_value(ctl.status()).unwrap();
        assert_eq!(status["presets"][0]["occupied"], true);
        assert_eq!(status["presets"][1]["occupied"], false);
    }

    #[tokio::test]
    async fn raw_hex_goes_out_verbatim() {
        let (ctl, link) = controller();
        let report = ctl.send_raw_hex("81 01 04 00 02 FF").await.unwrap();
        assert_eq!(report.command, "81 01 04 00 02 FF");
        assert_eq!(report.outcome, Outcome::Acked);
        assert_eq!(link.sent_hex(), vec!["81 01 04 00 02 FF"]);
        assert!(!ctl.status().camera.is_moving());
    }

    #[tokio::test]
    async fn test_connection_uses_a_side_effect_free_inquiry() {
        let (ctl, link) = controller();
        let report = ctl.test_connection().await;
        assert!(report.reachable);
        assert_eq!(link.sent_hex(), vec!["81 09 00 02 FF"]);
    }
}
