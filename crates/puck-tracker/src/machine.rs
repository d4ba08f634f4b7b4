//! The decision state machine driving calibration, tracking and previews.

use crate::camera::{CameraError, CameraSource};
use crate::clock::{Clock, SystemClock};
use crate::config::{CameraConfig, CaptureMode, Config, MachineConfig};
use crate::messages::{ColorTarget, Command, ControlMessage, ErrorCode, Status, TrackerState};
use crate::overlay;
use crate::paddle_link::PaddleLink;
use crate::settings::{SettingsError, SettingsStore, TrackerSettings};
use crate::streaming::{FrameHub, StatusHub};
use crate::tracker::{Calibration, PuckTracker, TrackerContext};
use crossbeam_channel::{Receiver, TryRecvError};
use ndarray::ArrayView2;
use puck_calibration::{CalibrationError, FiducialCalibrator};
use puck_detection::{all_blobs, apply_mask, extract, segment, BlobBounds, BlobSelection, HsvRange, RgbImage};
use puck_prediction::{
    GameMode, InterceptPredictor, PaddleCommand, PaddleCommander, PaddleState, TablePoint, Velocity,
};
use std::sync::Arc;
use std::time::Duration;

/// Channels the machine talks through.
pub struct MachineChannels {
    pub commands: Receiver<ControlMessage>,
    pub paddle: Box<dyn PaddleLink + Send>,
    pub frames: FrameHub,
    pub status: StatusHub,
}

/// In-memory values set through control messages; they win over the
/// settings file until the process exits.
#[derive(Clone, Copy, Debug, Default)]
struct Overrides {
    puck_range: Option<HsvRange>,
    fiducial_range: Option<HsvRange>,
    game_mode: Option<GameMode>,
}

struct CalibrationRun {
    calibrator: FiducialCalibrator,
    attempts: u32,
}

struct TrackingSession {
    tracker: PuckTracker,
    predictor: InterceptPredictor,
    commander: PaddleCommander,
}

struct Preview {
    target: ColorTarget,
    range: HsvRange,
    kernel: usize,
    bounds: Option<BlobBounds>,
    selection: BlobSelection,
}

pub struct TrackerMachine<C: CameraSource> {
    camera: C,
    camera_config: CameraConfig,
    config: MachineConfig,
    settings: SettingsStore,
    channels: MachineChannels,
    clock: Box<dyn Clock>,

    state: TrackerState,
    error: ErrorCode,
    entered: bool,
    camera_open: bool,
    retry_delay: Duration,
    overrides: Overrides,

    calibration: Option<CalibrationRun>,
    session: Option<TrackingSession>,
    preview: Option<Preview>,

    position_mm: Option<TablePoint>,
    velocity: Velocity,
    paddle: Option<PaddleCommand>,
}

impl<C: CameraSource> TrackerMachine<C> {
    pub fn new(camera: C, config: &Config, channels: MachineChannels) -> Self {
        Self {
            camera,
            camera_config: config.camera.clone(),
            config: config.machine.clone(),
            settings: SettingsStore::new(config.settings.path.clone()),
            channels,
            clock: Box::new(SystemClock),
            state: TrackerState::Idle,
            error: ErrorCode::None,
            entered: false,
            camera_open: false,
            retry_delay: Duration::from_millis(config.machine.camera_retry_initial_ms),
            overrides: Overrides::default(),
            calibration: None,
            session: None,
            preview: None,
            position_mm: None,
            velocity: Velocity::ZERO,
            paddle: None,
        }
    }

    /// Replaces the wall clock used for frame timestamps and pauses.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Paddle state while tracking.
    pub fn paddle_state(&self) -> Option<PaddleState> {
        self.session.as_ref().map(|session| session.commander.state())
    }

    pub fn error(&self) -> ErrorCode {
        self.error
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    /// Failed calibration attempts in the current run.
    pub fn calibration_attempts(&self) -> u32 {
        self.calibration.as_ref().map_or(0, |run| run.attempts)
    }

    pub fn status(&self) -> Status {
        Status {
            state: self.state,
            error: self.error,
            position_mm: self.position_mm,
            velocity_mmps: self.velocity,
            paddle: self.paddle,
        }
    }

    /// Runs until a quit request arrives or the command channel closes.
    pub fn run(&mut self) {
        tracing::info!("tracker loop started");
        while self.step() {}
        tracing::info!("tracker loop stopped");
    }

    /// One loop iteration: poll commands, then do at most one frame of work.
    ///
    /// Returns `false` once the machine has quit.
    pub fn step(&mut self) -> bool {
        self.poll_commands();
        if self.state == TrackerState::Quit {
            self.enter_quit();
            self.publish_status();
            return false;
        }
        if !self.entered {
            self.entered = true;
            self.enter();
        }

        match self.state {
            TrackerState::Calibrate => self.calibrate_step(),
            TrackerState::Tracking => self.tracking_step(),
            TrackerState::FindFiducials | TrackerState::FindPuck => self.preview_step(),
            TrackerState::Idle
            | TrackerState::Calibrated
            | TrackerState::NotCalibrated
            | TrackerState::Error => self.clock.sleep(self.config.idle_tick()),
            TrackerState::Quit => {}
        }

        self.publish_status();
        true
    }

    fn poll_commands(&mut self) {
        loop {
            match self.channels.commands.try_recv() {
                Ok(message) => self.handle(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.state != TrackerState::Quit {
                        tracing::info!("command channel closed, quitting");
                        self.transition(TrackerState::Quit);
                    }
                    break;
                }
            }
        }
    }

    fn handle(&mut self, message: ControlMessage) {
        if self.state == TrackerState::Quit {
            return;
        }
        match message {
            ControlMessage::Command(command) => self.handle_command(command),
            ControlMessage::SetColorRange { target, range } => self.set_color_range(target, range),
            ControlMessage::SetGameMode(mode) => {
                tracing::info!(?mode, "game mode changed");
                self.overrides.game_mode = Some(mode);
                if let Some(session) = &mut self.session {
                    session.commander.set_mode(mode);
                }
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        tracing::debug!(?command, state = %self.state, "command received");
        if command == Command::Quit {
            self.transition(TrackerState::Quit);
            return;
        }
        if self.state == TrackerState::Error {
            if command == Command::ClearError {
                self.error = ErrorCode::None;
                self.transition(TrackerState::Idle);
            } else {
                tracing::warn!(?command, "ignored while in error state");
            }
            return;
        }

        let next = match command {
            Command::Idle => TrackerState::Idle,
            Command::Calibrate => {
                self.error = ErrorCode::None;
                TrackerState::Calibrate
            }
            Command::Track => TrackerState::Tracking,
            Command::FindFiducials => TrackerState::FindFiducials,
            Command::FindPuck => TrackerState::FindPuck,
            Command::ClearError => {
                self.error = ErrorCode::None;
                return;
            }
            Command::Quit => TrackerState::Quit,
        };
        if next != self.state {
            self.transition(next);
        }
    }

    fn set_color_range(&mut self, target: ColorTarget, range: HsvRange) {
        tracing::info!(?target, lower = ?range.lower, upper = ?range.upper, "color range updated");
        match target {
            ColorTarget::Puck => {
                self.overrides.puck_range = Some(range);
                if let Some(session) = &mut self.session {
                    session.tracker.set_puck_range(range);
                }
            }
            ColorTarget::Fiducial => {
                self.overrides.fiducial_range = Some(range);
                if let Some(run) = &mut self.calibration {
                    run.calibrator.set_range(range);
                }
            }
        }
        if let Some(preview) = &mut self.preview {
            if preview.target == target {
                preview.range = range;
            }
        }
    }

    fn transition(&mut self, next: TrackerState) {
        tracing::info!(from = %self.state, to = %next, "state change");
        self.state = next;
        self.entered = false;
        self.calibration = None;
        self.session = None;
        self.preview = None;
        self.position_mm = None;
        self.velocity = Velocity::ZERO;
        self.paddle = None;
    }

    /// Moves to `Error`, which only a clear-error request leaves.
    fn fail(&mut self, code: ErrorCode) {
        tracing::error!(?code, "tracker error");
        self.error = code;
        self.transition(TrackerState::Error);
        self.entered = true;
        self.release_camera();
    }

    fn enter(&mut self) {
        match self.state {
            TrackerState::Calibrate => self.enter_calibrate(),
            TrackerState::Tracking => self.enter_tracking(),
            TrackerState::FindFiducials => self.enter_preview(ColorTarget::Fiducial),
            TrackerState::FindPuck => self.enter_preview(ColorTarget::Puck),
            TrackerState::Idle
            | TrackerState::Calibrated
            | TrackerState::NotCalibrated
            | TrackerState::Error => self.release_camera(),
            TrackerState::Quit => self.enter_quit(),
        }
    }

    fn enter_quit(&mut self) {
        self.release_camera();
    }

    fn load_settings(&mut self) -> Option<TrackerSettings> {
        match self.settings.load() {
            Ok(settings) => Some(settings),
            Err(e) => {
                self.settings_failed(e);
                None
            }
        }
    }

    fn settings_failed(&mut self, e: SettingsError) {
        tracing::error!(path = %self.settings.path().display(), "settings: {}", e);
        self.fail(ErrorCode::Settings);
    }

    fn enter_calibrate(&mut self) {
        let Some(settings) = self.load_settings() else {
            return;
        };
        let range = self
            .overrides
            .fiducial_range
            .unwrap_or_else(|| settings.fiducial.color.into());
        let mut calibrator = FiducialCalibrator::new(range, settings.detection.median_kernel);
        if let Some(bounds) = settings.detection.fiducial {
            calibrator = calibrator.with_bounds(bounds);
        }
        self.calibration = Some(CalibrationRun {
            calibrator,
            attempts: 0,
        });
        let mode = self.camera_config.calibration;
        self.open_camera(&mode);
    }

    fn enter_tracking(&mut self) {
        let Some(settings) = self.load_settings() else {
            return;
        };
        let Some(fiducials) = settings.fiducial.coordinates else {
            tracing::warn!("no fiducial coordinates stored");
            self.transition(TrackerState::NotCalibrated);
            return;
        };
        let calibration = match Calibration::new(fiducials, &settings.table) {
            Ok(calibration) => calibration,
            Err(CalibrationError::Singular(reason)) => {
                tracing::error!("stored fiducials are singular: {}", reason);
                self.fail(ErrorCode::CalibrationSingular);
                return;
            }
            Err(e) => {
                tracing::warn!("stored fiducials unusable: {}", e);
                self.transition(TrackerState::NotCalibrated);
                return;
            }
        };
        tracing::info!(
            width = calibration.transform.width,
            height = calibration.transform.height,
            mm_per_px_x = calibration.mapping.scale().mm_per_pixel_x,
            mm_per_px_y = calibration.mapping.scale().mm_per_pixel_y,
            "tracking calibration loaded"
        );

        let puck_range = self
            .overrides
            .puck_range
            .unwrap_or_else(|| settings.puck.color.into());
        let mode = self.overrides.game_mode.unwrap_or(settings.game_mode);
        self.session = Some(TrackingSession {
            tracker: PuckTracker::new(TrackerContext {
                puck_range,
                detection: settings.detection,
                calibration,
            }),
            predictor: InterceptPredictor::new(
                settings.prediction,
                settings.table.dimensions.width_mm,
            ),
            commander: PaddleCommander::new(
                settings.paddle,
                mode,
                settings.table.dimensions.length_mm,
            ),
        });
        let mode = self.camera_config.tracking;
        self.open_camera(&mode);
    }

    fn enter_preview(&mut self, target: ColorTarget) {
        let Some(settings) = self.load_settings() else {
            return;
        };
        let (range, bounds) = match target {
            ColorTarget::Puck => (
                self.overrides
                    .puck_range
                    .unwrap_or_else(|| settings.puck.color.into()),
                Some(settings.detection.puck),
            ),
            ColorTarget::Fiducial => (
                self.overrides
                    .fiducial_range
                    .unwrap_or_else(|| settings.fiducial.color.into()),
                settings.detection.fiducial,
            ),
        };
        self.preview = Some(Preview {
            target,
            range,
            kernel: settings.detection.median_kernel,
            bounds,
            selection: settings.detection.selection,
        });
        let mode = self.camera_config.calibration;
        self.open_camera(&mode);
    }

    fn open_camera(&mut self, mode: &CaptureMode) {
        match self.camera.open(mode) {
            Ok(()) => {
                self.camera_open = true;
                self.camera_recovered();
            }
            Err(e) => {
                self.camera_open = false;
                self.camera_failed(e);
            }
        }
    }

    fn release_camera(&mut self) {
        if self.camera_open {
            self.camera.release();
            self.camera_open = false;
            tracing::debug!("camera released");
        }
    }

    /// Reads a frame, reopening the camera first if it is not open.
    fn read_frame(&mut self, mode: CaptureMode) -> Option<RgbImage> {
        if !self.camera_open {
            self.open_camera(&mode);
            if !self.camera_open {
                return None;
            }
        }
        match self.camera.read() {
            Ok(frame) => {
                self.camera_recovered();
                Some(frame)
            }
            Err(e) => {
                if matches!(e, CameraError::Closed) {
                    self.camera_open = false;
                }
                self.camera_failed(e);
                None
            }
        }
    }

    fn camera_failed(&mut self, e: CameraError) {
        tracing::warn!(retry_in = ?self.retry_delay, "camera: {}", e);
        self.error = ErrorCode::Camera;
        if !self.retry_delay.is_zero() {
            self.clock.sleep(self.retry_delay);
            let max = Duration::from_millis(self.config.camera_retry_max_ms);
            self.retry_delay = (self.retry_delay * 2).min(max);
        }
    }

    fn camera_recovered(&mut self) {
        self.retry_delay = Duration::from_millis(self.config.camera_retry_initial_ms);
        if self.error == ErrorCode::Camera {
            self.error = ErrorCode::None;
        }
    }

    fn calibrate_step(&mut self) {
        let Some(frame) = self.read_frame(self.camera_config.calibration) else {
            return;
        };
        let Some(run) = &mut self.calibration else {
            return;
        };
        run.attempts += 1;
        let attempts = run.attempts;
        let found = run.calibrator.observe(frame.view());

        let mut annotated = frame;
        for corner in run.calibrator.partial().corners().into_iter().flatten() {
            overlay::draw_circle(&mut annotated.view_mut(), corner.x, corner.y, 10.0, overlay::PUCK);
        }
        self.channels.frames.publish(Arc::new(annotated));

        match found {
            Some(fiducials) => {
                let table = match self.settings.load() {
                    Ok(settings) => settings.table,
                    Err(e) => return self.settings_failed(e),
                };
                if let Err(e) = Calibration::new(fiducials, &table) {
                    tracing::error!("calibration rejected: {}", e);
                    return self.fail(ErrorCode::CalibrationSingular);
                }
                if let Err(e) = self.settings.save_fiducials(&fiducials) {
                    return self.settings_failed(e);
                }
                tracing::info!(attempts, ?fiducials, "calibration complete");
                self.error = ErrorCode::None;
                self.transition(TrackerState::Calibrated);
            }
            None if attempts >= self.config.max_calibration_attempts => {
                let located = self
                    .calibration
                    .as_ref()
                    .map_or(0, |run| run.calibrator.partial().found());
                tracing::error!(
                    attempts,
                    "{}",
                    CalibrationError::TooFewFiducials { found: located }
                );
                self.transition(TrackerState::Idle);
                self.error = ErrorCode::CalibrationFailed;
            }
            None => {}
        }
    }

    fn tracking_step(&mut self) {
        let Some(frame) = self.read_frame(self.camera_config.tracking) else {
            return;
        };
        let now = self.clock.now();
        let Some(session) = &mut self.session else {
            return;
        };

        let tracked = session.tracker.process(frame.view(), now);
        let position = tracked.observation.position_mm;

        let step = session
            .commander
            .step(&mut session.predictor, position, tracked.velocity);
        if let Some(e) = &step.error {
            tracing::warn!(state = ?step.state, "{}", e);
        }
        if let Some(command) = session.commander.filter(step.command) {
            tracing::debug!(x_mm = command.x_mm, y_mm = command.y_mm, "paddle command");
            self.channels.paddle.send(command);
        }

        let mut annotated = tracked.rectified;
        {
            let mut view = annotated.view_mut();
            if let Some(blob) = &tracked.blob {
                overlay::draw_puck(&mut view, blob);
            }
            if let Some(prediction) = &step.prediction {
                let mapping = &session.tracker.context().calibration.mapping;
                overlay::draw_prediction(&mut view, mapping, prediction);
            }
        }
        self.channels.frames.publish(Arc::new(annotated));

        self.position_mm = position;
        self.velocity = tracked.velocity;
        self.paddle = Some(session.commander.last_sent());
        if step.error.is_some() {
            self.error = ErrorCode::PredictionDivergence;
        } else if self.error == ErrorCode::PredictionDivergence {
            self.error = ErrorCode::None;
        }
    }

    fn preview_step(&mut self) {
        let Some(frame) = self.read_frame(self.camera_config.calibration) else {
            return;
        };
        let Some(preview) = &self.preview else {
            return;
        };
        let annotated = render_preview(frame.view(), preview);
        self.channels.frames.publish(Arc::new(annotated));
    }

    fn publish_status(&self) {
        self.channels.status.publish(self.status());
    }
}

/// Masked frame with rings around the blobs the current settings would pick.
fn render_preview(frame: ArrayView2<[u8; 3]>, preview: &Preview) -> RgbImage {
    let mask = segment(frame, &preview.range, preview.kernel);
    let mut out = apply_mask(frame, mask.view());
    let mut view = out.view_mut();
    match preview.target {
        ColorTarget::Puck => {
            let bounds = preview.bounds.unwrap_or_default();
            if let Some(blob) = extract(mask.view(), &bounds, preview.selection) {
                overlay::draw_puck(&mut view, &blob);
            }
        }
        ColorTarget::Fiducial => {
            for blob in all_blobs(mask.view()) {
                let accepted = preview
                    .bounds
                    .map_or(true, |b| b.accepts(blob.area, blob.radius));
                if accepted {
                    overlay::draw_puck(&mut view, &blob);
                }
            }
        }
    }
    out
}
