//! Frame loop
//!
//! Owns the coordinator and the tracking receiver. Once per frame it drains
//! every queued head position in arrival order, then any operator commands,
//! recomputes both cameras and hands each display to the renderer.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::coordinator::{DisplayId, DualDisplayCoordinator};
use crate::input::ManualCommand;
use crate::projection::GeometryError;
use crate::render::{DisplayPass, DisplayRenderer};
use crate::settings::{HeadTrackSettings, SettingsError};
use crate::tracking::{ReceiverStats, TrackingError, TrackingReceiver};

/// Errors creating or starting the app
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("invalid display geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),
}

/// What happened during one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Tracker positions applied
    pub tracked_events: usize,
    /// Operator commands applied
    pub commands: usize,
    /// Displays showing a held transform because their geometry is degenerate
    pub degenerate_displays: usize,
}

pub struct App {
    settings: HeadTrackSettings,
    coordinator: DualDisplayCoordinator,
    receiver: Option<TrackingReceiver>,
    commands: VecDeque<ManualCommand>,
    frame_count: u64,
}

impl App {
    pub fn new(mut settings: HeadTrackSettings) -> Result<Self, AppError> {
        settings.clamp_fps();
        settings.validate()?;
        let coordinator = DualDisplayCoordinator::new(&settings)?;

        tracing::info!(
            "Room {}x{}x{}, out-of-volume policy: {}",
            settings.room.width,
            settings.room.height,
            settings.room.depth,
            settings.coordinator.out_of_volume_policy.display_name()
        );

        Ok(Self {
            settings,
            coordinator,
            receiver: None,
            commands: VecDeque::new(),
            frame_count: 0,
        })
    }

    pub fn settings(&self) -> &HeadTrackSettings {
        &self.settings
    }

    pub fn coordinator(&self) -> &DualDisplayCoordinator {
        &self.coordinator
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Time budget per frame at the configured rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.settings.target_fps.max(1)))
    }

    /// Bind the tracking listener if tracking is enabled.
    ///
    /// Returns the bound address, or `None` when tracking is disabled.
    pub fn start_tracking(&mut self) -> Result<Option<SocketAddr>, AppError> {
        if !self.settings.tracking.enabled {
            tracing::info!("Head tracking disabled; manual input only");
            return Ok(None);
        }
        let receiver = TrackingReceiver::bind(&self.settings.tracking)?;
        let addr = receiver.local_addr();
        self.receiver = Some(receiver);
        Ok(Some(addr))
    }

    /// Use an already running receiver
    pub fn attach_receiver(&mut self, receiver: TrackingReceiver) {
        self.receiver = Some(receiver);
    }

    pub fn receiver_stats(&self) -> Option<ReceiverStats> {
        self.receiver.as_ref().map(TrackingReceiver::stats)
    }

    /// Queue an operator command for the next frame
    pub fn queue_command(&mut self, command: ManualCommand) {
        self.commands.push_back(command);
    }

    /// Run one frame: apply input, update both cameras, draw both displays
    pub fn frame(&mut self, renderer: &mut dyn DisplayRenderer) -> FrameReport {
        self.frame_count += 1;

        let mut tracked_events = 0;
        if let Some(receiver) = self.receiver.as_mut() {
            for position in receiver.drain() {
                self.coordinator.apply(position);
                tracked_events += 1;
            }
        }

        let commands = self.commands.len();
        while let Some(command) = self.commands.pop_front() {
            self.coordinator.handle_command(command);
        }

        self.coordinator.update_cameras();

        let mut degenerate_displays = 0;
        for display in self.coordinator.displays() {
            if display.is_degenerate() {
                degenerate_displays += 1;
            }
            renderer.draw_display(&DisplayPass {
                id: display.id(),
                name: display.name(),
                camera: display.camera(),
            });
        }

        FrameReport {
            frame: self.frame_count,
            tracked_events,
            commands,
            degenerate_displays,
        }
    }

    /// One-line summary of both eyes for periodic status logs
    pub fn status_line(&self) -> String {
        let mut parts = Vec::with_capacity(DisplayId::ALL.len());
        for id in DisplayId::ALL {
            let eye = self.coordinator.camera(id).eye();
            parts.push(format!("{} eye ({:.0}, {:.0}, {:.0})", id, eye.x, eye.y, eye.z));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Direction;
    use crate::render::RecordingRenderer;
    use glam::Vec3;

    fn manual_app() -> App {
        let mut settings = HeadTrackSettings::default();
        settings.tracking.enabled = false;
        App::new(settings).unwrap()
    }

    #[test]
    fn test_frame_draws_each_display_once() {
        let mut app = manual_app();
        let mut renderer = RecordingRenderer::default();
        let report = app.frame(&mut renderer);

        assert_eq!(report.frame, 1);
        assert_eq!(report.tracked_events, 0);
        let ids: Vec<_> = renderer.passes.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![DisplayId::Primary, DisplayId::Secondary]);
        // Independent cameras, independent transforms
        assert_ne!(renderer.passes[0].1, renderer.passes[1].1);
    }

    #[test]
    fn test_commands_apply_on_next_frame() {
        let mut app = manual_app();
        let mut renderer = RecordingRenderer::default();

        app.queue_command(ManualCommand::Nudge(Direction::Up));
        app.queue_command(ManualCommand::Nudge(Direction::Up));
        assert_eq!(
            app.coordinator().camera(DisplayId::Primary).eye(),
            Vec3::new(0.0, 0.0, 1200.0)
        );

        let report = app.frame(&mut renderer);
        assert_eq!(report.commands, 2);
        assert!(app
            .coordinator()
            .camera(DisplayId::Primary)
            .eye()
            .abs_diff_eq(Vec3::new(0.0, 0.0, 1000.0), 1e-3));

        let report = app.frame(&mut renderer);
        assert_eq!(report.commands, 0);
        assert_eq!(report.frame, 2);
    }

    #[test]
    fn test_tracking_disabled_binds_nothing() {
        let mut app = manual_app();
        assert_eq!(app.start_tracking().unwrap(), None);
        assert!(app.receiver_stats().is_none());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = HeadTrackSettings::default();
        settings.room.height = 0.0;
        assert!(matches!(App::new(settings), Err(AppError::Settings(_))));
    }

    #[test]
    fn test_frame_interval_follows_fps() {
        let mut settings = HeadTrackSettings::default();
        settings.target_fps = 50;
        settings.tracking.enabled = false;
        let app = App::new(settings).unwrap();
        assert_eq!(app.frame_interval(), Duration::from_millis(20));
    }
}
