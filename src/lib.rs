//! Immersive Headtrack Library
//!
//! Head-coupled perspective for two physical screens meeting at a right angle.
//! A tracked head position drives one off-axis camera per screen so each
//! screen behaves like a window into a shared 3D room.

pub mod app;
pub mod coordinator;
pub mod input;
pub mod projection;
pub mod render;
pub mod settings;
pub mod telemetry;
pub mod tracking;

pub use app::{App, AppError, FrameReport};
pub use coordinator::{Display, DisplayId, DualDisplayCoordinator, EdgeCorrection};
pub use input::{Direction, HeadPosition, InputSource, ManualCommand};
pub use projection::{compute_frustum, DisplaySurface, GeometryError, HeadTrackedCamera};
pub use render::{DisplayPass, DisplayRenderer, RecordingRenderer, TraceRenderer};
pub use settings::{HeadTrackSettings, OutOfVolumePolicy, SettingsError};
pub use tracking::{TrackingError, TrackingReceiver};
