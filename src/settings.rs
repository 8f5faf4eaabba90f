//! Settings management for the head-tracked display
//!
//! Handles loading/saving of the XML environment file describing the room,
//! the two screens, the clip planes and the tracking link.

use glam::Vec3;
use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::projection::{
    DisplaySurface, GeometryError, DEFAULT_FAR_CLIP, DEFAULT_FOV_DEGREES, DEFAULT_NEAR_CLIP,
};

/// A point in room units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<Point3> for Vec3 {
    fn from(p: Point3) -> Self {
        Vec3::new(p.x, p.y, p.z)
    }
}

impl From<Vec3> for Point3 {
    fn from(v: Vec3) -> Self {
        Point3::new(v.x, v.y, v.z)
    }
}

/// Physical room dimensions in room units, centered on the room origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomFrame {
    /// X extent
    #[serde(rename = "width", default = "default_room_width")]
    pub width: f32,
    /// Y extent
    #[serde(rename = "height", default = "default_room_height")]
    pub height: f32,
    /// Z extent
    #[serde(rename = "depth", default = "default_room_depth")]
    pub depth: f32,
}

fn default_room_width() -> f32 {
    600.0
}

fn default_room_height() -> f32 {
    400.0
}

fn default_room_depth() -> f32 {
    600.0
}

impl Default for RoomFrame {
    fn default() -> Self {
        Self {
            width: default_room_width(),
            height: default_room_height(),
            depth: default_room_depth(),
        }
    }
}

impl RoomFrame {
    pub fn half_width(&self) -> f32 {
        self.width / 2.0
    }

    pub fn half_height(&self) -> f32 {
        self.height / 2.0
    }

    pub fn half_depth(&self) -> f32 {
        self.depth / 2.0
    }

    /// Primary screen: the `z = depth/2` face, viewed from +z
    pub fn primary_surface(&self) -> DisplaySurface {
        let (w, h, d) = (self.half_width(), self.half_height(), self.half_depth());
        DisplaySurface::new(
            Vec3::new(-w, -h, d),
            Vec3::new(w, -h, d),
            Vec3::new(-w, h, d),
        )
    }

    /// Secondary screen: the `x = -width/2` face, viewed from -x.
    ///
    /// Its right edge meets the primary screen's left edge at a right angle.
    pub fn secondary_surface(&self) -> DisplaySurface {
        let (w, h, d) = (self.half_width(), self.half_height(), self.half_depth());
        DisplaySurface::new(
            Vec3::new(-w, -h, -d),
            Vec3::new(-w, -h, d),
            Vec3::new(-w, h, -d),
        )
    }
}

/// One physical screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "bottomLeft")]
    pub bottom_left: Point3,
    #[serde(rename = "bottomRight")]
    pub bottom_right: Point3,
    #[serde(rename = "topLeft")]
    pub top_left: Point3,
    /// Resting eye distance from the room origin along the screen normal
    #[serde(rename = "baselineDistance", default = "default_baseline_distance")]
    pub baseline_distance: f32,
}

fn default_baseline_distance() -> f32 {
    1200.0
}

impl DisplaySettings {
    pub fn from_surface(name: &str, surface: &DisplaySurface) -> Self {
        Self {
            name: name.to_string(),
            bottom_left: surface.bottom_left.into(),
            bottom_right: surface.bottom_right.into(),
            top_left: surface.top_left.into(),
            baseline_distance: default_baseline_distance(),
        }
    }

    pub fn surface(&self) -> DisplaySurface {
        DisplaySurface::new(
            self.bottom_left.into(),
            self.bottom_right.into(),
            self.top_left.into(),
        )
    }
}

/// Lens settings shared by both cameras
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Fallback vertical field of view in degrees
    #[serde(rename = "fovDegrees", default = "default_fov_degrees")]
    pub fov_degrees: f32,
    /// Per-display output aspect ratio (width / height)
    #[serde(rename = "aspectRatio", default = "default_aspect_ratio")]
    pub aspect_ratio: f32,
    #[serde(rename = "nearClip", default = "default_near_clip")]
    pub near_clip: f32,
    #[serde(rename = "farClip", default = "default_far_clip")]
    pub far_clip: f32,
}

fn default_fov_degrees() -> f32 {
    DEFAULT_FOV_DEGREES
}

fn default_aspect_ratio() -> f32 {
    16.0 / 9.0
}

fn default_near_clip() -> f32 {
    DEFAULT_NEAR_CLIP
}

fn default_far_clip() -> f32 {
    DEFAULT_FAR_CLIP
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_degrees: default_fov_degrees(),
            aspect_ratio: default_aspect_ratio(),
            near_clip: default_near_clip(),
            far_clip: default_far_clip(),
        }
    }
}

/// Tracking link (OSC over UDP) and unit conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Whether to listen for tracking packets
    #[serde(rename = "enabled", default = "default_tracking_enabled")]
    pub enabled: bool,
    /// Local address to bind the listener to
    #[serde(rename = "bindAddress", default = "default_bind_address")]
    pub bind_address: String,
    /// UDP port (default 7110)
    #[serde(rename = "port", default = "default_tracking_port")]
    pub port: u16,
    /// OSC address identifying head messages
    #[serde(rename = "address", default = "default_osc_address")]
    pub address: String,
    /// Scale from tracker metres to room units (3.28 ft/m × 100 units/ft)
    #[serde(rename = "metersToRoomUnits", default = "default_meters_to_room_units")]
    pub meters_to_room_units: f32,
    /// Added to converted y to compensate for sensor mounting height.
    ///
    /// When absent, `-room.height / 3` is used.
    #[serde(rename = "verticalOffset", default, skip_serializing_if = "Option::is_none")]
    pub vertical_offset: Option<f32>,
}

fn default_tracking_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_tracking_port() -> u16 {
    7110
}

fn default_osc_address() -> String {
    "/head".to_string()
}

fn default_meters_to_room_units() -> f32 {
    3.28 * 100.0
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            enabled: default_tracking_enabled(),
            bind_address: default_bind_address(),
            port: default_tracking_port(),
            address: default_osc_address(),
            meters_to_room_units: default_meters_to_room_units(),
            vertical_offset: None,
        }
    }
}

/// What a camera does when the head leaves its screen's valid volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutOfVolumePolicy {
    /// Keep the last eye position
    #[default]
    HoldLast,
    /// Return the eye to its baseline position
    ResetToBaseline,
}

impl OutOfVolumePolicy {
    /// Get display name for logs
    pub fn display_name(&self) -> &'static str {
        match self {
            OutOfVolumePolicy::HoldLast => "hold last position",
            OutOfVolumePolicy::ResetToBaseline => "reset to baseline",
        }
    }
}

/// Dual-display coordination tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorSettings {
    /// Lateral distance beyond which edge-angle correction kicks in
    #[serde(rename = "edgeCorrectionThreshold", default = "default_edge_threshold")]
    pub edge_correction_threshold: f32,
    #[serde(rename = "outOfVolumePolicy", default)]
    pub out_of_volume_policy: OutOfVolumePolicy,
    /// Room units moved per manual nudge
    #[serde(rename = "manualStep", default = "default_manual_step")]
    pub manual_step: f32,
}

fn default_edge_threshold() -> f32 {
    300.0
}

fn default_manual_step() -> f32 {
    100.0
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            edge_correction_threshold: default_edge_threshold(),
            out_of_volume_policy: OutOfVolumePolicy::default(),
            manual_step: default_manual_step(),
        }
    }
}

/// Environment settings stored in the XML config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "HeadTrackEnvironment")]
pub struct HeadTrackSettings {
    /// Frame rate of the render loop (1-240)
    #[serde(rename = "targetFps", default = "default_target_fps")]
    pub target_fps: u32,

    #[serde(rename = "room", default)]
    pub room: RoomFrame,

    #[serde(rename = "camera", default)]
    pub camera: CameraSettings,

    /// Primary screen; derived from the room when absent
    #[serde(rename = "primaryDisplay", default, skip_serializing_if = "Option::is_none")]
    pub primary_display: Option<DisplaySettings>,

    /// Secondary screen; derived from the room when absent
    #[serde(rename = "secondaryDisplay", default, skip_serializing_if = "Option::is_none")]
    pub secondary_display: Option<DisplaySettings>,

    #[serde(rename = "tracking", default)]
    pub tracking: TrackingSettings,

    #[serde(rename = "coordinator", default)]
    pub coordinator: CoordinatorSettings,
}

fn default_target_fps() -> u32 {
    30
}

impl Default for HeadTrackSettings {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            room: RoomFrame::default(),
            camera: CameraSettings::default(),
            primary_display: None,
            secondary_display: None,
            tracking: TrackingSettings::default(),
            coordinator: CoordinatorSettings::default(),
        }
    }
}

impl HeadTrackSettings {
    /// Clamp FPS to valid range (1-240)
    pub fn clamp_fps(&mut self) {
        self.target_fps = self.target_fps.clamp(1, 240);
    }

    /// Primary screen, falling back to the room's front face
    pub fn primary(&self) -> DisplaySettings {
        self.primary_display.clone().unwrap_or_else(|| {
            DisplaySettings::from_surface("Primary", &self.room.primary_surface())
        })
    }

    /// Secondary screen, falling back to the room's left face
    pub fn secondary(&self) -> DisplaySettings {
        self.secondary_display.clone().unwrap_or_else(|| {
            DisplaySettings::from_surface("Secondary", &self.room.secondary_surface())
        })
    }

    /// Vertical offset applied to converted tracker positions
    pub fn vertical_offset(&self) -> f32 {
        self.tracking
            .vertical_offset
            .unwrap_or(-self.room.height / 3.0)
    }

    /// Check that the configuration can produce finite projections
    pub fn validate(&self) -> Result<(), SettingsError> {
        let room = &self.room;
        if !(room.width > 0.0 && room.height > 0.0 && room.depth > 0.0) {
            return Err(SettingsError::Invalid(format!(
                "room dimensions must be positive ({} x {} x {})",
                room.width, room.height, room.depth
            )));
        }

        let camera = &self.camera;
        let clip_ok = camera.near_clip > 0.0
            && camera.far_clip > camera.near_clip
            && camera.far_clip.is_finite();
        if !clip_ok {
            return Err(SettingsError::Geometry(GeometryError::InvalidClipPlanes {
                near: camera.near_clip,
                far: camera.far_clip,
            }));
        }
        if !(camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0) {
            return Err(SettingsError::Invalid(format!(
                "field of view must be within (0, 180) degrees, got {}",
                camera.fov_degrees
            )));
        }
        if !(camera.aspect_ratio > 0.0) {
            return Err(SettingsError::Invalid(format!(
                "aspect ratio must be positive, got {}",
                camera.aspect_ratio
            )));
        }

        for display in [self.primary(), self.secondary()] {
            let surface = display.surface();
            let basis = surface.basis().map_err(SettingsError::Geometry)?;
            // The resting eye has to see the front of its screen
            let baseline = basis.normal * display.baseline_distance;
            if (baseline - surface.bottom_left).dot(basis.normal) <= 0.0 {
                return Err(SettingsError::Invalid(format!(
                    "baseline eye of '{}' is not in front of its screen",
                    display.name
                )));
            }
        }

        let scale = self.tracking.meters_to_room_units;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(SettingsError::Invalid(format!(
                "metersToRoomUnits must be positive, got {}",
                scale
            )));
        }

        let coordinator = &self.coordinator;
        for (name, value) in [
            ("edgeCorrectionThreshold", coordinator.edge_correction_threshold),
            ("manualStep", coordinator.manual_step),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SettingsError::Invalid(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(SettingsError::Io)?;
        let mut settings: Self = from_str(&contents).map_err(SettingsError::XmlParse)?;
        settings.clamp_fps();
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let xml = to_string(self).map_err(SettingsError::XmlWrite)?;

        // Add XML declaration
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(SettingsError::Io)?;
            }
        }
        fs::write(path, formatted).map_err(SettingsError::Io)?;
        Ok(())
    }

    /// Default settings file location in the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("ImmersiveHeadtrack");
            p.push("headtrack.xml");
            p
        })
    }

    /// Write these settings to the default location
    pub fn save_default(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::default_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to_file(&path)?;
        Ok(path)
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to load settings from {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Settings-related errors
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    XmlParse(quick_xml::DeError),
    XmlWrite(quick_xml::SeError),
    NoConfigDir,
    Geometry(GeometryError),
    Invalid(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::XmlParse(e) => write!(f, "XML parse error: {}", e),
            SettingsError::XmlWrite(e) => write!(f, "XML write error: {}", e),
            SettingsError::NoConfigDir => write!(f, "Could not determine config directory"),
            SettingsError::Geometry(e) => write!(f, "Invalid geometry: {}", e),
            SettingsError::Invalid(msg) => write!(f, "Invalid settings: {}", msg),
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = HeadTrackSettings::default();
        assert_eq!(settings.target_fps, 30);
        assert_eq!(settings.tracking.port, 7110);
        assert_eq!(settings.tracking.address, "/head");
        assert_eq!(settings.coordinator.edge_correction_threshold, 300.0);
        assert!((settings.vertical_offset() - (-400.0 / 3.0)).abs() < 1e-4);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_fps_clamping() {
        let mut settings = HeadTrackSettings::default();
        settings.target_fps = 300;
        settings.clamp_fps();
        assert_eq!(settings.target_fps, 240);

        settings.target_fps = 0;
        settings.clamp_fps();
        assert_eq!(settings.target_fps, 1);
    }

    #[test]
    fn test_default_screens_meet_at_right_angle() {
        let room = RoomFrame::default();
        let primary = room.primary_surface();
        let secondary = room.secondary_surface();

        // Shared vertical edge
        assert_eq!(primary.bottom_left, secondary.bottom_right);

        let a = primary.basis().unwrap();
        let b = secondary.basis().unwrap();
        assert!(a.normal.dot(b.normal).abs() < 1e-6);
        assert!(a.normal.abs_diff_eq(Vec3::Z, 1e-6));
        assert!(b.normal.abs_diff_eq(-Vec3::X, 1e-6));
    }

    #[test]
    fn test_invalid_surface_fails_validation() {
        let mut settings = HeadTrackSettings::default();
        let mut display = settings.primary();
        display.top_left = display.bottom_left;
        settings.primary_display = Some(display);
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Geometry(GeometryError::ZeroLengthEdge))
        ));
    }

    #[test]
    fn test_invalid_clip_planes_fail_validation() {
        let mut settings = HeadTrackSettings::default();
        settings.camera.near_clip = 50.0;
        settings.camera.far_clip = 10.0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Geometry(GeometryError::InvalidClipPlanes { .. }))
        ));
    }

    #[test]
    fn test_invalid_coordinator_values_fail_validation() {
        let mut settings = HeadTrackSettings::default();
        settings.coordinator.edge_correction_threshold = f32::NAN;
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));

        let mut settings = HeadTrackSettings::default();
        settings.coordinator.manual_step = -100.0;
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));

        let mut settings = HeadTrackSettings::default();
        settings.coordinator.edge_correction_threshold = 0.0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headtrack.xml");

        let mut settings = HeadTrackSettings::default();
        settings.target_fps = 60;
        settings.tracking.port = 9000;
        settings.tracking.vertical_offset = Some(-90.0);
        settings.coordinator.out_of_volume_policy = OutOfVolumePolicy::ResetToBaseline;
        settings.primary_display = Some(settings.primary());

        settings.save_to_file(&path).unwrap();
        let loaded = HeadTrackSettings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.xml");
        fs::write(
            &path,
            "<HeadTrackEnvironment><targetFps>45</targetFps>\
             <room><width>800</width></room></HeadTrackEnvironment>",
        )
        .unwrap();

        let loaded = HeadTrackSettings::load_from_file(&path).unwrap();
        assert_eq!(loaded.target_fps, 45);
        assert_eq!(loaded.room.width, 800.0);
        assert_eq!(loaded.room.depth, 600.0);
        assert_eq!(loaded.tracking, TrackingSettings::default());
        // Derived screens follow the configured room
        assert_eq!(loaded.secondary().bottom_left.x, -400.0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = HeadTrackSettings::load_from_file(Path::new("/nonexistent/headtrack.xml"));
        assert!(matches!(result, Err(SettingsError::Io(_))));
    }
}
