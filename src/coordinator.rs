//! Dual-display coordination
//!
//! Maps each head position onto the two screens' cameras. Tracker positions
//! are converted into room units, each screen decides whether the head is in
//! front of it, and near a screen's vertical edges the projected eye is pushed
//! outward to counter the flattening the off-axis frustum shows at grazing
//! angles.

use glam::Vec3;

use crate::input::{Direction, HeadPosition, InputSource, ManualCommand};
use crate::projection::{
    DisplaySurface, GeometryError, HeadTrackedCamera, ScreenBasis, MIN_EYE_DISTANCE,
};
use crate::settings::{DisplaySettings, HeadTrackSettings, OutOfVolumePolicy};

/// Identifies one of the two physical screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayId {
    /// Screen A, facing the viewer
    Primary,
    /// Screen B, meeting screen A at a right angle along a shared edge
    Secondary,
}

impl DisplayId {
    pub const ALL: [DisplayId; 2] = [DisplayId::Primary, DisplayId::Secondary];

    fn index(self) -> usize {
        match self {
            DisplayId::Primary => 0,
            DisplayId::Secondary => 1,
        }
    }
}

impl std::fmt::Display for DisplayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayId::Primary => write!(f, "primary"),
            DisplayId::Secondary => write!(f, "secondary"),
        }
    }
}

/// Lateral eye adjustment applied for one frame.
///
/// Stores both values so the true tracked lateral can be restored exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeCorrection {
    pub ratio: f32,
    pub original_lateral: f32,
    pub corrected_lateral: f32,
}

impl EdgeCorrection {
    fn none(lateral: f32) -> Self {
        Self {
            ratio: 0.0,
            original_lateral: lateral,
            corrected_lateral: lateral,
        }
    }

    /// Compute the correction for an eye in a screen's local frame.
    ///
    /// Past `threshold` (on either side) the ratio is the eye's lateral offset
    /// from the screen's left edge over its depth in front of the screen
    /// plane, and the lateral coordinate grows by `ratio * depth`.
    pub fn compute(local_eye: Vec3, threshold: f32, left_edge: f32, plane_offset: f32) -> Self {
        let lateral = local_eye.x;
        if lateral.abs() <= threshold {
            return Self::none(lateral);
        }

        let denominator = local_eye.z - plane_offset;
        if denominator <= MIN_EYE_DISTANCE {
            return Self::none(lateral);
        }

        let ratio = (lateral - left_edge) / denominator;
        Self {
            ratio,
            original_lateral: lateral,
            corrected_lateral: lateral + ratio * local_eye.z,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ratio != 0.0
    }

    /// Local eye with the corrected lateral coordinate
    pub fn apply(&self, local_eye: Vec3) -> Vec3 {
        Vec3::new(self.corrected_lateral, local_eye.y, local_eye.z)
    }

    /// Local eye with the true lateral coordinate restored
    pub fn revert(&self, local_eye: Vec3) -> Vec3 {
        Vec3::new(self.original_lateral, local_eye.y, local_eye.z)
    }
}

/// One physical screen with its own camera
#[derive(Debug, Clone)]
pub struct Display {
    id: DisplayId,
    name: String,
    surface: DisplaySurface,
    basis: ScreenBasis,
    /// Depth of the screen plane in the local frame
    plane_offset: f32,
    /// Lateral coordinate of the left vertical edge in the local frame
    left_edge: f32,
    camera: HeadTrackedCamera,
    correction: EdgeCorrection,
    /// Last camera update failed
    degenerate: bool,
}

impl Display {
    fn new(
        id: DisplayId,
        config: &DisplaySettings,
        settings: &HeadTrackSettings,
    ) -> Result<Self, GeometryError> {
        let surface = config.surface();
        let basis = surface.basis()?;

        let mut camera =
            HeadTrackedCamera::new(config.baseline_distance, settings.camera.aspect_ratio)
                .with_axis(basis.normal);
        camera.set_center(surface.center());
        camera.set_fov(settings.camera.fov_degrees);
        camera.set_clip_planes(settings.camera.near_clip, settings.camera.far_clip);

        let left_edge = basis.to_local(surface.bottom_left).x;

        Ok(Self {
            id,
            name: config.name.clone(),
            surface,
            basis,
            plane_offset: surface.bottom_left.dot(basis.normal),
            left_edge,
            camera,
            correction: EdgeCorrection::none(0.0),
            degenerate: false,
        })
    }

    pub fn id(&self) -> DisplayId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn surface(&self) -> &DisplaySurface {
        &self.surface
    }

    pub fn basis(&self) -> &ScreenBasis {
        &self.basis
    }

    pub fn plane_offset(&self) -> f32 {
        self.plane_offset
    }

    pub fn camera(&self) -> &HeadTrackedCamera {
        &self.camera
    }

    /// Correction used by the last camera update
    pub fn edge_correction(&self) -> EdgeCorrection {
        self.correction
    }

    /// Whether the last camera update failed and the previous transform is shown
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Resting eye position in room coordinates
    pub fn baseline_eye(&self) -> Vec3 {
        self.camera.axis() * self.camera.distance()
    }

    /// Room point in this screen's (lateral, vertical, depth) frame
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.basis.to_local(point)
    }

    pub fn to_global(&self, local: Vec3) -> Vec3 {
        self.basis.to_global(local)
    }

    /// A point is in this screen's valid volume when it is in front of the plane
    pub fn contains(&self, point: Vec3) -> bool {
        self.to_local(point).z > self.plane_offset
    }

    fn update_camera(&mut self, threshold: f32) {
        let eye = self.camera.eye();
        let local = self.to_local(eye);
        let correction =
            EdgeCorrection::compute(local, threshold, self.left_edge, self.plane_offset);
        let projected_eye = if correction.is_active() {
            self.to_global(correction.apply(local))
        } else {
            eye
        };

        let surface = self.surface;
        match self.camera.update(
            projected_eye,
            surface.bottom_left,
            surface.bottom_right,
            surface.top_left,
        ) {
            Ok(()) => {
                if self.degenerate {
                    tracing::info!(display = %self.id, "Projection recovered");
                    self.degenerate = false;
                }
            }
            Err(e) => {
                if !self.degenerate {
                    tracing::warn!(
                        display = %self.id,
                        eye = ?eye,
                        "Keeping previous projection: {}",
                        e
                    );
                    self.degenerate = true;
                }
            }
        }
        self.correction = correction;
    }
}

/// Routes head positions to both screens' cameras
#[derive(Debug, Clone)]
pub struct DualDisplayCoordinator {
    displays: [Display; 2],
    meters_to_room_units: f32,
    vertical_offset: f32,
    edge_threshold: f32,
    policy: OutOfVolumePolicy,
    manual_step: f32,
}

impl DualDisplayCoordinator {
    pub fn new(settings: &HeadTrackSettings) -> Result<Self, GeometryError> {
        let primary = Display::new(DisplayId::Primary, &settings.primary(), settings)?;
        let secondary = Display::new(DisplayId::Secondary, &settings.secondary(), settings)?;

        Ok(Self {
            displays: [primary, secondary],
            meters_to_room_units: settings.tracking.meters_to_room_units,
            vertical_offset: settings.vertical_offset(),
            edge_threshold: settings.coordinator.edge_correction_threshold,
            policy: settings.coordinator.out_of_volume_policy,
            manual_step: settings.coordinator.manual_step,
        })
    }

    pub fn display(&self, id: DisplayId) -> &Display {
        &self.displays[id.index()]
    }

    pub fn displays(&self) -> &[Display] {
        &self.displays
    }

    pub fn camera(&self, id: DisplayId) -> &HeadTrackedCamera {
        self.display(id).camera()
    }

    pub fn edge_correction(&self, id: DisplayId) -> EdgeCorrection {
        self.display(id).edge_correction()
    }

    pub fn out_of_volume_policy(&self) -> OutOfVolumePolicy {
        self.policy
    }

    /// Convert a head position into room units.
    ///
    /// Tracker positions are scaled and shifted down by the sensor mounting
    /// offset; manual positions are already in room units.
    pub fn to_room_units(&self, head: HeadPosition) -> Vec3 {
        match head.source {
            InputSource::Tracker => {
                let mut point = head.position * self.meters_to_room_units;
                point.y += self.vertical_offset;
                point
            }
            InputSource::Manual => head.position,
        }
    }

    /// Move each camera whose screen can see the head.
    ///
    /// Returns the number of displays that followed the position.
    pub fn apply(&mut self, head: HeadPosition) -> usize {
        let point = self.to_room_units(head);
        if !point.is_finite() {
            tracing::trace!("Ignoring non-finite {} position", head.source);
            return 0;
        }

        let mut followed = 0;
        for display in &mut self.displays {
            if display.contains(point) {
                display.camera.set_eye(point);
                followed += 1;
            } else if self.policy == OutOfVolumePolicy::ResetToBaseline {
                display.camera.reset_eye();
            }
        }

        tracing::trace!(
            source = %head.source,
            followed,
            "Head at ({:.1}, {:.1}, {:.1})",
            point.x,
            point.y,
            point.z
        );
        followed
    }

    /// Run an operator command
    pub fn handle_command(&mut self, command: ManualCommand) {
        match command {
            ManualCommand::Nudge(direction) => self.nudge(direction),
            ManualCommand::Position(position) => {
                self.apply(HeadPosition::manual(position));
            }
            ManualCommand::Preset { display: id, index } => {
                if !self.set_preset(id, index) {
                    tracing::warn!("Unknown preset {} for {} display", index, id);
                }
            }
            ManualCommand::ResetEyes => self.reset_eyes(),
        }
    }

    /// Step the head one manual step from the primary camera's eye
    pub fn nudge(&mut self, direction: Direction) {
        let eye = self.camera(DisplayId::Primary).eye();
        let target = eye + direction.offset() * self.manual_step;
        tracing::debug!("Manual nudge {:?} to {:?}", direction, target);
        self.apply(HeadPosition::manual(target));
    }

    /// Load a fixed viewpoint on one display. Unknown indices are a no-op.
    pub fn set_preset(&mut self, id: DisplayId, index: usize) -> bool {
        self.displays[id.index()].camera.set_preset(index)
    }

    /// Put both cameras back on their baseline eye, looking at their screen
    pub fn reset_eyes(&mut self) {
        for display in &mut self.displays {
            display.camera.reset_eye();
            display.camera.set_center(display.surface.center());
        }
    }

    /// Recompute both cameras' transforms for this frame
    pub fn update_cameras(&mut self) {
        let threshold = self.edge_threshold;
        for display in &mut self.displays {
            display.update_camera(threshold);
        }
    }
}
