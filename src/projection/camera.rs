//! Head-tracked camera for a single display
//!
//! Holds the per-display eye/look-at state and recomputes the combined
//! view-projection transform from the off-axis frustum every frame.

use glam::{Mat4, Quat, Vec3};

use super::frustum::{compute_frustum, GeometryError, OffAxisProjection};
use super::surface::DisplaySurface;

/// Default vertical field of view in degrees
pub const DEFAULT_FOV_DEGREES: f32 = 25.0;
/// Default near clip distance (room units)
pub const DEFAULT_NEAR_CLIP: f32 = 1.0;
/// Default far clip distance (room units)
pub const DEFAULT_FAR_CLIP: f32 = 10_000.0;

/// Number of built-in viewpoint presets
pub const PRESET_COUNT: usize = 3;

/// Camera whose projection follows a tracked eye through a fixed screen
#[derive(Debug, Clone)]
pub struct HeadTrackedCamera {
    eye: Vec3,
    center: Vec3,
    up: Vec3,
    /// Baseline viewing axis; the eye rests at `axis * distance`
    axis: Vec3,
    fov_degrees: f32,
    aspect_ratio: f32,
    near: f32,
    far: f32,
    /// Baseline distance from the room origin
    distance: f32,
    view: Mat4,
    projection: Mat4,
    combined: Mat4,
    off_axis: Option<OffAxisProjection>,
}

impl HeadTrackedCamera {
    /// Create a camera resting `distance` units from the origin along +Z,
    /// looking at the origin with a symmetric fallback perspective.
    pub fn new(distance: f32, aspect_ratio: f32) -> Self {
        let mut camera = Self {
            eye: Vec3::Z * distance,
            center: Vec3::ZERO,
            up: Vec3::Y,
            axis: Vec3::Z,
            fov_degrees: DEFAULT_FOV_DEGREES,
            aspect_ratio,
            near: DEFAULT_NEAR_CLIP,
            far: DEFAULT_FAR_CLIP,
            distance,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            combined: Mat4::IDENTITY,
            off_axis: None,
        };
        camera.rebuild_fallback();
        camera
    }

    /// Use a different baseline axis (normalized). The eye moves to the
    /// baseline position on the new axis.
    pub fn with_axis(mut self, axis: Vec3) -> Self {
        let axis = axis.normalize_or_zero();
        if axis != Vec3::ZERO {
            self.axis = axis;
        }
        self.eye = self.baseline_eye();
        self.off_axis = None;
        self.rebuild_fallback();
        self
    }

    /// Symmetric perspective used before the first off-axis update
    fn rebuild_fallback(&mut self) {
        if self.off_axis.is_some() {
            return;
        }
        self.view = if self.eye.distance_squared(self.center) > f32::EPSILON {
            Mat4::look_at_rh(self.eye, self.center, self.up)
        } else {
            Mat4::IDENTITY
        };
        self.projection = Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect_ratio,
            self.near,
            self.far,
        );
        self.combined = self.projection * self.view;
    }

    fn baseline_eye(&self) -> Vec3 {
        self.axis * self.distance
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn axis(&self) -> Vec3 {
        self.axis
    }

    pub fn fov_degrees(&self) -> f32 {
        self.fov_degrees
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn near_clip(&self) -> f32 {
        self.near
    }

    pub fn far_clip(&self) -> f32 {
        self.far
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// View matrix from the last update
    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    /// Projection matrix from the last update
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Projection × view, ready for the renderer
    pub fn combined_matrix(&self) -> Mat4 {
        self.combined
    }

    /// Off-axis frustum of the last successful update, if any
    pub fn off_axis(&self) -> Option<&OffAxisProjection> {
        self.off_axis.as_ref()
    }

    pub fn is_off_axis(&self) -> bool {
        self.off_axis.is_some()
    }

    pub fn set_eye(&mut self, eye: Vec3) {
        self.eye = eye;
    }

    pub fn set_center(&mut self, center: Vec3) {
        self.center = center;
    }

    pub fn set_up(&mut self, up: Vec3) {
        self.up = up;
    }

    pub fn set_fov(&mut self, fov_degrees: f32) {
        self.fov_degrees = fov_degrees;
        self.rebuild_fallback();
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
        self.rebuild_fallback();
    }

    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
        self.rebuild_fallback();
    }

    /// Put the eye back on its baseline position
    pub fn reset_eye(&mut self) {
        self.eye = self.baseline_eye();
    }

    /// Load one of the fixed demo viewpoints.
    ///
    /// Presets are authored for a +Z baseline axis and rotated onto this
    /// camera's axis. Every preset eye keeps within 100 units of the baseline
    /// depth, so a screen that the baseline eye sees stays in view. Returns
    /// `false` (and changes nothing) for unknown indices.
    pub fn set_preset(&mut self, index: usize) -> bool {
        let d = self.distance;
        let (eye, center) = match index {
            0 => (Vec3::new(0.0, 0.0, d), Vec3::new(0.0, -100.0, 0.0)),
            1 => (Vec3::new(d * 0.4, -175.0, d - 100.0), Vec3::new(0.0, -190.0, 0.0)),
            2 => (Vec3::new(-174.0, -97.8, d - 20.0), Vec3::new(0.0, -190.0, 0.0)),
            _ => return false,
        };
        let rotation = Quat::from_rotation_arc(Vec3::Z, self.axis);
        self.eye = rotation * eye;
        self.center = rotation * center;
        true
    }

    /// Recompute the combined transform for this frame.
    ///
    /// `eye` is the eye to project from (possibly edge-corrected by the
    /// caller); the stored eye is left untouched. The view looks at the center
    /// from a projection eye that keeps only the eye's depth along the axis,
    /// so the lateral skew comes from the off-axis frustum alone. Screen
    /// corners are given in room coordinates.
    ///
    /// The corners and the eye are both moved into view space before the
    /// frustum is built, so the combined matrix equals the room-space
    /// off-axis matrix. The choice of projection eye only changes how the
    /// transform is split between [`Self::view_matrix`] and
    /// [`Self::projection_matrix`].
    ///
    /// On error the previous transform is kept.
    pub fn update(
        &mut self,
        eye: Vec3,
        bottom_left: Vec3,
        bottom_right: Vec3,
        top_left: Vec3,
    ) -> Result<(), GeometryError> {
        if !eye.is_finite() {
            return Err(GeometryError::NonFiniteEye);
        }

        let projection_eye = self.center + self.axis * self.axis.dot(eye - self.center);
        let forward = self.center - projection_eye;
        if forward.length_squared() <= f32::EPSILON
            || self.up.cross(forward).length_squared() <= f32::EPSILON
        {
            return Err(GeometryError::DegenerateView);
        }

        let view = Mat4::look_at_rh(projection_eye, self.center, self.up);
        let surface =
            DisplaySurface::new(bottom_left, bottom_right, top_left).transformed(&view);
        let off_axis =
            compute_frustum(&surface, view.transform_point3(eye), self.near, self.far)?;

        self.view = view;
        self.projection = off_axis.matrix();
        self.combined = self.projection * self.view;
        self.off_axis = Some(off_axis);
        Ok(())
    }

    /// [`HeadTrackedCamera::update`] using the stored eye
    pub fn update_from_surface(&mut self, surface: &DisplaySurface) -> Result<(), GeometryError> {
        self.update(
            self.eye,
            surface.bottom_left,
            surface.bottom_right,
            surface.top_left,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> DisplaySurface {
        DisplaySurface::new(
            Vec3::new(-300.0, -200.0, 300.0),
            Vec3::new(300.0, -200.0, 300.0),
            Vec3::new(-300.0, 200.0, 300.0),
        )
    }

    fn project(matrix: &Mat4, point: Vec3) -> Vec3 {
        let clip = *matrix * point.extend(1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn test_new_camera_defaults() {
        let camera = HeadTrackedCamera::new(1200.0, 16.0 / 9.0);
        assert_eq!(camera.eye(), Vec3::new(0.0, 0.0, 1200.0));
        assert_eq!(camera.center(), Vec3::ZERO);
        assert_eq!(camera.up(), Vec3::Y);
        assert_eq!(camera.fov_degrees(), DEFAULT_FOV_DEGREES);
        assert!(!camera.is_off_axis());

        let expected = Mat4::perspective_rh(
            DEFAULT_FOV_DEGREES.to_radians(),
            16.0 / 9.0,
            DEFAULT_NEAR_CLIP,
            DEFAULT_FAR_CLIP,
        );
        assert!(camera.projection_matrix().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_with_axis_moves_baseline() {
        let camera = HeadTrackedCamera::new(1200.0, 1.0).with_axis(-Vec3::X);
        assert!(camera.eye().abs_diff_eq(Vec3::new(-1200.0, 0.0, 0.0), 1e-4));
    }

    #[test]
    fn test_setters_replace_state() {
        let mut camera = HeadTrackedCamera::new(1200.0, 1.0);
        camera.set_eye(Vec3::new(1.0, 2.0, 3.0));
        camera.set_center(Vec3::new(-4.0, 5.0, -6.0));
        assert_eq!(camera.eye(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(camera.center(), Vec3::new(-4.0, 5.0, -6.0));

        camera.reset_eye();
        assert_eq!(camera.eye(), Vec3::new(0.0, 0.0, 1200.0));
    }

    #[test]
    fn test_presets() {
        let mut camera = HeadTrackedCamera::new(1000.0, 1.0);

        assert!(camera.set_preset(1));
        assert!(camera.eye().abs_diff_eq(Vec3::new(400.0, -175.0, 900.0), 1e-4));
        assert!(camera.center().abs_diff_eq(Vec3::new(0.0, -190.0, 0.0), 1e-4));

        assert!(camera.set_preset(0));
        assert!(camera.eye().abs_diff_eq(Vec3::new(0.0, 0.0, 1000.0), 1e-4));
        assert!(camera.center().abs_diff_eq(Vec3::new(0.0, -100.0, 0.0), 1e-4));

        let before = (camera.eye(), camera.center());
        assert!(!camera.set_preset(3));
        assert_eq!((camera.eye(), camera.center()), before);
    }

    #[test]
    fn test_update_maps_screen_to_ndc() {
        let mut camera = HeadTrackedCamera::new(1200.0, 16.0 / 9.0);
        camera.set_center(screen().center());

        let eye = Vec3::new(-220.0, 90.0, 1400.0);
        camera.set_eye(eye);
        camera.update_from_surface(&screen()).unwrap();
        assert!(camera.is_off_axis());

        let combined = camera.combined_matrix();
        let surface = screen();
        let bl = project(&combined, surface.bottom_left);
        let tr = project(&combined, surface.top_right());
        assert!(bl.truncate().abs_diff_eq(glam::Vec2::new(-1.0, -1.0), 1e-4));
        assert!(tr.truncate().abs_diff_eq(glam::Vec2::new(1.0, 1.0), 1e-4));
    }

    #[test]
    fn test_view_uses_projection_eye() {
        let mut camera = HeadTrackedCamera::new(1200.0, 1.0);
        camera.set_center(Vec3::new(0.0, 0.0, 300.0));
        let surface = screen();
        camera
            .update(
                Vec3::new(250.0, -60.0, 900.0),
                surface.bottom_left,
                surface.bottom_right,
                surface.top_left,
            )
            .unwrap();

        // Looking straight down the axis: the center lands on the view axis
        let center_in_view = camera.view_matrix().transform_point3(camera.center());
        assert!(center_in_view.abs_diff_eq(Vec3::new(0.0, 0.0, -600.0), 1e-3));
        // The lateral offset lives in the frustum, not the view rotation
        let x_axis = camera.view_matrix().transform_vector3(Vec3::X);
        assert!(x_axis.abs_diff_eq(Vec3::X, 1e-6));
        let bounds = camera.off_axis().unwrap().bounds;
        assert!((bounds.left + bounds.right).abs() > 1e-3);
    }

    #[test]
    fn test_combined_matches_room_space_frustum() {
        let mut camera = HeadTrackedCamera::new(1200.0, 1.0);
        camera.set_center(Vec3::new(40.0, -190.0, 0.0));
        let eye = Vec3::new(-320.0, 75.0, 1100.0);
        camera.set_eye(eye);
        camera.update_from_surface(&screen()).unwrap();

        let room = compute_frustum(&screen(), eye, DEFAULT_NEAR_CLIP, DEFAULT_FAR_CLIP)
            .unwrap()
            .matrix();
        let combined = camera.combined_matrix();
        for point in [
            Vec3::new(-300.0, -200.0, 300.0),
            Vec3::new(120.0, 50.0, -400.0),
            Vec3::new(0.0, 0.0, 800.0),
        ] {
            assert!(project(&combined, point).abs_diff_eq(project(&room, point), 1e-3));
        }
        // The view half of the split still differs from the room frame
        assert_ne!(camera.view_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_update_does_not_move_stored_eye() {
        let mut camera = HeadTrackedCamera::new(1200.0, 1.0);
        camera.set_center(screen().center());
        let stored = Vec3::new(0.0, 0.0, 1500.0);
        camera.set_eye(stored);

        let surface = screen();
        camera
            .update(
                Vec3::new(-450.0, 0.0, 1500.0),
                surface.bottom_left,
                surface.bottom_right,
                surface.top_left,
            )
            .unwrap();
        assert_eq!(camera.eye(), stored);
        assert!((camera.off_axis().unwrap().eye.x - -450.0).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_update_keeps_previous_transform() {
        let mut camera = HeadTrackedCamera::new(1200.0, 1.0);
        camera.set_center(screen().center());
        camera.update_from_surface(&screen()).unwrap();
        let good = camera.combined_matrix();

        // Eye on the screen plane
        camera.set_eye(Vec3::new(10.0, 0.0, 300.0));
        assert!(camera.update_from_surface(&screen()).is_err());
        assert_eq!(camera.combined_matrix(), good);

        // Eye behind the screen
        camera.set_eye(Vec3::new(0.0, 0.0, -100.0));
        assert!(matches!(
            camera.update_from_surface(&screen()),
            Err(GeometryError::EyeBehindScreen { .. })
        ));
        assert_eq!(camera.combined_matrix(), good);
    }
}
