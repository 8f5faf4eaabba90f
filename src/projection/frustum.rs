//! Generalized off-axis perspective projection
//!
//! Builds the projection for a viewer looking through a fixed physical screen:
//! the frustum apex sits at the eye and its image plane is the screen rectangle,
//! so the projected image stays registered to the screen as the eye moves.
//!
//! Clip space is right-handed with depth mapped to `[0, 1]`, the same
//! convention as [`glam::Mat4::perspective_rh`].

use glam::{Mat4, Vec3, Vec4};
use thiserror::Error;

use super::surface::{DisplaySurface, ScreenBasis};

/// Smallest eye-to-screen-plane distance (room units) the builder accepts
pub const MIN_EYE_DISTANCE: f32 = 1.0e-3;

/// Geometry that cannot produce a finite projection
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    #[error("screen edge has zero length")]
    ZeroLengthEdge,
    #[error("screen edges are parallel")]
    ParallelEdges,
    #[error("eye lies on the screen plane (distance {distance})")]
    EyeOnPlane { distance: f32 },
    #[error("eye is behind the screen (distance {distance})")]
    EyeBehindScreen { distance: f32 },
    #[error("eye position is not finite")]
    NonFiniteEye,
    #[error("invalid clip planes (near {near}, far {far})")]
    InvalidClipPlanes { near: f32, far: f32 },
    #[error("view direction is zero or parallel to up")]
    DegenerateView,
}

/// Extents of the perpendicular frustum on the near plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustumBounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl FrustumBounds {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Off-center perspective matrix for these bounds
    pub fn perspective(&self) -> Mat4 {
        let (l, r, b, t, n, f) = (
            self.left,
            self.right,
            self.bottom,
            self.top,
            self.near,
            self.far,
        );
        Mat4::from_cols(
            Vec4::new(2.0 * n / (r - l), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * n / (t - b), 0.0, 0.0),
            Vec4::new((r + l) / (r - l), (t + b) / (t - b), f / (n - f), -1.0),
            Vec4::new(0.0, 0.0, n * f / (n - f), 0.0),
        )
    }
}

/// Result of [`compute_frustum`]: the bounds, the screen basis and the eye
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffAxisProjection {
    pub bounds: FrustumBounds,
    pub basis: ScreenBasis,
    pub eye: Vec3,
    /// Perpendicular distance from the eye to the screen plane
    pub eye_distance: f32,
}

impl OffAxisProjection {
    /// Frustum as if the screen were perpendicular to the view axis
    pub fn perpendicular(&self) -> Mat4 {
        self.bounds.perspective()
    }

    /// Rotation into the screen's basis
    pub fn rotation(&self) -> Mat4 {
        self.basis.rotation()
    }

    /// Translation moving the eye to the origin
    pub fn translation(&self) -> Mat4 {
        Mat4::from_translation(-self.eye)
    }

    /// Rotation and translation without the frustum term
    pub fn orientation(&self) -> Mat4 {
        self.rotation() * self.translation()
    }

    /// Full projection: frustum, then screen rotation, then eye translation.
    ///
    /// Points are translated first, so the translation is the rightmost factor.
    pub fn matrix(&self) -> Mat4 {
        self.perpendicular() * self.orientation()
    }
}

/// Build the off-axis projection of `surface` as seen from `eye`.
///
/// The eye must be in front of the screen (on the side its normal points to)
/// and at least [`MIN_EYE_DISTANCE`] from the plane.
pub fn compute_frustum(
    surface: &DisplaySurface,
    eye: Vec3,
    near: f32,
    far: f32,
) -> Result<OffAxisProjection, GeometryError> {
    if !(near > 0.0 && far > near && far.is_finite()) {
        return Err(GeometryError::InvalidClipPlanes { near, far });
    }
    if !eye.is_finite() {
        return Err(GeometryError::NonFiniteEye);
    }

    let basis = surface.basis()?;

    // Screen corners relative to the eye
    let va = surface.bottom_left - eye;
    let vb = surface.bottom_right - eye;
    let vc = surface.top_left - eye;

    let distance = -va.dot(basis.normal);
    if distance.abs() <= MIN_EYE_DISTANCE {
        return Err(GeometryError::EyeOnPlane { distance });
    }
    if distance < 0.0 {
        return Err(GeometryError::EyeBehindScreen { distance });
    }

    let scale = near / distance;
    let bounds = FrustumBounds {
        left: basis.right.dot(va) * scale,
        right: basis.right.dot(vb) * scale,
        bottom: basis.up.dot(va) * scale,
        top: basis.up.dot(vc) * scale,
        near,
        far,
    };

    Ok(OffAxisProjection {
        bounds,
        basis,
        eye,
        eye_distance: distance,
    })
}

/// [`compute_frustum`] taking the three corners directly
pub fn compute_frustum_from_corners(
    bottom_left: Vec3,
    bottom_right: Vec3,
    top_left: Vec3,
    eye: Vec3,
    near: f32,
    far: f32,
) -> Result<OffAxisProjection, GeometryError> {
    compute_frustum(
        &DisplaySurface::new(bottom_left, bottom_right, top_left),
        eye,
        near,
        far,
    )
}
