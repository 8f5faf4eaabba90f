//! Physical screen rectangles and the orthonormal frames derived from them.

use glam::{Mat4, Vec3, Vec4};

use super::frustum::GeometryError;

/// Squared lengths below this are treated as zero
const DEGENERATE_EPSILON: f32 = 1.0e-6;

/// A rectangular screen described by three of its corners in room coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySurface {
    pub bottom_left: Vec3,
    pub bottom_right: Vec3,
    pub top_left: Vec3,
}

impl DisplaySurface {
    pub fn new(bottom_left: Vec3, bottom_right: Vec3, top_left: Vec3) -> Self {
        Self {
            bottom_left,
            bottom_right,
            top_left,
        }
    }

    /// Compute the screen's right/up/normal basis.
    ///
    /// Fails when either edge is (nearly) zero length or the edges are
    /// (nearly) parallel, since no screen plane exists in that case.
    pub fn basis(&self) -> Result<ScreenBasis, GeometryError> {
        let edge_right = self.bottom_right - self.bottom_left;
        let edge_up = self.top_left - self.bottom_left;

        if !edge_right.is_finite() || !edge_up.is_finite() {
            return Err(GeometryError::ZeroLengthEdge);
        }
        if edge_right.length_squared() <= DEGENERATE_EPSILON
            || edge_up.length_squared() <= DEGENERATE_EPSILON
        {
            return Err(GeometryError::ZeroLengthEdge);
        }

        let right = edge_right.normalize();
        let up = edge_up.normalize();
        let normal = right.cross(up);
        if normal.length_squared() <= DEGENERATE_EPSILON {
            return Err(GeometryError::ParallelEdges);
        }

        Ok(ScreenBasis {
            right,
            up,
            normal: normal.normalize(),
        })
    }

    /// The fourth corner, completing the rectangle
    pub fn top_right(&self) -> Vec3 {
        self.bottom_right + (self.top_left - self.bottom_left)
    }

    /// Center of the screen rectangle
    pub fn center(&self) -> Vec3 {
        self.bottom_left
            + 0.5 * (self.bottom_right - self.bottom_left)
            + 0.5 * (self.top_left - self.bottom_left)
    }

    pub fn width(&self) -> f32 {
        (self.bottom_right - self.bottom_left).length()
    }

    pub fn height(&self) -> f32 {
        (self.top_left - self.bottom_left).length()
    }

    /// Move all corners through an affine transform
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self {
            bottom_left: matrix.transform_point3(self.bottom_left),
            bottom_right: matrix.transform_point3(self.bottom_right),
            top_left: matrix.transform_point3(self.top_left),
        }
    }
}

/// Orthonormal frame of a screen: `right` along the bottom edge, `up` along
/// the left edge and `normal` pointing toward the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenBasis {
    pub right: Vec3,
    pub up: Vec3,
    pub normal: Vec3,
}

impl ScreenBasis {
    /// Rotation taking room directions into screen directions.
    ///
    /// The rows are `right`, `up` and `normal`.
    pub fn rotation(&self) -> Mat4 {
        Mat4::from_cols(
            Vec4::new(self.right.x, self.up.x, self.normal.x, 0.0),
            Vec4::new(self.right.y, self.up.y, self.normal.y, 0.0),
            Vec4::new(self.right.z, self.up.z, self.normal.z, 0.0),
            Vec4::W,
        )
    }

    /// Vertical axis of the local frame, forced orthogonal to `right` and `normal`
    fn frame_up(&self) -> Vec3 {
        self.normal.cross(self.right)
    }

    /// Express a room point in this screen's local axes:
    /// `x` lateral, `y` vertical, `z` depth along the normal.
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        Vec3::new(
            point.dot(self.right),
            point.dot(self.frame_up()),
            point.dot(self.normal),
        )
    }

    /// Inverse of [`ScreenBasis::to_local`]
    pub fn to_global(&self, local: Vec3) -> Vec3 {
        self.right * local.x + self.frame_up() * local.y + self.normal * local.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall() -> DisplaySurface {
        DisplaySurface::new(
            Vec3::new(-300.0, -200.0, -300.0),
            Vec3::new(-300.0, -200.0, 300.0),
            Vec3::new(-300.0, 200.0, -300.0),
        )
    }

    #[test]
    fn test_front_wall_basis_is_identity() {
        let surface = DisplaySurface::new(
            Vec3::new(-300.0, -200.0, 300.0),
            Vec3::new(300.0, -200.0, 300.0),
            Vec3::new(-300.0, 200.0, 300.0),
        );
        let basis = surface.basis().unwrap();
        assert!(basis.right.abs_diff_eq(Vec3::X, 1e-6));
        assert!(basis.up.abs_diff_eq(Vec3::Y, 1e-6));
        assert!(basis.normal.abs_diff_eq(Vec3::Z, 1e-6));
        assert!(basis.rotation().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_side_wall_local_frame_swaps_axes() {
        let basis = wall().basis().unwrap();
        assert!(basis.normal.abs_diff_eq(-Vec3::X, 1e-6));

        // Lateral follows room z, depth follows room -x
        let local = basis.to_local(Vec3::new(-900.0, 50.0, 120.0));
        assert!(local.abs_diff_eq(Vec3::new(120.0, 50.0, 900.0), 1e-4));
    }

    #[test]
    fn test_local_frame_round_trip() {
        let basis = wall().basis().unwrap();
        let point = Vec3::new(-712.5, 33.0, -41.25);
        let back = basis.to_global(basis.to_local(point));
        assert!(back.abs_diff_eq(point, 1e-3));
    }

    #[test]
    fn test_degenerate_edges_rejected() {
        let zero = DisplaySurface::new(Vec3::ZERO, Vec3::ZERO, Vec3::Y);
        assert_eq!(zero.basis(), Err(GeometryError::ZeroLengthEdge));

        let parallel = DisplaySurface::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0);
        assert_eq!(parallel.basis(), Err(GeometryError::ParallelEdges));
    }

    #[test]
    fn test_center_and_extent() {
        let surface = wall();
        assert!(surface.center().abs_diff_eq(Vec3::new(-300.0, 0.0, 0.0), 1e-4));
        assert!(surface.top_right().abs_diff_eq(Vec3::new(-300.0, 200.0, 300.0), 1e-4));
        assert!((surface.width() - 600.0).abs() < 1e-3);
        assert!((surface.height() - 400.0).abs() < 1e-3);
    }
}
