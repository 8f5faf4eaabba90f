//! Off-axis projection for head-coupled displays
//!
//! A screen is a fixed rectangle in room space; the viewer's eye moves in
//! front of it. Each frame the frustum is rebuilt so the screen edges map
//! exactly onto the clip-space edges, giving a window-into-the-room effect.

pub mod camera;
pub mod frustum;
pub mod surface;

pub use camera::{
    HeadTrackedCamera, DEFAULT_FAR_CLIP, DEFAULT_FOV_DEGREES, DEFAULT_NEAR_CLIP, PRESET_COUNT,
};
pub use frustum::{
    compute_frustum, compute_frustum_from_corners, FrustumBounds, GeometryError,
    OffAxisProjection, MIN_EYE_DISTANCE,
};
pub use surface::{DisplaySurface, ScreenBasis};
