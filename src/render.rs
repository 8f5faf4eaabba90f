//! Renderer seam
//!
//! The camera core never touches GPU state. Each frame the app hands every
//! display's camera to a [`DisplayRenderer`], which loads the combined
//! transform into whatever pipeline it drives and draws the scene.

use glam::{Mat4, Vec3};

use crate::coordinator::DisplayId;
use crate::projection::HeadTrackedCamera;

/// Everything needed to draw one display for one frame
#[derive(Debug, Clone, Copy)]
pub struct DisplayPass<'a> {
    pub id: DisplayId,
    pub name: &'a str,
    pub camera: &'a HeadTrackedCamera,
}

impl DisplayPass<'_> {
    /// Projection × view for this display
    pub fn view_projection(&self) -> Mat4 {
        self.camera.combined_matrix()
    }

    /// True (uncorrected) eye, for lighting and specular terms
    pub fn eye(&self) -> Vec3 {
        self.camera.eye()
    }
}

/// Draws scene content for one display at a time
pub trait DisplayRenderer {
    fn draw_display(&mut self, pass: &DisplayPass<'_>);
}

/// Renderer for headless runs: logs each pass at trace level
#[derive(Debug, Default)]
pub struct TraceRenderer {
    passes: u64,
}

impl TraceRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total passes drawn
    pub fn passes(&self) -> u64 {
        self.passes
    }
}

impl DisplayRenderer for TraceRenderer {
    fn draw_display(&mut self, pass: &DisplayPass<'_>) {
        self.passes += 1;
        let eye = pass.eye();
        tracing::trace!(
            display = %pass.id,
            "Draw '{}' from eye ({:.1}, {:.1}, {:.1})",
            pass.name,
            eye.x,
            eye.y,
            eye.z
        );
    }
}

/// Collects transforms instead of drawing; handy for tests and recording
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub passes: Vec<(DisplayId, Mat4)>,
}

impl DisplayRenderer for RecordingRenderer {
    fn draw_display(&mut self, pass: &DisplayPass<'_>) {
        self.passes.push((pass.id, pass.view_projection()));
    }
}
