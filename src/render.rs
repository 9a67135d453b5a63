//! The seam between the session and whatever draws it.
//!
//! The session drives a [`RenderEngine`] once per frame: reflections first
//! through [`RenderEngine::capture_cube`], then the main view through
//! [`RenderEngine::render`]. The engine owns every GPU resource; the scene
//! only holds CPU-side data.

use thiserror::Error;

use crate::{
    camera::ViewportCamera, config::RendererConfig, data_structures::scene_graph::Scene,
    reflection::CubeCapture,
};

/// Upper bound for the device pixel ratio used for the drawing buffer.
pub const MAX_PIXEL_RATIO: f64 = 2.0;

#[derive(Debug, Error)]
pub enum FrameError {
    /// The surface could not provide a frame; it has been reconfigured and the
    /// next frame can proceed.
    #[error("surface unavailable: {0}")]
    Surface(String),
    #[error("render engine fault: {0}")]
    Engine(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererSettings {
    pub shadows: bool,
    pub vsync: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            shadows: true,
            vsync: true,
        }
    }
}

impl From<&RendererConfig> for RendererSettings {
    fn from(config: &RendererConfig) -> Self {
        Self {
            shadows: config.shadows,
            vsync: config.vsync,
        }
    }
}

/// Size of the view in logical pixels plus the pixel ratio of the drawing buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
}

impl Viewport {
    /// `device_pixel_ratio` is clamped to at most [`MAX_PIXEL_RATIO`].
    pub fn new(width: u32, height: u32, device_pixel_ratio: f64) -> Self {
        let pixel_ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio.min(MAX_PIXEL_RATIO)
        } else {
            1.0
        };
        Self {
            width,
            height,
            pixel_ratio,
        }
    }

    /// From a window's physical size and scale factor.
    pub fn from_physical(size: winit::dpi::PhysicalSize<u32>, scale_factor: f64) -> Self {
        let logical = size.to_logical::<f64>(scale_factor);
        Self::new(
            logical.width.round() as u32,
            logical.height.round() as u32,
            scale_factor,
        )
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Drawing buffer size in device pixels, never zero.
    pub fn physical_size(&self) -> [u32; 2] {
        [
            ((self.width as f64 * self.pixel_ratio).round() as u32).max(1),
            ((self.height as f64 * self.pixel_ratio).round() as u32).max(1),
        ]
    }
}

pub trait RenderEngine {
    fn configure(&mut self, settings: &RendererSettings) -> Result<(), FrameError>;

    fn resize(&mut self, viewport: Viewport);

    /// Renders the reflections of the frame: the probe's six cube faces and
    /// any planar mirror as seen from `camera`.
    fn capture_cube(
        &mut self,
        scene: &Scene,
        capture: &CubeCapture,
        camera: &ViewportCamera,
    ) -> Result<(), FrameError>;

    fn render(&mut self, scene: &Scene, camera: &ViewportCamera) -> Result<(), FrameError>;
}
