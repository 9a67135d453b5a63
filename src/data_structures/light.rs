//! Light sources.

use crate::data_structures::color::Rgb;

/// Orthographic frustum of a directional light's shadow camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowCamera {
    pub map_size: u32,
    pub near: f32,
    pub far: f32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl ShadowCamera {
    /// Symmetric frustum bounds from one half-extent.
    pub fn with_half_extent(map_size: u32, near: f32, far: f32, half_extent: f32) -> Self {
        Self {
            map_size,
            near,
            far,
            left: -half_extent,
            right: half_extent,
            top: half_extent,
            bottom: -half_extent,
        }
    }

    pub fn projection(&self) -> cgmath::Matrix4<f32> {
        crate::camera::OPENGL_TO_WGPU_MATRIX
            * cgmath::ortho(self.left, self.right, self.bottom, self.top, self.near, self.far)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    Ambient {
        color: Rgb,
        intensity: f32,
    },
    /// Omnidirectional light at the node's world position.
    Point {
        color: Rgb,
        intensity: f32,
    },
    /// Light shining from the node's world position towards the origin.
    Directional {
        color: Rgb,
        intensity: f32,
        visible: bool,
        shadow: Option<ShadowCamera>,
    },
}

impl Light {
    pub fn casts_shadow(&self) -> bool {
        matches!(
            self,
            Light::Directional {
                shadow: Some(_),
                visible: true,
                ..
            }
        )
    }

    /// Linear color premultiplied by intensity, black when the light is switched off.
    pub fn radiance(&self) -> Rgb {
        match self {
            Light::Ambient { color, intensity } | Light::Point { color, intensity } => {
                color.to_linear().scaled(*intensity)
            }
            Light::Directional {
                color,
                intensity,
                visible,
                ..
            } => {
                if *visible {
                    color.to_linear().scaled(*intensity)
                } else {
                    Rgb::BLACK
                }
            }
        }
    }
}
