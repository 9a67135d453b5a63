//! Surface descriptions consumed by the renderer.

use std::sync::Arc;

use crate::data_structures::{color::Rgb, texture::TextureData};

/// Lighting model of a material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shading {
    /// Unlit: color times map (or times the environment when one is bound).
    Basic,
    /// Diffuse only.
    Lambert,
    /// Diffuse plus specular highlight.
    Phong { shininess: f32 },
    /// Planar mirror: samples the reflection rendered for this node into a
    /// `texture_size` target.
    Reflector {
        clip_bias: f32,
        texture_size: [u32; 2],
    },
}

/// Environment map a material reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvMap {
    #[default]
    None,
    /// The cubemap written by the reflection capture each frame.
    CaptureTarget,
}

#[derive(Clone, Debug)]
pub struct Material {
    pub shading: Shading,
    pub color: Rgb,
    pub opacity: f32,
    pub transparent: bool,
    /// Color map; `None` until a texture load binds one.
    pub map: Option<Arc<TextureData>>,
    /// Tiling applied to the map's texture coordinates.
    pub map_repeat: [f32; 2],
    pub env_map: EnvMap,
    /// Whether scene fog affects this material.
    pub fog: bool,
}

impl Material {
    fn with_shading(shading: Shading) -> Self {
        Self {
            shading,
            color: Rgb::WHITE,
            opacity: 1.0,
            transparent: false,
            map: None,
            map_repeat: [1.0, 1.0],
            env_map: EnvMap::None,
            fog: true,
        }
    }

    pub fn basic() -> Self {
        Self::with_shading(Shading::Basic)
    }

    pub fn lambert() -> Self {
        Self::with_shading(Shading::Lambert)
    }

    pub fn phong(color: Rgb) -> Self {
        Self {
            color,
            ..Self::with_shading(Shading::Phong { shininess: 30.0 })
        }
    }

    pub fn reflector(color: Rgb, clip_bias: f32, texture_size: [u32; 2]) -> Self {
        Self {
            color,
            fog: false,
            ..Self::with_shading(Shading::Reflector {
                clip_bias,
                texture_size,
            })
        }
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    pub fn with_repeat(mut self, u: f32, v: f32) -> Self {
        self.map_repeat = [u, v];
        self
    }

    pub fn with_env_map(mut self, env_map: EnvMap) -> Self {
        self.env_map = env_map;
        self
    }

    pub fn with_transparency(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn reads_capture_target(&self) -> bool {
        self.env_map == EnvMap::CaptureTarget
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::basic()
    }
}
