//! Linear distance fog and the background color it is paired with.

use std::sync::Arc;

use crate::data_structures::{color::Rgb, texture::CubeTextureData};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fog {
    pub color: Rgb,
    pub near: f32,
    pub far: f32,
}

impl Fog {
    /// `near` wins when the range is inverted: `far` is raised to meet it.
    pub fn new(color: Rgb, near: f32, far: f32) -> Self {
        Self {
            color,
            near,
            far: far.max(near),
        }
    }

    /// Fog density at a view distance, using the same smoothstep ramp as the shader.
    pub fn factor(&self, distance: f32) -> f32 {
        if self.far <= self.near {
            return if distance >= self.far { 1.0 } else { 0.0 };
        }
        let t = ((distance - self.near) / (self.far - self.near)).clamp(0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }
}

/// Whatever is drawn behind all geometry.
#[derive(Clone, Debug)]
pub struct Background {
    /// Clear color; kept equal to the fog color by the fog binding.
    pub color: Rgb,
    /// Sky cube, drawn over the clear color once loaded.
    pub environment: Option<Arc<CubeTextureData>>,
}

impl Background {
    pub fn new(color: Rgb) -> Self {
        Self {
            color,
            environment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_ramps_between_near_and_far() {
        let fog = Fog::new(Rgb::WHITE, 20.0, 70.0);
        assert_eq!(fog.factor(10.0), 0.0);
        assert_eq!(fog.factor(80.0), 1.0);
        assert!((fog.factor(45.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn degenerate_range_is_a_step() {
        let fog = Fog::new(Rgb::WHITE, 5.0, 5.0);
        assert_eq!(fog.factor(4.9), 0.0);
        assert_eq!(fog.factor(5.0), 1.0);
    }

    #[test]
    fn inverted_range_raises_far_to_near() {
        let fog = Fog::new(Rgb::WHITE, 90.0, 70.0);
        assert_eq!((fog.near, fog.far), (90.0, 90.0));
    }
}
