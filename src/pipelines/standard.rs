//! The lit mesh pipeline used by every pass that produces color.
//!
//! One shader covers all [`Shading`] variants; the material uniform selects
//! the branch. Opaque and transparent meshes only differ in blending and
//! depth writes.

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    data_structures::{
        color::Rgb,
        fog::Fog,
        geometry::{ModelVertex, Vertex},
        material::{Material, Shading},
        texture::Texture,
        transform::TransformRaw,
    },
    pipelines::{DepthMode, mk_render_pipeline},
};

/// Point lights beyond this count are ignored by the shader.
pub const MAX_POINT_LIGHTS: usize = 4;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightRaw {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

/// Lights, fog and shadow parameters shared by every mesh of a pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniform {
    pub ambient: [f32; 4],
    pub points: [PointLightRaw; MAX_POINT_LIGHTS],
    /// Unit vector from the surface towards the directional light.
    pub sun_direction: [f32; 4],
    pub sun_color: [f32; 4],
    pub shadow_view_proj: [[f32; 4]; 4],
    pub fog_color: [f32; 4],
    /// near, far, unused, unused
    pub fog_range: [f32; 4],
    /// point light count, shadows on, shadow map size, unused
    pub flags: [u32; 4],
}

impl SceneUniform {
    pub fn new(fog: &Fog) -> Self {
        let [r, g, b] = fog.color.to_linear().to_array();
        Self {
            ambient: [0.0; 4],
            points: [PointLightRaw::default(); MAX_POINT_LIGHTS],
            sun_direction: [0.0, 1.0, 0.0, 0.0],
            sun_color: [0.0; 4],
            shadow_view_proj: Matrix4::identity().into(),
            fog_color: [r, g, b, 1.0],
            fog_range: [fog.near, fog.far, 0.0, 0.0],
            flags: [0; 4],
        }
    }

    pub fn add_ambient(&mut self, radiance: Rgb) {
        for (slot, c) in self.ambient.iter_mut().zip(radiance.to_array()) {
            *slot += c;
        }
    }

    /// Returns false once every slot is taken.
    pub fn push_point(&mut self, position: [f32; 3], radiance: Rgb) -> bool {
        let count = self.flags[0] as usize;
        if count >= MAX_POINT_LIGHTS {
            return false;
        }
        let [r, g, b] = radiance.to_array();
        self.points[count] = PointLightRaw {
            position: [position[0], position[1], position[2], 1.0],
            color: [r, g, b, 1.0],
        };
        self.flags[0] += 1;
        true
    }

    pub fn set_sun(&mut self, direction: [f32; 3], radiance: Rgb) {
        let [r, g, b] = radiance.to_array();
        self.sun_direction = [direction[0], direction[1], direction[2], 0.0];
        self.sun_color = [r, g, b, 1.0];
    }

    pub fn set_shadow(&mut self, view_proj: Matrix4<f32>, map_size: u32) {
        self.shadow_view_proj = view_proj.into();
        self.flags[1] = 1;
        self.flags[2] = map_size;
    }
}

/// Per-mesh material parameters.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    /// rgb and opacity
    pub color: [f32; 4],
    /// map repeat u, v, shininess, unused
    pub params: [f32; 4],
    /// shading model, has map, has environment, receives shadow
    pub flags: [u32; 4],
    /// fogged, unused, unused, unused
    pub options: [u32; 4],
    /// Projects world positions into the mirror texture.
    pub mirror_view_proj: [[f32; 4]; 4],
}

impl MaterialUniform {
    pub const BASIC: u32 = 0;
    pub const LAMBERT: u32 = 1;
    pub const PHONG: u32 = 2;
    pub const REFLECTOR: u32 = 3;

    pub fn new(material: &Material, receive_shadow: bool, has_env: bool) -> Self {
        let (shading, shininess) = match material.shading {
            Shading::Basic => (Self::BASIC, 0.0),
            Shading::Lambert => (Self::LAMBERT, 0.0),
            Shading::Phong { shininess } => (Self::PHONG, shininess),
            Shading::Reflector { .. } => (Self::REFLECTOR, 0.0),
        };
        let [r, g, b] = material.color.to_linear().to_array();
        let opacity = if material.transparent {
            material.opacity
        } else {
            1.0
        };
        Self {
            color: [r, g, b, opacity],
            params: [material.map_repeat[0], material.map_repeat[1], shininess, 0.0],
            flags: [
                shading,
                material.map.is_some() as u32,
                has_env as u32,
                receive_shadow as u32,
            ],
            options: [material.fog as u32, 0, 0, 0],
            mirror_view_proj: Matrix4::identity().into(),
        }
    }

    pub fn with_mirror(mut self, view_proj: Matrix4<f32>) -> Self {
        self.mirror_view_proj = view_proj.into();
        self
    }
}

/// Opaque and transparent variants for one color format.
#[derive(Debug)]
pub struct StandardPipelines {
    pub format: wgpu::TextureFormat,
    pub opaque: wgpu::RenderPipeline,
    pub transparent: wgpu::RenderPipeline,
}

impl StandardPipelines {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        camera_layout: &wgpu::BindGroupLayout,
        scene_layout: &wgpu::BindGroupLayout,
        material_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Standard Pipeline Layout"),
            bind_group_layouts: &[Some(camera_layout), Some(scene_layout), Some(material_layout)],
            immediate_size: 0,
        });
        let shader = || wgpu::ShaderModuleDescriptor {
            label: Some("Standard Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("standard.wgsl").into()),
        };
        let buffers = [ModelVertex::desc(), TransformRaw::desc()];

        let opaque = mk_render_pipeline(
            device,
            &layout,
            format,
            Some(wgpu::BlendState::REPLACE),
            Some((Texture::DEPTH_FORMAT, DepthMode::OPAQUE)),
            &buffers,
            shader(),
        );
        let transparent = mk_render_pipeline(
            device,
            &layout,
            format,
            Some(wgpu::BlendState::ALPHA_BLENDING),
            Some((Texture::DEPTH_FORMAT, DepthMode::TRANSPARENT)),
            &buffers,
            shader(),
        );
        Self {
            format,
            opaque,
            transparent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_match_the_shader() {
        assert_eq!(std::mem::size_of::<SceneUniform>(), 16 + 4 * 32 + 16 * 2 + 64 + 16 * 3);
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 16 * 4 + 64);
    }

    #[test]
    fn point_slots_are_bounded() {
        let mut uniform = SceneUniform::new(&Fog::new(Rgb::WHITE, 1.0, 2.0));
        for _ in 0..MAX_POINT_LIGHTS {
            assert!(uniform.push_point([0.0; 3], Rgb::WHITE));
        }
        assert!(!uniform.push_point([0.0; 3], Rgb::WHITE));
        assert_eq!(uniform.flags[0] as usize, MAX_POINT_LIGHTS);
    }

    #[test]
    fn opaque_materials_ignore_opacity() {
        let mut material = Material::phong(Rgb::from_hex(0xff0000));
        material.opacity = 0.3;
        assert_eq!(MaterialUniform::new(&material, false, false).color[3], 1.0);
        material.transparent = true;
        assert_eq!(MaterialUniform::new(&material, false, false).color[3], 0.3);
        assert_eq!(MaterialUniform::new(&material, true, false).flags[0], MaterialUniform::PHONG);
    }
}
