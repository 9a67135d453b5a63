//! Decoded images and GPU textures.
//!
//! [`TextureData`] and [`CubeTextureData`] are what asset loads resolve to and
//! what materials hold. [`Texture`] wraps the WGPU resources the renderer
//! creates from them, plus the depth and render targets it needs itself.

use anyhow::{Result, bail};

use crate::data_structures::next_resource_id;

/// An RGBA8 image in sRGB space.
#[derive(Debug)]
pub struct TextureData {
    pub id: u64,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn new(label: impl Into<String>, width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let label = label.into();
        if rgba.len() != width as usize * height as usize * 4 {
            bail!(
                "texture {label} has {} bytes, expected {}x{}x4",
                rgba.len(),
                width,
                height
            );
        }
        Ok(Self {
            id: next_resource_id(),
            label,
            width,
            height,
            rgba,
        })
    }

    pub fn solid(label: impl Into<String>, rgba: [u8; 4]) -> Self {
        Self {
            id: next_resource_id(),
            label: label.into(),
            width: 1,
            height: 1,
            rgba: rgba.to_vec(),
        }
    }
}

/// Six equally sized faces in +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Debug)]
pub struct CubeTextureData {
    pub id: u64,
    pub size: u32,
    pub faces: [TextureData; 6],
}

impl CubeTextureData {
    pub fn new(faces: [TextureData; 6]) -> Result<Self> {
        let size = faces[0].width;
        for face in &faces {
            if face.width != size || face.height != size {
                bail!(
                    "cube face {} is {}x{}, expected {size}x{size}",
                    face.label,
                    face.width,
                    face.height
                );
            }
        }
        Ok(Self {
            id: next_resource_id(),
            size,
            faces,
        })
    }
}

/// A GPU texture with a view and optional sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
    /// Format of every off-screen color target (reflections, cube capture).
    pub const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_shadow_sampler(device));

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Upload a decoded image as a repeating sRGB texture.
    pub fn from_data(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData) -> Self {
        let size = wgpu::Extent3d {
            width: data.width,
            height: data.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&data.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        write_layer(queue, &texture, 0, data);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_default_sampler(device));
        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Upload six faces as a cube texture.
    pub fn from_cube_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &CubeTextureData,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: data.size,
            height: data.size,
            depth_or_array_layers: 6,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("cube texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (layer, face) in data.faces.iter().enumerate() {
            write_layer(queue, &texture, layer as u32, face);
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("cube texture view"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = Some(create_clamped_sampler(device));
        Self {
            texture,
            view,
            sampler,
        }
    }

    /// A 2D color target that can afterwards be sampled, e.g. by a mirror.
    pub fn create_render_target(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size[0].max(1),
                height: size[1].max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::CAPTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_clamped_sampler(device));
        Self {
            texture,
            view,
            sampler,
        }
    }

    /// A cube color target. `view` samples the whole cube; use
    /// [`Texture::face_view`] to render into one face.
    pub fn create_cube_render_target(device: &wgpu::Device, size: u32, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.max(1),
                height: size.max(1),
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::CAPTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = Some(create_clamped_sampler(device));
        Self {
            texture,
            view,
            sampler,
        }
    }

    pub fn face_view(&self, face: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("cube face view"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_array_layer: face,
            array_layer_count: Some(1),
            ..Default::default()
        })
    }

    /// 1x1 white texture bound wherever a material has no map.
    pub fn white(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::from_data(device, queue, &TextureData::solid("white", [255; 4]))
    }

    /// 1x1 black cube bound wherever a material has no environment.
    pub fn black_cube(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let face = || TextureData::solid("black", [0, 0, 0, 255]);
        let faces = [face(), face(), face(), face(), face(), face()];
        let data = CubeTextureData {
            id: next_resource_id(),
            size: 1,
            faces,
        };
        Self::from_cube_data(device, queue, &data)
    }
}

fn write_layer(queue: &wgpu::Queue, texture: &wgpu::Texture, layer: u32, data: &TextureData) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
        },
        &data.rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * data.width),
            rows_per_image: Some(data.height),
        },
        wgpu::Extent3d {
            width: data.width,
            height: data.height,
            depth_or_array_layers: 1,
        },
    );
}

pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        ..Default::default()
    })
}

pub fn create_clamped_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        ..Default::default()
    })
}

/// Comparison sampler for PCF shadow lookups.
pub fn create_shadow_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("shadow sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        compare: Some(wgpu::CompareFunction::LessEqual),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(TextureData::new("bad", 2, 2, vec![0; 15]).is_err());
        assert!(TextureData::new("ok", 2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn cube_faces_must_match() {
        let face = |w| TextureData::new("f", w, w, vec![0; (w * w * 4) as usize]).unwrap();
        assert!(CubeTextureData::new([face(2), face(2), face(2), face(2), face(2), face(2)]).is_ok());
        assert!(CubeTextureData::new([face(2), face(2), face(4), face(2), face(2), face(2)]).is_err());
    }
}
