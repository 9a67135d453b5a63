//! Fullscreen pass that draws the sky cube behind everything else.

use crate::{
    data_structures::texture::Texture,
    pipelines::{DepthMode, mk_render_pipeline},
};

pub fn mk_sky_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    camera_layout: &wgpu::BindGroupLayout,
    cube_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Sky Pipeline Layout"),
        bind_group_layouts: &[Some(camera_layout), Some(cube_layout)],
        immediate_size: 0,
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Sky Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("sky.wgsl").into()),
    };
    mk_render_pipeline(
        device,
        &layout,
        format,
        Some(wgpu::BlendState::REPLACE),
        Some((Texture::DEPTH_FORMAT, DepthMode::BACKGROUND)),
        &[],
        shader,
    )
}
