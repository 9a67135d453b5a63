//! GPU device, queue and the target frames are presented to.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use winit::window::Window;

use crate::{data_structures::texture::Texture, render::FrameError};

/// Where the main pass ends up.
#[derive(Debug)]
pub enum RenderTarget {
    Window {
        window: Arc<Window>,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    /// An offscreen color texture, used for headless rendering.
    Offscreen { texture: wgpu::Texture },
}

/// A frame acquired from the [`RenderTarget`].
pub struct Frame {
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl Frame {
    /// Presents the frame if it came from a window surface.
    pub fn present(self) {
        if let Some(surface_texture) = self.surface_texture {
            surface_texture.present();
        }
    }
}

#[derive(Debug)]
pub struct Context {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub target: RenderTarget,
    pub(crate) depth_texture: Texture,
    format: wgpu::TextureFormat,
    size: [u32; 2],
}

impl Context {
    /// Sets up a device presenting to `window`.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        // The instance is a handle to our GPU
        log::info!("wgpu setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("creating the window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible GPU adapter")?;
        let (device, queue) = request_device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders output linear color, so prefer an sRGB surface.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let size = [config.width, config.height];
        let depth_texture = Texture::create_depth_texture(&device, size, "depth_texture");
        Ok(Self {
            device,
            queue,
            target: RenderTarget::Window {
                window,
                surface,
                config,
            },
            depth_texture,
            format: surface_format,
            size,
        })
    }

    /// Sets up a device rendering into an offscreen `width`x`height` texture.
    pub async fn headless(width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("no GPU adapter for headless rendering")?;
        let (device, queue) = request_device(&adapter).await?;

        let format = wgpu::TextureFormat::Rgba8UnormSrgb;
        let size = [width.max(1), height.max(1)];
        let texture = create_offscreen_texture(&device, size, format);
        let depth_texture = Texture::create_depth_texture(&device, size, "depth_texture");
        Ok(Self {
            device,
            queue,
            target: RenderTarget::Offscreen { texture },
            depth_texture,
            format,
            size,
        })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Size of the drawing buffer in device pixels.
    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        match &self.target {
            RenderTarget::Window { window, .. } => Some(window),
            RenderTarget::Offscreen { .. } => None,
        }
    }

    /// Switches vsync on or off for window targets.
    pub fn set_vsync(&mut self, vsync: bool) {
        if let RenderTarget::Window {
            surface, config, ..
        } = &mut self.target
        {
            config.present_mode = if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            };
            surface.configure(&self.device, config);
        }
    }

    /// Resizes the drawing buffer and the depth texture.
    pub fn resize(&mut self, size: [u32; 2]) {
        let size = [size[0].max(1), size[1].max(1)];
        if size == self.size {
            return;
        }
        self.size = size;
        match &mut self.target {
            RenderTarget::Window {
                surface, config, ..
            } => {
                config.width = size[0];
                config.height = size[1];
                surface.configure(&self.device, config);
            }
            RenderTarget::Offscreen { texture } => {
                *texture = create_offscreen_texture(&self.device, size, self.format);
            }
        }
        self.depth_texture = Texture::create_depth_texture(&self.device, size, "depth_texture");
    }

    /// Acquires the next frame. A lost or outdated surface is reconfigured and
    /// reported, so the caller can skip this frame.
    pub fn acquire(&mut self) -> Result<Frame, FrameError> {
        match &self.target {
            RenderTarget::Window {
                surface, config, ..
            } => match surface.get_current_texture() {
                wgpu::CurrentSurfaceTexture::Success(surface_texture)
                | wgpu::CurrentSurfaceTexture::Suboptimal(surface_texture) => {
                    let view = surface_texture
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    Ok(Frame {
                        view,
                        surface_texture: Some(surface_texture),
                    })
                }
                err => {
                    surface.configure(&self.device, config);
                    Err(FrameError::Surface(format!("{err:?}")))
                }
            },
            RenderTarget::Offscreen { texture } => Ok(Frame {
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                surface_texture: None,
            }),
        }
    }
}

async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
            ..Default::default()
        })
        .await
        .context("requesting the GPU device")
}

fn create_offscreen_texture(
    device: &wgpu::Device,
    size: [u32; 2],
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen target"),
        size: wgpu::Extent3d {
            width: size[0],
            height: size[1],
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}
