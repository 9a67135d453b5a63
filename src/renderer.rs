//! The wgpu implementation of [`RenderEngine`].
//!
//! GPU resources are created lazily from the CPU-side scene and cached by the
//! resource ids of meshes and textures, and by node for materials and
//! mirrors. Every frame runs up to four kinds of passes:
//!
//! 1. the directional shadow map,
//! 2. the six faces of the reflection capture ([`RenderEngine::capture_cube`]),
//! 3. one pass per planar mirror,
//! 4. the main view.

use std::{collections::HashMap, iter};

use anyhow::Result;
use cgmath::{EuclideanSpace, InnerSpace, Matrix4, MetricSpace, Point3, Vector3};
use log::{debug, info};
use wgpu::util::DeviceExt;

use crate::{
    camera::{CameraUniform, ViewportCamera},
    context::Context,
    data_structures::{
        color::Rgb,
        geometry::MeshData,
        light::Light,
        material::{EnvMap, Shading},
        scene_graph::{NodeId, Scene},
        texture::Texture,
        transform::TransformRaw,
    },
    pipelines::{
        self,
        shadow::mk_shadow_pipeline,
        sky::mk_sky_pipeline,
        standard::{MaterialUniform, SceneUniform, StandardPipelines},
    },
    reflection::{CubeCapture, PlanarMirror},
    render::{FrameError, RenderEngine, RendererSettings, Viewport},
};

const NO_CLIP: [f32; 4] = [0.0; 4];

/// A camera uniform buffer and its group 0 bind group.
struct CameraBinding {
    uniform: CameraUniform,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl CameraBinding {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str) -> Self {
        let uniform = CameraUniform::new();
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some(label),
        });
        Self {
            uniform,
            buffer,
            bind_group,
        }
    }

    fn write(
        &mut self,
        queue: &wgpu::Queue,
        position: Point3<f32>,
        view_proj: Matrix4<f32>,
        clip_plane: [f32; 4],
    ) {
        self.uniform.set(position, view_proj);
        self.uniform.clip_plane = clip_plane;
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
}

impl GpuMesh {
    fn new(device: &wgpu::Device, data: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} vertex buffer", data.label)),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} index buffer", data.label)),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_indices: data.indices.len() as u32,
        }
    }
}

/// Which textures a material bind group was built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MaterialKey {
    map: Option<u64>,
    env: Option<u64>,
    mirror: Option<u64>,
}

struct GpuMaterial {
    key: MaterialKey,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct MirrorTarget {
    id: u64,
    size: [u32; 2],
    color: Texture,
    depth: Texture,
    camera: CameraBinding,
}

struct CaptureTarget {
    id: u64,
    resolution: u32,
    cube: Texture,
    depth: Texture,
    faces: Vec<(wgpu::TextureView, CameraBinding)>,
}

struct ShadowMap {
    size: u32,
    texture: Texture,
    camera: CameraBinding,
}

struct Sky {
    id: u64,
    #[allow(unused)]
    texture: Texture,
    bind_group: wgpu::BindGroup,
}

struct Layouts {
    camera: wgpu::BindGroupLayout,
    scene: wgpu::BindGroupLayout,
    material: wgpu::BindGroupLayout,
    cube: wgpu::BindGroupLayout,
}

/// One visible mesh of the current frame.
#[derive(Clone, Copy, Debug)]
struct DrawItem {
    node: NodeId,
    mesh: u64,
    instance: u32,
    transparent: bool,
    cast_shadow: bool,
    position: Point3<f32>,
}

/// Color target, depth target and pipelines of one pass.
struct PassTarget<'a> {
    label: &'a str,
    color: &'a wgpu::TextureView,
    depth: &'a wgpu::TextureView,
    camera: &'a wgpu::BindGroup,
    eye: Point3<f32>,
    pipelines: &'a StandardPipelines,
    sky: &'a wgpu::RenderPipeline,
}

pub struct WgpuRenderer {
    ctx: Context,
    settings: RendererSettings,
    layouts: Layouts,
    main_pipelines: StandardPipelines,
    capture_pipelines: Option<StandardPipelines>,
    main_sky: wgpu::RenderPipeline,
    capture_sky: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    main_camera: CameraBinding,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    shadow: ShadowMap,
    shadow_active: bool,
    shadows_pending: bool,
    white: Texture,
    black_cube: Texture,
    fallback_sampler: wgpu::Sampler,
    instances: wgpu::Buffer,
    meshes: HashMap<u64, GpuMesh>,
    textures: HashMap<u64, Texture>,
    materials: HashMap<NodeId, GpuMaterial>,
    mirrors: HashMap<NodeId, MirrorTarget>,
    capture: Option<CaptureTarget>,
    sky: Option<Sky>,
}

impl WgpuRenderer {
    /// A renderer presenting to `window`.
    pub async fn new(window: std::sync::Arc<winit::window::Window>) -> Result<Self> {
        Ok(Self::from_context(Context::new(window).await?))
    }

    /// A renderer drawing into an offscreen texture.
    pub async fn headless(width: u32, height: u32) -> Result<Self> {
        Ok(Self::from_context(Context::headless(width, height).await?))
    }

    pub fn from_context(ctx: Context) -> Self {
        let device = &ctx.device;
        let layouts = Layouts {
            camera: pipelines::camera_layout(device),
            scene: pipelines::scene_layout(device),
            material: pipelines::material_layout(device),
            cube: pipelines::cube_layout(device),
        };
        let standard = |format| {
            StandardPipelines::new(
                device,
                format,
                &layouts.camera,
                &layouts.scene,
                &layouts.material,
            )
        };
        let main_pipelines = standard(ctx.format());
        let capture_pipelines =
            (ctx.format() != Texture::CAPTURE_FORMAT).then(|| standard(Texture::CAPTURE_FORMAT));
        let main_sky = mk_sky_pipeline(device, ctx.format(), &layouts.camera, &layouts.cube);
        let capture_sky =
            mk_sky_pipeline(device, Texture::CAPTURE_FORMAT, &layouts.camera, &layouts.cube);
        let shadow_pipeline = mk_shadow_pipeline(device, &layouts.camera);

        let shadow = ShadowMap {
            size: 1,
            texture: Texture::create_depth_texture(device, [1, 1], "shadow map"),
            camera: CameraBinding::new(device, &layouts.camera, "shadow camera"),
        };
        let scene_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene uniform"),
            size: std::mem::size_of::<SceneUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let scene_bind_group =
            mk_scene_bind_group(device, &layouts.scene, &scene_buffer, &shadow.texture);
        let main_camera = CameraBinding::new(device, &layouts.camera, "main camera");
        let white = Texture::white(device, &ctx.queue);
        let black_cube = Texture::black_cube(device, &ctx.queue);
        let fallback_sampler = crate::data_structures::texture::create_clamped_sampler(device);
        let instances = mk_instance_buffer(device, 64);

        info!("renderer ready, output format {:?}", ctx.format());
        Self {
            ctx,
            settings: RendererSettings::default(),
            layouts,
            main_pipelines,
            capture_pipelines,
            main_sky,
            capture_sky,
            shadow_pipeline,
            main_camera,
            scene_buffer,
            scene_bind_group,
            shadow,
            shadow_active: false,
            shadows_pending: true,
            white,
            black_cube,
            fallback_sampler,
            instances,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            materials: HashMap::new(),
            mirrors: HashMap::new(),
            capture: None,
            sky: None,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    fn capture_pipelines(&self) -> &StandardPipelines {
        self.capture_pipelines
            .as_ref()
            .unwrap_or(&self.main_pipelines)
    }

    /// Uploads whatever the scene references for the first time and writes
    /// every per-frame uniform. Returns the visible meshes in draw order.
    fn prepare(&mut self, scene: &Scene, camera: &ViewportCamera) -> Vec<DrawItem> {
        let mut raws: Vec<TransformRaw> = Vec::new();
        let mut draws = Vec::new();
        for (id, node, mesh) in scene.graph.visible_meshes() {
            let data = &mesh.geometry;
            if data.indices.is_empty() {
                continue;
            }
            self.meshes.entry(data.id).or_insert_with(|| {
                debug!("uploading mesh {}", data.label);
                GpuMesh::new(&self.ctx.device, data)
            });
            if let Some(map) = &mesh.material.map {
                self.textures.entry(map.id).or_insert_with(|| {
                    debug!("uploading texture {}", map.label);
                    Texture::from_data(&self.ctx.device, &self.ctx.queue, map)
                });
            }
            let p = node.world().position();
            draws.push(DrawItem {
                node: id,
                mesh: data.id,
                instance: raws.len() as u32,
                transparent: mesh.material.transparent,
                cast_shadow: mesh.cast_shadow,
                position: Point3::new(p.x, p.y, p.z),
            });
            raws.push(node.world().to_raw());
        }

        self.write_instances(&raws);
        self.update_sky(scene);
        self.write_scene_uniform(scene);
        self.write_materials(scene, camera, &draws);
        draws
    }

    fn write_instances(&mut self, raws: &[TransformRaw]) {
        let needed = (raws.len() * std::mem::size_of::<TransformRaw>()) as wgpu::BufferAddress;
        if needed > self.instances.size() {
            self.instances = mk_instance_buffer(&self.ctx.device, raws.len().next_power_of_two());
        }
        if !raws.is_empty() {
            self.ctx
                .queue
                .write_buffer(&self.instances, 0, bytemuck::cast_slice(raws));
        }
    }

    fn update_sky(&mut self, scene: &Scene) {
        match &scene.background.environment {
            Some(cube) if self.sky.as_ref().map(|sky| sky.id) != Some(cube.id) => {
                info!("uploading sky cube ({}px faces)", cube.size);
                let texture = Texture::from_cube_data(&self.ctx.device, &self.ctx.queue, cube);
                let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &self.layouts.cube,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&texture.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(
                                texture.sampler.as_ref().unwrap_or(&self.fallback_sampler),
                            ),
                        },
                    ],
                    label: Some("sky_bind_group"),
                });
                self.sky = Some(Sky {
                    id: cube.id,
                    texture,
                    bind_group,
                });
            }
            Some(_) => {}
            None => self.sky = None,
        }
    }

    fn write_scene_uniform(&mut self, scene: &Scene) {
        let mut uniform = SceneUniform::new(&scene.fog);
        let mut shadow = None;
        let mut has_sun = false;
        for (_, node) in scene.graph.visible_nodes() {
            let Some(light) = node.light() else {
                continue;
            };
            let position = node.world().position();
            match light {
                Light::Ambient { .. } => uniform.add_ambient(light.radiance()),
                Light::Point { .. } => {
                    if !uniform.push_point(position.into(), light.radiance()) {
                        debug!("point light {} exceeds the shader's light count", node.name);
                    }
                }
                Light::Directional {
                    shadow: shadow_camera,
                    ..
                } => {
                    if has_sun {
                        debug!("ignoring extra directional light {}", node.name);
                        continue;
                    }
                    has_sun = true;
                    let direction = if position.magnitude2() > 0.0 {
                        position.normalize()
                    } else {
                        Vector3::unit_y()
                    };
                    uniform.set_sun(direction.into(), light.radiance());
                    if let (true, true, Some(shadow_camera)) =
                        (self.settings.shadows, light.casts_shadow(), shadow_camera)
                    {
                        let eye = Point3::from_vec(position);
                        let up = if direction.y.abs() > 0.99 {
                            Vector3::unit_z()
                        } else {
                            Vector3::unit_y()
                        };
                        let view = Matrix4::look_at_rh(eye, Point3::origin(), up);
                        shadow = Some((
                            shadow_camera.projection() * view,
                            eye,
                            shadow_camera.map_size,
                        ));
                    }
                }
            }
        }

        self.shadow_active = shadow.is_some();
        if let Some((view_proj, eye, size)) = shadow {
            self.ensure_shadow_map(size);
            uniform.set_shadow(view_proj, size);
            self.shadow
                .camera
                .write(&self.ctx.queue, eye, view_proj, NO_CLIP);
        }
        self.ctx
            .queue
            .write_buffer(&self.scene_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    fn ensure_shadow_map(&mut self, size: u32) {
        if self.shadow.size == size {
            return;
        }
        debug!("shadow map resized to {size}x{size}");
        self.shadow.size = size;
        self.shadow.texture = Texture::create_depth_texture(&self.ctx.device, [size, size], "shadow map");
        self.scene_bind_group = mk_scene_bind_group(
            &self.ctx.device,
            &self.layouts.scene,
            &self.scene_buffer,
            &self.shadow.texture,
        );
    }

    fn ensure_mirrors(&mut self, mirrors: &[PlanarMirror]) {
        self.mirrors
            .retain(|node, _| mirrors.iter().any(|mirror| mirror.node == *node));
        for mirror in mirrors {
            if self
                .mirrors
                .get(&mirror.node)
                .is_some_and(|target| target.size == mirror.texture_size)
            {
                continue;
            }
            let device = &self.ctx.device;
            let size = mirror.texture_size;
            debug!("mirror target {:?} is {}x{}", mirror.node, size[0], size[1]);
            self.mirrors.insert(
                mirror.node,
                MirrorTarget {
                    id: crate::data_structures::next_resource_id(),
                    size,
                    color: Texture::create_render_target(device, size, "mirror target"),
                    depth: Texture::create_depth_texture(device, size, "mirror depth"),
                    camera: CameraBinding::new(device, &self.layouts.camera, "mirror camera"),
                },
            );
        }
    }

    fn ensure_capture(&mut self, resolution: u32) {
        if self
            .capture
            .as_ref()
            .is_some_and(|capture| capture.resolution == resolution)
        {
            return;
        }
        info!("reflection capture target is {resolution}px per face");
        let device = &self.ctx.device;
        let cube = Texture::create_cube_render_target(device, resolution, "capture cube");
        let faces = (0..6)
            .map(|face| {
                (
                    cube.face_view(face),
                    CameraBinding::new(device, &self.layouts.camera, "capture face camera"),
                )
            })
            .collect();
        self.capture = Some(CaptureTarget {
            id: crate::data_structures::next_resource_id(),
            resolution,
            depth: Texture::create_depth_texture(device, [resolution, resolution], "capture depth"),
            cube,
            faces,
        });
    }

    fn write_materials(&mut self, scene: &Scene, camera: &ViewportCamera, draws: &[DrawItem]) {
        let mirrors = PlanarMirror::collect(scene);
        self.ensure_mirrors(&mirrors);
        for draw in draws {
            let Some(mesh) = scene.graph.node(draw.node).and_then(|node| node.mesh()) else {
                continue;
            };
            let material = &mesh.material;
            let env = match material.env_map {
                EnvMap::CaptureTarget => self.capture.as_ref().map(|capture| capture.id),
                EnvMap::None => None,
            };
            let mirror = match material.shading {
                Shading::Reflector { .. } => self.mirrors.get(&draw.node).map(|target| target.id),
                _ => None,
            };
            let key = MaterialKey {
                map: material.map.as_ref().map(|map| map.id),
                env,
                mirror,
            };

            let mut uniform = MaterialUniform::new(material, mesh.receive_shadow, env.is_some());
            if let Some(mirror) = mirrors.iter().find(|mirror| mirror.node == draw.node) {
                uniform = uniform.with_mirror(mirror.virtual_eye(camera).1);
            }

            match self.materials.get(&draw.node) {
                Some(gpu) if gpu.key == key => {
                    self.ctx
                        .queue
                        .write_buffer(&gpu.buffer, 0, bytemuck::cast_slice(&[uniform]));
                }
                _ => {
                    let gpu = self.create_material(draw.node, key, &uniform);
                    self.materials.insert(draw.node, gpu);
                }
            }
        }
    }

    fn create_material(&self, node: NodeId, key: MaterialKey, uniform: &MaterialUniform) -> GpuMaterial {
        let device = &self.ctx.device;
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("material uniform"),
            contents: bytemuck::cast_slice(&[*uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let map = key
            .map
            .and_then(|id| self.textures.get(&id))
            .unwrap_or(&self.white);
        let env = key
            .env
            .and(self.capture.as_ref())
            .map(|capture| &capture.cube)
            .unwrap_or(&self.black_cube);
        let mirror = key
            .mirror
            .and(self.mirrors.get(&node))
            .map(|target| &target.color)
            .unwrap_or(&self.white);
        let sampler = |texture| {
            let texture: &Texture = texture;
            wgpu::BindingResource::Sampler(texture.sampler.as_ref().unwrap_or(&self.fallback_sampler))
        };
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.layouts.material,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: sampler(map),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&env.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: sampler(env),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&mirror.view),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: sampler(mirror),
                },
            ],
            label: Some("material_bind_group"),
        });
        GpuMaterial {
            key,
            buffer,
            bind_group,
        }
    }

    fn encode_shadow_pass(&self, encoder: &mut wgpu::CommandEncoder, draws: &[DrawItem]) {
        if !self.shadow_active {
            return;
        }
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.shadow.texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&self.shadow_pipeline);
        pass.set_bind_group(0, &self.shadow.camera.bind_group, &[]);
        pass.set_vertex_buffer(1, self.instances.slice(..));
        for draw in draws.iter().filter(|draw| draw.cast_shadow) {
            if let Some(mesh) = self.meshes.get(&draw.mesh) {
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.num_indices, 0, draw.instance..draw.instance + 1);
            }
        }
    }

    /// Sky, then opaque meshes, then transparent meshes back to front.
    fn encode_scene_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: PassTarget<'_>,
        scene: &Scene,
        draws: &[DrawItem],
        excluded: &dyn Fn(NodeId) -> bool,
    ) {
        let clear = scene.clear_color().to_linear();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(target.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(to_wgpu_color(clear)),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: target.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
            multiview_mask: None,
        });

        if let Some(sky) = &self.sky {
            pass.set_pipeline(target.sky);
            pass.set_bind_group(0, target.camera, &[]);
            pass.set_bind_group(1, &sky.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        let mut opaque = Vec::new();
        let mut transparent = Vec::new();
        for draw in draws.iter().filter(|draw| !excluded(draw.node)) {
            if draw.transparent {
                transparent.push(*draw);
            } else {
                opaque.push(*draw);
            }
        }
        transparent.sort_by(|a, b| {
            let da = a.position.distance2(target.eye);
            let db = b.position.distance2(target.eye);
            db.total_cmp(&da)
        });

        pass.set_bind_group(0, target.camera, &[]);
        pass.set_bind_group(1, &self.scene_bind_group, &[]);
        pass.set_vertex_buffer(1, self.instances.slice(..));
        for (pipeline, batch) in [
            (&target.pipelines.opaque, &opaque),
            (&target.pipelines.transparent, &transparent),
        ] {
            pass.set_pipeline(pipeline);
            for draw in batch {
                let (Some(mesh), Some(material)) =
                    (self.meshes.get(&draw.mesh), self.materials.get(&draw.node))
                else {
                    continue;
                };
                pass.set_bind_group(2, &material.bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.num_indices, 0, draw.instance..draw.instance + 1);
            }
        }
    }

    /// Copies the offscreen target back to the CPU.
    #[cfg(feature = "integration-tests")]
    pub async fn read_pixels(&self) -> Result<image::RgbaImage> {
        use anyhow::{Context as _, bail};

        let crate::context::RenderTarget::Offscreen { texture } = &self.ctx.target else {
            bail!("only offscreen targets can be read back");
        };
        let [width, height] = self.ctx.size();
        let unpadded = 4 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;
        let buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback buffer"),
            size: (padded * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(iter::once(encoder.finish()));

        // the mapping has to be requested before polling
        let (tx, rx) = futures::channel::oneshot::channel();
        let slice = buffer.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.ctx.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(std::time::Duration::from_secs(3)),
        })?;
        rx.await??;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        for row in data.chunks(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
        drop(data);
        buffer.unmap();
        image::RgbaImage::from_raw(width, height, pixels).context("readback has the wrong size")
    }
}

impl RenderEngine for WgpuRenderer {
    fn configure(&mut self, settings: &RendererSettings) -> Result<(), FrameError> {
        info!(
            "renderer configured: shadows {}, vsync {}",
            settings.shadows, settings.vsync
        );
        self.settings = *settings;
        self.ctx.set_vsync(settings.vsync);
        Ok(())
    }

    fn resize(&mut self, viewport: Viewport) {
        self.ctx.resize(viewport.physical_size());
    }

    fn capture_cube(
        &mut self,
        scene: &Scene,
        capture: &CubeCapture,
        camera: &ViewportCamera,
    ) -> Result<(), FrameError> {
        self.ensure_capture(capture.resolution);
        let draws = self.prepare(scene, camera);

        let queue = &self.ctx.queue;
        if let Some(target) = self.capture.as_mut() {
            for (face, (_, binding)) in target.faces.iter_mut().enumerate() {
                binding.write(queue, capture.position, capture.face_view_proj(face), NO_CLIP);
            }
        }
        let Some(target) = self.capture.as_ref() else {
            return Err(FrameError::Engine("capture target missing".to_string()));
        };

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Capture Encoder"),
            });
        if self.shadows_pending {
            self.encode_shadow_pass(&mut encoder, &draws);
        }
        for (view, binding) in &target.faces {
            self.encode_scene_pass(
                &mut encoder,
                PassTarget {
                    label: "Capture Pass",
                    color: view,
                    depth: &target.depth.view,
                    camera: &binding.bind_group,
                    eye: capture.position,
                    pipelines: self.capture_pipelines(),
                    sky: &self.capture_sky,
                },
                scene,
                &draws,
                &|node: NodeId| capture.is_excluded(node),
            );
        }
        self.ctx.queue.submit(iter::once(encoder.finish()));
        self.shadows_pending = false;
        Ok(())
    }

    fn render(&mut self, scene: &Scene, camera: &ViewportCamera) -> Result<(), FrameError> {
        let frame = self.ctx.acquire()?;
        let draws = self.prepare(scene, camera);

        let mirrors: Vec<_> = PlanarMirror::collect(scene)
            .into_iter()
            .map(|mirror| {
                let (eye, view_proj) = mirror.virtual_eye(camera);
                (mirror, eye, view_proj)
            })
            .collect();
        let queue = &self.ctx.queue;
        for (mirror, eye, view_proj) in &mirrors {
            if let Some(target) = self.mirrors.get_mut(&mirror.node) {
                target.camera.write(queue, *eye, *view_proj, mirror.clip_plane());
            }
        }
        let eye = camera.camera.position;
        self.main_camera
            .write(queue, eye, camera.view_proj(), NO_CLIP);

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        if self.shadows_pending {
            self.encode_shadow_pass(&mut encoder, &draws);
        }
        for (mirror, mirror_eye, _) in &mirrors {
            let Some(target) = self.mirrors.get(&mirror.node) else {
                continue;
            };
            self.encode_scene_pass(
                &mut encoder,
                PassTarget {
                    label: "Mirror Pass",
                    color: &target.color.view,
                    depth: &target.depth.view,
                    camera: &target.camera.bind_group,
                    eye: *mirror_eye,
                    pipelines: self.capture_pipelines(),
                    sky: &self.capture_sky,
                },
                scene,
                &draws,
                &|node: NodeId| node == mirror.node,
            );
        }
        self.encode_scene_pass(
            &mut encoder,
            PassTarget {
                label: "Render Pass",
                color: &frame.view,
                depth: &self.ctx.depth_texture.view,
                camera: &self.main_camera.bind_group,
                eye,
                pipelines: &self.main_pipelines,
                sky: &self.main_sky,
            },
            scene,
            &draws,
            &|_: NodeId| false,
        );

        self.ctx.queue.submit(iter::once(encoder.finish()));
        frame.present();
        self.shadows_pending = true;
        Ok(())
    }
}

fn mk_scene_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    shadow_map: &Texture,
) -> wgpu::BindGroup {
    let comparison = crate::data_structures::texture::create_shadow_sampler(device);
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&shadow_map.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(
                    shadow_map.sampler.as_ref().unwrap_or(&comparison),
                ),
            },
        ],
        label: Some("scene_bind_group"),
    })
}

fn mk_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("instance buffer"),
        size: (capacity.max(1) * std::mem::size_of::<TransformRaw>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn to_wgpu_color(color: Rgb) -> wgpu::Color {
    wgpu::Color {
        r: color.r as f64,
        g: color.g as f64,
        b: color.b as f64,
        a: 1.0,
    }
}
