//! dusk-scene
//!
//! An interactive 3D scene at dusk: a fogged floor, a sky cube, a reflective
//! sphere fed by a per-frame cube capture, a planar mirror and a few props that
//! can be dragged around while the camera orbits.
//!
//! The crate is split into a GPU-free core and a wgpu backend. The core
//! (scene graph, asset coordination, pointer arbitration, parameter binding,
//! the frame loop) talks to rendering only through [`render::RenderEngine`],
//! so it can be driven and tested without a device.
//!
//! High-level modules
//! - `camera`: viewport camera, projection, picking rays and the camera uniform
//! - `composer`: builds the initial scene and issues its asset loads
//! - `config`: serde session configuration with complete defaults
//! - `context`: wgpu device, queue and window or offscreen target
//! - `controls`: orbit and drag controllers plus the arbiter between them
//! - `data_structures`: scene graph, transforms, geometry, materials, lights
//! - `flow`: the winit host driving a [`session::Session`]
//! - `panel`: bindable property surfaces and the keyboard control panel
//! - `pipelines`: render pipelines and their shaders
//! - `reflection`: cube capture scheduling and planar mirrors
//! - `render`: the engine seam, viewport and frame errors
//! - `renderer`: the wgpu implementation of the engine seam
//! - `resources`: asset sources, glTF and image decoding, the load coordinator
//! - `session`: the per-session context and the render loop driver

pub mod camera;
pub mod composer;
pub mod config;
pub mod context;
pub mod controls;
pub mod data_structures;
pub mod flow;
pub mod panel;
pub mod pipelines;
pub mod reflection;
pub mod render;
pub mod renderer;
pub mod resources;
pub mod session;
