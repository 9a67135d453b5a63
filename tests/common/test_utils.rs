#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use cgmath::Point3;
use dusk_scene::{
    camera::ViewportCamera,
    config::SessionConfig,
    data_structures::{
        geometry::Geometry,
        material::Material,
        scene_graph::{Mesh, NodeId, NodeKind, Scene, Subgraph},
        texture::TextureData,
    },
    reflection::CubeCapture,
    render::{FrameError, RenderEngine, RendererSettings, Viewport},
    resources::AssetSource,
    session::{FrameScheduler, Session},
};
use futures::{FutureExt, future::BoxFuture};

/// One call the session made into its engine.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    Configure(RendererSettings),
    Resize(Viewport),
    Capture {
        camera: Point3<f32>,
        probe: Point3<f32>,
        excluded: Vec<NodeId>,
    },
    Render {
        camera: Point3<f32>,
        nodes: usize,
    },
}

/// A [`RenderEngine`] that only writes down what it was asked to do.
#[derive(Clone, Default)]
pub struct RecordingEngine {
    pub calls: Arc<Mutex<Vec<EngineCall>>>,
    /// Makes every `render` fail with an engine fault.
    pub fail_render: bool,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RenderEngine for RecordingEngine {
    fn configure(&mut self, settings: &RendererSettings) -> Result<(), FrameError> {
        self.record(EngineCall::Configure(*settings));
        Ok(())
    }

    fn resize(&mut self, viewport: Viewport) {
        self.record(EngineCall::Resize(viewport));
    }

    fn capture_cube(
        &mut self,
        _scene: &Scene,
        capture: &CubeCapture,
        camera: &ViewportCamera,
    ) -> Result<(), FrameError> {
        self.record(EngineCall::Capture {
            camera: camera.camera.position,
            probe: capture.position,
            excluded: capture.excluded.clone(),
        });
        Ok(())
    }

    fn render(&mut self, scene: &Scene, camera: &ViewportCamera) -> Result<(), FrameError> {
        self.record(EngineCall::Render {
            camera: camera.camera.position,
            nodes: scene.graph.len(),
        });
        if self.fail_render {
            return Err(FrameError::Engine("render disabled in this test".to_string()));
        }
        Ok(())
    }
}

/// Serves models and images from memory. Unknown paths fail like missing files.
#[derive(Default)]
pub struct MemoryAssetSource {
    models: HashMap<String, Subgraph>,
    images: HashMap<String, [u8; 4]>,
    model_loads: AtomicUsize,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, path: &str, model: Subgraph) -> Self {
        self.models.insert(path.to_string(), model);
        self
    }

    pub fn with_image(mut self, path: &str, rgba: [u8; 4]) -> Self {
        self.images.insert(path.to_string(), rgba);
        self
    }

    /// Every asset the default session asks for.
    pub fn for_config(config: &SessionConfig) -> Self {
        let assets = &config.assets;
        let mut source = Self::new()
            .with_model(&assets.model, two_box_model())
            .with_image(&assets.ground_texture, [40, 120, 40, 255])
            .with_image(&assets.sun_texture, [250, 200, 60, 255]);
        for face in &assets.skybox {
            source = source.with_image(face, [20, 20, 60, 255]);
        }
        source
    }

    pub fn model_loads(&self) -> usize {
        self.model_loads.load(Ordering::SeqCst)
    }
}

impl AssetSource for MemoryAssetSource {
    fn load_model(&self, path: &str) -> BoxFuture<'static, anyhow::Result<Subgraph>> {
        self.model_loads.fetch_add(1, Ordering::SeqCst);
        let model = self
            .models
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no model at {path}"));
        futures::future::ready(model).boxed()
    }

    fn load_image(&self, path: &str) -> BoxFuture<'static, anyhow::Result<TextureData>> {
        let image = match self.images.get(path) {
            Some(rgba) => Ok(TextureData::solid(path, *rgba)),
            None => Err(anyhow::anyhow!("no image at {path}")),
        };
        futures::future::ready(image).boxed()
    }
}

/// A group holding two unit boxes, one of them nested.
pub fn two_box_model() -> Subgraph {
    let cube = || {
        NodeKind::Mesh(Mesh::new(
            Geometry::unit_cube().tessellate(),
            Material::lambert(),
        ))
    };
    Subgraph::group("model")
        .with_child(Subgraph::new("box a", cube()))
        .with_child(Subgraph::group("inner").with_child(Subgraph::new("box b", cube())))
}

/// Counts how often the loop asked for another frame.
#[derive(Clone, Default)]
pub struct CountingScheduler(pub Arc<AtomicUsize>);

impl CountingScheduler {
    pub fn requests(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl FrameScheduler for CountingScheduler {
    fn request_next_frame(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

pub const VIEWPORT: Viewport = Viewport {
    width: 1280,
    height: 720,
    pixel_ratio: 1.0,
};

/// A session on the recording engine. The runtime must outlive the session's loads.
pub fn session_with(
    config: &SessionConfig,
    source: MemoryAssetSource,
    runtime: &tokio::runtime::Runtime,
) -> (Session, RecordingEngine) {
    let engine = RecordingEngine::new();
    let session = Session::new(
        config,
        VIEWPORT,
        Box::new(engine.clone()),
        Arc::new(source),
        runtime.handle().clone(),
    )
    .unwrap();
    (session, engine)
}

pub fn session(runtime: &tokio::runtime::Runtime) -> (Session, RecordingEngine) {
    let config = SessionConfig::default();
    let source = MemoryAssetSource::for_config(&config);
    session_with(&config, source, runtime)
}

/// Fixed frame step used by loop tests.
pub const STEP: Duration = Duration::from_millis(16);
