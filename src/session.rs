//! The session context and the render loop driver.
//!
//! [`Session`] owns everything one interactive session needs: the live scene,
//! the viewport camera, both pointer controllers and their arbiter, the asset
//! coordinator, the reflection scheduler, the control panel and the engine.
//! [`RenderLoop`] advances it one frame at a time and asks its
//! [`FrameScheduler`] for the next frame afterwards.

use std::{sync::Arc, time::Duration};

use instant::Instant;
use log::{debug, info};

use crate::{
    camera::ViewportCamera,
    composer::compose,
    config::SessionConfig,
    controls::{
        PointerEvent,
        arbiter::{InteractionArbiter, InteractionMode, PointerConsumer},
        drag::{DragControls, DragController, DragView},
        orbit::{NavigationController, OrbitControls},
    },
    data_structures::scene_graph::{NodeId, Scene},
    panel::{
        BindError, Bindable,
        fog_binding::FogBinding,
        keyboard::{KeyboardPanel, PanelChange, PanelKey, snapshot},
        light_binding::DirectionalLightBinding,
        ParamValue,
    },
    reflection::ReflectionCaptureScheduler,
    render::{FrameError, RenderEngine, RendererSettings, Viewport},
    resources::{
        AssetSource,
        coordinator::{AssetLoadCoordinator, LoadOutcome},
    },
};

/// What one frame did.
#[derive(Debug)]
pub struct FrameReport {
    /// Sequence number of the frame, starting at 1.
    pub frame: u64,
    /// Loads that completed since the previous frame and were applied to the scene.
    pub loads: Vec<LoadOutcome>,
}

pub struct Session {
    scene: Scene,
    camera: ViewportCamera,
    viewport: Viewport,
    engine: Box<dyn RenderEngine>,
    coordinator: AssetLoadCoordinator,
    navigation: Box<dyn NavigationController>,
    drag: Box<dyn DragController>,
    arbiter: InteractionArbiter,
    reflections: ReflectionCaptureScheduler,
    panel: KeyboardPanel,
    directional_light: NodeId,
    fog_slider: (f32, f32),
    frames: u64,
}

impl Session {
    /// Composes the scene, configures the engine and issues every asset load.
    ///
    /// Loads run on `runtime` and are applied at the start of later frames.
    pub fn new(
        config: &SessionConfig,
        viewport: Viewport,
        mut engine: Box<dyn RenderEngine>,
        source: Arc<dyn AssetSource>,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self, FrameError> {
        let composed = compose(config, viewport);
        engine.configure(&RendererSettings::from(&config.renderer))?;
        engine.resize(viewport);

        let mut coordinator = AssetLoadCoordinator::new(source, runtime);
        let handles = composed.request_assets(config, &mut coordinator);
        info!("session started, {} asset loads in flight", handles.len());

        let mut orbit = OrbitControls::from_config(config.camera.target, &config.controls);
        orbit.set_viewport_height(viewport.height);

        Ok(Self {
            camera: composed.camera,
            viewport,
            engine,
            coordinator,
            navigation: Box::new(orbit),
            drag: Box::new(DragControls::new(composed.props.to_vec())),
            arbiter: InteractionArbiter::new(),
            reflections: ReflectionCaptureScheduler::new(composed.probe),
            panel: KeyboardPanel::new(),
            directional_light: composed.directional_light,
            fog_slider: (config.fog.slider_min, config.fog.slider_max),
            frames: 0,
            scene: composed.scene,
        })
    }

    /// Replaces the pointer controllers, e.g. with scripted ones.
    pub fn with_controllers(
        mut self,
        navigation: Box<dyn NavigationController>,
        drag: Box<dyn DragController>,
    ) -> Self {
        self.navigation = navigation;
        self.drag = drag;
        self.arbiter = InteractionArbiter::new();
        self
    }

    /// One iteration: apply finished loads, advance navigation, capture
    /// reflections, render the main view. Steps never run out of this order.
    pub fn frame(&mut self, dt: Duration) -> Result<FrameReport, FrameError> {
        let loads = self.coordinator.apply_ready(&mut self.scene);
        self.navigation.update(&mut self.camera.camera, dt);
        self.scene.graph.update_world_transforms();
        self.reflections
            .capture(&self.scene, &self.camera, self.engine.as_mut())?;
        self.engine.render(&self.scene, &self.camera)?;
        self.frames += 1;
        Ok(FrameReport {
            frame: self.frames,
            loads,
        })
    }

    /// Routes one pointer event to exactly one controller.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> PointerConsumer {
        let view = DragView {
            camera: &self.camera,
            width: self.viewport.width,
            height: self.viewport.height,
        };
        self.arbiter.route(
            &event,
            self.navigation.as_mut(),
            self.drag.as_mut(),
            &view,
            &mut self.scene.graph,
        )
    }

    /// Applies a panel key to the fog and light folders.
    pub fn handle_panel_key(&mut self, key: PanelKey) -> Result<Option<PanelChange>, BindError> {
        self.with_panel(|panel, surfaces| panel.handle(key, surfaces))
    }

    /// Every panel property with its current value.
    pub fn panel_snapshot(&mut self) -> Vec<(String, &'static str, ParamValue)> {
        self.with_panel(|_, surfaces| snapshot(surfaces))
    }

    fn with_panel<R>(
        &mut self,
        f: impl FnOnce(&mut KeyboardPanel, &mut [&mut dyn Bindable]) -> R,
    ) -> R {
        let (min, max) = self.fog_slider;
        let Scene {
            graph,
            fog,
            background,
        } = &mut self.scene;
        let mut fog = FogBinding::new(fog, background).with_slider_range(min, max);
        let mut light = graph
            .node_mut(self.directional_light)
            .and_then(DirectionalLightBinding::new);
        let mut surfaces: Vec<&mut dyn Bindable> = vec![&mut fog as &mut dyn Bindable];
        if let Some(light) = light.as_mut() {
            surfaces.push(light);
        }
        f(&mut self.panel, surfaces.as_mut_slice())
    }

    /// Runs `f` against the fog folder, e.g. for writes from outside the panel.
    pub fn with_fog<R>(&mut self, f: impl FnOnce(&mut FogBinding<'_>) -> R) -> R {
        let (min, max) = self.fog_slider;
        let mut binding = FogBinding::for_scene(&mut self.scene).with_slider_range(min, max);
        f(&mut binding)
    }

    /// New aspect ratio, drawing buffer size and pixel ratio. Zero-sized
    /// viewports, e.g. a minimized window, are ignored.
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport.width == 0 || viewport.height == 0 {
            debug!("ignoring resize to {}x{}", viewport.width, viewport.height);
            return;
        }
        self.viewport = viewport;
        self.camera
            .projection
            .resize(viewport.width, viewport.height);
        self.navigation.set_viewport(viewport.width, viewport.height);
        self.engine.resize(viewport);
    }

    /// Waits for every outstanding load and applies it.
    pub async fn wait_for_loads(&mut self) -> Vec<LoadOutcome> {
        self.coordinator.wait_for_pending(&mut self.scene).await
    }

    pub fn pending_loads(&self) -> usize {
        self.coordinator.pending_count()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn camera(&self) -> &ViewportCamera {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn mode(&self) -> InteractionMode {
        self.arbiter.mode()
    }

    pub fn navigation_enabled(&self) -> bool {
        self.navigation.enabled()
    }

    pub fn dragged(&self) -> Option<NodeId> {
        self.drag.dragged()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn captures(&self) -> u64 {
        self.reflections.frames()
    }
}

/// The host's "call me again next frame" primitive.
pub trait FrameScheduler {
    fn request_next_frame(&mut self);
}

/// Drives a [`Session`] one frame per host callback.
///
/// Each [`RenderLoop::tick`] runs exactly one [`Session::frame`] and then
/// reschedules, so iterations cannot overlap and none is skipped.
pub struct RenderLoop<S: FrameScheduler> {
    scheduler: S,
    last_frame: Option<Instant>,
}

impl<S: FrameScheduler> RenderLoop<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            last_frame: None,
        }
    }

    /// Kicks off the first frame.
    pub fn start(&mut self) {
        self.scheduler.request_next_frame();
    }

    /// Runs one frame at `now` and requests the next one, also after a failed
    /// frame.
    pub fn tick(&mut self, session: &mut Session, now: Instant) -> Result<FrameReport, FrameError> {
        let dt = self
            .last_frame
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last_frame = Some(now);
        let result = session.frame(dt);
        self.scheduler.request_next_frame();
        result
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}
