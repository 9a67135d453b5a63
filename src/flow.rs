//! The winit host: window, event translation and the redraw-driven loop.
//!
//! Everything interesting happens in [`Session`]; this module only turns
//! window events into session calls and redraw requests into
//! [`RenderLoop::tick`]s.

use std::sync::Arc;

use instant::Instant;
use log::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalPosition, LogicalSize},
    event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use crate::{
    config::SessionConfig,
    controls::PointerEvent,
    panel::keyboard::PanelKey,
    render::{FrameError, Viewport},
    renderer::WgpuRenderer,
    resources::FileAssetSource,
    session::{FrameScheduler, RenderLoop, Session},
};

/// Wheel pixels that count as one line.
const PIXELS_PER_LINE: f64 = 100.0;

/// Requests redraws of the session window.
pub struct WindowScheduler(Arc<Window>);

impl FrameScheduler for WindowScheduler {
    fn request_next_frame(&mut self) {
        self.0.request_redraw();
    }
}

/// FPS counter shown in the window title.
struct FrameTiming {
    last_fps_time: Instant,
    frame_count: u32,
    base_title: String,
}

impl FrameTiming {
    fn new(base_title: String) -> Self {
        Self {
            last_fps_time: Instant::now(),
            frame_count: 0,
            base_title,
        }
    }

    fn update(&mut self, window: &Window, now: Instant) {
        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed.as_secs_f32() >= 0.5 {
            let fps = self.frame_count as f32 / elapsed.as_secs_f32();
            window.set_title(&format!("{} - {:.1} fps", self.base_title, fps));
            self.frame_count = 0;
            self.last_fps_time = now;
        }
    }
}

struct AppState {
    window: Arc<Window>,
    session: Session,
    render_loop: RenderLoop<WindowScheduler>,
    timing: FrameTiming,
    cursor: LogicalPosition<f64>,
}

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    config: SessionConfig,
    state: Option<AppState>,
}

impl App {
    pub fn new(config: SessionConfig) -> anyhow::Result<Self> {
        Ok(Self {
            async_runtime: tokio::runtime::Runtime::new()?,
            config,
            state: None,
        })
    }

    fn init(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window_config = &self.config.window;
        let attributes = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(LogicalSize::new(window_config.width, window_config.height));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let renderer = self
            .async_runtime
            .block_on(WgpuRenderer::new(window.clone()))?;
        let source = match &self.config.assets.root {
            Some(root) => FileAssetSource::new(root.clone()),
            None => FileAssetSource::default(),
        };
        let viewport = Viewport::from_physical(window.inner_size(), window.scale_factor());
        let session = Session::new(
            &self.config,
            viewport,
            Box::new(renderer),
            Arc::new(source),
            self.async_runtime.handle().clone(),
        )?;

        let mut render_loop = RenderLoop::new(WindowScheduler(window.clone()));
        render_loop.start();
        Ok(AppState {
            timing: FrameTiming::new(window_config.title.clone()),
            window,
            session,
            render_loop,
            cursor: LogicalPosition::new(0.0, 0.0),
        })
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => {
                info!("window ready");
                self.state = Some(state);
            }
            Err(err) => {
                error!("failed to start the session: {err:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                let viewport = Viewport::from_physical(size, state.window.scale_factor());
                state.session.resize(viewport);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let viewport = Viewport::from_physical(state.window.inner_size(), scale_factor);
                state.session.resize(viewport);
            }
            WindowEvent::CursorMoved { position, .. } => {
                state.cursor = position.to_logical(state.window.scale_factor());
                state.session.handle_pointer(PointerEvent::Moved {
                    position: state.cursor,
                });
            }
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                let position = state.cursor;
                let event = match button_state {
                    ElementState::Pressed => PointerEvent::Pressed { button, position },
                    ElementState::Released => PointerEvent::Released { button, position },
                };
                state.session.handle_pointer(event);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => (position.y / PIXELS_PER_LINE) as f32,
                };
                state.session.handle_pointer(PointerEvent::Wheel { delta });
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if let Some(key) = PanelKey::from_key_code(code) {
                    if let Err(err) = state.session.handle_panel_key(key) {
                        warn!("panel: {err}");
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                state.timing.update(&state.window, now);
                match state.render_loop.tick(&mut state.session, now) {
                    Ok(report) if !report.loads.is_empty() => {
                        debug!("frame {} applied {} loads", report.frame, report.loads.len());
                    }
                    Ok(_) => {}
                    Err(err @ FrameError::Surface(_)) => warn!("{err}"),
                    Err(err @ FrameError::Engine(_)) => error!("{err}"),
                }
            }
            _ => {}
        }
    }
}

/// Opens the session window and runs until it is closed.
pub fn run(config: SessionConfig) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config)?;
    event_loop.run_app(&mut app)?;
    Ok(())
}
