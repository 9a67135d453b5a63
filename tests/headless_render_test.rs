#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
fn srgb_bytes(color: dusk_scene::data_structures::color::Rgb) -> [u8; 3] {
    let f_to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [f_to_u8(color.r), f_to_u8(color.g), f_to_u8(color.b)]
}

#[test]
#[cfg(feature = "integration-tests")]
fn empty_scene_shows_the_background_color() {
    use dusk_scene::{
        camera::{Camera, Projection, ViewportCamera},
        data_structures::{color::Rgb, fog::Fog, scene_graph::Scene},
        render::RenderEngine,
        renderer::WgpuRenderer,
    };

    let rt = common::test_utils::runtime();
    let mut renderer = rt.block_on(WgpuRenderer::headless(64, 48)).unwrap();
    let fog = Fog::new(Rgb::from_hex(0xadd8e6), 20.0, 70.0);
    let scene = Scene::new(fog);
    let camera = ViewportCamera {
        camera: Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0)),
        projection: Projection::new(64, 48, cgmath::Deg(75.0), 1.0, 100.0),
    };

    renderer.render(&scene, &camera).unwrap();
    let image = rt.block_on(renderer.read_pixels()).unwrap();

    assert_eq!(image.dimensions(), (64, 48));
    let [r, g, b] = srgb_bytes(fog.color);
    for pixel in image.pixels() {
        assert!(pixel[0].abs_diff(r) <= 1 && pixel[1].abs_diff(g) <= 1 && pixel[2].abs_diff(b) <= 1);
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn composed_session_captures_and_renders_every_frame() {
    use std::sync::Arc;

    use dusk_scene::{
        config::SessionConfig,
        render::Viewport,
        renderer::WgpuRenderer,
        session::{RenderLoop, Session},
    };

    use crate::common::test_utils::{CountingScheduler, MemoryAssetSource};

    let rt = common::test_utils::runtime();
    let renderer = rt.block_on(WgpuRenderer::headless(160, 90)).unwrap();
    let config = SessionConfig::default();
    let mut session = Session::new(
        &config,
        Viewport::new(160, 90, 1.0),
        Box::new(renderer),
        Arc::new(MemoryAssetSource::for_config(&config)),
        rt.handle().clone(),
    )
    .unwrap();
    rt.block_on(session.wait_for_loads());

    let mut render_loop = RenderLoop::new(CountingScheduler::default());
    let start = instant::Instant::now();
    for i in 0..3u32 {
        render_loop
            .tick(&mut session, start + std::time::Duration::from_millis(16) * i)
            .unwrap();
    }
    assert_eq!(session.frames(), 3);
    assert_eq!(session.captures(), 3);
}
