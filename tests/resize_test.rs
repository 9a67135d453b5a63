use dusk_scene::render::{MAX_PIXEL_RATIO, Viewport};

use crate::common::test_utils::{EngineCall, runtime, session};

mod common;

fn last_resize(calls: &[EngineCall]) -> Option<Viewport> {
    calls.iter().rev().find_map(|call| match call {
        EngineCall::Resize(viewport) => Some(*viewport),
        _ => None,
    })
}

#[test]
fn session_start_configures_and_sizes_the_engine() {
    let rt = runtime();
    let (_session, engine) = session(&rt);
    let calls = engine.calls();
    assert!(matches!(calls[0], EngineCall::Configure(settings) if settings.shadows));
    assert_eq!(last_resize(&calls).map(|v| v.physical_size()), Some([1280, 720]));
}

#[test]
fn resize_updates_aspect_surface_and_ratio() {
    let rt = runtime();
    let (mut session, engine) = session(&rt);

    for (w, h, dpr) in [(1024, 512, 1.0), (800, 600, 3.0), (333, 777, 1.5)] {
        session.resize(Viewport::new(w, h, dpr));
        let aspect = session.camera().projection.aspect;
        assert!((aspect - w as f32 / h as f32).abs() < 1e-6);

        let viewport = last_resize(&engine.calls()).unwrap();
        assert_eq!((viewport.width, viewport.height), (w, h));
        assert!(viewport.pixel_ratio <= MAX_PIXEL_RATIO);
        assert_eq!(session.viewport(), viewport);
    }
    assert_eq!(session.viewport().physical_size(), [500, 1166]);
}

#[test]
fn zero_sized_viewports_are_ignored() {
    let rt = runtime();
    let (mut session, engine) = session(&rt);
    let before = engine.calls().len();
    let aspect = session.camera().projection.aspect;

    session.resize(Viewport::new(0, 600, 1.0));
    session.resize(Viewport::new(800, 0, 1.0));

    assert_eq!(engine.calls().len(), before);
    assert_eq!(session.camera().projection.aspect, aspect);
}
