use cgmath::{Point3, Vector4};
use dusk_scene::{
    controls::{
        PointerEvent,
        arbiter::{InteractionMode, PointerConsumer},
    },
    session::Session,
};
use winit::{dpi::LogicalPosition, event::MouseButton};

use crate::common::test_utils::{VIEWPORT, runtime, session};

mod common;

/// Where a world point lands in the viewport, in logical pixels.
fn project(session: &Session, point: Point3<f32>) -> LogicalPosition<f64> {
    let clip = session.camera().view_proj() * Vector4::new(point.x, point.y, point.z, 1.0);
    let (x, y) = (clip.x / clip.w, clip.y / clip.w);
    LogicalPosition::new(
        ((x + 1.0) * 0.5 * VIEWPORT.width as f32) as f64,
        ((1.0 - y) * 0.5 * VIEWPORT.height as f32) as f64,
    )
}

fn prop_position(session: &Session, name: &str) -> Point3<f32> {
    let graph = &session.scene().graph;
    let id = graph.find(name).unwrap();
    let p = graph.node(id).unwrap().world().position();
    Point3::new(p.x, p.y, p.z)
}

fn press(position: LogicalPosition<f64>) -> PointerEvent {
    PointerEvent::Pressed {
        button: MouseButton::Left,
        position,
    }
}

fn release(position: LogicalPosition<f64>) -> PointerEvent {
    PointerEvent::Released {
        button: MouseButton::Left,
        position,
    }
}

#[test]
fn pressing_a_prop_switches_to_dragging() {
    let rt = runtime();
    let (mut session, _) = session(&rt);
    assert_eq!(session.mode(), InteractionMode::Navigate);
    assert!(session.navigation_enabled());

    let at = project(&session, prop_position(&session, "red box"));
    assert_eq!(session.handle_pointer(press(at)), PointerConsumer::Drag);
    assert_eq!(session.mode(), InteractionMode::Dragging);
    assert!(!session.navigation_enabled());
    assert_eq!(session.dragged(), session.scene().graph.find("red box"));

    assert_eq!(session.handle_pointer(release(at)), PointerConsumer::Drag);
    assert_eq!(session.mode(), InteractionMode::Navigate);
    assert!(session.navigation_enabled());
    assert_eq!(session.dragged(), None);
}

#[test]
fn dragging_moves_only_the_prop() {
    let rt = runtime();
    let (mut session, _) = session(&rt);
    let camera_before = session.camera().camera.position;
    let start = prop_position(&session, "green box");
    let at = project(&session, start);

    session.handle_pointer(press(at));
    let moved = LogicalPosition::new(at.x + 60.0, at.y - 40.0);
    assert_eq!(
        session.handle_pointer(PointerEvent::Moved { position: moved }),
        PointerConsumer::Drag
    );
    // wheel input during a drag never reaches navigation
    assert_eq!(
        session.handle_pointer(PointerEvent::Wheel { delta: 3.0 }),
        PointerConsumer::Drag
    );
    session.handle_pointer(release(moved));

    let end = prop_position(&session, "green box");
    assert!((end - start).x > 0.1, "prop stayed at {start:?}");
    assert_eq!(session.camera().camera.position, camera_before);
}

#[test]
fn empty_space_belongs_to_navigation() {
    let rt = runtime();
    let (mut session, _) = session(&rt);
    let sky = LogicalPosition::new(4.0, 4.0);
    assert_eq!(session.handle_pointer(press(sky)), PointerConsumer::Navigation);
    assert_eq!(session.mode(), InteractionMode::Navigate);
    assert!(session.navigation_enabled());
    assert_eq!(session.handle_pointer(release(sky)), PointerConsumer::Navigation);
}

#[test]
fn exactly_one_controller_is_active() {
    let rt = runtime();
    let (mut session, _) = session(&rt);
    let at = project(&session, prop_position(&session, "blue box"));
    let events = [
        press(at),
        PointerEvent::Moved {
            position: LogicalPosition::new(at.x + 5.0, at.y),
        },
        release(at),
        press(LogicalPosition::new(4.0, 4.0)),
        release(LogicalPosition::new(4.0, 4.0)),
        press(at),
        release(at),
    ];
    for event in events {
        session.handle_pointer(event);
        let dragging = session.mode() == InteractionMode::Dragging;
        assert_ne!(dragging, session.navigation_enabled(), "after {event:?}");
    }
}
