use dusk_scene::{
    data_structures::color::Rgb,
    panel::{BindError, Bindable, ParamValue, keyboard::PanelKey},
};

use crate::common::test_utils::{runtime, session};

mod common;

#[test]
fn near_never_exceeds_far() {
    let rt = runtime();
    let (mut session, _) = session(&rt);
    let writes = [
        ("near", 35.0),
        ("far", 10.0),
        ("near", 90.0),
        ("far", 95.0),
        ("near", -4.0),
        ("far", -8.0),
        ("near", 50.0),
    ];
    for (name, value) in writes {
        session.with_fog(|fog| {
            fog.set(name, ParamValue::Number(value)).unwrap();
            assert!(fog.near() <= fog.far(), "{name}={value} left {} > {}", fog.near(), fog.far());
            assert_eq!(fog.get(name).unwrap(), ParamValue::Number(value));
        });
    }
    let fog = session.scene().fog;
    assert!(fog.near <= fog.far);
}

#[test]
fn crossing_writes_drag_the_other_bound() {
    let rt = runtime();
    let (mut session, _) = session(&rt);

    session.with_fog(|fog| fog.set_near(90.0));
    assert_eq!((session.scene().fog.near, session.scene().fog.far), (90.0, 90.0));

    session.with_fog(|fog| {
        fog.set_near(20.0);
        fog.set_far(70.0);
        fog.set_far(5.0);
    });
    assert_eq!((session.scene().fog.near, session.scene().fog.far), (5.0, 5.0));
}

#[test]
fn color_writes_reach_fog_and_background() {
    let rt = runtime();
    let (mut session, _) = session(&rt);
    let orange = Rgb::from_hex(0xffa07a);
    session.with_fog(|fog| fog.set("color", ParamValue::Color(orange)).unwrap());
    assert_eq!(session.scene().fog.color, orange);
    assert_eq!(session.scene().background.color, orange);
    assert_eq!(session.scene().clear_color(), orange);
}

#[test]
fn bad_writes_are_reported_and_change_nothing() {
    let rt = runtime();
    let (mut session, _) = session(&rt);
    let before = session.scene().fog;
    session.with_fog(|fog| {
        assert!(matches!(
            fog.set("near", ParamValue::Bool(true)),
            Err(BindError::WrongType { .. })
        ));
        assert!(matches!(
            fog.set("density", ParamValue::Number(1.0)),
            Err(BindError::UnknownProperty { .. })
        ));
    });
    assert_eq!(session.scene().fog, before);
}

#[test]
fn keyboard_panel_steps_the_selected_property() {
    let rt = runtime();
    let (mut session, _) = session(&rt);

    let change = session.handle_panel_key(PanelKey::Increase).unwrap().unwrap();
    assert_eq!((change.folder.as_str(), change.name), ("fog", "near"));
    assert!((session.scene().fog.near - 20.1).abs() < 1e-4);

    // near is already at the bottom of its slider
    session.with_fog(|fog| fog.set_near(20.0));
    session.handle_panel_key(PanelKey::Decrease).unwrap();
    assert_eq!(session.scene().fog.near, 20.0);

    session.handle_panel_key(PanelKey::NextProperty).unwrap();
    session.handle_panel_key(PanelKey::NextProperty).unwrap();
    let change = session.handle_panel_key(PanelKey::Increase).unwrap().unwrap();
    assert_eq!(change.name, "color");
    assert_eq!(session.scene().fog.color, Rgb::WHITE);
    assert_eq!(session.scene().background.color, Rgb::WHITE);
}

#[test]
fn snapshot_covers_fog_and_light_folders() {
    let rt = runtime();
    let (mut session, _) = session(&rt);
    let snapshot = session.panel_snapshot();
    let names: Vec<_> = snapshot
        .iter()
        .map(|(folder, name, _)| format!("{folder}.{name}"))
        .collect();
    for expected in ["fog.near", "fog.far", "fog.color"] {
        assert!(names.iter().any(|n| n == expected), "{expected} missing from {names:?}");
    }
    assert!(snapshot.iter().any(|(folder, name, value)| folder != "fog"
        && *name == "intensity"
        && value.as_number().is_some()));
}
