//! Assembly of the dusk scene.
//!
//! [`compose`] builds the static part of the graph with literal transforms;
//! [`ComposedScene::request_assets`] then asks the coordinator for the textures
//! and models that fill it in as they arrive.

use std::f32::consts::FRAC_PI_2;

use cgmath::{Deg, Quaternion, Rad, Rotation3};
use log::info;

use crate::{
    camera::{Camera, Projection, ViewportCamera},
    config::SessionConfig,
    data_structures::{
        color::Rgb,
        fog::Fog,
        geometry::Geometry,
        light::{Light, ShadowCamera},
        material::{EnvMap, Material},
        scene_graph::{CaptureProbe, Mesh, NodeId, NodeKind, Scene},
        transform::Transform,
    },
    render::Viewport,
    resources::coordinator::{AssetLoadCoordinator, LoadHandle},
};

/// Tiling of the grass texture across the ground.
pub const GROUND_REPEAT: f32 = 10.0;

const PROP_COLORS: [(&str, u32); 3] = [
    ("red box", 0xff0000),
    ("green box", 0x00ff00),
    ("blue box", 0x0000ff),
];
const PROP_POSITIONS: [[f32; 3]; 3] = [[0.0, -4.5, 10.0], [3.0, -4.5, 10.0], [5.0, -4.5, 10.0]];

/// The composed scene plus handles to the nodes the session works with.
pub struct ComposedScene {
    pub scene: Scene,
    pub camera: ViewportCamera,
    pub ground: NodeId,
    pub sun: NodeId,
    pub point_light: NodeId,
    pub ambient_light: NodeId,
    pub directional_light: NodeId,
    pub probe: NodeId,
    pub mirror_sphere: NodeId,
    pub mirror_plane: NodeId,
    pub props: [NodeId; 3],
}

fn at(p: [f32; 3]) -> Transform {
    Transform::at(p[0], p[1], p[2])
}

/// Builds the static scene. Insertion order does not matter: every node hangs
/// directly off the root.
pub fn compose(config: &SessionConfig, viewport: Viewport) -> ComposedScene {
    let fog = Fog::new(config.fog.color, config.fog.near, config.fog.far);
    let mut scene = Scene::new(fog);
    let root = scene.graph.root();
    let graph = &mut scene.graph;

    let camera = ViewportCamera {
        camera: Camera::new(config.camera.position, config.camera.target),
        projection: Projection::new(
            viewport.width,
            viewport.height,
            Deg(config.camera.fov_degrees),
            config.camera.near,
            config.camera.far,
        ),
    };

    let ground = graph.add(
        root,
        "ground",
        NodeKind::Mesh(
            Mesh::new(
                Geometry::Cuboid {
                    width: 40.0,
                    height: 40.0,
                    depth: 1.0,
                }
                .tessellate(),
                Material::lambert().with_repeat(GROUND_REPEAT, GROUND_REPEAT),
            )
            .receiving_shadow(),
        ),
        Transform::at(0.0, -5.5, 0.0).with_rotation(Quaternion::from_angle_x(Rad(FRAC_PI_2))),
    );

    let sun = graph.add(
        root,
        "sun",
        NodeKind::Mesh(Mesh::new(
            Geometry::Sphere {
                radius: 1.54,
                width_segments: 10,
                height_segments: 10,
            }
            .tessellate(),
            Material::basic(),
        )),
        Transform::at(20.0, 20.0, -20.0),
    );

    let lighting = &config.lighting;
    let point_light = graph.add(
        root,
        "point light",
        NodeKind::Light(Light::Point {
            color: lighting.point.color,
            intensity: lighting.point.intensity,
        }),
        at(lighting.point.position),
    );
    let ambient_light = graph.add(
        root,
        "ambient light",
        NodeKind::Light(Light::Ambient {
            color: lighting.ambient.color,
            intensity: lighting.ambient.intensity,
        }),
        Transform::default(),
    );
    let sun_light = &lighting.directional;
    let directional_light = graph.add(
        root,
        "directional light",
        NodeKind::Light(Light::Directional {
            color: sun_light.color,
            intensity: sun_light.intensity,
            visible: sun_light.visible,
            shadow: sun_light.cast_shadow.then(|| {
                ShadowCamera::with_half_extent(
                    sun_light.shadow_map_size,
                    sun_light.shadow_near,
                    sun_light.shadow_far,
                    sun_light.shadow_half_extent,
                )
            }),
        }),
        at(sun_light.position),
    );

    let renderer = &config.renderer;
    let probe = graph.add(
        root,
        "cube camera",
        NodeKind::Probe(CaptureProbe {
            near: renderer.capture_near,
            far: renderer.capture_far,
            resolution: renderer.capture_resolution,
        }),
        at(renderer.probe_position),
    );
    let mirror_sphere = graph.add(
        root,
        "mirror sphere",
        NodeKind::Mesh(Mesh::new(
            Geometry::Sphere {
                radius: 1.5,
                width_segments: 32,
                height_segments: 16,
            }
            .tessellate(),
            Material::basic().with_env_map(EnvMap::CaptureTarget),
        )),
        at(renderer.probe_position),
    );

    let props = PROP_COLORS.map(|(name, color)| (name, Rgb::from_hex(color)));
    let mut prop_ids = [root; 3];
    for (i, (name, color)) in props.into_iter().enumerate() {
        prop_ids[i] = graph.add(
            root,
            name,
            NodeKind::Mesh(Mesh::new(
                Geometry::unit_cube().tessellate(),
                Material::phong(color).with_transparency(true),
            )),
            at(PROP_POSITIONS[i]),
        );
    }

    // sized from the viewport at composition time, later resizes keep it
    let mirror_plane = graph.add(
        root,
        "vertical mirror",
        NodeKind::Mesh(Mesh::new(
            Geometry::Plane {
                width: 40.0,
                height: 20.0,
            }
            .tessellate(),
            Material::reflector(
                renderer.mirror_color,
                renderer.mirror_clip_bias,
                viewport.physical_size(),
            ),
        )),
        Transform::at(0.0, 5.5, -20.0),
    );

    scene.graph.update_world_transforms();
    info!("composed scene with {} nodes", scene.graph.len());

    ComposedScene {
        scene,
        camera,
        ground,
        sun,
        point_light,
        ambient_light,
        directional_light,
        probe,
        mirror_sphere,
        mirror_plane,
        props: prop_ids,
    }
}

impl ComposedScene {
    /// Issues every asset load the scene needs: the sky, the ground and sun
    /// textures, the main model and any extra model instances.
    pub fn request_assets(
        &self,
        config: &SessionConfig,
        coordinator: &mut AssetLoadCoordinator,
    ) -> Vec<LoadHandle> {
        let assets = &config.assets;
        let mut handles = vec![
            coordinator.load_cube(assets.skybox.clone()),
            coordinator.load_texture(&assets.sun_texture, self.sun),
            coordinator.load_texture(&assets.ground_texture, self.ground),
            coordinator.load_model(&assets.model, assets.model_placement),
        ];
        for extra in &assets.extra_models {
            handles.push(coordinator.load_instances(&extra.path, extra.placements.clone()));
        }
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composed() -> ComposedScene {
        compose(&SessionConfig::default(), Viewport::new(1280, 720, 1.0))
    }

    #[test]
    fn literal_transforms() {
        let c = composed();
        let graph = &c.scene.graph;
        let pos = |id: NodeId| graph.node(id).unwrap().world().position();
        assert_eq!(pos(c.ground).y, -5.5);
        assert_eq!(pos(c.sun), cgmath::Vector3::new(20.0, 20.0, -20.0));
        assert_eq!(pos(c.mirror_plane), cgmath::Vector3::new(0.0, 5.5, -20.0));
        assert_eq!(pos(c.probe), pos(c.mirror_sphere));
        assert_eq!(pos(c.props[1]), cgmath::Vector3::new(3.0, -4.5, 10.0));
    }

    #[test]
    fn shadow_flags() {
        let c = composed();
        let mesh = |id: NodeId| c.scene.graph.node(id).unwrap().mesh().unwrap().clone();
        assert!(mesh(c.ground).receive_shadow);
        assert!(!mesh(c.sun).cast_shadow);
        let light = c.scene.graph.node(c.directional_light).unwrap().light().unwrap();
        match light {
            Light::Directional { shadow: Some(shadow), .. } => {
                assert_eq!(shadow.left, -50.0);
                assert_eq!(shadow.top, 50.0);
                assert_eq!(shadow.map_size, 1024);
            }
            other => panic!("unexpected light {other:?}"),
        }
    }

    #[test]
    fn fog_and_background_start_equal() {
        let c = composed();
        assert_eq!(c.scene.fog.color, c.scene.background.color);
        assert_eq!((c.scene.fog.near, c.scene.fog.far), (20.0, 70.0));
    }

    #[test]
    fn mirror_texture_follows_the_viewport() {
        let c = compose(&SessionConfig::default(), Viewport::new(800, 600, 3.0));
        let mesh = c.scene.graph.node(c.mirror_plane).unwrap().mesh().unwrap();
        match mesh.material.shading {
            crate::data_structures::material::Shading::Reflector { texture_size, clip_bias } => {
                assert_eq!(texture_size, [1600, 1200]);
                assert_eq!(clip_bias, 0.003);
            }
            other => panic!("unexpected shading {other:?}"),
        }
    }

    #[test]
    fn camera_starts_at_the_configured_pose() {
        let c = composed();
        assert_eq!(c.camera.camera.position, cgmath::Point3::new(-15.0, 10.0, 20.0));
        assert_eq!(c.camera.projection.aspect, 1280.0 / 720.0);
    }
}
