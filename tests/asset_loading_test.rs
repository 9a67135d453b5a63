use std::sync::Arc;

use dusk_scene::{
    data_structures::{
        color::Rgb,
        fog::Fog,
        geometry::Geometry,
        material::Material,
        scene_graph::{Mesh, NodeKind, Scene, Subgraph},
        texture::TextureData,
    },
    resources::{
        AssetSource,
        coordinator::{AssetKind, AssetLoadCoordinator, LoadError, LoadStatus, Placement},
    },
};
use futures::{FutureExt, future::BoxFuture};

use crate::common::test_utils::{MemoryAssetSource, runtime, two_box_model};

mod common;

fn scene() -> Scene {
    Scene::new(Fog::new(Rgb::from_hex(0xadd8e6), 20.0, 70.0))
}

fn coordinator(
    source: MemoryAssetSource,
    rt: &tokio::runtime::Runtime,
) -> (AssetLoadCoordinator, Arc<MemoryAssetSource>) {
    let source = Arc::new(source);
    (AssetLoadCoordinator::new(source.clone(), rt.handle().clone()), source)
}

#[test]
fn loaded_model_adds_its_nodes_with_shadows() {
    let rt = runtime();
    let source = MemoryAssetSource::new().with_model("model/scene.gltf", two_box_model());
    let (mut coordinator, _) = coordinator(source, &rt);
    let mut scene = scene();
    let before = scene.graph.len();

    let handle = coordinator.load_model("model/scene.gltf", Placement::at(1.0, -5.0, 0.0));
    assert!(coordinator.is_pending(handle));
    let outcomes = rt.block_on(coordinator.wait_for_pending(&mut scene));

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].status, LoadStatus::Applied { nodes_added: 4 }));
    assert!(!coordinator.is_pending(handle));
    assert_eq!(scene.graph.len(), before + two_box_model().len());
    let meshes: Vec<_> = scene.graph.visible_meshes().map(|(_, _, mesh)| mesh.clone()).collect();
    assert_eq!(meshes.len(), 2);
    assert!(meshes.iter().all(|mesh| mesh.cast_shadow && mesh.receive_shadow));

    let top = scene.graph.find("model").unwrap();
    let position = scene.graph.node(top).unwrap().world().position();
    assert_eq!(position, cgmath::Vector3::new(1.0, -5.0, 0.0));
}

#[test]
fn failed_model_leaves_the_scene_alone() {
    let rt = runtime();
    let (mut coordinator, _) = coordinator(MemoryAssetSource::new(), &rt);
    let mut scene = scene();
    let before = scene.graph.len();

    coordinator.load_model("model/missing.gltf", Placement::default());
    let outcomes = rt.block_on(coordinator.wait_for_pending(&mut scene));

    assert_eq!(scene.graph.len(), before);
    assert_eq!(outcomes[0].kind, AssetKind::Model);
    assert!(matches!(
        &outcomes[0].status,
        LoadStatus::Failed(LoadError::Source { path, .. }) if path == "model/missing.gltf"
    ));
    assert_eq!(coordinator.pending_count(), 0);
}

#[test]
fn one_failure_does_not_block_the_others() {
    let rt = runtime();
    let source = MemoryAssetSource::new()
        .with_model("model/scene.gltf", two_box_model())
        .with_image("img/grass.jpg", [0, 255, 0, 255]);
    let (mut coordinator, _) = coordinator(source, &rt);
    let mut scene = scene();
    let ground = scene.graph.add(
        scene.graph.root(),
        "ground",
        NodeKind::Mesh(Mesh::new(
            Geometry::unit_cube().tessellate(),
            Material::lambert(),
        )),
        Default::default(),
    );

    coordinator.load_model("model/nope.gltf", Placement::default());
    coordinator.load_texture("img/grass.jpg", ground);
    coordinator.load_model("model/scene.gltf", Placement::default());
    let outcomes = rt.block_on(coordinator.wait_for_pending(&mut scene));

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes.iter().filter(|o| o.is_applied()).count(), 2);
    let material = &scene.graph.node(ground).unwrap().mesh().unwrap().material;
    assert_eq!(material.map.as_ref().unwrap().rgba, vec![0, 255, 0, 255]);
}

#[test]
fn texture_for_a_node_without_material_fails() {
    let rt = runtime();
    let source = MemoryAssetSource::new().with_image("img/sun.jpg", [255; 4]);
    let (mut coordinator, _) = coordinator(source, &rt);
    let mut scene = scene();
    let root = scene.graph.root();

    coordinator.load_texture("img/sun.jpg", root);
    let outcomes = rt.block_on(coordinator.wait_for_pending(&mut scene));
    assert!(matches!(
        outcomes[0].status,
        LoadStatus::Failed(LoadError::NoMaterial(node)) if node == root
    ));
}

#[test]
fn cube_becomes_the_background_environment() {
    let rt = runtime();
    let faces = ["px", "nx", "py", "ny", "pz", "nz"].map(|f| format!("sky/{f}.png"));
    let mut source = MemoryAssetSource::new();
    for face in &faces {
        source = source.with_image(face, [10, 10, 40, 255]);
    }
    let (mut coordinator, _) = coordinator(source, &rt);
    let mut scene = scene();
    assert!(scene.background.environment.is_none());

    coordinator.load_cube(faces.clone());
    let outcomes = rt.block_on(coordinator.wait_for_pending(&mut scene));
    assert!(outcomes[0].is_applied());
    let cube = scene.background.environment.as_ref().unwrap();
    assert_eq!(cube.size, 1);
    // the clear color is untouched, the sky is drawn over it
    assert_eq!(scene.background.color, scene.fog.color);
}

#[test]
fn instances_parse_once_and_attach_per_placement() {
    let rt = runtime();
    let source = MemoryAssetSource::new().with_model("model-tree/scene.gltf", two_box_model());
    let (mut coordinator, source) = coordinator(source, &rt);
    let mut scene = scene();
    let before = scene.graph.len();
    let placements = vec![
        Placement::at(10.0, -5.0, 8.0).with_scale(0.01),
        Placement::at(13.0, -5.0, 7.0).with_scale(0.007),
        Placement::at(-9.0, -5.0, 4.0).with_scale(0.012),
    ];

    coordinator.load_instances("model-tree/scene.gltf", placements.clone());
    let outcomes = rt.block_on(coordinator.wait_for_pending(&mut scene));

    assert_eq!(source.model_loads(), 1);
    assert!(matches!(outcomes[0].status, LoadStatus::Applied { nodes_added: 12 }));
    assert_eq!(scene.graph.len(), before + 3 * two_box_model().len());
    let tops: Vec<_> = scene
        .graph
        .nodes()
        .filter(|(_, node)| node.name == "model")
        .map(|(_, node)| node.world().position())
        .collect();
    assert_eq!(tops.len(), 3);
    for (top, placement) in tops.iter().zip(&placements) {
        assert_eq!(*top, placement.transform().position);
    }
}

struct PanickingSource;

fn parse_corrupt_model() -> anyhow::Result<Subgraph> {
    panic!("corrupt model")
}

impl AssetSource for PanickingSource {
    fn load_model(&self, _: &str) -> BoxFuture<'static, anyhow::Result<Subgraph>> {
        async { parse_corrupt_model() }.boxed()
    }

    fn load_image(&self, _: &str) -> BoxFuture<'static, anyhow::Result<TextureData>> {
        futures::future::ready(Err(anyhow::anyhow!("no images here"))).boxed()
    }
}

#[test]
fn panicking_loader_is_a_failed_load() {
    let rt = runtime();
    let mut coordinator =
        AssetLoadCoordinator::new(Arc::new(PanickingSource), rt.handle().clone());
    let mut scene = scene();
    let before = scene.graph.len();
    coordinator.load_model("model/scene.gltf", Placement::default());
    let outcomes = rt.block_on(coordinator.wait_for_pending(&mut scene));
    assert!(!outcomes[0].is_applied());
    assert_eq!(scene.graph.len(), before);
}
