//! glTF parsing into detached [`Subgraph`]s.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context as _, bail};
use log::{debug, warn};

use crate::{
    data_structures::{
        color::Rgb,
        geometry::{MeshData, ModelVertex},
        material::Material,
        scene_graph::{Mesh, NodeKind, Subgraph},
        texture::TextureData,
        transform::Transform,
    },
    resources::texture::{decode_image, load_binary},
};

/// Reads a `.gltf` or `.glb` file and everything it references.
///
/// The returned tree has an identity top node named after the file; its
/// children are the nodes of the default scene.
pub async fn load_model_gltf(path: &Path) -> anyhow::Result<Subgraph> {
    let bytes = load_binary(path).await?;
    let gltf = gltf::Gltf::from_slice(&bytes)
        .with_context(|| format!("parsing {}", path.display()))?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => match gltf.blob.as_deref() {
                Some(blob) => buffers.push(blob.to_vec()),
                None => bail!("{} references a missing binary chunk", path.display()),
            },
            gltf::buffer::Source::Uri(uri) => {
                buffers.push(load_binary(&resolve_uri(&base, uri)?).await?);
            }
        }
    }

    let mut images = Vec::new();
    for image in gltf.images() {
        let label = format!("{}#image{}", path.display(), image.index());
        let (bytes, hint) = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let buffer = &buffers[view.buffer().index()];
                let end = view.offset() + view.length();
                if end > buffer.len() {
                    bail!("image view of {label} is out of bounds");
                }
                (buffer[view.offset()..end].to_vec(), mime_extension(Some(mime_type)))
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                let full = resolve_uri(&base, uri)?;
                let hint = mime_extension(mime_type).or_else(|| {
                    full.extension()
                        .and_then(|ext| ext.to_str())
                        .map(str::to_ascii_lowercase)
                });
                (load_binary(&full).await?, hint)
            }
        };
        images.push((label, bytes, hint));
    }

    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("model")
        .to_string();
    let document = gltf.document;
    tokio::task::spawn_blocking(move || {
        let images = images
            .into_iter()
            .map(|(label, bytes, hint)| {
                decode_image(&bytes, &label, hint.as_deref()).map(Arc::new)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        to_subgraph(&name, &document, &buffers, &images)
    })
    .await
    .context("glTF conversion task panicked")?
}

fn resolve_uri(base: &Path, uri: &str) -> anyhow::Result<PathBuf> {
    if uri.starts_with("data:") {
        bail!("embedded data URIs are not supported");
    }
    Ok(base.join(uri))
}

fn mime_extension(mime_type: Option<&str>) -> Option<String> {
    mime_type
        .and_then(|mt| mt.split('/').next_back())
        .map(|ext| if ext == "jpeg" { "jpg" } else { ext }.to_string())
}

/// Builds the node tree of the default (or first) scene.
pub fn to_subgraph(
    name: &str,
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    images: &[Arc<TextureData>],
) -> anyhow::Result<Subgraph> {
    let materials: Vec<Material> = document
        .materials()
        .map(|material| to_material(&material, images))
        .collect();
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .with_context(|| format!("{name} contains no scene"))?;

    let mut root = Subgraph::group(name);
    let mut meshes = HashMap::new();
    for node in scene.nodes() {
        root.children
            .push(to_scene_node(node, buffers, &materials, &mut meshes));
    }
    debug!("converted glTF '{}' into {} nodes", name, root.len());
    Ok(root)
}

fn to_material(material: &gltf::Material, images: &[Arc<TextureData>]) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, a] = pbr.base_color_factor();
    let map = pbr
        .base_color_texture()
        .and_then(|info| images.get(info.texture().source().index()).cloned());
    Material {
        color: Rgb::new(r, g, b),
        opacity: a,
        transparent: material.alpha_mode() == gltf::material::AlphaMode::Blend,
        map,
        ..Material::lambert()
    }
}

fn to_scene_node(
    node: gltf::scene::Node,
    buffers: &[Vec<u8>],
    materials: &[Material],
    meshes: &mut HashMap<(usize, usize), Arc<MeshData>>,
) -> Subgraph {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node{}", node.index()));

    let (t, r, s) = node.transform().decomposed();
    let local = Transform {
        position: t.into(),
        // glTF stores quaternions as [x, y, z, w]
        rotation: cgmath::Quaternion::new(r[3], r[0], r[1], r[2]),
        scale: s.into(),
    };

    let mut primitives = Vec::new();
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                warn!(
                    "skipping primitive {} of mesh {:?}: only triangle lists are drawn",
                    primitive.index(),
                    mesh.name()
                );
                continue;
            }
            let key = (mesh.index(), primitive.index());
            let geometry = match meshes.get(&key) {
                Some(geometry) => geometry.clone(),
                None => {
                    let label = format!("{}.{}", mesh.name().unwrap_or("mesh"), primitive.index());
                    let geometry = Arc::new(read_primitive(&primitive, buffers, label));
                    meshes.insert(key, geometry.clone());
                    geometry
                }
            };
            let material = primitive
                .material()
                .index()
                .and_then(|idx| materials.get(idx).cloned())
                .unwrap_or_else(Material::lambert);
            primitives.push(Mesh::new(geometry, material));
        }
    }

    let mut out = if primitives.len() == 1 {
        let mesh = primitives.remove(0);
        Subgraph::new(name, NodeKind::Mesh(mesh))
    } else {
        let mut group = Subgraph::group(name.clone());
        for (i, mesh) in primitives.into_iter().enumerate() {
            group = group.with_child(Subgraph::new(format!("{name}.{i}"), NodeKind::Mesh(mesh)));
        }
        group
    };
    out.local = local;
    for child in node.children() {
        out.children
            .push(to_scene_node(child, buffers, materials, meshes));
    }
    out
}

fn read_primitive(primitive: &gltf::Primitive, buffers: &[Vec<u8>], label: String) -> MeshData {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let mut vertices: Vec<ModelVertex> = reader
        .read_positions()
        .map(|positions| {
            positions
                .map(|position| ModelVertex {
                    position,
                    normal: [0.0, 1.0, 0.0],
                    tex_coords: [0.0, 0.0],
                })
                .collect()
        })
        .unwrap_or_default();
    if let Some(normals) = reader.read_normals() {
        for (vertex, normal) in vertices.iter_mut().zip(normals) {
            vertex.normal = normal;
        }
    }
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
        for (vertex, tex_coord) in vertices.iter_mut().zip(tex_coords) {
            vertex.tex_coords = tex_coord;
        }
    }
    let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    MeshData::new(label, vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [ { "name": "tri", "mesh": 0, "translation": [1.0, 2.0, 3.0] } ],
        "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 } } ] } ],
        "accessors": [ {
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
            "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
        } ],
        "bufferViews": [ { "buffer": 0, "byteLength": 36 } ],
        "buffers": [ { "byteLength": 36 } ]
    }"#;

    fn triangle_buffer() -> Vec<u8> {
        [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect()
    }

    #[test]
    fn converts_single_primitive_node_to_mesh() {
        let gltf = gltf::Gltf::from_slice(TRIANGLE.as_bytes()).unwrap();
        let tree = to_subgraph("tri", &gltf.document, &[triangle_buffer()], &[]).unwrap();
        assert_eq!(tree.len(), 2);
        let child = &tree.children[0];
        assert_eq!(child.name, "tri");
        assert_eq!(child.local.position, cgmath::Vector3::new(1.0, 2.0, 3.0));
        match &child.kind {
            NodeKind::Mesh(mesh) => {
                assert_eq!(mesh.geometry.vertices.len(), 3);
                // no index accessor means sequential indices
                assert_eq!(mesh.geometry.indices, vec![0, 1, 2]);
                assert!(!mesh.cast_shadow);
            }
            other => panic!("expected a mesh, got {other:?}"),
        }
    }

    #[test]
    fn mime_types_map_to_extensions() {
        assert_eq!(mime_extension(Some("image/jpeg")).as_deref(), Some("jpg"));
        assert_eq!(mime_extension(Some("image/png")).as_deref(), Some("png"));
        assert_eq!(mime_extension(None), None);
    }
}
