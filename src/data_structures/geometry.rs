//! Procedural geometry and the vertex format shared by every mesh.
//!
//! Shapes are described by [`Geometry`] and tessellated once into a
//! [`MeshData`]. Loaded models produce `MeshData` directly.

use std::sync::Arc;

use cgmath::InnerSpace;

use crate::data_structures::next_resource_id;

/// Describes the memory layout of a vertex type for a pipeline.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Triangle list ready for upload. The `id` keys the renderer's buffer cache.
#[derive(Debug)]
pub struct MeshData {
    pub id: u64,
    pub label: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(label: impl Into<String>, vertices: Vec<ModelVertex>, indices: Vec<u32>) -> Self {
        Self {
            id: next_resource_id(),
            label: label.into(),
            vertices,
            indices,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned bounds in mesh space, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = self.vertices.first()?.position;
        Some(self.vertices.iter().fold((first, first), |(min, max), v| {
            (
                [
                    min[0].min(v.position[0]),
                    min[1].min(v.position[1]),
                    min[2].min(v.position[2]),
                ],
                [
                    max[0].max(v.position[0]),
                    max[1].max(v.position[1]),
                    max[2].max(v.position[2]),
                ],
            )
        }))
    }
}

/// Procedural shapes used by the composed scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Geometry {
    /// UV sphere with `width_segments` around and `height_segments` top to bottom.
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    /// Axis-aligned box centred on the origin.
    Cuboid { width: f32, height: f32, depth: f32 },
    /// Single quad in the XY plane facing +Z.
    Plane { width: f32, height: f32 },
}

impl Geometry {
    pub fn unit_cube() -> Self {
        Geometry::Cuboid {
            width: 1.0,
            height: 1.0,
            depth: 1.0,
        }
    }

    pub fn tessellate(&self) -> Arc<MeshData> {
        let (label, (vertices, indices)) = match *self {
            Geometry::Sphere {
                radius,
                width_segments,
                height_segments,
            } => ("sphere", sphere(radius, width_segments, height_segments)),
            Geometry::Cuboid {
                width,
                height,
                depth,
            } => ("box", cuboid(width, height, depth)),
            Geometry::Plane { width, height } => ("plane", plane(width, height)),
        };
        Arc::new(MeshData::new(label, vertices, indices))
    }
}

fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> (Vec<ModelVertex>, Vec<u32>) {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let theta = v * std::f32::consts::PI;
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let phi = u * std::f32::consts::TAU;
            let position = cgmath::Vector3::new(
                -radius * phi.cos() * theta.sin(),
                radius * theta.cos(),
                radius * phi.sin() * theta.sin(),
            );
            let normal = if position.magnitude2() > 0.0 {
                position.normalize()
            } else {
                cgmath::Vector3::unit_y()
            };
            vertices.push(ModelVertex {
                position: position.into(),
                normal: normal.into(),
                tex_coords: [u, v],
            });
        }
    }

    let row = width_segments + 1;
    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;
            // the poles collapse one triangle of each quad
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    (vertices, indices)
}

fn cuboid(width: f32, height: f32, depth: f32) -> (Vec<ModelVertex>, Vec<u32>) {
    use cgmath::Vector3;
    let half = Vector3::new(width / 2.0, height / 2.0, depth / 2.0);
    let extent = |axis: Vector3<f32>| axis.x.abs() * half.x + axis.y.abs() * half.y + axis.z.abs() * half.z;
    // (normal, right, up) with right x up == normal
    let faces = [
        (Vector3::unit_x(), -Vector3::unit_z(), Vector3::unit_y()),
        (-Vector3::unit_x(), Vector3::unit_z(), Vector3::unit_y()),
        (Vector3::unit_y(), Vector3::unit_x(), -Vector3::unit_z()),
        (-Vector3::unit_y(), Vector3::unit_x(), Vector3::unit_z()),
        (Vector3::unit_z(), Vector3::unit_x(), Vector3::unit_y()),
        (-Vector3::unit_z(), -Vector3::unit_x(), Vector3::unit_y()),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, right, up) in faces {
        let base = vertices.len() as u32;
        let center = normal * extent(normal);
        let right = right * extent(right);
        let up = up * extent(up);
        // bottom-left, bottom-right, top-right, top-left
        let corners = [
            (center - right - up, [0.0, 1.0]),
            (center + right - up, [1.0, 1.0]),
            (center + right + up, [1.0, 0.0]),
            (center - right + up, [0.0, 0.0]),
        ];
        for (position, tex_coords) in corners {
            vertices.push(ModelVertex {
                position: position.into(),
                normal: normal.into(),
                tex_coords,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

fn plane(width: f32, height: f32) -> (Vec<ModelVertex>, Vec<u32>) {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let normal = [0.0, 0.0, 1.0];
    let vertices = vec![
        ModelVertex {
            position: [-hw, -hh, 0.0],
            normal,
            tex_coords: [0.0, 1.0],
        },
        ModelVertex {
            position: [hw, -hh, 0.0],
            normal,
            tex_coords: [1.0, 1.0],
        },
        ModelVertex {
            position: [hw, hh, 0.0],
            normal,
            tex_coords: [1.0, 0.0],
        },
        ModelVertex {
            position: [-hw, hh, 0.0],
            normal,
            tex_coords: [0.0, 0.0],
        },
    ];
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let mesh = Geometry::Sphere {
            radius: 1.5,
            width_segments: 32,
            height_segments: 16,
        }
        .tessellate();
        assert_eq!(mesh.vertices.len(), 33 * 17);
        // two pole rows contribute one triangle per quad
        assert_eq!(mesh.triangle_count(), 32 * 16 * 2 - 2 * 32);
        for v in &mesh.vertices {
            let p = cgmath::Vector3::from(v.position);
            assert!((p.magnitude() - 1.5).abs() < 1e-4);
        }
    }

    #[test]
    fn cuboid_bounds_match_dimensions() {
        let mesh = Geometry::Cuboid {
            width: 40.0,
            height: 40.0,
            depth: 1.0,
        }
        .tessellate();
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, [-20.0, -20.0, -0.5]);
        assert_eq!(max, [20.0, 20.0, 0.5]);
        assert_eq!(mesh.triangle_count(), 12);
    }

    #[test]
    fn cuboid_faces_wind_counter_clockwise_from_outside() {
        let mesh = Geometry::unit_cube().tessellate();
        for tri in mesh.indices.chunks(3) {
            let p = |i: u32| cgmath::Vector3::from(mesh.vertices[i as usize].position);
            let n = cgmath::Vector3::from(mesh.vertices[tri[0] as usize].normal);
            let face_normal = (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]));
            assert!(face_normal.dot(n) > 0.0);
        }
    }

    #[test]
    fn ids_are_unique_per_tessellation() {
        let a = Geometry::unit_cube().tessellate();
        let b = Geometry::unit_cube().tessellate();
        assert_ne!(a.id, b.id);
    }
}
