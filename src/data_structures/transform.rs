//! Spatial transforms for scene nodes.
//!
//! Every node keeps a local [`Transform`] relative to its parent. World
//! transforms are composed top-down as matrices, `parent * local`, into a
//! [`WorldTransform`], which is packed into a [`TransformRaw`] for the GPU
//! instance buffer.

use std::ops::Mul;

use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, One, Point3, SquareMatrix, Vector3};

use crate::data_structures::geometry::Vertex;

/// Position, rotation (as quaternion), and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Transform {
    /// Identity transform (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn at(x: f32, y: f32, z: f32) -> Self {
        cgmath::Vector3::new(x, y, z).into()
    }

    pub fn with_rotation(mut self, rotation: cgmath::Quaternion<f32>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = cgmath::Vector3::new(scale, scale, scale);
        self
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl From<cgmath::Vector3<f32>> for Transform {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }
}

/// A node-to-world matrix, composed from every ancestor's [`Transform`].
///
/// Kept as a full matrix so non-uniform parent scale under a rotated child
/// shears correctly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldTransform(Matrix4<f32>);

impl WorldTransform {
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        self.0
    }

    /// The world position of the node's origin.
    pub fn position(&self) -> Vector3<f32> {
        self.0.w.truncate()
    }

    /// Inverse transpose of the upper 3x3, for transforming normals.
    pub fn normal_matrix(&self) -> Matrix3<f32> {
        let linear = Matrix3::from_cols(self.0.x.truncate(), self.0.y.truncate(), self.0.z.truncate());
        linear
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(linear)
    }

    /// The world direction of the local +Z axis, as a surface normal.
    pub fn forward(&self) -> Vector3<f32> {
        (self.normal_matrix() * Vector3::unit_z()).normalize()
    }

    /// Maps a point given in world space into the space this transform describes.
    pub fn inverse_transform_point(&self, point: Point3<f32>) -> Point3<f32> {
        use cgmath::Transform as _;
        match self.0.invert() {
            Some(inverse) => inverse.transform_point(point),
            None => point,
        }
    }

    pub fn to_raw(&self) -> TransformRaw {
        TransformRaw {
            model: self.0.into(),
            normal: self.normal_matrix().into(),
        }
    }
}

impl Default for WorldTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Transform> for WorldTransform {
    fn from(local: Transform) -> Self {
        Self(local.to_matrix())
    }
}

impl Mul<Transform> for WorldTransform {
    type Output = WorldTransform;

    fn mul(self, local: Transform) -> Self::Output {
        WorldTransform(self.0 * local.to_matrix())
    }
}

/**
 * The raw transform is what lands in the per-node instance buffer.
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransformRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
}

/**
 * Stride layout: the model matrix as four vec4s followed by the normal matrix
 * as three vec3s. Locations 5..=11 are reserved for it in every pipeline.
 */
impl Vertex for TransformRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<TransformRaw>() as wgpu::BufferAddress,
            // One transform per drawn instance, not per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Rotation3};

    use super::*;

    fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < 1e-5
    }

    #[test]
    fn composition_applies_parent_scale_and_rotation() {
        let parent = Transform::at(1.0, 0.0, 0.0)
            .with_rotation(cgmath::Quaternion::from_angle_y(Deg(90.0)))
            .with_uniform_scale(2.0);
        let world = WorldTransform::from(parent) * Transform::at(1.0, 0.0, 0.0);
        assert!(close(world.position(), Vector3::new(1.0, 0.0, -2.0)));
    }

    #[test]
    fn non_uniform_parent_scale_shears_a_rotated_child() {
        let mut parent = Transform::new();
        parent.scale = Vector3::new(2.0, 1.0, 1.0);
        let child = Transform::new().with_rotation(cgmath::Quaternion::from_angle_z(Deg(45.0)));
        let world = WorldTransform::from(parent) * child;

        // the child's local +X lands on parent-scaled (cos 45, sin 45)
        let x_axis = world.to_matrix().x.truncate();
        let h = std::f32::consts::FRAC_1_SQRT_2;
        assert!(close(x_axis, Vector3::new(2.0 * h, h, 0.0)));
    }

    #[test]
    fn normals_stay_perpendicular_under_shear() {
        let mut parent = Transform::new();
        parent.scale = Vector3::new(2.0, 1.0, 1.0);
        let child = Transform::new().with_rotation(cgmath::Quaternion::from_angle_z(Deg(45.0)));
        let world = WorldTransform::from(parent) * child;

        let tangent = world.to_matrix() * Vector3::unit_x().extend(0.0);
        let normal = world.normal_matrix() * Vector3::unit_y();
        assert!(tangent.truncate().dot(normal).abs() < 1e-5);
    }

    #[test]
    fn forward_is_the_rotated_z_axis() {
        let t = Transform::new().with_rotation(cgmath::Quaternion::from_angle_y(Deg(90.0)));
        assert!(close(WorldTransform::from(t).forward(), Vector3::unit_x()));
    }

    #[test]
    fn inverse_point_round_trips() {
        let world = WorldTransform::from(Transform::at(3.0, -4.5, 10.0).with_uniform_scale(0.5));
        let local = world.inverse_transform_point(Point3::new(3.5, -4.5, 10.0));
        assert!((local.x - 1.0).abs() < 1e-5);
        assert!(local.y.abs() < 1e-5);
    }
}
