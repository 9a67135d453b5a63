//! Cameras: the viewport camera's pose and projection, GPU camera uniforms and
//! pointer rays.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3};
use winit::dpi::LogicalPosition;

/// cgmath builds OpenGL clip space (z in -1..1); wgpu expects z in 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Pose of a camera looking at a target point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>>(position: P, target: P) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn forward(&self) -> Vector3<f32> {
        let dir = self.target - self.position;
        if dir.magnitude2() > 0.0 {
            dir.normalize()
        } else {
            -Vector3::unit_z()
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }
}

/// Perspective projection with a vertical field of view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// The camera the main view is rendered from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportCamera {
    pub camera: Camera,
    pub projection: Projection,
}

impl ViewportCamera {
    pub fn view_proj(&self) -> Matrix4<f32> {
        self.projection.calc_matrix() * self.camera.calc_matrix()
    }

    /// Ray from the eye through a pixel of a `width`x`height` viewport.
    pub fn cast_ray_from_mouse(
        &self,
        mouse: LogicalPosition<f64>,
        width: f32,
        height: f32,
    ) -> Ray {
        let ndc_x = (2.0 * mouse.x as f32 / width.max(1.0)) - 1.0;
        let ndc_y = 1.0 - (2.0 * mouse.y as f32 / height.max(1.0));
        let inverse = self.view_proj().invert().unwrap_or_else(Matrix4::identity);
        let unproject = |z: f32| {
            let p = inverse * cgmath::Vector4::new(ndc_x, ndc_y, z, 1.0);
            Point3::from_vec(p.truncate() / p.w)
        };
        // wgpu clip space depth runs 0..1
        let near = unproject(0.0);
        let far = unproject(1.0);
        Ray {
            origin: near,
            direction: (far - near).normalize(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }

    /// Distance along the ray to a plane, if it is hit in front of the origin.
    pub fn intersect_plane(&self, point: Point3<f32>, normal: Vector3<f32>) -> Option<f32> {
        let denom = normal.dot(self.direction);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = normal.dot(point - self.origin) / denom;
        (t >= 0.0).then_some(t)
    }

    /// Slab test against an axis-aligned box; returns the entry distance.
    pub fn intersect_aabb(&self, min: Point3<f32>, max: Point3<f32>) -> Option<f32> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let origin = self.origin[axis];
            let dir = self.direction[axis];
            if dir.abs() < 1e-8 {
                if origin < min[axis] || origin > max[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (min[axis] - origin) / dir;
            let t2 = (max[axis] - origin) / dir;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }
        if t_max < t_min.max(0.0) {
            return None;
        }
        Some(t_min.max(0.0))
    }

    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Ray {
        use cgmath::Transform;
        Ray {
            origin: matrix.transform_point(self.origin),
            direction: matrix.transform_vector(self.direction),
        }
    }
}

/// Camera data as laid out in the shaders' uniform buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    /// Fragments with `dot(clip_plane.xyz, p) + clip_plane.w < 0` are discarded.
    /// All zeros disables clipping.
    pub clip_plane: [f32; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
            inv_view_proj: Matrix4::identity().into(),
            clip_plane: [0.0; 4],
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.set(camera.position, projection.calc_matrix() * camera.calc_matrix());
    }

    pub fn set(&mut self, position: Point3<f32>, view_proj: Matrix4<f32>) {
        self.view_position = position.to_homogeneous().into();
        self.view_proj = view_proj.into();
        self.inv_view_proj = view_proj.invert().unwrap_or_else(Matrix4::identity).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Deg;

    use super::*;

    fn viewport() -> ViewportCamera {
        ViewportCamera {
            camera: Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0)),
            projection: Projection::new(800, 600, Deg(75.0), 1.0, 100.0),
        }
    }

    #[test]
    fn center_ray_points_at_target() {
        let ray = viewport().cast_ray_from_mouse((400.0, 300.0).into(), 800.0, 600.0);
        assert!((ray.direction - Vector3::new(0.0, 0.0, -1.0)).magnitude() < 1e-4);
        assert!((ray.origin.z - 9.0).abs() < 1e-3);
    }

    #[test]
    fn ray_hits_box_in_front() {
        let ray = viewport().cast_ray_from_mouse((400.0, 300.0).into(), 800.0, 600.0);
        let t = ray
            .intersect_aabb(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5))
            .unwrap();
        assert!((ray.at(t).z - 0.5).abs() < 1e-3);
        assert!(
            ray.intersect_aabb(Point3::new(5.0, 5.0, -0.5), Point3::new(6.0, 6.0, 0.5))
                .is_none()
        );
    }

    #[test]
    fn resize_updates_aspect() {
        let mut projection = Projection::new(800, 600, Deg(75.0), 1.0, 100.0);
        projection.resize(1920, 1080);
        assert!((projection.aspect - 1920.0 / 1080.0).abs() < 1e-6);
    }
}
