//! Per-frame cube reflection capture.
//!
//! The probe node's world position is the eye of six 90° cameras, one per cube
//! face. Meshes whose material samples the capture target are left out of the
//! capture so a mirror never renders itself.

use cgmath::{Deg, EuclideanSpace, InnerSpace, Matrix4, Point3, Transform as _, Vector3};
use log::warn;

use crate::{
    camera::{OPENGL_TO_WGPU_MATRIX, ViewportCamera},
    data_structures::{
        material::Shading,
        scene_graph::{NodeId, NodeKind, Scene},
    },
    render::{FrameError, RenderEngine},
};

/// Look direction and up vector of each face, in +X, -X, +Y, -Y, +Z, -Z order.
///
/// Together with the mirrored x axis in [`CubeCapture::face_view_proj`] this
/// matches the cube sampling convention, so a face can be sampled with a plain
/// world-space direction.
pub const CUBE_FACES: [([f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ([0.0, 1.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, -1.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
];

/// Everything an engine needs to render one cube capture.
#[derive(Clone, Debug, PartialEq)]
pub struct CubeCapture {
    pub probe: NodeId,
    pub position: Point3<f32>,
    pub resolution: u32,
    pub near: f32,
    pub far: f32,
    /// Nodes that must not appear in the capture.
    pub excluded: Vec<NodeId>,
}

impl CubeCapture {
    pub fn face_view_proj(&self, face: usize) -> Matrix4<f32> {
        let (dir, up) = CUBE_FACES[face % 6];
        let view = Matrix4::look_to_rh(self.position, Vector3::from(dir), Vector3::from(up));
        let proj = cgmath::perspective(Deg(90.0), 1.0, self.near, self.far);
        Matrix4::from_nonuniform_scale(-1.0, 1.0, 1.0) * OPENGL_TO_WGPU_MATRIX * proj * view
    }

    pub fn is_excluded(&self, id: NodeId) -> bool {
        self.excluded.contains(&id)
    }
}

/// Re-renders the probe's cube target once per frame.
#[derive(Debug)]
pub struct ReflectionCaptureScheduler {
    probe: NodeId,
    frames: u64,
}

impl ReflectionCaptureScheduler {
    pub fn new(probe: NodeId) -> Self {
        Self { probe, frames: 0 }
    }

    pub fn probe(&self) -> NodeId {
        self.probe
    }

    /// Number of captures issued so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Describes this frame's capture from the current world transforms.
    pub fn prepare(&self, scene: &Scene) -> Option<CubeCapture> {
        let node = scene.graph.node(self.probe)?;
        let NodeKind::Probe(probe) = &node.kind else {
            return None;
        };
        let p = node.world().position();
        let excluded = scene
            .graph
            .nodes()
            .filter(|(_, n)| {
                n.mesh()
                    .is_some_and(|mesh| mesh.material.reads_capture_target())
            })
            .map(|(id, _)| id)
            .collect();
        Some(CubeCapture {
            probe: self.probe,
            position: Point3::new(p.x, p.y, p.z),
            resolution: probe.resolution,
            near: probe.near,
            far: probe.far,
            excluded,
        })
    }

    /// Renders the capture. Must run after navigation and before the main render.
    pub fn capture(
        &mut self,
        scene: &Scene,
        camera: &ViewportCamera,
        engine: &mut dyn RenderEngine,
    ) -> Result<(), FrameError> {
        let Some(capture) = self.prepare(scene) else {
            warn!("capture probe {:?} is missing, skipping reflections", self.probe);
            return Ok(());
        };
        engine.capture_cube(scene, &capture, camera)?;
        self.frames += 1;
        Ok(())
    }
}

/// A flat mirror: the scene reflected across the plane through `point` with
/// unit `normal`, rendered into a `texture_size` target.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanarMirror {
    pub node: NodeId,
    pub point: Point3<f32>,
    pub normal: Vector3<f32>,
    pub clip_bias: f32,
    pub texture_size: [u32; 2],
}

impl PlanarMirror {
    /// Every visible reflector mesh, facing along its local +Z.
    pub fn collect(scene: &Scene) -> Vec<PlanarMirror> {
        scene
            .graph
            .visible_meshes()
            .filter_map(|(id, node, mesh)| match mesh.material.shading {
                Shading::Reflector {
                    clip_bias,
                    texture_size,
                } => {
                    let p = node.world().position();
                    Some(PlanarMirror {
                        node: id,
                        point: Point3::new(p.x, p.y, p.z),
                        normal: node.world().forward(),
                        clip_bias,
                        texture_size,
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Householder reflection across the mirror plane.
    pub fn reflection(&self) -> Matrix4<f32> {
        let n = self.normal;
        let d = -n.dot(self.point.to_vec());
        #[rustfmt::skip]
        let m = Matrix4::new(
            1.0 - 2.0 * n.x * n.x, -2.0 * n.x * n.y, -2.0 * n.x * n.z, 0.0,
            -2.0 * n.y * n.x, 1.0 - 2.0 * n.y * n.y, -2.0 * n.y * n.z, 0.0,
            -2.0 * n.z * n.x, -2.0 * n.z * n.y, 1.0 - 2.0 * n.z * n.z, 0.0,
            -2.0 * d * n.x, -2.0 * d * n.y, -2.0 * d * n.z, 1.0,
        );
        m
    }

    /// The main camera mirrored behind the plane.
    pub fn virtual_eye(&self, camera: &ViewportCamera) -> (Point3<f32>, Matrix4<f32>) {
        let reflection = self.reflection();
        let eye = reflection.transform_point(camera.camera.position);
        (eye, camera.view_proj() * reflection)
    }

    /// Plane equation for the mirror pass, pushed `clip_bias` towards the
    /// front so geometry touching the mirror is kept out of its reflection.
    pub fn clip_plane(&self) -> [f32; 4] {
        let n = self.normal;
        let d = -n.dot(self.point.to_vec()) - self.clip_bias;
        [n.x, n.y, n.z, d]
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{SquareMatrix, Transform as _, Vector4};

    use crate::data_structures::{
        color::Rgb,
        fog::Fog,
        geometry::Geometry,
        material::{EnvMap, Material},
        scene_graph::{CaptureProbe, Mesh},
        transform::Transform,
    };

    use super::*;

    fn scene() -> (Scene, NodeId, NodeId) {
        let mut scene = Scene::new(Fog::new(Rgb::WHITE, 20.0, 70.0));
        let root = scene.graph.root();
        let probe = scene.graph.add(
            root,
            "probe",
            NodeKind::Probe(CaptureProbe {
                near: 1.0,
                far: 500.0,
                resolution: 128,
            }),
            Transform::at(-3.0, 3.0, 0.0),
        );
        let sphere = scene.graph.add(
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
            Transform::at(-3.0, 3.0, 0.0),
        );
        (scene, probe, sphere)
    }

    #[test]
    fn capture_excludes_its_consumers() {
        let (scene, probe, sphere) = scene();
        let capture = ReflectionCaptureScheduler::new(probe).prepare(&scene).unwrap();
        assert_eq!(capture.excluded, vec![sphere]);
        assert_eq!(capture.position, Point3::new(-3.0, 3.0, 0.0));
        assert_eq!(capture.resolution, 128);
    }

    #[test]
    fn non_probe_node_gives_no_capture() {
        let (scene, _, sphere) = scene();
        assert!(ReflectionCaptureScheduler::new(sphere).prepare(&scene).is_none());
    }

    #[test]
    fn each_face_looks_down_its_axis() {
        let (scene, probe, _) = scene();
        let capture = ReflectionCaptureScheduler::new(probe).prepare(&scene).unwrap();
        for (face, (dir, _)) in CUBE_FACES.iter().enumerate() {
            let target = capture.position + Vector3::from(*dir) * 10.0;
            let clip = capture.face_view_proj(face) * Vector4::new(target.x, target.y, target.z, 1.0);
            assert!(clip.w > 0.0, "face {face} looks the wrong way");
            assert!((clip.x / clip.w).abs() < 1e-4 && (clip.y / clip.w).abs() < 1e-4);
        }
    }

    #[test]
    fn positive_x_face_maps_plus_z_to_the_left() {
        let (scene, probe, _) = scene();
        let capture = ReflectionCaptureScheduler::new(probe).prepare(&scene).unwrap();
        let m = capture.face_view_proj(0);
        let p = m.transform_point(capture.position + Vector3::new(10.0, 0.0, 5.0));
        assert!(p.x < 0.0);
        let q = m.transform_point(capture.position + Vector3::new(10.0, 5.0, 0.0));
        assert!(q.y > 0.0);
        assert!(m.invert().is_some());
    }

    #[test]
    fn mirror_reflects_across_its_plane() {
        let mut scene = Scene::new(Fog::new(Rgb::WHITE, 20.0, 70.0));
        let root = scene.graph.root();
        let id = scene.graph.add(
            root,
            "mirror",
            NodeKind::Mesh(Mesh::new(
                Geometry::Plane {
                    width: 40.0,
                    height: 20.0,
                }
                .tessellate(),
                Material::reflector(Rgb::from_hex(0x889999), 0.003, [800, 600]),
            )),
            Transform::at(0.0, 5.5, -20.0),
        );
        let mirrors = PlanarMirror::collect(&scene);
        assert_eq!(mirrors.len(), 1);
        let mirror = &mirrors[0];
        assert_eq!(mirror.node, id);
        assert!((mirror.normal - Vector3::unit_z()).magnitude() < 1e-6);

        let p = mirror.reflection().transform_point(Point3::new(1.0, 2.0, -15.0));
        assert!((p - Point3::new(1.0, 2.0, -25.0)).magnitude() < 1e-4);

        let [a, b, c, d] = mirror.clip_plane();
        let in_front = a * 0.0 + b * 0.0 + c * -19.0 + d;
        let behind = c * -21.0 + d;
        assert!(in_front > 0.0 && behind < 0.0);
        assert!((c * -20.0 + d + 0.003).abs() < 1e-5);
    }
}
