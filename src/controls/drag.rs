use cgmath::{InnerSpace, Point3, SquareMatrix, Transform as _, Vector3};
use log::debug;
use winit::{dpi::LogicalPosition, event::MouseButton};

use crate::{
    camera::{Ray, ViewportCamera},
    controls::PointerEvent,
    data_structures::scene_graph::{NodeId, SceneGraph},
};

/// Drag lifecycle reported to the arbiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragEvent {
    Start(NodeId),
    End(NodeId),
}

/// What a drag controller needs to turn pixels into world positions.
#[derive(Clone, Copy, Debug)]
pub struct DragView<'a> {
    pub camera: &'a ViewportCamera,
    pub width: u32,
    pub height: u32,
}

impl DragView<'_> {
    pub fn ray(&self, position: LogicalPosition<f64>) -> Ray {
        self.camera
            .cast_ray_from_mouse(position, self.width as f32, self.height as f32)
    }
}

/// Moves scene nodes with the pointer.
pub trait DragController {
    /// Moves the dragged node and reports when a drag begins or ends.
    fn handle_pointer(
        &mut self,
        event: &PointerEvent,
        view: &DragView<'_>,
        graph: &mut SceneGraph,
    ) -> Option<DragEvent>;

    fn dragged(&self) -> Option<NodeId>;
}

#[derive(Clone, Copy, Debug)]
struct ActiveDrag {
    node: NodeId,
    plane_point: Point3<f32>,
    plane_normal: Vector3<f32>,
    /// Hit point minus the node's world position at grab time.
    grab_offset: Vector3<f32>,
}

/// Drags a fixed set of meshes across a camera-facing plane.
#[derive(Debug)]
pub struct DragControls {
    objects: Vec<NodeId>,
    active: Option<ActiveDrag>,
}

impl DragControls {
    pub fn new(objects: Vec<NodeId>) -> Self {
        Self {
            objects,
            active: None,
        }
    }

    pub fn objects(&self) -> &[NodeId] {
        &self.objects
    }

    /// The nearest draggable mesh under the ray, with the world-space hit point.
    pub fn pick(&self, ray: &Ray, graph: &SceneGraph) -> Option<(NodeId, Point3<f32>)> {
        let mut best: Option<(f32, NodeId, Point3<f32>)> = None;
        for &id in &self.objects {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let Some((min, max)) = node.mesh().and_then(|mesh| mesh.geometry.bounds()) else {
                continue;
            };
            let world = node.world().to_matrix();
            let Some(inverse) = world.invert() else {
                continue;
            };
            let local_ray = ray.transformed(&inverse);
            let Some(t) = local_ray.intersect_aabb(min.into(), max.into()) else {
                continue;
            };
            let hit = world.transform_point(local_ray.at(t));
            let distance = (hit - ray.origin).dot(ray.direction);
            if best.is_none_or(|(d, _, _)| distance < d) {
                best = Some((distance, id, hit));
            }
        }
        best.map(|(_, id, hit)| (id, hit))
    }

    fn start(
        &mut self,
        position: LogicalPosition<f64>,
        view: &DragView<'_>,
        graph: &SceneGraph,
    ) -> Option<DragEvent> {
        let ray = view.ray(position);
        let (node, hit) = self.pick(&ray, graph)?;
        let origin = graph.node(node)?.world().position();
        self.active = Some(ActiveDrag {
            node,
            plane_point: hit,
            plane_normal: -view.camera.camera.forward(),
            grab_offset: hit - Point3::new(origin.x, origin.y, origin.z),
        });
        debug!("drag started on {:?}", node);
        Some(DragEvent::Start(node))
    }

    fn drag_to(
        &self,
        drag: &ActiveDrag,
        position: LogicalPosition<f64>,
        view: &DragView<'_>,
        graph: &mut SceneGraph,
    ) {
        let ray = view.ray(position);
        let Some(t) = ray.intersect_plane(drag.plane_point, drag.plane_normal) else {
            return;
        };
        let world_target = ray.at(t) - drag.grab_offset;
        let parent_world = graph
            .node(drag.node)
            .and_then(|node| node.parent())
            .and_then(|parent| graph.node(parent))
            .map(|parent| *parent.world());
        let local = match parent_world {
            Some(parent) => parent.inverse_transform_point(world_target),
            None => world_target,
        };
        if let Some(node) = graph.node_mut(drag.node) {
            node.local.position = Vector3::new(local.x, local.y, local.z);
        }
        graph.update_world_transforms();
    }
}

impl DragController for DragControls {
    fn handle_pointer(
        &mut self,
        event: &PointerEvent,
        view: &DragView<'_>,
        graph: &mut SceneGraph,
    ) -> Option<DragEvent> {
        match (*event, self.active) {
            (
                PointerEvent::Pressed {
                    button: MouseButton::Left,
                    position,
                },
                None,
            ) => self.start(position, view, graph),
            (PointerEvent::Moved { position }, Some(drag)) => {
                self.drag_to(&drag, position, view, graph);
                None
            }
            (
                PointerEvent::Released {
                    button: MouseButton::Left,
                    ..
                },
                Some(drag),
            ) => {
                self.active = None;
                debug!("drag ended on {:?}", drag.node);
                Some(DragEvent::End(drag.node))
            }
            _ => None,
        }
    }

    fn dragged(&self) -> Option<NodeId> {
        self.active.map(|drag| drag.node)
    }
}
