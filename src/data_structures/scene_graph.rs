//! Scene graph and hierarchical scene organization.
//!
//! Nodes live in an arena owned by [`SceneGraph`]. A node is inserted under an
//! existing parent and is never moved or removed afterwards, so every node is
//! reachable from the root and no node has two parents. Because parents are
//! always inserted before their children, world transforms are resolved with a
//! single forward pass over the arena.
//!
//! Loaded models arrive as a detached [`Subgraph`] tree and are grafted in with
//! [`SceneGraph::attach`].

use std::sync::Arc;

use log::warn;

use crate::data_structures::{
    color::Rgb,
    fog::{Background, Fog},
    geometry::MeshData,
    light::Light,
    material::Material,
    transform::{Transform, WorldTransform},
};

/// Index of a node in its [`SceneGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A geometry+material pair.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub geometry: Arc<MeshData>,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Mesh {
    pub fn new(geometry: Arc<MeshData>, material: Material) -> Self {
        Self {
            geometry,
            material,
            cast_shadow: false,
            receive_shadow: false,
        }
    }

    pub fn casting_shadow(mut self) -> Self {
        self.cast_shadow = true;
        self
    }

    pub fn receiving_shadow(mut self) -> Self {
        self.receive_shadow = true;
        self
    }
}

/// Six-face camera that renders the scene around its position into the
/// capture cubemap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureProbe {
    pub near: f32,
    pub far: f32,
    pub resolution: u32,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    Light(Light),
    Probe(CaptureProbe),
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub local: Transform,
    pub visible: bool,
    world: WorldTransform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    pub fn world(&self) -> &WorldTransform {
        &self.world
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }
}

/// A detached tree, e.g. a parsed model, waiting to be attached.
#[derive(Clone, Debug)]
pub struct Subgraph {
    pub name: String,
    pub kind: NodeKind,
    pub local: Transform,
    pub children: Vec<Subgraph>,
}

impl Subgraph {
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            local: Transform::default(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Subgraph) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes including `self`.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(Subgraph::len).sum::<usize>()
    }

    pub fn for_each_mesh_mut(&mut self, f: &mut dyn FnMut(&mut Mesh)) {
        if let NodeKind::Mesh(mesh) = &mut self.kind {
            f(mesh);
        }
        for child in self.children.iter_mut() {
            child.for_each_mesh_mut(f);
        }
    }
}

pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = SceneNode {
            name: "root".to_string(),
            kind: NodeKind::Group,
            local: Transform::default(),
            visible: true,
            world: WorldTransform::identity(),
            parent: None,
            children: Vec::new(),
        };
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    /// Inserts a node under `parent`. An unknown parent falls back to the root.
    pub fn add(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
        local: Transform,
    ) -> NodeId {
        let parent = if parent.0 < self.nodes.len() {
            parent
        } else {
            warn!(
                "parent {:?} does not exist, attaching to the root instead",
                parent
            );
            self.root()
        };
        let id = NodeId(self.nodes.len());
        let world = self.nodes[parent.0].world * local;
        self.nodes.push(SceneNode {
            name: name.into(),
            kind,
            local,
            visible: true,
            world,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Grafts a detached tree under `parent` and returns the id of its top node.
    pub fn attach(&mut self, parent: NodeId, subgraph: Subgraph) -> NodeId {
        let Subgraph {
            name,
            kind,
            local,
            children,
        } = subgraph;
        let id = self.add(parent, name, kind, local);
        for child in children {
            self.attach(id, child);
        }
        id
    }

    /// Recomputes every world transform from the local ones.
    pub fn update_world_transforms(&mut self) {
        self.nodes[0].world = WorldTransform::from(self.nodes[0].local);
        for i in 1..self.nodes.len() {
            let parent = match self.nodes[i].parent {
                Some(parent) => self.nodes[parent.0].world,
                None => WorldTransform::identity(),
            };
            let world = parent * self.nodes[i].local;
            self.nodes[i].world = world;
        }
    }

    /// `id` and everything below it, parents before children.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(next.0) {
                out.push(next);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Every node reachable from the root whose ancestors are all visible.
    pub fn visible_nodes(&self) -> Vec<(NodeId, &SceneNode)> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if !node.visible {
                continue;
            }
            out.push((id, node));
            stack.extend(node.children.iter().rev());
        }
        out
    }

    pub fn visible_meshes(&self) -> impl Iterator<Item = (NodeId, &SceneNode, &Mesh)> {
        self.visible_nodes()
            .into_iter()
            .filter_map(|(id, node)| node.mesh().map(|mesh| (id, node, mesh)))
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the renderer draws: the node graph plus scene-wide fog and background.
pub struct Scene {
    pub graph: SceneGraph,
    pub fog: Fog,
    pub background: Background,
}

impl Scene {
    /// An empty graph whose background starts out equal to the fog color.
    pub fn new(fog: Fog) -> Self {
        Self {
            graph: SceneGraph::new(),
            background: Background::new(fog.color),
            fog,
        }
    }

    pub fn clear_color(&self) -> Rgb {
        self.background.color
    }
}

#[cfg(test)]
mod tests {
    use crate::data_structures::{geometry::Geometry, material::Material};

    use super::*;

    fn mesh() -> NodeKind {
        NodeKind::Mesh(Mesh::new(
            Geometry::unit_cube().tessellate(),
            Material::basic(),
        ))
    }

    #[test]
    fn attach_preserves_shape_and_count() {
        let mut graph = SceneGraph::new();
        let sub = Subgraph::group("model")
            .with_child(Subgraph::new("a", mesh()))
            .with_child(Subgraph::group("b").with_child(Subgraph::new("c", mesh())));
        let before = graph.len();
        let top = graph.attach(graph.root(), sub);
        assert_eq!(graph.len(), before + 4);
        assert_eq!(graph.node(top).unwrap().children().len(), 2);
        assert_eq!(graph.descendants(top).len(), 4);
    }

    #[test]
    fn world_transforms_follow_parents() {
        let mut graph = SceneGraph::new();
        let parent = graph.add(graph.root(), "p", NodeKind::Group, Transform::at(1.0, 0.0, 0.0));
        let child = graph.add(parent, "c", mesh(), Transform::at(0.0, 2.0, 0.0));
        graph.node_mut(parent).unwrap().local.position.z = 5.0;
        graph.update_world_transforms();
        let world = graph.node(child).unwrap().world().position();
        assert_eq!((world.x, world.y, world.z), (1.0, 2.0, 5.0));
    }

    #[test]
    fn hidden_nodes_hide_their_subtree() {
        let mut graph = SceneGraph::new();
        let parent = graph.add(graph.root(), "p", NodeKind::Group, Transform::default());
        graph.add(parent, "c", mesh(), Transform::default());
        assert_eq!(graph.visible_meshes().count(), 1);
        graph.node_mut(parent).unwrap().visible = false;
        assert_eq!(graph.visible_meshes().count(), 0);
    }

    #[test]
    fn unknown_parent_falls_back_to_root() {
        let mut graph = SceneGraph::new();
        let id = graph.add(NodeId(42), "orphan", NodeKind::Group, Transform::default());
        assert_eq!(graph.node(id).unwrap().parent(), Some(graph.root()));
    }
}
