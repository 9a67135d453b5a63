//! Asynchronous asset loading into a live scene.
//!
//! Loads run on a tokio runtime and report back through a channel. Nothing is
//! written to the scene from the runtime: the render thread calls
//! [`AssetLoadCoordinator::apply_ready`] between frames and every completion
//! that arrived since the last call is applied there, in arrival order.

use std::{collections::HashMap, fmt, panic::AssertUnwindSafe, sync::Arc};

use futures::{
    FutureExt, StreamExt,
    channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded},
    future::BoxFuture,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    data_structures::{
        scene_graph::{NodeId, Scene, SceneNode, Subgraph},
        texture::{CubeTextureData, TextureData},
        transform::Transform,
    },
    resources::AssetSource,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Model,
    Texture,
    Cube,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetKind::Model => "model",
            AssetKind::Texture => "texture",
            AssetKind::Cube => "cube texture",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{kind} '{path}' could not be loaded: {reason}")]
    Source {
        kind: AssetKind,
        path: String,
        reason: String,
    },
    #[error("node {0:?} has no material to bind a texture to")]
    NoMaterial(NodeId),
}

/// Where a loaded model instance goes, relative to the scene root.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placement {
    pub position: [f32; 3],
    pub scale: f32,
}

impl Placement {
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn transform(&self) -> Transform {
        let [x, y, z] = self.position;
        Transform::at(x, y, z).with_uniform_scale(self.scale)
    }

    /// Scales `local` uniformly about the origin, then offsets it.
    pub fn place(&self, local: Transform) -> Transform {
        let [x, y, z] = self.position;
        Transform {
            position: cgmath::Vector3::new(x, y, z) + local.position * self.scale,
            rotation: local.rotation,
            scale: local.scale * self.scale,
        }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::at(0.0, 0.0, 0.0)
    }
}

/// Identifies one in-flight load. Resolves exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadHandle(u64);

#[derive(Debug)]
pub enum LoadStatus {
    Applied { nodes_added: usize },
    Failed(LoadError),
}

/// What happened to a load once it was applied.
#[derive(Debug)]
pub struct LoadOutcome {
    pub handle: LoadHandle,
    pub kind: AssetKind,
    pub path: String,
    pub status: LoadStatus,
}

impl LoadOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self.status, LoadStatus::Applied { .. })
    }
}

enum Payload {
    Model {
        subgraph: Subgraph,
        placements: Vec<Placement>,
    },
    Texture {
        data: TextureData,
        target: NodeId,
    },
    Cube(CubeTextureData),
}

struct Completion {
    handle: LoadHandle,
    outcome: anyhow::Result<Payload>,
}

struct PendingLoad {
    kind: AssetKind,
    path: String,
}

pub struct AssetLoadCoordinator {
    source: Arc<dyn AssetSource>,
    runtime: tokio::runtime::Handle,
    sender: UnboundedSender<Completion>,
    receiver: UnboundedReceiver<Completion>,
    pending: HashMap<LoadHandle, PendingLoad>,
    next_handle: u64,
}

impl AssetLoadCoordinator {
    pub fn new(source: Arc<dyn AssetSource>, runtime: tokio::runtime::Handle) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            source,
            runtime,
            sender,
            receiver,
            pending: HashMap::new(),
            next_handle: 0,
        }
    }

    /// Loads a model once and attaches it at `placement`.
    pub fn load_model(&mut self, path: &str, placement: Placement) -> LoadHandle {
        self.load_instances(path, vec![placement])
    }

    /// Parses a model once and attaches one copy per placement.
    pub fn load_instances(&mut self, path: &str, placements: Vec<Placement>) -> LoadHandle {
        let future = self.source.load_model(path);
        self.spawn(AssetKind::Model, path, future, move |subgraph| {
            Payload::Model {
                subgraph,
                placements,
            }
        })
    }

    /// Loads an image and binds it as the color map of the mesh at `target`.
    pub fn load_texture(&mut self, path: &str, target: NodeId) -> LoadHandle {
        let future = self.source.load_image(path);
        self.spawn(AssetKind::Texture, path, future, move |data| {
            Payload::Texture { data, target }
        })
    }

    /// Loads six faces (+X, -X, +Y, -Y, +Z, -Z) and binds them as the scene
    /// background environment.
    pub fn load_cube(&mut self, paths: [String; 6]) -> LoadHandle {
        let label = paths.join(", ");
        let future = self.source.load_cube(paths);
        self.spawn(AssetKind::Cube, &label, future, Payload::Cube)
    }

    fn spawn<T, F>(
        &mut self,
        kind: AssetKind,
        path: &str,
        future: BoxFuture<'static, anyhow::Result<T>>,
        finish: F,
    ) -> LoadHandle
    where
        T: Send + 'static,
        F: FnOnce(T) -> Payload + Send + 'static,
    {
        let handle = LoadHandle(self.next_handle);
        self.next_handle += 1;
        info!("loading {} '{}'", kind, path);
        self.pending.insert(
            handle,
            PendingLoad {
                kind,
                path: path.to_string(),
            },
        );

        let sender = self.sender.clone();
        self.runtime.spawn(async move {
            let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result.map(finish),
                Err(_) => Err(anyhow::anyhow!("loader panicked")),
            };
            // the receiver lives as long as the coordinator
            let _ = sender.unbounded_send(Completion { handle, outcome });
        });
        handle
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, handle: LoadHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    /// Applies every completion that has arrived so far. Never waits.
    pub fn apply_ready(&mut self, scene: &mut Scene) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        while let Some(Some(completion)) = self.receiver.next().now_or_never() {
            outcomes.extend(self.apply(completion, scene));
        }
        outcomes
    }

    /// Waits until every issued load has resolved, applying each as it lands.
    pub async fn wait_for_pending(&mut self, scene: &mut Scene) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        while !self.pending.is_empty() {
            match self.receiver.next().await {
                Some(completion) => outcomes.extend(self.apply(completion, scene)),
                None => break,
            }
        }
        outcomes
    }

    fn apply(&mut self, completion: Completion, scene: &mut Scene) -> Option<LoadOutcome> {
        let PendingLoad { kind, path } = self.pending.remove(&completion.handle)?;
        let result = match completion.outcome {
            Ok(payload) => apply_payload(payload, scene),
            Err(err) => Err(LoadError::Source {
                kind,
                path: path.clone(),
                reason: format!("{err:#}"),
            }),
        };
        let status = match result {
            Ok(nodes_added) => {
                info!("loaded {} '{}' ({} nodes added)", kind, path, nodes_added);
                LoadStatus::Applied { nodes_added }
            }
            Err(err) => {
                error!("{}", err);
                LoadStatus::Failed(err)
            }
        };
        Some(LoadOutcome {
            handle: completion.handle,
            kind,
            path,
            status,
        })
    }
}

fn apply_payload(payload: Payload, scene: &mut Scene) -> Result<usize, LoadError> {
    match payload {
        Payload::Model {
            subgraph,
            placements,
        } => {
            let root = scene.graph.root();
            let mut added = 0;
            for placement in &placements {
                let mut instance = subgraph.clone();
                instance.local = placement.place(instance.local);
                instance.for_each_mesh_mut(&mut |mesh| {
                    mesh.cast_shadow = true;
                    mesh.receive_shadow = true;
                });
                added += instance.len();
                scene.graph.attach(root, instance);
            }
            Ok(added)
        }
        Payload::Texture { data, target } => {
            let mesh = scene
                .graph
                .node_mut(target)
                .and_then(SceneNode::mesh_mut)
                .ok_or(LoadError::NoMaterial(target))?;
            mesh.material.map = Some(Arc::new(data));
            Ok(0)
        }
        Payload::Cube(data) => {
            scene.background.environment = Some(Arc::new(data));
            Ok(0)
        }
    }
}
