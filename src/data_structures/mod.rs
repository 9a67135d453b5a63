//! Scene data: graph, transforms, geometry, materials, lights, fog and textures.
//!
//! - `color` is the RGB type the panel and materials share
//! - `transform` holds local/world transforms and their GPU layout
//! - `geometry` tessellates procedural shapes into vertex/index data
//! - `material` describes how a mesh is shaded and which textures it reads
//! - `light` holds point, ambient and directional lights with shadow frusta
//! - `fog` holds the fog parameters and the background they are tied to
//! - `texture` contains decoded images and their GPU counterparts
//! - `scene_graph` is the node arena every subsystem reads and augments

use std::sync::atomic::{AtomicU64, Ordering};

pub mod color;
pub mod fog;
pub mod geometry;
pub mod light;
pub mod material;
pub mod scene_graph;
pub mod texture;
pub mod transform;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id for meshes and textures, used as GPU cache key.
pub(crate) fn next_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}
