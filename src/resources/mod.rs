//! Loading meshes and textures from external files.
//!
//! [`AssetSource`] is the seam between the scene and wherever its assets come
//! from. [`FileAssetSource`] reads them from disk relative to an asset root;
//! [`coordinator::AssetLoadCoordinator`] schedules loads and grafts the results
//! into the scene on the render thread.

use std::path::{Path, PathBuf};

use futures::{FutureExt, future::BoxFuture};

use crate::data_structures::{
    scene_graph::Subgraph,
    texture::{CubeTextureData, TextureData},
};

pub mod coordinator;
pub mod model;
pub mod texture;

/// Something that can produce parsed assets for a path.
///
/// Futures are `'static` so they can be spawned on the runtime.
pub trait AssetSource: Send + Sync {
    fn load_model(&self, path: &str) -> BoxFuture<'static, anyhow::Result<Subgraph>>;

    fn load_image(&self, path: &str) -> BoxFuture<'static, anyhow::Result<TextureData>>;

    /// Faces in +X, -X, +Y, -Y, +Z, -Z order.
    fn load_cube(
        &self,
        paths: [String; 6],
    ) -> BoxFuture<'static, anyhow::Result<CubeTextureData>> {
        let faces = paths.map(|path| self.load_image(&path));
        async move {
            let faces = futures::future::try_join_all(faces).await?;
            let faces: [TextureData; 6] = faces
                .try_into()
                .map_err(|_| anyhow::anyhow!("a cube texture needs exactly six faces"))?;
            CubeTextureData::new(faces)
        }
        .boxed()
    }
}

/// Loads assets from the filesystem.
#[derive(Clone, Debug)]
pub struct FileAssetSource {
    root: PathBuf,
}

impl FileAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves `path` against the asset root. Leading `./` is ignored.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let relative = path.trim_start_matches("./");
        if Path::new(relative).is_absolute() {
            PathBuf::from(relative)
        } else {
            self.root.join(relative)
        }
    }
}

impl Default for FileAssetSource {
    /// The `assets` directory next to the executable, where the build script copies it.
    fn default() -> Self {
        let root = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("assets")))
            .filter(|dir| dir.is_dir())
            .unwrap_or_else(|| PathBuf::from("assets"));
        Self::new(root)
    }
}

impl AssetSource for FileAssetSource {
    fn load_model(&self, path: &str) -> BoxFuture<'static, anyhow::Result<Subgraph>> {
        let path = self.resolve(path);
        async move { model::load_model_gltf(&path).await }.boxed()
    }

    fn load_image(&self, path: &str) -> BoxFuture<'static, anyhow::Result<TextureData>> {
        let path = self.resolve(path);
        async move { texture::load_texture(&path).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_paths_under_the_root() {
        let source = FileAssetSource::new("/srv/assets");
        assert_eq!(
            source.resolve("./model/scene.gltf"),
            PathBuf::from("/srv/assets/model/scene.gltf")
        );
        assert_eq!(source.resolve("/abs/sky.png"), PathBuf::from("/abs/sky.png"));
    }

    #[tokio::test]
    async fn missing_files_fail() {
        let source = FileAssetSource::new("/definitely/not/here");
        assert!(source.load_image("img/grass.jpg").await.is_err());
        assert!(source.load_model("model/scene.gltf").await.is_err());
    }
}
