//! Session configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! reproduces the stock dusk scene. A file only needs the fields it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{data_structures::color::Rgb, resources::coordinator::Placement};

pub const CONFIG_ENV_VAR: &str = "DUSK_SCENE_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub fog: FogConfig,
    pub lighting: LightingConfig,
    pub renderer: RendererConfig,
    pub assets: AssetsConfig,
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// The file named by the first argument, else by [`CONFIG_ENV_VAR`], else defaults.
    pub fn from_args_or_env(mut args: impl Iterator<Item = String>) -> Result<Self, ConfigError> {
        let path = args
            .nth(1)
            .filter(|path| !path.is_empty())
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
            .filter(|path| !path.is_empty());
        match path {
            Some(path) => {
                log::info!("reading session config from {}", path);
                Self::load(Path::new(&path))
            }
            None => Ok(Self::default()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "dusk-scene".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 1.0,
            far: 100.0,
            position: [-15.0, 10.0, 20.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub auto_rotate: bool,
    /// 2.0 is one orbit every 30 seconds.
    pub auto_rotate_speed: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    /// No upper bound on the orbit radius when unset.
    pub max_distance: Option<f32>,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            auto_rotate: true,
            auto_rotate_speed: 2.0,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    pub color: Rgb,
    pub near: f32,
    pub far: f32,
    /// Lower bound of the near/far panel sliders.
    pub slider_min: f32,
    pub slider_max: f32,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            // "lightblue"
            color: Rgb::from_hex(0xadd8e6),
            near: 20.0,
            far: 70.0,
            slider_min: 20.0,
            slider_max: 70.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointLightConfig {
    pub color: Rgb,
    pub intensity: f32,
    pub position: [f32; 3],
}

impl Default for PointLightConfig {
    fn default() -> Self {
        Self {
            color: Rgb::WHITE,
            intensity: 1.0,
            position: [-100.0, 200.0, 100.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientLightConfig {
    pub color: Rgb,
    pub intensity: f32,
}

impl Default for AmbientLightConfig {
    fn default() -> Self {
        Self {
            color: Rgb::BLACK,
            intensity: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalLightConfig {
    pub color: Rgb,
    pub intensity: f32,
    pub position: [f32; 3],
    pub visible: bool,
    pub cast_shadow: bool,
    pub shadow_map_size: u32,
    pub shadow_near: f32,
    pub shadow_far: f32,
    pub shadow_half_extent: f32,
}

impl Default for DirectionalLightConfig {
    fn default() -> Self {
        Self {
            color: Rgb::WHITE,
            intensity: 2.0,
            position: [500.0, 500.0, -500.0],
            visible: true,
            cast_shadow: true,
            shadow_map_size: 1024,
            shadow_near: 250.0,
            shadow_far: 1000.0,
            shadow_half_extent: 50.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub point: PointLightConfig,
    pub ambient: AmbientLightConfig,
    pub directional: DirectionalLightConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub shadows: bool,
    pub vsync: bool,
    pub probe_position: [f32; 3],
    pub capture_resolution: u32,
    pub capture_near: f32,
    pub capture_far: f32,
    pub mirror_color: Rgb,
    pub mirror_clip_bias: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            shadows: true,
            vsync: true,
            probe_position: [-3.0, 3.0, 0.0],
            capture_resolution: 128,
            capture_near: 1.0,
            capture_far: 500.0,
            mirror_color: Rgb::from_hex(0x889999),
            mirror_clip_bias: 0.003,
        }
    }
}

/// A model loaded once and placed several times.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelInstances {
    pub path: String,
    pub placements: Vec<Placement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory the other paths are relative to. Defaults to the bundled `assets/`.
    pub root: Option<PathBuf>,
    pub model: String,
    pub model_placement: Placement,
    pub extra_models: Vec<ModelInstances>,
    pub ground_texture: String,
    pub sun_texture: String,
    /// +X, -X, +Y, -Y, +Z, -Z.
    pub skybox: [String; 6],
}

impl Default for AssetsConfig {
    fn default() -> Self {
        let face = |name: &str| format!("sky-map/dusk_{name}.png");
        Self {
            root: None,
            model: "model/scene.gltf".to_string(),
            model_placement: Placement::at(1.0, -5.0, 0.0),
            extra_models: Vec::new(),
            ground_texture: "img/grasslight-big.jpg".to_string(),
            sun_texture: "img/sunmap.jpg".to_string(),
            skybox: [
                face("rt"),
                face("lf"),
                face("up"),
                face("dn"),
                face("bk"),
                face("ft"),
            ],
        }
    }
}
