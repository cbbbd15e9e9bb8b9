// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use scop_render::{FaceCulling, PolygonMode, PresentPreference, SamplerFilter};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub window: WindowCfg,
    pub render: RenderCfg,
    pub camera: CameraCfg,
    pub assets: AssetsCfg,
    pub scene: SceneCfg,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            title: "scop".to_owned(),
            width: 1600,
            height: 900,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub present_mode: PresentPreference,
    pub sampler_filter: SamplerFilter,
    pub face_culling: FaceCulling,
    pub polygon_mode: PolygonMode,
    /// Unset: on in debug builds, off in release builds.
    pub validation: Option<bool>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        Self {
            clear_color: [0.02, 0.02, 0.03, 1.0],
            present_mode: PresentPreference::default(),
            sampler_filter: SamplerFilter::default(),
            face_culling: FaceCulling::default(),
            polygon_mode: PolygonMode::default(),
            validation: None,
        }
    }
}

impl RenderCfg {
    pub fn validation(&self) -> bool {
        self.validation.unwrap_or(cfg!(debug_assertions))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CameraCfg {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub pitch: f32,
    pub yaw: f32,
    /// Units per second.
    pub speed: f32,
    /// Speed multiplier while Left Ctrl is held.
    pub sprint: f32,
    /// Degrees per second for the arrow keys.
    pub rotate_speed: f32,
}

impl Default for CameraCfg {
    fn default() -> Self {
        Self {
            fov: 80.0,
            near: 0.1,
            far: 1000.0,
            position: [0.41, 0.77, 1.67],
            pitch: -20.88,
            yaw: -95.34,
            speed: 3.0,
            sprint: 5.0,
            rotate_speed: 45.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AssetsCfg {
    pub texture: PathBuf,
    /// SPIR-V files replacing the built-in shaders.
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
}

impl Default for AssetsCfg {
    fn default() -> Self {
        Self {
            texture: PathBuf::from("data/textures/duckSpaceship.png"),
            vertex_shader: None,
            fragment_shader: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SceneCfg {
    /// Model rotation around Y, degrees per second.
    pub spin_speed: f32,
}

impl Default for SceneCfg {
    fn default() -> Self {
        Self { spin_speed: 30.0 }
    }
}

/// Command-line values that win over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub texture: Option<PathBuf>,
    pub wireframe: bool,
    pub validation: Option<bool>,
}

impl AppConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("parse config")
    }

    /// A missing file yields the defaults; an unreadable or malformed one is
    /// an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = Self::parse(&text).with_context(|| format!("in {}", path.display()))?;
        info!("config loaded from {}", path.display());
        Ok(cfg)
    }

    pub fn apply(&mut self, o: &Overrides) {
        if let Some(texture) = &o.texture {
            self.assets.texture = texture.clone();
        }
        if o.wireframe {
            self.render.polygon_mode = PolygonMode::Line;
        }
        if let Some(v) = o.validation {
            self.render.validation = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(AppConfig::parse("").unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppConfig::parse(
            r#"
            [window]
            title = "duck"

            [render]
            present_mode = "fifo"
            sampler_filter = "linear"
            face_culling = "none"
            validation = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "duck");
        assert_eq!(cfg.window.width, 1600);
        assert_eq!(cfg.render.present_mode, PresentPreference::Fifo);
        assert_eq!(cfg.render.sampler_filter, SamplerFilter::Linear);
        assert_eq!(cfg.render.face_culling, FaceCulling::None);
        assert_eq!(cfg.render.polygon_mode, PolygonMode::Fill);
        assert!(!cfg.render.validation());
        assert_eq!(cfg.camera, CameraCfg::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(AppConfig::parse("[render]\npresent_mode = \"vsync\"").is_err());
        assert!(AppConfig::parse("[window\n").is_err());
        assert!(AppConfig::parse("[nope]\nx = 1").is_err());
    }

    #[test]
    fn render_enums_read_snake_case() {
        let cfg = AppConfig::parse(
            "[render]\nface_culling = \"counter_clockwise\"\npolygon_mode = \"point\"\npresent_mode = \"immediate\"",
        )
        .unwrap();
        assert_eq!(cfg.render.face_culling, FaceCulling::CounterClockwise);
        assert_eq!(cfg.render.polygon_mode, PolygonMode::Point);
        assert_eq!(cfg.render.present_mode, PresentPreference::Immediate);
        assert!(AppConfig::parse("[render]\nface_culling = \"CounterClockwise\"").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load(&dir.path().join("scop.toml")).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn file_on_disk_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scop.toml");
        fs::write(&path, "[scene]\nspin_speed = 90.0\n").unwrap();
        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.scene.spin_speed, 90.0);
    }

    #[test]
    fn overrides_win() {
        let mut cfg = AppConfig::default();
        cfg.apply(&Overrides {
            texture: Some(PathBuf::from("other.png")),
            wireframe: true,
            validation: Some(true),
        });
        assert_eq!(cfg.assets.texture, PathBuf::from("other.png"));
        assert_eq!(cfg.render.polygon_mode, PolygonMode::Line);
        assert!(cfg.render.validation());
    }

    #[test]
    fn empty_overrides_change_nothing() {
        let mut cfg = AppConfig::default();
        cfg.apply(&Overrides::default());
        assert_eq!(cfg, AppConfig::default());
    }
}
