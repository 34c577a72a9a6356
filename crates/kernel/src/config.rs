use glam::Vec3;
use pixelscene_anim::AnimationTiming;
use pixelscene_render::{PixelationConfig, RenderView};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything that shapes the scene. Missing fields take the defaults of the
/// stock pixel scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub pixelation: PixelationConfig,
    pub animation: AnimationTiming,
    /// Dynamic boxes spawned at `(i, i, 2)`.
    pub box_count: u32,
    pub box_texture_repeat: f32,
    pub floor_texture_repeat: f32,
    /// Background as `#rrggbb`.
    pub clear_color: String,
    pub camera: RenderView,
    pub gravity: Vec3,
    /// Where to place the player cone, if anywhere.
    pub player: Option<Vec3>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            pixelation: PixelationConfig::default(),
            animation: AnimationTiming::default(),
            box_count: 5,
            box_texture_repeat: 1.5,
            floor_texture_repeat: 3.0,
            clear_color: "#151729".into(),
            camera: RenderView::default(),
            gravity: Vec3::new(0.0, -9.81, 0.0),
            player: None,
        }
    }
}

impl SceneConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&text)?;
        tracing::info!(path = %path.as_ref().display(), "scene config loaded");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pixelation
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.animation
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        for (name, repeat) in [
            ("box_texture_repeat", self.box_texture_repeat),
            ("floor_texture_repeat", self.floor_texture_repeat),
        ] {
            if !repeat.is_finite() || repeat <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be positive, got {repeat}"
                )));
            }
        }
        self.clear_rgb()?;
        let cam = &self.camera;
        if !(cam.zoom.is_finite() && cam.zoom > 0.0) {
            return Err(ConfigError::Invalid("camera zoom must be positive".into()));
        }
        if !(cam.near >= 0.0 && cam.near < cam.far) {
            return Err(ConfigError::Invalid(format!(
                "camera near {} must be below far {}",
                cam.near, cam.far
            )));
        }
        if cam.eye == cam.target || !cam.eye.is_finite() || !cam.target.is_finite() {
            return Err(ConfigError::Invalid("camera eye and target must differ".into()));
        }
        if !self.gravity.is_finite() {
            return Err(ConfigError::Invalid("gravity must be finite".into()));
        }
        if self.player.is_some_and(|p| !p.is_finite()) {
            return Err(ConfigError::Invalid("player position must be finite".into()));
        }
        Ok(())
    }

    /// Background colour as linear floats.
    pub fn clear_rgb(&self) -> Result<[f32; 3], ConfigError> {
        let hex = self
            .clear_color
            .strip_prefix('#')
            .filter(|h| h.len() == 6)
            .and_then(|h| u32::from_str_radix(h, 16).ok())
            .ok_or_else(|| {
                let color = &self.clear_color;
                ConfigError::Invalid(format!("clear_color `{color}` is not #rrggbb"))
            })?;
        Ok(pixelscene_ecs::hex_rgb(hex))
    }
}
