//! Texture provider for the pixel scene.
//!
//! Textures are identified by content hash. Consumers only ever hold a
//! [`TextureId`]; the renderer resolves it to pixels and sampler settings at
//! upload time.
//!
//! # Layout
//! A JSON manifest lists named textures and how to produce them:
//!
//! ```json
//! { "textures": [
//!     { "name": "box", "kind": "checker", "size": 16, "cells": 4, "repeat": [1.5, 1.5] }
//! ] }
//! ```

use pixelscene_common::TextureId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Errors from texture operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("texture not found: {0}")]
    NotFound(String),
    #[error("invalid texture `{name}`: {reason}")]
    InvalidTexture { name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

/// How a texture is sampled. Defaults are the pixel-art settings: nearest
/// filtering, no mipmaps, repeat wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    pub filter: TextureFilter,
    pub wrap: WrapMode,
    pub generate_mipmaps: bool,
    /// UV tiling factor.
    pub repeat: [f32; 2],
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            filter: TextureFilter::Nearest,
            wrap: WrapMode::Repeat,
            generate_mipmaps: false,
            repeat: [1.0, 1.0],
        }
    }
}

impl SamplerSettings {
    pub fn repeating(factor: f32) -> Self {
        Self {
            repeat: [factor, factor],
            ..Self::default()
        }
    }
}

/// RGBA8 image plus its sampler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub sampler: SamplerSettings,
}

impl Texture {
    fn validate(&self) -> Result<(), AssetError> {
        let invalid = |reason: String| AssetError::InvalidTexture {
            name: self.name.clone(),
            reason,
        };
        if self.width == 0 || self.height == 0 {
            return Err(invalid(format!("zero size {}x{}", self.width, self.height)));
        }
        let expected = self.width as usize * self.height as usize * 4;
        if self.pixels.len() != expected {
            return Err(invalid(format!(
                "expected {expected} bytes, got {}",
                self.pixels.len()
            )));
        }
        if self.sampler.repeat.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(invalid("repeat factor must be finite and positive".into()));
        }
        Ok(())
    }
}

/// Generate a `size`×`size` checkerboard with `cells` squares per side.
pub fn checker(size: u32, cells: u32, light: u32, dark: u32) -> Vec<u8> {
    let cell = (size / cells.max(1)).max(1);
    let rgba = |hex: u32| [(hex >> 16) as u8, (hex >> 8) as u8, hex as u8, 0xff];
    let (light, dark) = (rgba(light), rgba(dark));
    let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
    for y in 0..size {
        for x in 0..size {
            let texel = if ((x / cell) + (y / cell)) % 2 == 0 {
                light
            } else {
                dark
            };
            pixels.extend_from_slice(&texel);
        }
    }
    pixels
}

/// How a manifest entry produces its pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextureSource {
    Checker {
        size: u32,
        cells: u32,
        #[serde(default = "default_light")]
        light: u32,
        #[serde(default = "default_dark")]
        dark: u32,
    },
}

fn default_light() -> u32 {
    0xb4b4b4
}

fn default_dark() -> u32 {
    0x5a5a5a
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureEntry {
    pub name: String,
    #[serde(flatten)]
    pub source: TextureSource,
    #[serde(default = "default_repeat")]
    pub repeat: [f32; 2],
}

fn default_repeat() -> [f32; 2] {
    [1.0, 1.0]
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextureManifest {
    pub textures: Vec<TextureEntry>,
}

impl TextureManifest {
    /// The two checker textures of the pixel scene: boxes tile 1.5×, the
    /// floor 3×.
    pub fn pixel_scene(box_repeat: f32, floor_repeat: f32) -> Self {
        let checker = || TextureSource::Checker {
            size: 16,
            cells: 4,
            light: default_light(),
            dark: default_dark(),
        };
        Self {
            textures: vec![
                TextureEntry {
                    name: "box".into(),
                    source: checker(),
                    repeat: [box_repeat; 2],
                },
                TextureEntry {
                    name: "floor".into(),
                    source: checker(),
                    repeat: [floor_repeat; 2],
                },
            ],
        }
    }
}

/// Content-addressed texture registry.
#[derive(Debug, Clone, Default)]
pub struct TextureStore {
    textures: BTreeMap<TextureId, Texture>,
    names: BTreeMap<String, TextureId>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every texture a manifest lists.
    pub fn from_manifest(manifest: &TextureManifest) -> Result<Self, AssetError> {
        let mut store = Self::new();
        for entry in &manifest.textures {
            let TextureSource::Checker {
                size,
                cells,
                light,
                dark,
            } = entry.source;
            store.register(Texture {
                name: entry.name.clone(),
                width: size,
                height: size,
                pixels: checker(size, cells, light, dark),
                sampler: SamplerSettings {
                    repeat: entry.repeat,
                    ..SamplerSettings::default()
                },
            })?;
        }
        tracing::debug!(count = store.len(), "textures built from manifest");
        Ok(store)
    }

    pub fn from_manifest_str(json: &str) -> Result<Self, AssetError> {
        let manifest: TextureManifest = serde_json::from_str(json)?;
        Self::from_manifest(&manifest)
    }

    /// Load a manifest from a JSON file.
    pub fn load_manifest(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let file = std::fs::File::open(path)?;
        let manifest: TextureManifest = serde_json::from_reader(file)?;
        Self::from_manifest(&manifest)
    }

    /// Register a texture and return its content id. Re-registering identical
    /// content under another name aliases the same id.
    pub fn register(&mut self, texture: Texture) -> Result<TextureId, AssetError> {
        texture.validate()?;
        let id = content_hash(&texture);
        self.names.insert(texture.name.clone(), id);
        self.textures.entry(id).or_insert(texture);
        Ok(id)
    }

    pub fn get(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<TextureId> {
        self.names.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<TextureId, AssetError> {
        self.by_name(name)
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureId, &Texture)> {
        self.textures.iter().map(|(id, t)| (*id, t))
    }

    /// Number of distinct textures.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

fn content_hash(texture: &Texture) -> TextureId {
    let mut hasher = Sha256::new();
    hasher.update(texture.width.to_le_bytes());
    hasher.update(texture.height.to_le_bytes());
    hasher.update(&texture.pixels);
    let s = &texture.sampler;
    hasher.update([s.filter as u8, s.wrap as u8, s.generate_mipmaps as u8]);
    for r in s.repeat {
        hasher.update(r.to_le_bytes());
    }
    let result = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&result[..8]);
    TextureId(u64::from_le_bytes(bytes))
}

pub fn crate_info() -> &'static str {
    "pixelscene-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checker_alternates() {
        let px = checker(4, 2, 0xffffff, 0x000000);
        assert_eq!(px.len(), 4 * 4 * 4);
        assert_eq!(&px[0..4], &[0xff, 0xff, 0xff, 0xff]);
        // (2, 0) is in the second cell.
        assert_eq!(&px[8..12], &[0, 0, 0, 0xff]);
        // (2, 2) wraps back to light.
        let i = (2 * 4 + 2) * 4;
        assert_eq!(&px[i..i + 4], &[0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn default_sampler_is_pixel_art() {
        let s = SamplerSettings::default();
        assert_eq!(s.filter, TextureFilter::Nearest);
        assert_eq!(s.wrap, WrapMode::Repeat);
        assert!(!s.generate_mipmaps);
        assert_eq!(SamplerSettings::repeating(3.0).repeat, [3.0, 3.0]);
    }

    #[test]
    fn pixel_scene_manifest_builds_two_textures() {
        let store = TextureStore::from_manifest(&TextureManifest::pixel_scene(1.5, 3.0)).unwrap();
        // Same pixels but different repeat factors: two distinct ids.
        assert_eq!(store.len(), 2);
        let b = store.require("box").unwrap();
        let f = store.require("floor").unwrap();
        assert_ne!(b, f);
        assert_eq!(store.get(b).unwrap().sampler.repeat, [1.5, 1.5]);
        assert_eq!(store.get(f).unwrap().sampler.repeat, [3.0, 3.0]);
    }

    #[test]
    fn identical_content_dedups() {
        let mut store = TextureStore::new();
        let make = |name: &str| Texture {
            name: name.into(),
            width: 2,
            height: 2,
            pixels: checker(2, 2, 0xffffff, 0),
            sampler: SamplerSettings::default(),
        };
        let a = store.register(make("a")).unwrap();
        let b = store.register(make("b")).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.by_name("b"), Some(a));
    }

    #[test]
    fn wrong_pixel_count_is_rejected() {
        let mut store = TextureStore::new();
        let err = store
            .register(Texture {
                name: "bad".into(),
                width: 2,
                height: 2,
                pixels: vec![0; 3],
                sampler: SamplerSettings::default(),
            })
            .unwrap_err();
        assert!(matches!(err, AssetError::InvalidTexture { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn missing_name_is_not_found() {
        let store = TextureStore::new();
        assert!(matches!(store.require("floor"), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn manifest_from_json() {
        let json = r#"{ "textures": [
            { "name": "floor", "kind": "checker", "size": 8, "cells": 2, "repeat": [3.0, 3.0] },
            { "name": "box", "kind": "checker", "size": 8, "cells": 4 }
        ] }"#;
        let store = TextureStore::from_manifest_str(json).unwrap();
        let boxed = store.get(store.require("box").unwrap()).unwrap();
        assert_eq!(boxed.sampler.repeat, [1.0, 1.0]);
        assert_eq!(boxed.width, 8);
    }

    #[test]
    fn load_manifest_from_disk() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let manifest = TextureManifest::pixel_scene(1.5, 3.0);
        std::fs::write(tmp.path(), serde_json::to_string(&manifest).unwrap()).unwrap();

        let store = TextureStore::load_manifest(tmp.path()).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn bad_json_reports_error() {
        assert!(matches!(
            TextureStore::from_manifest_str("{ not json"),
            Err(AssetError::Json(_))
        ));
    }
}
