//! Scene files for `fxc`.
//!
//! A scene names a capability profile, the program cache size, the textures a
//! draw may sample, and one draw whose color and coverage stages are nested
//! processor tables. [`FxConfig::pipeline`] turns the draw into an effect
//! tree.

mod scene;

use codegen::{AdvancedBlendSupport, Caps, DstReadSupport, GlslGeneration, DEFAULT_CAPACITY};
use serde::{Deserialize, Serialize};

pub use scene::{
    ChannelSpec, CoordsSpec, DomainModeSpec, DrawSpec, DstCopySpec, FilterSpec, GeometrySpec,
    InputModeSpec, InputSpec, OriginSpec, PixelFormatSpec, PrecisionSpec, PrimitiveSpec,
    ProcessorSpec, SampleSpec, TargetSpec, TextureSpec, TileSpec,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FxConfig {
    pub version: u32,
    #[serde(default)]
    pub caps: CapsSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub textures: Vec<TextureSpec>,
    pub draw: DrawSpec,
}

/// A named profile plus per-field overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CapsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<GlslGeneration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision_qualifiers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_read: Option<DstReadSupport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_blend: Option<AdvancedBlendSupport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_swizzle: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha8_in_red: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_derivatives: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_vertex_attributes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_varying_vectors: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl CapsSection {
    /// Resolves the profile (or `profile_override` when given) and applies
    /// the field overrides on top of it.
    pub fn resolve(&self, profile_override: Option<&str>) -> Result<Caps, ConfigError> {
        let name = profile_override.or(self.profile.as_deref());
        let mut caps = match name {
            None => Caps::default(),
            Some(name) => Caps::from_profile(name).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "unknown capability profile '{name}'; expected one of {}",
                    codegen::caps::PROFILE_NAMES.join(", ")
                ))
            })?,
        };

        if let Some(value) = self.generation {
            caps.generation = value;
        }
        if let Some(value) = self.precision_qualifiers {
            caps.precision_qualifiers = value;
        }
        if let Some(value) = self.dst_read {
            caps.dst_read = value;
        }
        if let Some(value) = self.advanced_blend {
            caps.advanced_blend = value;
        }
        if let Some(value) = self.texture_swizzle {
            caps.texture_swizzle = value;
        }
        if let Some(value) = self.alpha8_in_red {
            caps.alpha8_in_red = value;
        }
        if let Some(value) = self.standard_derivatives {
            caps.standard_derivatives = value;
        }
        if let Some(value) = self.max_vertex_attributes {
            caps.max_vertex_attributes = value;
        }
        if let Some(value) = self.max_varying_vectors {
            caps.max_varying_vectors = value;
        }
        Ok(caps)
    }
}

impl FxConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FxConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn caps(&self, profile_override: Option<&str>) -> Result<Caps, ConfigError> {
        self.caps.resolve(profile_override)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache.capacity must be greater than zero".into(),
            ));
        }

        for (index, texture) in self.textures.iter().enumerate() {
            if texture.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "texture #{index} must have a name"
                )));
            }
            if texture.width == 0 || texture.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "texture '{}' must have non-zero dimensions",
                    texture.name
                )));
            }
            if self.textures[..index].iter().any(|t| t.name == texture.name) {
                return Err(ConfigError::Invalid(format!(
                    "texture '{}' is defined twice",
                    texture.name
                )));
            }
        }

        self.caps(None)?;
        self.pipeline()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegen::InputSource;
    use effects::{ClassId, FragmentKind};

    const SAMPLE: &str = r#"
version = 1

[caps]
profile = "gles2"
max_varying_vectors = 12

[cache]
capacity = 8

[[textures]]
name = "checker"
id = 1
width = 64
height = 64

[[textures]]
name = "mask"
id = 2
width = 32
height = 32
format = "alpha8"

[draw]
primitive = "triangles"
target = { width = 640, height = 480 }
color_input = "uniform"
uniform_color = [1.0, 0.5, 0.25, 1.0]
blend = "src-over"

[draw.geometry]
type = "default"
local_coords = true

[[draw.color]]
type = "compose"
mode = "multiply"
src = { type = "texture", texture = "checker", swizzle = "bgra" }
dst = { type = "series", children = [
    { type = "const-color", color = [0.0, 0.0, 1.0, 1.0], mode = "modulate-rgba" },
    { type = "linear-gradient", start = [0.0, 0.0, 0.0, 1.0], end = [1.0, 1.0, 1.0, 1.0] },
] }

[[draw.coverage]]
type = "texture"
texture = "mask"
coords = "device"
"#;

    #[test]
    fn parses_sample_config() {
        let config = FxConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.version, 1);
        assert_eq!(config.cache.capacity, 8);

        let caps = config.caps(None).unwrap();
        assert_eq!(caps.generation, GlslGeneration::Es100);
        assert_eq!(caps.max_varying_vectors, 12);
        assert_eq!(config.caps(Some("desktop")).unwrap().generation, GlslGeneration::V330);

        let pipeline = config.pipeline().unwrap();
        assert_eq!(pipeline.color_input, InputSource::Uniform);
        assert_eq!(pipeline.color, [1.0, 0.5, 0.25, 1.0]);
        let compose = &pipeline.color_stages[0];
        assert_eq!(compose.class_id(), ClassId::COMPOSE);
        assert_eq!(compose.num_transforms(), 2);
        assert_eq!(compose.num_textures(), 1);
        assert_eq!(compose.child(1).child_count(), 2);
        assert!(matches!(compose.child(1).child(0).kind(), FragmentKind::ConstColor { .. }));
        assert_eq!(pipeline.coverage_stages.len(), 1);
    }

    #[test]
    fn cache_capacity_defaults() {
        let config = FxConfig::from_toml_str(
            r#"
version = 1

[draw]
target = { width = 16, height = 16 }
"#,
        )
        .unwrap();
        assert_eq!(config.cache.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.caps(None).unwrap(), Caps::default());
    }

    fn invalid(input: &str) -> String {
        match FxConfig::from_toml_str(input) {
            Err(ConfigError::Invalid(message)) => message,
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_version() {
        let message = invalid(
            r#"
version = 2

[draw]
target = { width = 16, height = 16 }
"#,
        );
        assert!(message.contains("version 2"), "{message}");
    }

    #[test]
    fn rejects_unknown_texture() {
        let message = invalid(
            r#"
version = 1

[draw]
target = { width = 16, height = 16 }

[[draw.color]]
type = "texture"
texture = "missing"
"#,
        );
        assert!(message.contains("unknown texture 'missing'"), "{message}");
    }

    #[test]
    fn rejects_bad_swizzle_and_matrix() {
        let swizzle = invalid(
            r#"
version = 1

[[textures]]
name = "t"
id = 1
width = 4
height = 4

[draw]
target = { width = 16, height = 16 }

[[draw.color]]
type = "texture"
texture = "t"
swizzle = "rgbx"
"#,
        );
        assert!(swizzle.contains("rgbx"), "{swizzle}");

        let matrix = invalid(
            r#"
version = 1

[draw]
target = { width = 16, height = 16 }
view_matrix = [1.0, 0.0, 0.0]
"#,
        );
        assert!(matrix.contains("view_matrix"), "{matrix}");
    }

    #[test]
    fn rejects_empty_series_and_unknown_profile() {
        let series = invalid(
            r#"
version = 1

[draw]
target = { width = 16, height = 16 }

[[draw.color]]
type = "series"
children = []
"#,
        );
        assert!(series.contains("at least one child"), "{series}");

        let profile = invalid(
            r#"
version = 1

[caps]
profile = "vulkan"

[draw]
target = { width = 16, height = 16 }
"#,
        );
        assert!(profile.contains("vulkan"), "{profile}");
    }
}
