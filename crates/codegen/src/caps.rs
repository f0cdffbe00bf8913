use serde::{Deserialize, Serialize};

/// Shading language dialect the generated text targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlslGeneration {
    #[serde(rename = "110")]
    V110,
    #[serde(rename = "130")]
    V130,
    #[serde(rename = "140")]
    V140,
    #[serde(rename = "150")]
    V150,
    #[serde(rename = "330")]
    V330,
    #[serde(rename = "es100")]
    Es100,
    #[serde(rename = "es300")]
    Es300,
}

impl GlslGeneration {
    pub fn version_declaration(self) -> &'static str {
        match self {
            GlslGeneration::V110 => "#version 110",
            GlslGeneration::V130 => "#version 130",
            GlslGeneration::V140 => "#version 140",
            GlslGeneration::V150 => "#version 150",
            GlslGeneration::V330 => "#version 330",
            GlslGeneration::Es100 => "#version 100",
            GlslGeneration::Es300 => "#version 300 es",
        }
    }

    pub fn is_es(self) -> bool {
        matches!(self, GlslGeneration::Es100 | GlslGeneration::Es300)
    }

    /// `in`/`out` storage qualifiers instead of `attribute`/`varying`, and a
    /// declared fragment output instead of `gl_FragColor`.
    pub fn uses_in_out(self) -> bool {
        !matches!(self, GlslGeneration::V110 | GlslGeneration::Es100)
    }

    pub fn texture_function(self) -> &'static str {
        if self.uses_in_out() {
            "texture"
        } else {
            "texture2D"
        }
    }
}

/// How the fragment stage can read the destination color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DstReadSupport {
    None,
    FramebufferFetch,
    TextureCopy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdvancedBlendSupport {
    None,
    /// Requires a blend barrier between overlapping draws.
    Basic,
    Coherent,
}

/// Device capabilities consulted while building keys and shader text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caps {
    pub generation: GlslGeneration,
    pub precision_qualifiers: bool,
    pub dst_read: DstReadSupport,
    pub advanced_blend: AdvancedBlendSupport,
    /// Sampler objects can swizzle, so shaders never need to.
    pub texture_swizzle: bool,
    /// Alpha-only textures are stored in the red channel.
    pub alpha8_in_red: bool,
    pub standard_derivatives: bool,
    pub max_vertex_attributes: u32,
    pub max_varying_vectors: u32,
}

pub const PROFILE_NAMES: [&str; 3] = ["desktop", "gles2", "gles3"];

impl Caps {
    pub fn desktop_gl() -> Self {
        Self {
            generation: GlslGeneration::V330,
            precision_qualifiers: false,
            dst_read: DstReadSupport::TextureCopy,
            advanced_blend: AdvancedBlendSupport::None,
            texture_swizzle: true,
            alpha8_in_red: true,
            standard_derivatives: true,
            max_vertex_attributes: 16,
            max_varying_vectors: 15,
        }
    }

    pub fn gles2() -> Self {
        Self {
            generation: GlslGeneration::Es100,
            precision_qualifiers: true,
            dst_read: DstReadSupport::FramebufferFetch,
            advanced_blend: AdvancedBlendSupport::None,
            texture_swizzle: false,
            alpha8_in_red: false,
            standard_derivatives: true,
            max_vertex_attributes: 8,
            max_varying_vectors: 8,
        }
    }

    pub fn gles3() -> Self {
        Self {
            generation: GlslGeneration::Es300,
            precision_qualifiers: true,
            dst_read: DstReadSupport::FramebufferFetch,
            advanced_blend: AdvancedBlendSupport::Coherent,
            texture_swizzle: true,
            alpha8_in_red: true,
            standard_derivatives: true,
            max_vertex_attributes: 16,
            max_varying_vectors: 15,
        }
    }

    pub fn from_profile(name: &str) -> Option<Self> {
        match name {
            "desktop" => Some(Self::desktop_gl()),
            "gles2" => Some(Self::gles2()),
            "gles3" => Some(Self::gles3()),
            _ => None,
        }
    }

    /// Swizzles that the sampler cannot apply are baked into shader text.
    pub fn shader_swizzling(&self) -> bool {
        !self.texture_swizzle
    }
}

impl Default for Caps {
    fn default() -> Self {
        Self::desktop_gl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_resolve_by_name() {
        for name in PROFILE_NAMES {
            assert!(Caps::from_profile(name).is_some(), "{name}");
        }
        assert!(Caps::from_profile("vulkan").is_none());
    }

    #[test]
    fn generation_picks_texture_function() {
        assert_eq!(GlslGeneration::Es100.texture_function(), "texture2D");
        assert_eq!(GlslGeneration::V110.texture_function(), "texture2D");
        assert_eq!(GlslGeneration::V330.texture_function(), "texture");
        assert_eq!(GlslGeneration::Es300.texture_function(), "texture");
    }
}
