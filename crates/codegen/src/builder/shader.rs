use std::fmt::Write as _;

use crate::backend::ShaderStage;
use crate::caps::{Caps, GlslGeneration};
use crate::types::{ShaderVar, SlType};
use crate::uniform::{UniformInfo, Visibility};

use super::SamplerHandle;

/// Optional language feature switched on with an `#extension` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlslFeature {
    pub bit: u32,
    pub extension: &'static str,
}

impl GlslFeature {
    pub const STANDARD_DERIVATIVES: GlslFeature = GlslFeature {
        bit: 1 << 0,
        extension: "GL_OES_standard_derivatives",
    };
    pub const FRAMEBUFFER_FETCH: GlslFeature = GlslFeature {
        bit: 1 << 1,
        extension: "GL_EXT_shader_framebuffer_fetch",
    };
    pub const ADVANCED_BLEND: GlslFeature = GlslFeature {
        bit: 1 << 2,
        extension: "GL_KHR_blend_equation_advanced",
    };
}

/// Text buffers for one shader stage.
///
/// Everything is append-only until [`ShaderBuilder::finalize`] stitches the
/// buffers together, which may happen once.
#[derive(Debug)]
pub struct ShaderBuilder {
    stage: ShaderStage,
    caps: Caps,
    features: u32,
    extensions: Vec<String>,
    layout_qualifiers: Vec<String>,
    inputs: Vec<ShaderVar>,
    outputs: Vec<ShaderVar>,
    functions: String,
    body: String,
    finalized: bool,
}

impl ShaderBuilder {
    pub(crate) fn new(stage: ShaderStage, caps: Caps) -> Self {
        Self {
            stage,
            caps,
            features: 0,
            extensions: Vec::new(),
            layout_qualifiers: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            functions: String::new(),
            body: String::new(),
            finalized: false,
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn caps(&self) -> &Caps {
        &self.caps
    }

    /// Appends raw statements to `main()`.
    pub fn code_append(&mut self, code: &str) {
        debug_assert!(!self.finalized);
        self.body.push_str(code);
    }

    /// Records `extension` once per feature bit. Returns whether the
    /// directive was newly added.
    pub fn add_feature(&mut self, bit: u32, extension: &str) -> bool {
        if self.features & bit != 0 {
            return false;
        }
        self.features |= bit;
        self.extensions.push(format!("#extension {extension} : require"));
        true
    }

    /// Adds the extension directive for `feature` when this generation needs
    /// one.
    pub fn enable_feature(&mut self, feature: GlslFeature) {
        // Derivatives are core outside GLSL ES 1.00.
        let needed = feature != GlslFeature::STANDARD_DERIVATIVES
            || self.caps.generation == GlslGeneration::Es100;
        if needed {
            self.add_feature(feature.bit, feature.extension);
        }
    }

    pub fn has_feature(&self, feature: GlslFeature) -> bool {
        self.features & feature.bit != 0
    }

    pub fn add_layout_qualifier(&mut self, qualifier: &str) {
        if !self.layout_qualifiers.iter().any(|q| q == qualifier) {
            self.layout_qualifiers.push(qualifier.to_string());
        }
    }

    pub(crate) fn add_input(&mut self, var: ShaderVar) {
        self.inputs.push(var);
    }

    pub(crate) fn add_output(&mut self, var: ShaderVar) {
        self.outputs.push(var);
    }

    pub(crate) fn append_function(
        &mut self,
        return_type: SlType,
        name: &str,
        args: &[ShaderVar],
        body: &str,
    ) {
        let params = args
            .iter()
            .map(|arg| arg.declaration(&self.caps, self.stage))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(self.functions, "{} {name}({params}) {{", return_type.name());
        push_indented(&mut self.functions, body);
        self.functions.push_str("}\n\n");
    }

    /// Expression sampling `sampler` at `coords`, including any swizzle the
    /// sampler object cannot apply itself.
    pub fn texture_lookup(&self, sampler: &SamplerHandle, coords: &str) -> String {
        let mut lookup = format!(
            "{}({}, {})",
            self.caps.generation.texture_function(),
            sampler.name,
            coords
        );
        if let Some(swizzle) = sampler.shader_swizzle.filter(|s| !s.is_identity()) {
            lookup.push('.');
            lookup.push_str(swizzle.as_str());
        }
        lookup
    }

    pub fn append_texture_lookup(&mut self, sampler: &SamplerHandle, coords: &str) {
        let lookup = self.texture_lookup(sampler, coords);
        self.code_append(&lookup);
    }

    /// Like [`Self::append_texture_lookup`], multiplied by `modulation` when
    /// given.
    pub fn append_texture_lookup_and_modulate(
        &mut self,
        modulation: Option<&str>,
        sampler: &SamplerHandle,
        coords: &str,
    ) {
        let lookup = self.texture_lookup(sampler, coords);
        match modulation {
            Some(modulation) => self.code_append(&format!("({modulation} * {lookup})")),
            None => self.code_append(&lookup),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Produces the complete source. Declaration order is fixed: version,
    /// extensions, layout qualifiers, uniforms, inputs, outputs, helper
    /// functions, then `main()`.
    ///
    /// Panics when called twice.
    pub(crate) fn finalize(&mut self, uniforms: &[UniformInfo]) -> String {
        assert!(
            !self.finalized,
            "{} shader finalized twice",
            self.stage.name()
        );
        self.finalized = true;

        let visibility = match self.stage {
            ShaderStage::Vertex => Visibility::VERTEX,
            ShaderStage::Fragment => Visibility::FRAGMENT,
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}", self.caps.generation.version_declaration());
        for extension in &self.extensions {
            let _ = writeln!(out, "{extension}");
        }
        for qualifier in &self.layout_qualifiers {
            let _ = writeln!(out, "{qualifier}");
        }
        if self.stage == ShaderStage::Fragment && self.caps.precision_qualifiers {
            out.push_str("precision mediump float;\n");
        }
        for uniform in uniforms.iter().filter(|u| u.visibility.contains(visibility)) {
            let _ = writeln!(out, "{};", uniform.var.declaration(&self.caps, self.stage));
        }
        for var in self.inputs.iter().chain(self.outputs.iter()) {
            let _ = writeln!(out, "{};", var.declaration(&self.caps, self.stage));
        }
        out.push('\n');
        out.push_str(&self.functions);
        out.push_str("void main() {\n");
        push_indented(&mut out, &self.body);
        out.push_str("}\n");
        out
    }
}

fn push_indented(out: &mut String, code: &str) {
    for line in code.lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, "    {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeModifier;
    use crate::uniform::UniformHandle;
    use effects::Swizzle;

    fn sampler(swizzle: Option<Swizzle>) -> SamplerHandle {
        SamplerHandle {
            uniform: UniformHandle(0),
            name: "uSampler0_Stage1".into(),
            shader_swizzle: swizzle,
            sampler_swizzle: Swizzle::RGBA,
        }
    }

    #[test]
    fn lookup_uses_generation_function_and_swizzle() {
        let es2 = ShaderBuilder::new(ShaderStage::Fragment, Caps::gles2());
        assert_eq!(
            es2.texture_lookup(&sampler(Some(Swizzle::AAAA)), "vCoord"),
            "texture2D(uSampler0_Stage1, vCoord).aaaa"
        );
        let desktop = ShaderBuilder::new(ShaderStage::Fragment, Caps::desktop_gl());
        assert_eq!(
            desktop.texture_lookup(&sampler(None), "vCoord"),
            "texture(uSampler0_Stage1, vCoord)"
        );
        assert_eq!(
            desktop.texture_lookup(&sampler(Some(Swizzle::RGBA)), "vCoord"),
            "texture(uSampler0_Stage1, vCoord)"
        );
    }

    #[test]
    fn features_are_idempotent() {
        let mut fs = ShaderBuilder::new(ShaderStage::Fragment, Caps::gles2());
        fs.enable_feature(GlslFeature::STANDARD_DERIVATIVES);
        fs.enable_feature(GlslFeature::STANDARD_DERIVATIVES);
        assert!(!fs.add_feature(GlslFeature::STANDARD_DERIVATIVES.bit, "ignored"));
        let source = fs.finalize(&[]);
        assert_eq!(source.matches("#extension").count(), 1);

        let mut desktop = ShaderBuilder::new(ShaderStage::Fragment, Caps::desktop_gl());
        desktop.enable_feature(GlslFeature::STANDARD_DERIVATIVES);
        assert!(!desktop.has_feature(GlslFeature::STANDARD_DERIVATIVES));
    }

    #[test]
    fn finalize_orders_sections() {
        let mut fs = ShaderBuilder::new(ShaderStage::Fragment, Caps::gles2());
        fs.add_input(ShaderVar::new("vCoord", SlType::Vec2, TypeModifier::VaryingIn));
        fs.append_function(SlType::Float, "halve", &[ShaderVar::param("x", SlType::Float)], "return x * 0.5;\n");
        fs.add_feature(GlslFeature::FRAMEBUFFER_FETCH.bit, GlslFeature::FRAMEBUFFER_FETCH.extension);
        fs.code_append("gl_FragColor = vec4(halve(vCoord.x));\n");
        let uniforms = [
            UniformInfo {
                var: ShaderVar::new("uColor", SlType::Vec4, TypeModifier::Uniform),
                visibility: Visibility::FRAGMENT,
            },
            UniformInfo {
                var: ShaderVar::new("uViewM", SlType::Mat3, TypeModifier::Uniform),
                visibility: Visibility::VERTEX,
            },
        ];
        let source = fs.finalize(&uniforms);
        let order = [
            "#version 100",
            "#extension GL_EXT_shader_framebuffer_fetch",
            "precision mediump float;",
            "uniform vec4 uColor;",
            "varying vec2 vCoord;",
            "float halve(float x)",
            "void main()",
            "    gl_FragColor",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|needle| source.find(needle).unwrap_or_else(|| panic!("{needle} missing")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{source}");
        assert!(!source.contains("uViewM"));
    }

    #[test]
    #[should_panic(expected = "finalized twice")]
    fn finalize_twice_panics() {
        let mut vs = ShaderBuilder::new(ShaderStage::Vertex, Caps::default());
        let _ = vs.finalize(&[]);
        let _ = vs.finalize(&[]);
    }
}
