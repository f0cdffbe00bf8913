//! Shader text generation for one draw.
//!
//! [`ProgramBuilder::build`] walks the geometry processor, every color and
//! coverage stage and the transfer processor in key order, creating one
//! emitter per processor and letting it append code. Names declared while a
//! processor emits are suffixed with `_Stage<N>` for its top-level stage and
//! `_c<i>` for every child level below it, so siblings and nested children
//! never collide.

mod fragment;
mod shader;
mod vertex;

use std::collections::HashSet;
use std::fmt::Write as _;

use effects::{FragmentProcessor, Precision, Swizzle, TextureAccess};

use crate::backend::ShaderStage;
use crate::caps::Caps;
use crate::emitter::{EmitArgs, EmitterNode, GeometryEmitArgs, XferEmitArgs};
use crate::error::BuildError;
use crate::pipeline::{DrawAnalysis, DrawKind, DrawPipeline, DstReadMode};
use crate::registry::EmitterRegistry;
use crate::runtime::{FragmentStageEffects, ProgramEffects, SamplerBinding};
use crate::types::{ShaderVar, SlType, TypeModifier};
use crate::uniform::{UniformHandle, UniformInfo, Visibility};

pub use shader::{GlslFeature, ShaderBuilder};

/// A texture sampler uniform and how reads through it are swizzled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerHandle {
    pub uniform: UniformHandle,
    pub name: String,
    /// Swizzle written into the shader text, when the sampler cannot apply it.
    pub shader_swizzle: Option<Swizzle>,
    /// Swizzle passed to the backend when the texture is bound.
    pub sampler_swizzle: Swizzle,
}

/// Fragment-side name of a transformed coordinate varying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedCoord {
    pub name: String,
    /// `Vec2`, or `Vec3` when the transform needs a perspective divide.
    pub ty: SlType,
}

/// Whether an alpha-only texture is sampled from its red channel.
pub(crate) fn alpha_remapped(caps: &Caps, access: &TextureAccess) -> bool {
    access.texture.config.component_mask().is_alpha_only() && caps.alpha8_in_red
}

pub(crate) fn effective_swizzle(caps: &Caps, access: &TextureAccess) -> Swizzle {
    if alpha_remapped(caps, access) {
        access.swizzle.remap(b'a', b'r')
    } else {
        access.swizzle
    }
}

/// Shader sources plus everything needed to feed the linked program.
pub struct GeneratedProgram {
    pub vertex: String,
    pub fragment: String,
    pub uniforms: Vec<UniformInfo>,
    /// Attribute names, bound to their index in this list.
    pub attributes: Vec<&'static str>,
    pub(crate) effects: ProgramEffects,
}

pub struct ProgramBuilder {
    caps: Caps,
    analysis: DrawAnalysis,
    draw_kind: DrawKind,
    vertex: ShaderBuilder,
    fragment: ShaderBuilder,
    uniforms: Vec<UniformInfo>,
    names: HashSet<String>,
    next_stage: usize,
    stage: Option<usize>,
    mangle: Vec<usize>,
    position_var: &'static str,
    local_coords_var: &'static str,
    fragment_output: Option<&'static str>,
    dst_color: Option<String>,
}

impl ProgramBuilder {
    fn new(caps: Caps, analysis: DrawAnalysis, draw_kind: DrawKind) -> Self {
        Self {
            caps,
            analysis,
            draw_kind,
            vertex: ShaderBuilder::new(ShaderStage::Vertex, caps),
            fragment: ShaderBuilder::new(ShaderStage::Fragment, caps),
            uniforms: Vec::new(),
            names: HashSet::new(),
            next_stage: 0,
            stage: None,
            mangle: Vec::new(),
            position_var: "pos2",
            local_coords_var: "inPosition",
            fragment_output: None,
            dst_color: None,
        }
    }

    /// Generates vertex and fragment source for `pipeline`, creating an
    /// emitter for every processor through `registry`.
    pub fn build(
        pipeline: &DrawPipeline,
        draw_kind: DrawKind,
        caps: &Caps,
        registry: &EmitterRegistry,
    ) -> Result<GeneratedProgram, BuildError> {
        let analysis = DrawAnalysis::new(pipeline, caps)?;

        let mut geometry = registry.create_geometry(&pipeline.geometry)?;
        let color_nodes = pipeline
            .color_stages
            .iter()
            .map(|fp| EmitterNode::create(fp, registry))
            .collect::<Result<Vec<_>, _>>()?;
        let coverage_nodes = pipeline
            .coverage_stages
            .iter()
            .map(|fp| EmitterNode::create(fp, registry))
            .collect::<Result<Vec<_>, _>>()?;
        let mut xfer = registry.create_xfer(&pipeline.xfer)?;

        let mut builder = ProgramBuilder::new(*caps, analysis, draw_kind);
        let builtins = builder.emit_vertex_preamble(pipeline);
        let input_color = builder.input_color_expr(pipeline);
        let input_coverage = builder.input_coverage_expr(pipeline);

        builder.enter_stage();
        let gp = &pipeline.geometry;
        let geometry_samplers = gp
            .textures()
            .iter()
            .enumerate()
            .map(|(i, access)| builder.add_sampler(access, &format!("Sampler{i}")))
            .collect::<Vec<_>>();
        let gp_color = builder.name_variable("outputColor");
        let gp_coverage = builder.name_variable("outputCoverage");
        builder
            .fragment
            .code_append(&format!("vec4 {gp_color};\nvec4 {gp_coverage};\n"));
        {
            let mut args = GeometryEmitArgs {
                builder: &mut builder,
                processor: gp,
                samplers: &geometry_samplers,
                color_input: pipeline.color_input,
                coverage_input: pipeline.coverage_input,
                input_color: &input_color,
                input_coverage: &input_coverage,
                output_color: &gp_color,
                output_coverage: &gp_coverage,
            };
            geometry.emit_code(&mut args);
        }
        builder.exit_stage();

        let mut color = gp_color;
        let mut color_effects = Vec::with_capacity(color_nodes.len());
        for (fp, node) in pipeline.color_stages.iter().zip(color_nodes) {
            let (effects, output) = builder.emit_fragment_stage(fp, node, &color);
            color_effects.push(effects);
            color = output;
        }

        let mut coverage = gp_coverage;
        let mut coverage_effects = Vec::with_capacity(coverage_nodes.len());
        for (fp, node) in pipeline.coverage_stages.iter().zip(coverage_nodes) {
            let (effects, output) = builder.emit_fragment_stage(fp, node, &coverage);
            coverage_effects.push(effects);
            coverage = output;
        }

        let dst_color = if analysis.dst_read == DstReadMode::None {
            None
        } else {
            Some(builder.dst_color())
        };
        let output = builder.fragment_output();
        builder.enter_stage();
        {
            let mut args = XferEmitArgs {
                builder: &mut builder,
                processor: &pipeline.xfer,
                input_color: &color,
                input_coverage: &coverage,
                output,
                dst_color: dst_color.as_deref(),
                hardware_advanced: analysis.hardware_advanced_blend,
            };
            xfer.emit_code(&mut args);
        }
        builder.exit_stage();
        builder.emit_point_size();

        let attributes = gp.attributes().iter().map(|a| a.name).collect();
        let vertex = builder.vertex.finalize(&builder.uniforms);
        let fragment = builder.fragment.finalize(&builder.uniforms);
        let effects = ProgramEffects::new(
            builtins,
            geometry,
            geometry_samplers.iter().map(SamplerBinding::from).collect(),
            color_effects,
            coverage_effects,
            xfer,
        );

        Ok(GeneratedProgram {
            vertex,
            fragment,
            uniforms: builder.uniforms,
            attributes,
            effects,
        })
    }

    fn emit_fragment_stage(
        &mut self,
        fp: &FragmentProcessor,
        mut node: EmitterNode,
        input: &str,
    ) -> (FragmentStageEffects, String) {
        self.enter_stage();
        let (coords, transforms) = self.emit_transforms(fp);
        let samplers = (0..fp.num_textures())
            .map(|i| self.add_sampler(fp.texture_access(i), &format!("Sampler{i}")))
            .collect::<Vec<_>>();
        let output = self.name_variable("output");
        self.fragment.code_append(&format!("vec4 {output};\n"));
        {
            let mut args = EmitArgs::new(
                self,
                fp,
                input,
                &output,
                &coords,
                &samplers,
                &mut node.children,
            );
            node.emitter.emit_code(&mut args);
        }
        self.exit_stage();
        let effects = FragmentStageEffects::new(
            node,
            transforms,
            samplers.iter().map(SamplerBinding::from).collect(),
        );
        (effects, output)
    }

    pub fn caps(&self) -> &Caps {
        &self.caps
    }

    pub fn draw_kind(&self) -> DrawKind {
        self.draw_kind
    }

    pub fn vertex(&mut self) -> &mut ShaderBuilder {
        &mut self.vertex
    }

    pub fn fragment(&mut self) -> &mut ShaderBuilder {
        &mut self.fragment
    }

    pub fn uniforms(&self) -> &[UniformInfo] {
        &self.uniforms
    }

    pub fn uniform_name(&self, handle: UniformHandle) -> &str {
        &self.uniforms[handle.0].var.name
    }

    fn enter_stage(&mut self) {
        debug_assert!(self.stage.is_none() && self.mangle.is_empty());
        self.stage = Some(self.next_stage);
        self.next_stage += 1;
    }

    fn exit_stage(&mut self) {
        assert!(self.mangle.is_empty(), "unbalanced child emission");
        self.stage = None;
    }

    pub(crate) fn enter_child(&mut self, index: usize) {
        debug_assert!(self.stage.is_some());
        self.mangle.push(index);
    }

    pub(crate) fn exit_child(&mut self) {
        self.mangle.pop();
    }

    fn mangle_suffix(&self) -> String {
        let mut suffix = String::new();
        if let Some(stage) = self.stage {
            let _ = write!(suffix, "_Stage{stage}");
        }
        for child in &self.mangle {
            let _ = write!(suffix, "_c{child}");
        }
        suffix
    }

    fn reserve_name(&mut self, name: &str) {
        let fresh = self.names.insert(name.to_string());
        debug_assert!(fresh, "{name} declared twice");
    }

    /// Returns `base` decorated with the current stage and child path,
    /// unique within the program.
    pub fn name_variable(&mut self, base: &str) -> String {
        let mangled = format!("{base}{}", self.mangle_suffix());
        let mut name = mangled.clone();
        let mut n = 1;
        while self.names.contains(&name) {
            name = format!("{mangled}_{n}");
            n += 1;
        }
        self.names.insert(name.clone());
        name
    }

    pub fn add_uniform(&mut self, visibility: Visibility, ty: SlType, base: &str) -> UniformHandle {
        self.add_uniform_with_precision(visibility, ty, base, Precision::Default)
    }

    pub fn add_uniform_with_precision(
        &mut self,
        visibility: Visibility,
        ty: SlType,
        base: &str,
        precision: Precision,
    ) -> UniformHandle {
        let name = self.name_variable(&format!("u{base}"));
        self.push_uniform(name, ty, visibility, precision)
    }

    fn add_builtin_uniform(&mut self, visibility: Visibility, ty: SlType, name: &str) -> UniformHandle {
        self.reserve_name(name);
        self.push_uniform(name.to_string(), ty, visibility, Precision::Default)
    }

    fn push_uniform(
        &mut self,
        name: String,
        ty: SlType,
        visibility: Visibility,
        precision: Precision,
    ) -> UniformHandle {
        let handle = UniformHandle(self.uniforms.len());
        self.uniforms.push(UniformInfo {
            var: ShaderVar::new(name, ty, TypeModifier::Uniform).with_precision(precision),
            visibility,
        });
        handle
    }

    /// Declares a vertex-to-fragment varying and returns its name.
    pub fn add_varying(&mut self, ty: SlType, base: &str, precision: Precision) -> String {
        let name = self.name_variable(&format!("v{base}"));
        self.vertex.add_output(
            ShaderVar::new(name.clone(), ty, TypeModifier::VaryingOut).with_precision(precision),
        );
        self.fragment.add_input(
            ShaderVar::new(name.clone(), ty, TypeModifier::VaryingIn).with_precision(precision),
        );
        name
    }

    pub fn add_sampler(&mut self, access: &TextureAccess, base: &str) -> SamplerHandle {
        let uniform = self.add_uniform(Visibility::FRAGMENT, SlType::Sampler2D, base);
        let swizzle = effective_swizzle(&self.caps, access);
        let (shader_swizzle, sampler_swizzle) = if self.caps.shader_swizzling() {
            (Some(swizzle), Swizzle::RGBA)
        } else {
            (None, swizzle)
        };
        SamplerHandle {
            uniform,
            name: self.uniform_name(uniform).to_string(),
            shader_swizzle,
            sampler_swizzle,
        }
    }

    /// Declares a helper function in `stage` and returns its unique name.
    pub fn emit_function(
        &mut self,
        stage: ShaderStage,
        return_type: SlType,
        base: &str,
        args: &[ShaderVar],
        body: &str,
    ) -> String {
        let name = self.name_variable(base);
        let target = match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
        };
        target.append_function(return_type, &name, args, body);
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use effects::{GeometryProcessor, Matrix3, VertexFlags};

    use crate::pipeline::RenderTarget;

    fn builder() -> ProgramBuilder {
        let pipeline = DrawPipeline::new(
            GeometryProcessor::default_geometry(VertexFlags::default(), Matrix3::IDENTITY),
            RenderTarget::new(10, 10),
        );
        let caps = Caps::default();
        let analysis = DrawAnalysis::new(&pipeline, &caps).unwrap();
        ProgramBuilder::new(caps, analysis, DrawKind::Triangles)
    }

    #[test]
    fn names_carry_stage_and_child_path() {
        let mut b = builder();
        b.enter_stage();
        assert_eq!(b.name_variable("tmp"), "tmp_Stage0");
        b.enter_child(1);
        b.enter_child(0);
        assert_eq!(b.name_variable("tmp"), "tmp_Stage0_c1_c0");
        b.exit_child();
        b.exit_child();
        b.exit_stage();
        b.enter_stage();
        assert_eq!(b.name_variable("tmp"), "tmp_Stage1");
    }

    #[test]
    fn repeated_names_are_made_unique() {
        let mut b = builder();
        let first = b.emit_function(ShaderStage::Fragment, SlType::Float, "helper", &[], "return 1.0;\n");
        let second = b.emit_function(ShaderStage::Fragment, SlType::Float, "helper", &[], "return 2.0;\n");
        assert_ne!(first, second);
        let source = b.fragment.finalize(&[]);
        assert!(source.contains(&format!("float {first}()")));
        assert!(source.contains(&format!("float {second}()")));
    }
}
