//! Per-draw state upload for a linked program.
//!
//! [`ProgramEffects`] owns every emitter created while the program was built
//! and the handles of the uniforms the program declares itself. Each draw
//! walks the same processors in the same order the code was generated for,
//! skipping uniform writes whose value is already current. Textures are
//! bound on every draw.

use effects::{
    Color, CoordSet, FragmentProcessor, Matrix3, SamplerParams, Swizzle, TextureAccess,
};

use crate::builder::SamplerHandle;
use crate::emitter::{EmitterNode, GeometryEmitter, XferEmitter};
use crate::pipeline::DrawPipeline;
use crate::uniform::{ProgramDataManager, UniformHandle};

pub(crate) struct DstCopyUniforms {
    pub(crate) sampler: UniformHandle,
    pub(crate) rect: UniformHandle,
}

/// Uniforms the program declares for itself rather than for a processor.
pub(crate) struct BuiltinUniforms {
    view_matrix: UniformHandle,
    rt_adjustment: UniformHandle,
    color: Option<UniformHandle>,
    coverage: Option<UniformHandle>,
    dst_copy: Option<DstCopyUniforms>,
    rt_height: Option<UniformHandle>,
    current_view: Option<Matrix3>,
    current_rt: Option<[f32; 4]>,
    current_color: Option<Color>,
    current_coverage: Option<f32>,
    current_dst_rect: Option<[f32; 4]>,
    current_rt_height: Option<f32>,
}

impl BuiltinUniforms {
    pub(crate) fn new(
        view_matrix: UniformHandle,
        rt_adjustment: UniformHandle,
        color: Option<UniformHandle>,
        coverage: Option<UniformHandle>,
        dst_copy: Option<DstCopyUniforms>,
        rt_height: Option<UniformHandle>,
    ) -> Self {
        Self {
            view_matrix,
            rt_adjustment,
            color,
            coverage,
            dst_copy,
            rt_height,
            current_view: None,
            current_rt: None,
            current_color: None,
            current_coverage: None,
            current_dst_rect: None,
            current_rt_height: None,
        }
    }

    fn set_data(&mut self, dm: &mut ProgramDataManager<'_>, pipeline: &DrawPipeline) {
        let view = *pipeline.geometry.view_matrix();
        if self.current_view != Some(view) {
            dm.set_matrix3f(self.view_matrix, &view);
            self.current_view = Some(view);
        }

        let adjustment = pipeline.render_target.adjustment();
        if self.current_rt != Some(adjustment) {
            dm.set4fv(self.rt_adjustment, &adjustment);
            self.current_rt = Some(adjustment);
        }

        if let Some(handle) = self.color {
            if self.current_color != Some(pipeline.color) {
                dm.set4fv(handle, &pipeline.color);
                self.current_color = Some(pipeline.color);
            }
        }

        if let Some(handle) = self.coverage {
            if self.current_coverage != Some(pipeline.coverage) {
                dm.set1f(handle, pipeline.coverage);
                self.current_coverage = Some(pipeline.coverage);
            }
        }

        if let (Some(uniforms), Some(copy)) = (&self.dst_copy, pipeline.dst_copy) {
            let rect = [
                copy.offset[0],
                copy.offset[1],
                1.0 / copy.texture.width.max(1) as f32,
                1.0 / copy.texture.height.max(1) as f32,
            ];
            if self.current_dst_rect != Some(rect) {
                dm.set4fv(uniforms.rect, &rect);
                self.current_dst_rect = Some(rect);
            }
        }

        if let Some(handle) = self.rt_height {
            let height = pipeline.render_target.height as f32;
            if self.current_rt_height != Some(height) {
                dm.set1f(handle, height);
                self.current_rt_height = Some(height);
            }
        }
    }
}

/// A sampler uniform and the texture unit it was pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SamplerBinding {
    uniform: UniformHandle,
    sampler_swizzle: Swizzle,
    unit: Option<u32>,
}

impl From<&SamplerHandle> for SamplerBinding {
    fn from(handle: &SamplerHandle) -> Self {
        Self {
            uniform: handle.uniform,
            sampler_swizzle: handle.sampler_swizzle,
            unit: None,
        }
    }
}

impl SamplerBinding {
    fn assign_unit(&mut self, dm: &mut ProgramDataManager<'_>, next_unit: &mut u32) {
        dm.set1i(self.uniform, *next_unit as i32);
        tracing::trace!(unit = *next_unit, "sampler unit assigned");
        self.unit = Some(*next_unit);
        *next_unit += 1;
    }

    fn bind(&self, dm: &mut ProgramDataManager<'_>, access: &TextureAccess) {
        let Some(unit) = self.unit else {
            unreachable!("texture bound before sampler units were assigned");
        };
        dm.bind_texture(unit, &access.params, self.sampler_swizzle, &access.texture);
    }
}

/// Matrix uniform of one coordinate transform and the value it holds.
pub(crate) struct TransformUniform {
    handle: UniformHandle,
    current: Option<Matrix3>,
}

impl TransformUniform {
    pub(crate) fn new(handle: UniformHandle) -> Self {
        Self {
            handle,
            current: None,
        }
    }
}

/// Emitters and bindings of one top-level color or coverage stage.
pub(crate) struct FragmentStageEffects {
    node: EmitterNode,
    transforms: Vec<TransformUniform>,
    samplers: Vec<SamplerBinding>,
}

impl FragmentStageEffects {
    pub(crate) fn new(
        node: EmitterNode,
        transforms: Vec<TransformUniform>,
        samplers: Vec<SamplerBinding>,
    ) -> Self {
        Self {
            node,
            transforms,
            samplers,
        }
    }

    fn set_data(
        &mut self,
        dm: &mut ProgramDataManager<'_>,
        processor: &FragmentProcessor,
        coord_change: &Matrix3,
    ) {
        self.node.set_data(dm, processor);

        for (index, uniform) in self.transforms.iter_mut().enumerate() {
            let transform = processor.transform(index);
            let mut matrix = match transform.source {
                CoordSet::Local => transform.matrix.concat(coord_change),
                CoordSet::Device => transform.matrix,
            };
            if transform.reverse_y {
                matrix = matrix.flipped_y();
            }
            if uniform.current == Some(matrix) {
                tracing::trace!(index, "transform unchanged");
                continue;
            }
            dm.set_matrix3f(uniform.handle, &matrix);
            uniform.current = Some(matrix);
        }

        for (index, binding) in self.samplers.iter().enumerate() {
            binding.bind(dm, processor.texture_access(index));
        }
    }
}

/// Everything a linked program needs to accept a new draw.
pub struct ProgramEffects {
    builtins: BuiltinUniforms,
    geometry: Box<dyn GeometryEmitter>,
    geometry_samplers: Vec<SamplerBinding>,
    color: Vec<FragmentStageEffects>,
    coverage: Vec<FragmentStageEffects>,
    xfer: Box<dyn XferEmitter>,
    dst_copy_unit: Option<u32>,
}

impl ProgramEffects {
    pub(crate) fn new(
        builtins: BuiltinUniforms,
        geometry: Box<dyn GeometryEmitter>,
        geometry_samplers: Vec<SamplerBinding>,
        color: Vec<FragmentStageEffects>,
        coverage: Vec<FragmentStageEffects>,
        xfer: Box<dyn XferEmitter>,
    ) -> Self {
        Self {
            builtins,
            geometry,
            geometry_samplers,
            color,
            coverage,
            xfer,
            dst_copy_unit: None,
        }
    }

    /// Points every sampler uniform at its own texture unit, counting up from
    /// `next_unit` in generation order. The destination copy comes last.
    pub fn init_samplers(&mut self, dm: &mut ProgramDataManager<'_>, next_unit: &mut u32) {
        for binding in &mut self.geometry_samplers {
            binding.assign_unit(dm, next_unit);
        }
        for stage in self.color.iter_mut().chain(self.coverage.iter_mut()) {
            for binding in &mut stage.samplers {
                binding.assign_unit(dm, next_unit);
            }
        }
        if let Some(dst_copy) = &self.builtins.dst_copy {
            dm.set1i(dst_copy.sampler, *next_unit as i32);
            self.dst_copy_unit = Some(*next_unit);
            *next_unit += 1;
        }
    }

    /// Uploads the uniforms of `pipeline` that differ from the last draw and
    /// binds its textures.
    ///
    /// `pipeline` must have the key this program was built from.
    pub fn set_data(&mut self, dm: &mut ProgramDataManager<'_>, pipeline: &DrawPipeline) {
        debug_assert_eq!(self.color.len(), pipeline.color_stages.len());
        debug_assert_eq!(self.coverage.len(), pipeline.coverage_stages.len());

        self.builtins.set_data(dm, pipeline);

        let gp = &pipeline.geometry;
        self.geometry.set_data(dm, gp);
        for (binding, access) in self.geometry_samplers.iter().zip(gp.textures()) {
            binding.bind(dm, access);
        }

        let coord_change = gp.coord_change_matrix();
        for (stage, fp) in self.color.iter_mut().zip(&pipeline.color_stages) {
            stage.set_data(dm, fp, &coord_change);
        }
        for (stage, fp) in self.coverage.iter_mut().zip(&pipeline.coverage_stages) {
            stage.set_data(dm, fp, &coord_change);
        }

        self.xfer.set_data(dm, &pipeline.xfer);

        if let (Some(unit), Some(copy)) = (self.dst_copy_unit, pipeline.dst_copy) {
            dm.bind_texture(unit, &SamplerParams::default(), Swizzle::RGBA, &copy.texture);
        }
    }

    /// Texture units this program uses.
    pub fn sampler_count(&self) -> usize {
        self.geometry_samplers.len()
            + self
                .color
                .iter()
                .chain(&self.coverage)
                .map(|stage| stage.samplers.len())
                .sum::<usize>()
            + usize::from(self.builtins.dst_copy.is_some())
    }
}
