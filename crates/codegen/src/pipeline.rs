use effects::{
    Color, FragmentProcessor, GeometryKind, GeometryProcessor, Matrix3, SurfaceOrigin,
    TextureHandle, TransferProcessor, XferKind, WHITE,
};

use crate::caps::{AdvancedBlendSupport, Caps, DstReadSupport};
use crate::error::BuildError;

/// Where the color or coverage entering the first stage comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputSource {
    /// Constant `vec4(1.0)`, folded into the shader text.
    #[default]
    AllOnes,
    /// Per-vertex attribute supplied by the geometry processor.
    Attribute,
    /// Per-draw uniform.
    Uniform,
}

impl InputSource {
    pub(crate) fn key_value(self) -> u8 {
        match self {
            InputSource::AllOnes => 0,
            InputSource::Attribute => 1,
            InputSource::Uniform => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawKind {
    #[default]
    Triangles,
    Lines,
    /// Vertex stage writes `gl_PointSize`.
    Points,
}

impl DrawKind {
    pub(crate) fn key_value(self) -> u8 {
        match self {
            DrawKind::Triangles => 0,
            DrawKind::Lines => 1,
            DrawKind::Points => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub origin: SurfaceOrigin,
}

impl RenderTarget {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            origin: SurfaceOrigin::TopLeft,
        }
    }

    pub fn with_origin(mut self, origin: SurfaceOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// `(sx, tx, sy, ty)` mapping device pixels to normalized device
    /// coordinates, flipping y for top-left targets.
    pub fn adjustment(&self) -> [f32; 4] {
        let sx = 2.0 / self.width.max(1) as f32;
        let sy = 2.0 / self.height.max(1) as f32;
        match self.origin {
            SurfaceOrigin::TopLeft => [sx, -1.0, -sy, 1.0],
            SurfaceOrigin::BottomLeft => [sx, -1.0, sy, -1.0],
        }
    }
}

/// Copy of the destination pixels under a draw, used for shader blending
/// when the fragment stage cannot read the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DstCopy {
    pub texture: TextureHandle,
    /// Device-space position of the copy's top-left texel.
    pub offset: [f32; 2],
}

/// Everything one draw needs shaded.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawPipeline {
    pub geometry: GeometryProcessor,
    pub color_stages: Vec<FragmentProcessor>,
    pub coverage_stages: Vec<FragmentProcessor>,
    pub xfer: TransferProcessor,
    pub color_input: InputSource,
    pub coverage_input: InputSource,
    pub color: Color,
    pub coverage: f32,
    pub render_target: RenderTarget,
    pub dst_copy: Option<DstCopy>,
}

impl DrawPipeline {
    pub fn new(geometry: GeometryProcessor, render_target: RenderTarget) -> Self {
        Self {
            geometry,
            color_stages: Vec::new(),
            coverage_stages: Vec::new(),
            xfer: TransferProcessor::src_over(),
            color_input: InputSource::AllOnes,
            coverage_input: InputSource::AllOnes,
            color: WHITE,
            coverage: 1.0,
            render_target,
            dst_copy: None,
        }
    }

    pub fn with_color_stage(mut self, stage: FragmentProcessor) -> Self {
        self.color_stages.push(stage);
        self
    }

    pub fn with_coverage_stage(mut self, stage: FragmentProcessor) -> Self {
        self.coverage_stages.push(stage);
        self
    }

    pub fn with_xfer(mut self, xfer: TransferProcessor) -> Self {
        self.xfer = xfer;
        self
    }

    /// Uniform input color.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self.color_input = InputSource::Uniform;
        self
    }

    pub fn with_color_input(mut self, source: InputSource) -> Self {
        self.color_input = source;
        self
    }

    /// Uniform input coverage.
    pub fn with_coverage(mut self, coverage: f32) -> Self {
        self.coverage = coverage;
        self.coverage_input = InputSource::Uniform;
        self
    }

    pub fn with_coverage_input(mut self, source: InputSource) -> Self {
        self.coverage_input = source;
        self
    }

    pub fn with_dst_copy(mut self, dst_copy: DstCopy) -> Self {
        self.dst_copy = Some(dst_copy);
        self
    }

    /// Geometry processor, every fragment processor node, and the transfer
    /// processor.
    pub fn processor_count(&self) -> usize {
        2 + self
            .fragment_stages()
            .map(FragmentProcessor::tree_size)
            .sum::<usize>()
    }

    /// Color stages followed by coverage stages.
    pub fn fragment_stages(&self) -> impl Iterator<Item = &FragmentProcessor> {
        self.color_stages.iter().chain(self.coverage_stages.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstReadMode {
    None,
    FramebufferFetch,
    CopyTopLeft,
    CopyBottomLeft,
}

impl DstReadMode {
    pub(crate) fn key_value(self) -> u8 {
        match self {
            DstReadMode::None => 0,
            DstReadMode::FramebufferFetch => 1,
            DstReadMode::CopyTopLeft => 2,
            DstReadMode::CopyBottomLeft => 3,
        }
    }

    pub fn uses_copy(self) -> bool {
        matches!(self, DstReadMode::CopyTopLeft | DstReadMode::CopyBottomLeft)
    }
}

/// How the transfer processor's coverage reaches the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageOutput {
    /// Color is multiplied by coverage and blended by hardware.
    Modulate,
    /// The shader mixes its blended color with the destination by coverage.
    CombineWithDst,
}

impl CoverageOutput {
    pub(crate) fn key_value(self) -> u8 {
        match self {
            CoverageOutput::Modulate => 0,
            CoverageOutput::CombineWithDst => 1,
        }
    }
}

/// Capability-dependent decisions shared by key building and code
/// generation, so both always agree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawAnalysis {
    pub dst_read: DstReadMode,
    pub coverage_output: CoverageOutput,
    pub hardware_advanced_blend: bool,
    pub view_perspective: bool,
    /// A destination copy is read on a top-left target, so fragment rows
    /// are converted with the target height before sampling it.
    pub flip_frag_coord: bool,
    /// Matrix local-coordinate transforms are pre-multiplied with.
    pub coord_change: Matrix3,
}

impl DrawAnalysis {
    pub fn new(pipeline: &DrawPipeline, caps: &Caps) -> Result<Self, BuildError> {
        let gp = &pipeline.geometry;

        if pipeline.color_input == InputSource::Attribute && !gp.has_color_attribute() {
            return Err(BuildError::Unsupported(
                "color input is per-vertex but the geometry has no color attribute".into(),
            ));
        }
        if pipeline.coverage_input == InputSource::Attribute && !gp.has_coverage_attribute() {
            return Err(BuildError::Unsupported(
                "coverage input is per-vertex but the geometry has no coverage attribute".into(),
            ));
        }
        if matches!(gp.kind(), GeometryKind::DistanceField { .. }) && !caps.standard_derivatives
        {
            return Err(BuildError::Unsupported(
                "distance field coverage needs standard derivatives".into(),
            ));
        }

        let attributes = gp.attributes().len();
        if attributes > caps.max_vertex_attributes as usize {
            return Err(BuildError::Unsupported(format!(
                "{attributes} vertex attributes exceed the limit of {}",
                caps.max_vertex_attributes
            )));
        }
        let varyings = varying_count(pipeline);
        if varyings > caps.max_varying_vectors as usize {
            return Err(BuildError::Unsupported(format!(
                "{varyings} varyings exceed the limit of {}",
                caps.max_varying_vectors
            )));
        }

        let mut dst_read = DstReadMode::None;
        let mut coverage_output = CoverageOutput::Modulate;
        let mut hardware_advanced_blend = false;
        if let XferKind::Custom { mode } = pipeline.xfer.kind() {
            if caps.advanced_blend != AdvancedBlendSupport::None {
                hardware_advanced_blend = true;
            } else {
                coverage_output = CoverageOutput::CombineWithDst;
                dst_read = match (caps.dst_read, pipeline.dst_copy) {
                    (DstReadSupport::FramebufferFetch, _) => DstReadMode::FramebufferFetch,
                    (DstReadSupport::TextureCopy, Some(copy)) => match copy.texture.origin {
                        SurfaceOrigin::TopLeft => DstReadMode::CopyTopLeft,
                        SurfaceOrigin::BottomLeft => DstReadMode::CopyBottomLeft,
                    },
                    (DstReadSupport::TextureCopy, None) => {
                        return Err(BuildError::Unsupported(format!(
                            "blend mode {} needs a destination copy",
                            mode.name()
                        )))
                    }
                    (DstReadSupport::None, _) => {
                        return Err(BuildError::Unsupported(format!(
                            "blend mode {} needs advanced blending or a destination read",
                            mode.name()
                        )))
                    }
                };
            }
        }

        Ok(Self {
            dst_read,
            coverage_output,
            hardware_advanced_blend,
            flip_frag_coord: dst_read.uses_copy()
                && pipeline.render_target.origin == SurfaceOrigin::TopLeft,
            view_perspective: gp.view_matrix().has_perspective(),
            coord_change: gp.coord_change_matrix(),
        })
    }
}

fn varying_count(pipeline: &DrawPipeline) -> usize {
    let gp = &pipeline.geometry;
    let mut count = pipeline
        .fragment_stages()
        .map(FragmentProcessor::num_transforms)
        .sum::<usize>();
    if pipeline.color_input == InputSource::Attribute {
        count += 1;
    }
    if pipeline.coverage_input == InputSource::Attribute {
        count += 1;
    }
    if matches!(gp.kind(), GeometryKind::DistanceField { .. }) {
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use effects::{BlendMode, PixelConfig, VertexFlags};

    fn pipeline() -> DrawPipeline {
        DrawPipeline::new(
            GeometryProcessor::default_geometry(VertexFlags::default(), Matrix3::IDENTITY),
            RenderTarget::new(100, 50),
        )
    }

    #[test]
    fn advanced_blend_prefers_hardware() {
        let p = pipeline().with_xfer(TransferProcessor::for_mode(BlendMode::Multiply));
        let analysis = DrawAnalysis::new(&p, &Caps::gles3()).unwrap();
        assert!(analysis.hardware_advanced_blend);
        assert_eq!(analysis.dst_read, DstReadMode::None);
        assert_eq!(analysis.coverage_output, CoverageOutput::Modulate);

        let analysis = DrawAnalysis::new(&p, &Caps::gles2()).unwrap();
        assert_eq!(analysis.dst_read, DstReadMode::FramebufferFetch);
        assert_eq!(analysis.coverage_output, CoverageOutput::CombineWithDst);
    }

    #[test]
    fn dst_copy_required_without_fetch() {
        let p = pipeline().with_xfer(TransferProcessor::for_mode(BlendMode::Overlay));
        assert!(matches!(
            DrawAnalysis::new(&p, &Caps::desktop_gl()),
            Err(BuildError::Unsupported(_))
        ));

        let copy = TextureHandle::new(9, 100, 50, PixelConfig::Rgba8888)
            .with_origin(SurfaceOrigin::BottomLeft);
        let p = p.with_dst_copy(DstCopy {
            texture: copy,
            offset: [0.0, 0.0],
        });
        let analysis = DrawAnalysis::new(&p, &Caps::desktop_gl()).unwrap();
        assert_eq!(analysis.dst_read, DstReadMode::CopyBottomLeft);
        assert!(analysis.flip_frag_coord);

        let mut bottom_left = p.clone();
        bottom_left.render_target = RenderTarget::new(100, 50).with_origin(SurfaceOrigin::BottomLeft);
        let analysis = DrawAnalysis::new(&bottom_left, &Caps::desktop_gl()).unwrap();
        assert!(!analysis.flip_frag_coord);

        let mut no_reads = Caps::desktop_gl();
        no_reads.dst_read = DstReadSupport::None;
        assert!(DrawAnalysis::new(&p, &no_reads).is_err());
    }

    #[test]
    fn attribute_inputs_need_attributes() {
        let p = pipeline().with_color_input(InputSource::Attribute);
        assert!(DrawAnalysis::new(&p, &Caps::default()).is_err());
    }

    #[test]
    fn rt_adjustment_flips_top_left_targets() {
        let adjust = RenderTarget::new(100, 50).adjustment();
        assert_eq!(adjust, [0.02, -1.0, -0.04, 1.0]);
        let adjust = RenderTarget::new(100, 50)
            .with_origin(SurfaceOrigin::BottomLeft)
            .adjustment();
        assert_eq!(adjust, [0.02, -1.0, 0.04, -1.0]);
    }
}
