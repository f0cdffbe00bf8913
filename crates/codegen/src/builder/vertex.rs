use effects::{CoordSet, FragmentProcessor, LOCAL_COORDS_ATTR, POSITION_ATTR};

use crate::pipeline::{DrawKind, DrawPipeline, InputSource};
use crate::runtime::{BuiltinUniforms, DstCopyUniforms, TransformUniform};
use crate::types::{ShaderVar, SlType, TypeModifier};
use crate::uniform::Visibility;

use super::{ProgramBuilder, TransformedCoord};

pub(crate) const VIEW_MATRIX: &str = "uViewM";
pub(crate) const RT_ADJUSTMENT: &str = "uRTAdjustment";
pub(crate) const COLOR: &str = "uColor";
pub(crate) const COVERAGE: &str = "uCoverage";
pub(crate) const DST_COPY_SAMPLER: &str = "uDstCopySampler";
pub(crate) const DST_COPY_RECT: &str = "uDstCopyRect";
pub(crate) const RT_HEIGHT: &str = "uRTHeight";

impl ProgramBuilder {
    /// Declares attributes and program-owned uniforms, and writes
    /// `gl_Position`.
    pub(super) fn emit_vertex_preamble(&mut self, pipeline: &DrawPipeline) -> BuiltinUniforms {
        let gp = &pipeline.geometry;
        for attribute in gp.attributes() {
            self.reserve_name(attribute.name);
            self.vertex.add_input(ShaderVar::new(
                attribute.name,
                SlType::from_attrib(attribute.ty),
                TypeModifier::Attribute,
            ));
        }
        if gp.has_explicit_local_coords() {
            self.local_coords_var = LOCAL_COORDS_ATTR.name;
        }

        let view_matrix = self.add_builtin_uniform(Visibility::VERTEX, SlType::Mat3, VIEW_MATRIX);
        let rt_adjustment =
            self.add_builtin_uniform(Visibility::VERTEX, SlType::Vec4, RT_ADJUSTMENT);
        let color = (pipeline.color_input == InputSource::Uniform)
            .then(|| self.add_builtin_uniform(Visibility::FRAGMENT, SlType::Vec4, COLOR));
        let coverage = (pipeline.coverage_input == InputSource::Uniform)
            .then(|| self.add_builtin_uniform(Visibility::FRAGMENT, SlType::Float, COVERAGE));
        let dst_copy = self.analysis.dst_read.uses_copy().then(|| DstCopyUniforms {
            sampler: self.add_builtin_uniform(
                Visibility::FRAGMENT,
                SlType::Sampler2D,
                DST_COPY_SAMPLER,
            ),
            rect: self.add_builtin_uniform(Visibility::FRAGMENT, SlType::Vec4, DST_COPY_RECT),
        });
        let rt_height = self
            .analysis
            .flip_frag_coord
            .then(|| self.add_builtin_uniform(Visibility::FRAGMENT, SlType::Float, RT_HEIGHT));

        let position = POSITION_ATTR.name;
        if self.analysis.view_perspective {
            self.position_var = "pos3";
            self.reserve_name("pos3");
            self.vertex.code_append(&format!(
                "vec3 pos3 = {VIEW_MATRIX} * vec3({position}, 1.0);\n\
                 gl_Position = vec4(dot(pos3.xz, {RT_ADJUSTMENT}.xy), \
                 dot(pos3.yz, {RT_ADJUSTMENT}.zw), 0.0, pos3.z);\n"
            ));
        } else {
            self.position_var = "pos2";
            self.reserve_name("pos2");
            self.vertex.code_append(&format!(
                "vec2 pos2 = ({VIEW_MATRIX} * vec3({position}, 1.0)).xy;\n\
                 gl_Position = vec4(pos2.x * {RT_ADJUSTMENT}.x + {RT_ADJUSTMENT}.y, \
                 pos2.y * {RT_ADJUSTMENT}.z + {RT_ADJUSTMENT}.w, 0.0, 1.0);\n"
            ));
        }

        BuiltinUniforms::new(view_matrix, rt_adjustment, color, coverage, dst_copy, rt_height)
    }

    pub(super) fn input_color_expr(&self, pipeline: &DrawPipeline) -> String {
        match pipeline.color_input {
            InputSource::Uniform => COLOR.to_string(),
            InputSource::AllOnes | InputSource::Attribute => "vec4(1.0)".to_string(),
        }
    }

    pub(super) fn input_coverage_expr(&self, pipeline: &DrawPipeline) -> String {
        match pipeline.coverage_input {
            InputSource::Uniform => format!("vec4({COVERAGE})"),
            InputSource::AllOnes | InputSource::Attribute => "vec4(1.0)".to_string(),
        }
    }

    /// Vertex-side expression for the local coordinates of a vertex.
    pub fn local_coords(&self) -> &'static str {
        self.local_coords_var
    }

    /// Name of the device-space position: `pos2`, or `pos3` when the view
    /// matrix has perspective.
    pub fn position(&self) -> &'static str {
        self.position_var
    }

    /// One matrix uniform and varying per transform of the stage rooted at
    /// `fp`, in flattened pre-order.
    pub(super) fn emit_transforms(
        &mut self,
        fp: &FragmentProcessor,
    ) -> (Vec<TransformedCoord>, Vec<TransformUniform>) {
        let coord_change = self.analysis.coord_change;
        let mut coords = Vec::with_capacity(fp.num_transforms());
        let mut uniforms = Vec::with_capacity(fp.num_transforms());
        for i in 0..fp.num_transforms() {
            let transform = fp.transform(i);
            let ty = if transform.needs_perspective(&coord_change) {
                SlType::Vec3
            } else {
                SlType::Vec2
            };
            let matrix = self.add_uniform_with_precision(
                Visibility::VERTEX,
                SlType::Mat3,
                &format!("CoordTransformMatrix_{i}"),
                transform.precision,
            );
            let matrix_name = self.uniform_name(matrix).to_string();
            let varying = self.add_varying(ty, &format!("MatrixCoord_{i}"), transform.precision);

            let source = match transform.source {
                CoordSet::Local => format!("vec3({}, 1.0)", self.local_coords_var),
                CoordSet::Device if self.analysis.view_perspective => {
                    "vec3(pos3.xy / pos3.z, 1.0)".to_string()
                }
                CoordSet::Device => "vec3(pos2, 1.0)".to_string(),
            };
            let code = match ty {
                SlType::Vec3 => format!("{varying} = {matrix_name} * {source};\n"),
                _ => format!("{varying} = ({matrix_name} * {source}).xy;\n"),
            };
            self.vertex.code_append(&code);

            coords.push(TransformedCoord { name: varying, ty });
            uniforms.push(TransformUniform::new(matrix));
        }
        (coords, uniforms)
    }

    pub(super) fn emit_point_size(&mut self) {
        if self.draw_kind == DrawKind::Points {
            self.vertex.code_append("gl_PointSize = 1.0;\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use effects::{
        CoordTransform, GeometryProcessor, Matrix3, PixelConfig, SamplerParams, TextureAccess,
        TextureHandle, VertexFlags,
    };

    use crate::caps::Caps;
    use crate::pipeline::RenderTarget;
    use crate::registry::builtin_registry;

    use super::*;

    fn texture_stage(transform: CoordTransform) -> FragmentProcessor {
        let access = TextureAccess::new(
            TextureHandle::new(2, 32, 32, PixelConfig::Rgba8888),
            SamplerParams::default(),
        );
        FragmentProcessor::simple_texture_with(access, transform)
    }

    fn vertex_source(gp: GeometryProcessor, transform: CoordTransform) -> String {
        let pipeline = DrawPipeline::new(gp, RenderTarget::new(64, 64))
            .with_color_stage(texture_stage(transform));
        ProgramBuilder::build(&pipeline, DrawKind::Triangles, &Caps::desktop_gl(), builtin_registry())
            .unwrap()
            .vertex
    }

    #[test]
    fn affine_view_writes_pos2() {
        let gp = GeometryProcessor::default_geometry(VertexFlags::default(), Matrix3::scale(2.0, 2.0));
        let source = vertex_source(gp, CoordTransform::device(Matrix3::IDENTITY));
        assert!(source.contains("vec2 pos2 = (uViewM * vec3(inPosition, 1.0)).xy;"), "{source}");
        assert!(source.contains("* vec3(pos2, 1.0)).xy;"));
        assert!(!source.contains("pos3"));
    }

    #[test]
    fn perspective_view_divides_device_coords_by_w() {
        let gp = GeometryProcessor::default_geometry(
            VertexFlags::default(),
            Matrix3::perspective(0.002, 0.0),
        );
        let source = vertex_source(gp, CoordTransform::device(Matrix3::IDENTITY));
        assert!(source.contains("vec3 pos3 = uViewM * vec3(inPosition, 1.0);"), "{source}");
        assert!(source.contains("0.0, pos3.z);"));
        assert!(source.contains("(uCoordTransformMatrix_0_Stage1 * vec3(pos3.xy / pos3.z, 1.0)).xy;"));
        // an affine transform of device coords still fits in two components
        assert!(source.contains("out vec2 vMatrixCoord_0_Stage1;"));
    }

    #[test]
    fn varying_width_follows_transform_perspective() {
        let flat = GeometryProcessor::default_geometry(VertexFlags::default(), Matrix3::IDENTITY);
        let source = vertex_source(flat.clone(), CoordTransform::local(Matrix3::scale(0.5, 0.5)));
        assert!(source.contains("out vec2 vMatrixCoord_0_Stage1;"), "{source}");

        let source = vertex_source(flat, CoordTransform::local(Matrix3::perspective(0.0, 0.01)));
        assert!(source.contains("out vec3 vMatrixCoord_0_Stage1;"), "{source}");
        assert!(source.contains(
            "vMatrixCoord_0_Stage1 = uCoordTransformMatrix_0_Stage1 * vec3(inPosition, 1.0);"
        ));
    }

    #[test]
    fn local_matrix_perspective_reaches_only_implicit_local_coords() {
        let implicit = GeometryProcessor::default_geometry(VertexFlags::default(), Matrix3::IDENTITY)
            .with_local_matrix(Matrix3::perspective(0.01, 0.0));
        let source = vertex_source(implicit.clone(), CoordTransform::local(Matrix3::IDENTITY));
        assert!(source.contains("out vec3 vMatrixCoord_0_Stage1;"), "{source}");

        let source = vertex_source(implicit, CoordTransform::device(Matrix3::IDENTITY));
        assert!(source.contains("out vec2 vMatrixCoord_0_Stage1;"), "{source}");

        let flags = VertexFlags {
            local_coords: true,
            ..VertexFlags::default()
        };
        let explicit = GeometryProcessor::default_geometry(flags, Matrix3::IDENTITY)
            .with_local_matrix(Matrix3::perspective(0.01, 0.0));
        let source = vertex_source(explicit, CoordTransform::local(Matrix3::IDENTITY));
        assert!(source.contains("out vec2 vMatrixCoord_0_Stage1;"), "{source}");
        assert!(source.contains(&format!("vec3({}, 1.0)", LOCAL_COORDS_ATTR.name)));
    }
}
