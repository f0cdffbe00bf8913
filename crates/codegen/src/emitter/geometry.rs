use effects::{
    GeometryKind, GeometryProcessor, Precision, COLOR_ATTR, COVERAGE_ATTR, TEXTURE_COORDS_ATTR,
};

use crate::builder::GlslFeature;
use crate::caps::Caps;
use crate::key::KeyBuilder;
use crate::pipeline::InputSource;
use crate::types::SlType;
use crate::uniform::{ProgramDataManager, UniformHandle, Visibility};

use super::{GeometryEmitArgs, GeometryEmitter};

/// Passes the per-vertex color through a varying when color comes from an
/// attribute, otherwise copies the uniform or constant input.
fn emit_color(args: &mut GeometryEmitArgs<'_>) {
    let output = args.output_color;
    if args.color_input == InputSource::Attribute {
        let varying = args
            .builder
            .add_varying(SlType::Vec4, "Color", Precision::Default);
        args.builder
            .vertex()
            .code_append(&format!("{varying} = {};\n", COLOR_ATTR.name));
        args.builder
            .fragment()
            .code_append(&format!("{output} = {varying};\n"));
    } else {
        let input = args.input_color;
        args.builder
            .fragment()
            .code_append(&format!("{output} = {input};\n"));
    }
}

pub(crate) struct DefaultGeometryEmitter;

impl DefaultGeometryEmitter {
    pub(crate) fn create(_processor: &GeometryProcessor) -> Box<dyn GeometryEmitter> {
        Box::new(DefaultGeometryEmitter)
    }

    pub(crate) fn gen_key(processor: &GeometryProcessor, _caps: &Caps, key: &mut KeyBuilder) {
        let GeometryKind::Default { flags } = processor.kind() else {
            unreachable!("default geometry key for {:?}", processor.class_id());
        };
        key.add32(flags.local_coords as u32 | (flags.color as u32) << 1 | (flags.coverage as u32) << 2);
    }
}

impl GeometryEmitter for DefaultGeometryEmitter {
    fn emit_code(&mut self, args: &mut GeometryEmitArgs<'_>) {
        emit_color(args);

        let output = args.output_coverage;
        if args.coverage_input == InputSource::Attribute {
            let varying = args
                .builder
                .add_varying(SlType::Float, "Coverage", Precision::Default);
            args.builder
                .vertex()
                .code_append(&format!("{varying} = {};\n", COVERAGE_ATTR.name));
            args.builder
                .fragment()
                .code_append(&format!("{output} = vec4({varying});\n"));
        } else {
            let input = args.input_coverage;
            args.builder
                .fragment()
                .code_append(&format!("{output} = {input};\n"));
        }
    }
}

/// Antialiased coverage from a signed distance field atlas.
#[derive(Default)]
pub(crate) struct DistanceFieldEmitter {
    atlas_size: Option<UniformHandle>,
    current: Option<[f32; 2]>,
}

impl DistanceFieldEmitter {
    pub(crate) fn create(_processor: &GeometryProcessor) -> Box<dyn GeometryEmitter> {
        Box::<Self>::default()
    }

    pub(crate) fn gen_key(processor: &GeometryProcessor, _caps: &Caps, key: &mut KeyBuilder) {
        let GeometryKind::DistanceField {
            similarity,
            color_attr,
        } = processor.kind()
        else {
            unreachable!("distance field key for {:?}", processor.class_id());
        };
        key.add32(*similarity as u32 | (*color_attr as u32) << 1);
    }
}

// Distance values are stored biased around 128/255 with 8 steps per texel.
const DISTANCE_MULTIPLIER: &str = "7.96875";
const DISTANCE_THRESHOLD: &str = "0.50196078431";
const AA_FACTOR: &str = "0.65";

impl GeometryEmitter for DistanceFieldEmitter {
    fn emit_code(&mut self, args: &mut GeometryEmitArgs<'_>) {
        let GeometryKind::DistanceField { similarity, .. } = args.processor.kind() else {
            unreachable!("distance field emitter for {:?}", args.processor.class_id());
        };
        emit_color(args);

        let handle = args
            .builder
            .add_uniform(Visibility::BOTH, SlType::Vec2, "AtlasSize");
        self.atlas_size = Some(handle);
        let atlas = args.builder.uniform_name(handle).to_string();
        let uv = args
            .builder
            .add_varying(SlType::Vec2, "TextureCoords", Precision::High);
        args.builder.vertex().code_append(&format!(
            "{uv} = {} / {atlas};\n",
            TEXTURE_COORDS_ATTR.name
        ));

        let st = args.builder.name_variable("st");
        let tex_color = args.builder.name_variable("texColor");
        let distance = args.builder.name_variable("distance");
        let afwidth = args.builder.name_variable("afwidth");
        let value = args.builder.name_variable("val");
        let lookup = args
            .builder
            .fragment()
            .texture_lookup(&args.samplers[0], &uv);

        let mut code = format!(
            "vec2 {st} = {uv} * {atlas};\n\
             vec4 {tex_color} = {lookup};\n\
             float {distance} = {DISTANCE_MULTIPLIER} * ({tex_color}.a - {DISTANCE_THRESHOLD});\n"
        );
        if *similarity {
            // Uniform scale: the gradient length is the same in every direction.
            code.push_str(&format!(
                "float {afwidth} = abs({AA_FACTOR} * length(dFdy({st})));\n"
            ));
        } else {
            let grad = args.builder.name_variable("distGrad");
            let jdx = args.builder.name_variable("Jdx");
            let jdy = args.builder.name_variable("Jdy");
            let grad_len = args.builder.name_variable("distGradLen2");
            code.push_str(&format!(
                "vec2 {grad} = vec2(dFdx({distance}), dFdy({distance}));\n\
                 float {grad_len} = dot({grad}, {grad});\n\
                 if ({grad_len} < 0.0001) {{\n\
                 \x20   {grad} = vec2(0.7071, 0.7071);\n\
                 }} else {{\n\
                 \x20   {grad} = {grad} * inversesqrt({grad_len});\n\
                 }}\n\
                 vec2 {jdx} = dFdx({st});\n\
                 vec2 {jdy} = dFdy({st});\n\
                 float {afwidth} = {AA_FACTOR} * length(vec2({grad}.x * {jdx}.x + {grad}.y * {jdy}.x, \
                 {grad}.x * {jdx}.y + {grad}.y * {jdy}.y));\n"
            ));
        }
        let input = args.input_coverage;
        let output = args.output_coverage;
        code.push_str(&format!(
            "float {value} = smoothstep(-{afwidth}, {afwidth}, {distance});\n\
             {output} = {input} * {value};\n"
        ));

        let fs = args.builder.fragment();
        fs.enable_feature(GlslFeature::STANDARD_DERIVATIVES);
        fs.code_append(&code);
    }

    fn set_data(&mut self, dm: &mut ProgramDataManager<'_>, processor: &GeometryProcessor) {
        let (Some(handle), Some(atlas)) = (self.atlas_size, processor.textures().first()) else {
            return;
        };
        let value = [atlas.texture.width as f32, atlas.texture.height as f32];
        if self.current != Some(value) {
            dm.set2f(handle, value[0], value[1]);
            self.current = Some(value);
        }
    }
}
