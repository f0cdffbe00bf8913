use effects::{Color, FragmentKind, FragmentProcessor, SurfaceOrigin};

use crate::caps::Caps;
use crate::key::KeyBuilder;
use crate::types::SlType;
use crate::uniform::{ProgramDataManager, UniformHandle, Visibility};

use super::blend::append_blend;
use super::{EmitArgs, FragmentEmitter};

/// Uploads `value` to `handle` unless it already holds it.
fn upload4(
    dm: &mut ProgramDataManager<'_>,
    handle: Option<UniformHandle>,
    current: &mut Option<[f32; 4]>,
    value: [f32; 4],
) {
    if let Some(handle) = handle {
        if *current != Some(value) {
            dm.set4fv(handle, &value);
            *current = Some(value);
        }
    }
}

#[derive(Default)]
pub(crate) struct ConstColorEmitter {
    color: Option<UniformHandle>,
    current: Option<Color>,
}

impl ConstColorEmitter {
    pub(crate) fn create(_processor: &FragmentProcessor) -> Box<dyn FragmentEmitter> {
        Box::<Self>::default()
    }

    pub(crate) fn gen_key(processor: &FragmentProcessor, _caps: &Caps, key: &mut KeyBuilder) {
        let FragmentKind::ConstColor { mode, .. } = processor.kind() else {
            unreachable!("const color key for {:?}", processor.class_id());
        };
        key.add32(*mode as u32);
    }
}

impl FragmentEmitter for ConstColorEmitter {
    fn emit_code(&mut self, args: &mut EmitArgs<'_>) {
        let FragmentKind::ConstColor { mode, .. } = args.processor.kind() else {
            unreachable!("const color emitter for {:?}", args.processor.class_id());
        };
        let handle = args
            .builder
            .add_uniform(Visibility::FRAGMENT, SlType::Vec4, "Color");
        self.color = Some(handle);
        let color = args.builder.uniform_name(handle).to_string();
        let (input, output) = (args.input, args.output);
        let code = match mode {
            effects::InputMode::Ignore => format!("{output} = {color};\n"),
            effects::InputMode::ModulateRgba => format!("{output} = {input} * {color};\n"),
            effects::InputMode::ModulateA => format!("{output} = {input}.a * {color};\n"),
        };
        args.builder.fragment().code_append(&code);
    }

    fn set_data(&mut self, dm: &mut ProgramDataManager<'_>, processor: &FragmentProcessor) {
        if let FragmentKind::ConstColor { color, .. } = processor.kind() {
            upload4(dm, self.color, &mut self.current, *color);
        }
    }
}

pub(crate) struct SimpleTextureEmitter;

impl SimpleTextureEmitter {
    pub(crate) fn create(_processor: &FragmentProcessor) -> Box<dyn FragmentEmitter> {
        Box::new(SimpleTextureEmitter)
    }

    pub(crate) fn gen_key(_processor: &FragmentProcessor, _caps: &Caps, _key: &mut KeyBuilder) {}
}

impl FragmentEmitter for SimpleTextureEmitter {
    fn emit_code(&mut self, args: &mut EmitArgs<'_>) {
        let coords = args.coords_2d(0);
        let (input, output) = (args.input, args.output);
        let sampler = &args.samplers[0];
        let fs = args.builder.fragment();
        fs.code_append(&format!("{output} = "));
        fs.append_texture_lookup_and_modulate(Some(input), sampler, &coords);
        fs.code_append(";\n");
    }
}

#[derive(Default)]
pub(crate) struct TextureDomainEmitter {
    domain: Option<UniformHandle>,
    current: Option<[f32; 4]>,
}

impl TextureDomainEmitter {
    pub(crate) fn create(_processor: &FragmentProcessor) -> Box<dyn FragmentEmitter> {
        Box::<Self>::default()
    }

    pub(crate) fn gen_key(processor: &FragmentProcessor, _caps: &Caps, key: &mut KeyBuilder) {
        let FragmentKind::TextureDomain { mode, .. } = processor.kind() else {
            unreachable!("texture domain key for {:?}", processor.class_id());
        };
        key.add32(*mode as u32);
    }
}

impl FragmentEmitter for TextureDomainEmitter {
    fn emit_code(&mut self, args: &mut EmitArgs<'_>) {
        let FragmentKind::TextureDomain { mode, .. } = args.processor.kind() else {
            unreachable!("texture domain emitter for {:?}", args.processor.class_id());
        };
        let coords = args.coords_2d(0);
        let handle = args
            .builder
            .add_uniform(Visibility::FRAGMENT, SlType::Vec4, "TexDom");
        self.domain = Some(handle);
        let domain = args.builder.uniform_name(handle).to_string();
        let (input, output) = (args.input, args.output);

        let code = match mode {
            effects::DomainMode::Clamp => {
                let clamped = args.builder.name_variable("clampCoord");
                let lookup = args.texture_lookup(0, &clamped);
                format!(
                    "vec2 {clamped} = clamp({coords}, {domain}.xy, {domain}.zw);\n\
                     {output} = {input} * {lookup};\n"
                )
            }
            effects::DomainMode::Decal => {
                let inside = args.builder.name_variable("inDomain");
                let lookup = args.texture_lookup(0, &coords);
                format!(
                    "float {inside} = step({domain}.x, {coords}.x) * step({domain}.y, {coords}.y) * \
                     step({coords}.x, {domain}.z) * step({coords}.y, {domain}.w);\n\
                     {output} = {input} * {lookup} * {inside};\n"
                )
            }
        };
        args.builder.fragment().code_append(&code);
    }

    fn set_data(&mut self, dm: &mut ProgramDataManager<'_>, processor: &FragmentProcessor) {
        let FragmentKind::TextureDomain { domain, .. } = processor.kind() else {
            return;
        };
        let [left, top, right, bottom] = *domain;
        // Bottom-left textures store rows upside down.
        let value = match processor.texture_access(0).texture.origin {
            SurfaceOrigin::TopLeft => [left, top, right, bottom],
            SurfaceOrigin::BottomLeft => [left, 1.0 - bottom, right, 1.0 - top],
        };
        upload4(dm, self.domain, &mut self.current, value);
    }
}

#[derive(Default)]
pub(crate) struct LinearGradientEmitter {
    start: Option<UniformHandle>,
    end: Option<UniformHandle>,
    current_start: Option<Color>,
    current_end: Option<Color>,
}

impl LinearGradientEmitter {
    pub(crate) fn create(_processor: &FragmentProcessor) -> Box<dyn FragmentEmitter> {
        Box::<Self>::default()
    }

    pub(crate) fn gen_key(_processor: &FragmentProcessor, _caps: &Caps, _key: &mut KeyBuilder) {}
}

impl FragmentEmitter for LinearGradientEmitter {
    fn emit_code(&mut self, args: &mut EmitArgs<'_>) {
        let coords = args.coords_2d(0);
        let start = args
            .builder
            .add_uniform(Visibility::FRAGMENT, SlType::Vec4, "GradientStart");
        let end = args
            .builder
            .add_uniform(Visibility::FRAGMENT, SlType::Vec4, "GradientEnd");
        self.start = Some(start);
        self.end = Some(end);
        let start = args.builder.uniform_name(start).to_string();
        let end = args.builder.uniform_name(end).to_string();
        let (input, output) = (args.input, args.output);
        args.builder.fragment().code_append(&format!(
            "{output} = mix({start}, {end}, clamp({coords}.x, 0.0, 1.0)) * {input}.a;\n"
        ));
    }

    fn set_data(&mut self, dm: &mut ProgramDataManager<'_>, processor: &FragmentProcessor) {
        if let FragmentKind::LinearGradient { start, end } = processor.kind() {
            upload4(dm, self.start, &mut self.current_start, *start);
            upload4(dm, self.end, &mut self.current_end, *end);
        }
    }
}

#[derive(Default)]
pub(crate) struct ColorMatrixEmitter {
    matrix: Option<UniformHandle>,
    bias: Option<UniformHandle>,
    current: Option<[f32; 20]>,
}

impl ColorMatrixEmitter {
    pub(crate) fn create(_processor: &FragmentProcessor) -> Box<dyn FragmentEmitter> {
        Box::<Self>::default()
    }

    /// The generated code does not depend on the matrix values.
    pub(crate) fn gen_key(_processor: &FragmentProcessor, _caps: &Caps, _key: &mut KeyBuilder) {}
}

/// Splits a row-major 4x5 color matrix into a column-major `mat4` and the
/// bias column.
fn split_color_matrix(matrix: &[f32; 20]) -> ([f32; 16], [f32; 4]) {
    let mut m = [0.0; 16];
    let mut bias = [0.0; 4];
    for row in 0..4 {
        for col in 0..4 {
            m[col * 4 + row] = matrix[row * 5 + col];
        }
        bias[row] = matrix[row * 5 + 4];
    }
    (m, bias)
}

impl FragmentEmitter for ColorMatrixEmitter {
    fn emit_code(&mut self, args: &mut EmitArgs<'_>) {
        let matrix = args
            .builder
            .add_uniform(Visibility::FRAGMENT, SlType::Mat4, "ColorMatrix");
        let bias = args
            .builder
            .add_uniform(Visibility::FRAGMENT, SlType::Vec4, "ColorMatrixBias");
        self.matrix = Some(matrix);
        self.bias = Some(bias);
        let matrix = args.builder.uniform_name(matrix).to_string();
        let bias = args.builder.uniform_name(bias).to_string();
        let alpha = args.builder.name_variable("nonZeroAlpha");
        let (input, output) = (args.input, args.output);
        // The matrix applies to unpremultiplied color.
        args.builder.fragment().code_append(&format!(
            "float {alpha} = max({input}.a, 0.0001);\n\
             {output} = {matrix} * vec4({input}.rgb / {alpha}, {alpha}) + {bias};\n\
             {output} = clamp({output}, 0.0, 1.0);\n\
             {output}.rgb *= {output}.a;\n"
        ));
    }

    fn set_data(&mut self, dm: &mut ProgramDataManager<'_>, processor: &FragmentProcessor) {
        let FragmentKind::ColorMatrix { matrix } = processor.kind() else {
            return;
        };
        if self.current.as_ref() == Some(matrix) {
            return;
        }
        let (m, bias) = split_color_matrix(matrix);
        if let Some(handle) = self.matrix {
            dm.set_matrix4f(handle, &m);
        }
        if let Some(handle) = self.bias {
            dm.set4fv(handle, &bias);
        }
        self.current = Some(*matrix);
    }
}

#[derive(Default)]
pub(crate) struct DisplacementMapEmitter {
    scale: Option<UniformHandle>,
    current: Option<[f32; 2]>,
}

impl DisplacementMapEmitter {
    pub(crate) fn create(_processor: &FragmentProcessor) -> Box<dyn FragmentEmitter> {
        Box::<Self>::default()
    }

    pub(crate) fn gen_key(processor: &FragmentProcessor, _caps: &Caps, key: &mut KeyBuilder) {
        let FragmentKind::DisplacementMap {
            x_selector,
            y_selector,
            ..
        } = processor.kind()
        else {
            unreachable!("displacement key for {:?}", processor.class_id());
        };
        key.add32(*x_selector as u32 | (*y_selector as u32) << 2);
    }
}

impl FragmentEmitter for DisplacementMapEmitter {
    fn emit_code(&mut self, args: &mut EmitArgs<'_>) {
        let FragmentKind::DisplacementMap {
            x_selector,
            y_selector,
            ..
        } = args.processor.kind()
        else {
            unreachable!("displacement emitter for {:?}", args.processor.class_id());
        };
        let displacement_coords = args.coords_2d(0);
        let color_coords = args.coords_2d(1);
        let handle = args
            .builder
            .add_uniform(Visibility::FRAGMENT, SlType::Vec2, "Scale");
        self.scale = Some(handle);
        let scale = args.builder.uniform_name(handle).to_string();

        let dcolor = args.builder.name_variable("dColor");
        let ccoords = args.builder.name_variable("cCoords");
        let lookup = args.texture_lookup(0, &displacement_coords);
        let (x, y) = (x_selector.swizzle_char(), y_selector.swizzle_char());
        let (input, output) = (args.input, args.output);
        let sampler = &args.samplers[1];
        let fs = args.builder.fragment();
        fs.code_append(&format!(
            "vec4 {dcolor} = {lookup};\n\
             {dcolor}.rgb = {dcolor}.a < 0.0001 ? vec3(0.0) : {dcolor}.rgb / {dcolor}.a;\n\
             vec2 {ccoords} = {color_coords} + {scale} * ({dcolor}.{x}{y} - vec2(0.5));\n\
             {output} = "
        ));
        fs.append_texture_lookup_and_modulate(Some(input), sampler, &ccoords);
        fs.code_append(";\n");
    }

    fn set_data(&mut self, dm: &mut ProgramDataManager<'_>, processor: &FragmentProcessor) {
        let FragmentKind::DisplacementMap { scale, .. } = processor.kind() else {
            return;
        };
        let color = &processor.texture_access(1).texture;
        let sx = scale[0] / color.width.max(1) as f32;
        let sy = scale[1] / color.height.max(1) as f32;
        let value = match color.origin {
            SurfaceOrigin::TopLeft => [sx, sy],
            SurfaceOrigin::BottomLeft => [sx, -sy],
        };
        let Some(handle) = self.scale else {
            return;
        };
        if self.current != Some(value) {
            dm.set2f(handle, value[0], value[1]);
            self.current = Some(value);
        }
    }
}

pub(crate) struct ComposeEmitter;

impl ComposeEmitter {
    pub(crate) fn create(_processor: &FragmentProcessor) -> Box<dyn FragmentEmitter> {
        Box::new(ComposeEmitter)
    }

    pub(crate) fn gen_key(processor: &FragmentProcessor, _caps: &Caps, key: &mut KeyBuilder) {
        let FragmentKind::Compose { mode } = processor.kind() else {
            unreachable!("compose key for {:?}", processor.class_id());
        };
        key.add32(*mode as u32);
    }
}

impl FragmentEmitter for ComposeEmitter {
    fn emit_code(&mut self, args: &mut EmitArgs<'_>) {
        let FragmentKind::Compose { mode } = args.processor.kind() else {
            unreachable!("compose emitter for {:?}", args.processor.class_id());
        };
        let input = args.input;
        let src = args.emit_child_to_temp(0, input);
        let dst = args.emit_child_to_temp(1, input);
        append_blend(args.builder, *mode, &src, &dst, args.output);
    }
}

pub(crate) struct SeriesEmitter;

impl SeriesEmitter {
    pub(crate) fn create(_processor: &FragmentProcessor) -> Box<dyn FragmentEmitter> {
        Box::new(SeriesEmitter)
    }

    pub(crate) fn gen_key(_processor: &FragmentProcessor, _caps: &Caps, _key: &mut KeyBuilder) {}
}

impl FragmentEmitter for SeriesEmitter {
    fn emit_code(&mut self, args: &mut EmitArgs<'_>) {
        let count = args.processor.child_count();
        let output = args.output;
        let mut current = args.input.to_string();
        for index in 0..count {
            if index + 1 == count {
                args.emit_child(index, &current, output);
            } else {
                current = args.emit_child_to_temp(index, &current);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_matrix_splits_bias_column() {
        let mut matrix = [0.0; 20];
        for (i, v) in matrix.iter_mut().enumerate() {
            *v = i as f32;
        }
        let (m, bias) = split_color_matrix(&matrix);
        // row 1, column 2 lands in column 2 of the mat4
        assert_eq!(m[2 * 4 + 1], 7.0);
        assert_eq!(m[0], 0.0);
        assert_eq!(m[3], 15.0);
        assert_eq!(bias, [4.0, 9.0, 14.0, 19.0]);
    }
}
