use effects::{BlendMode, TransferProcessor, XferKind};

use crate::builder::GlslFeature;
use crate::caps::{AdvancedBlendSupport, Caps};
use crate::key::KeyBuilder;

use super::blend::append_blend;
use super::{XferEmitArgs, XferEmitter};

/// Coefficient blending is left to fixed-function hardware; the shader only
/// folds coverage into the color.
pub(crate) struct PorterDuffEmitter;

impl PorterDuffEmitter {
    pub(crate) fn create(_processor: &TransferProcessor) -> Box<dyn XferEmitter> {
        Box::new(PorterDuffEmitter)
    }

    pub(crate) fn gen_key(processor: &TransferProcessor, _caps: &Caps, key: &mut KeyBuilder) {
        key.add32(processor.mode() as u32);
    }
}

impl XferEmitter for PorterDuffEmitter {
    fn emit_code(&mut self, args: &mut XferEmitArgs<'_>) {
        let (color, coverage, output) = (args.input_color, args.input_coverage, args.output);
        args.builder
            .fragment()
            .code_append(&format!("{output} = {color} * {coverage};\n"));
    }
}

pub(crate) struct CustomXferEmitter;

impl CustomXferEmitter {
    pub(crate) fn create(_processor: &TransferProcessor) -> Box<dyn XferEmitter> {
        Box::new(CustomXferEmitter)
    }

    pub(crate) fn gen_key(processor: &TransferProcessor, caps: &Caps, key: &mut KeyBuilder) {
        let hardware = caps.advanced_blend != AdvancedBlendSupport::None;
        key.add32(processor.mode() as u32 | (hardware as u32) << 8);
    }
}

/// Layout name of `mode` in `GL_KHR_blend_equation_advanced`.
fn khr_blend_name(mode: BlendMode) -> &'static str {
    match mode {
        BlendMode::Multiply => "multiply",
        BlendMode::Overlay => "overlay",
        BlendMode::Darken => "darken",
        BlendMode::Lighten => "lighten",
        BlendMode::ColorDodge => "colordodge",
        BlendMode::ColorBurn => "colorburn",
        BlendMode::HardLight => "hardlight",
        BlendMode::SoftLight => "softlight",
        BlendMode::Difference => "difference",
        BlendMode::Exclusion => "exclusion",
        BlendMode::Hue => "hsl_hue",
        BlendMode::Saturation => "hsl_saturation",
        BlendMode::Color => "hsl_color",
        BlendMode::Luminosity => "hsl_luminosity",
        other => unreachable!("{} has no advanced blend equation", other.name()),
    }
}

impl XferEmitter for CustomXferEmitter {
    fn emit_code(&mut self, args: &mut XferEmitArgs<'_>) {
        let XferKind::Custom { mode } = *args.processor.kind() else {
            unreachable!("custom transfer emitter for {:?}", args.processor.class_id());
        };
        let (color, coverage, output) = (args.input_color, args.input_coverage, args.output);

        if args.hardware_advanced {
            let fs = args.builder.fragment();
            fs.enable_feature(GlslFeature::ADVANCED_BLEND);
            fs.add_layout_qualifier(&format!(
                "layout(blend_support_{}) out;",
                khr_blend_name(mode)
            ));
            fs.code_append(&format!("{output} = {color} * {coverage};\n"));
            return;
        }

        let Some(dst) = args.dst_color else {
            unreachable!("shader blending without a destination read");
        };
        let blended = args.builder.name_variable("blended");
        args.builder
            .fragment()
            .code_append(&format!("vec4 {blended};\n"));
        append_blend(args.builder, mode, color, dst, &blended);
        args.builder.fragment().code_append(&format!(
            "{output} = {coverage} * {blended} + (vec4(1.0) - {coverage}) * {dst};\n"
        ));
    }
}
