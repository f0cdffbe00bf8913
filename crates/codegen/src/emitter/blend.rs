//! GLSL for every [`BlendMode`], on premultiplied colors.

use effects::{BlendCoeff, BlendMode};

use crate::backend::ShaderStage;
use crate::builder::ProgramBuilder;
use crate::types::{ShaderVar, SlType};

/// Writes `output = mode(src, dst)`.
pub(crate) fn append_blend(
    builder: &mut ProgramBuilder,
    mode: BlendMode,
    src: &str,
    dst: &str,
    output: &str,
) {
    if let Some((src_coeff, dst_coeff)) = mode.coeffs() {
        let expr = coeff_expression(src, src_coeff, dst, dst_coeff);
        builder
            .fragment()
            .code_append(&format!("{output} = {expr};\n"));
        return;
    }

    // Advanced modes share the alpha equation.
    builder.fragment().code_append(&format!(
        "{output}.a = {src}.a + (1.0 - {src}.a) * {dst}.a;\n"
    ));
    if mode.is_non_separable() {
        append_non_separable(builder, mode, src, dst, output);
    } else {
        append_separable(builder, mode, src, dst, output);
    }
}

fn coeff_term(color: &str, coeff: BlendCoeff, src: &str, dst: &str) -> Option<String> {
    let factor = match coeff {
        BlendCoeff::Zero => return None,
        BlendCoeff::One => return Some(color.to_string()),
        BlendCoeff::SrcColor => src.to_string(),
        BlendCoeff::InvSrcColor => format!("(vec4(1.0) - {src})"),
        BlendCoeff::DstColor => dst.to_string(),
        BlendCoeff::InvDstColor => format!("(vec4(1.0) - {dst})"),
        BlendCoeff::SrcAlpha => format!("{src}.a"),
        BlendCoeff::InvSrcAlpha => format!("(1.0 - {src}.a)"),
        BlendCoeff::DstAlpha => format!("{dst}.a"),
        BlendCoeff::InvDstAlpha => format!("(1.0 - {dst}.a)"),
    };
    Some(format!("{color} * {factor}"))
}

fn coeff_expression(src: &str, src_coeff: BlendCoeff, dst: &str, dst_coeff: BlendCoeff) -> String {
    let terms = [
        coeff_term(src, src_coeff, src, dst),
        coeff_term(dst, dst_coeff, src, dst),
    ];
    let terms: Vec<String> = terms.into_iter().flatten().collect();
    if terms.is_empty() {
        "vec4(0.0)".to_string()
    } else {
        terms.join(" + ")
    }
}

fn append_separable(
    builder: &mut ProgramBuilder,
    mode: BlendMode,
    src: &str,
    dst: &str,
    output: &str,
) {
    let rgb = match mode {
        BlendMode::Overlay => {
            let f = overlay_helper(builder);
            format!(
                "vec3({f}({src}.ra, {dst}.ra), {f}({src}.ga, {dst}.ga), {f}({src}.ba, {dst}.ba)) + \
                 {dst}.rgb * (1.0 - {src}.a) + {src}.rgb * (1.0 - {dst}.a)"
            )
        }
        // Overlay with the operands swapped.
        BlendMode::HardLight => {
            let f = overlay_helper(builder);
            format!(
                "vec3({f}({dst}.ra, {src}.ra), {f}({dst}.ga, {src}.ga), {f}({dst}.ba, {src}.ba)) + \
                 {dst}.rgb * (1.0 - {src}.a) + {src}.rgb * (1.0 - {dst}.a)"
            )
        }
        BlendMode::Darken => format!(
            "min((1.0 - {src}.a) * {dst}.rgb + {src}.rgb, (1.0 - {dst}.a) * {src}.rgb + {dst}.rgb)"
        ),
        BlendMode::Lighten => format!(
            "max((1.0 - {src}.a) * {dst}.rgb + {src}.rgb, (1.0 - {dst}.a) * {src}.rgb + {dst}.rgb)"
        ),
        BlendMode::ColorDodge => {
            let f = color_dodge_helper(builder);
            per_channel(&f, src, dst)
        }
        BlendMode::ColorBurn => {
            let f = color_burn_helper(builder);
            per_channel(&f, src, dst)
        }
        BlendMode::SoftLight => {
            let f = soft_light_helper(builder);
            format!(
                "{dst}.a == 0.0 ? {src}.rgb : vec3({f}({src}.ra, {dst}.ra), \
                 {f}({src}.ga, {dst}.ga), {f}({src}.ba, {dst}.ba))"
            )
        }
        BlendMode::Difference => format!(
            "{src}.rgb + {dst}.rgb - 2.0 * min({src}.rgb * {dst}.a, {dst}.rgb * {src}.a)"
        ),
        BlendMode::Exclusion => {
            format!("{dst}.rgb + {src}.rgb - 2.0 * {dst}.rgb * {src}.rgb")
        }
        BlendMode::Multiply => format!(
            "(1.0 - {src}.a) * {dst}.rgb + (1.0 - {dst}.a) * {src}.rgb + {src}.rgb * {dst}.rgb"
        ),
        other => unreachable!("{} is not a separable advanced mode", other.name()),
    };
    builder
        .fragment()
        .code_append(&format!("{output}.rgb = {rgb};\n"));
}

fn per_channel(f: &str, src: &str, dst: &str) -> String {
    format!(
        "vec3({f}({src}.r, {src}.a, {dst}.r, {dst}.a), \
         {f}({src}.g, {src}.a, {dst}.g, {dst}.a), \
         {f}({src}.b, {src}.a, {dst}.b, {dst}.a))"
    )
}

fn component_pair_args() -> [ShaderVar; 2] {
    [
        ShaderVar::param("s", SlType::Vec2),
        ShaderVar::param("d", SlType::Vec2),
    ]
}

fn component_args() -> [ShaderVar; 4] {
    [
        ShaderVar::param("sc", SlType::Float),
        ShaderVar::param("sa", SlType::Float),
        ShaderVar::param("dc", SlType::Float),
        ShaderVar::param("da", SlType::Float),
    ]
}

fn overlay_helper(builder: &mut ProgramBuilder) -> String {
    builder.emit_function(
        ShaderStage::Fragment,
        SlType::Float,
        "blend_overlay_component",
        &component_pair_args(),
        "if (2.0 * d.x <= d.y) {\n\
         \x20   return 2.0 * s.x * d.x;\n\
         }\n\
         return s.y * d.y - 2.0 * (d.y - d.x) * (s.y - s.x);\n",
    )
}

fn color_dodge_helper(builder: &mut ProgramBuilder) -> String {
    builder.emit_function(
        ShaderStage::Fragment,
        SlType::Float,
        "color_dodge_component",
        &component_args(),
        "if (dc == 0.0) {\n\
         \x20   return sc * (1.0 - da);\n\
         }\n\
         float d = sa - sc;\n\
         if (d == 0.0) {\n\
         \x20   return sa * da + sc * (1.0 - da) + dc * (1.0 - sa);\n\
         }\n\
         d = min(da, dc * sa / d);\n\
         return d * sa + sc * (1.0 - da) + dc * (1.0 - sa);\n",
    )
}

fn color_burn_helper(builder: &mut ProgramBuilder) -> String {
    builder.emit_function(
        ShaderStage::Fragment,
        SlType::Float,
        "color_burn_component",
        &component_args(),
        "if (da == dc) {\n\
         \x20   return sa * da + sc * (1.0 - da) + dc * (1.0 - sa);\n\
         }\n\
         if (sc == 0.0) {\n\
         \x20   return dc * (1.0 - sa);\n\
         }\n\
         float d = max(0.0, da - (da - dc) * sa / sc);\n\
         return sa * d + sc * (1.0 - da) + dc * (1.0 - sa);\n",
    )
}

fn soft_light_helper(builder: &mut ProgramBuilder) -> String {
    builder.emit_function(
        ShaderStage::Fragment,
        SlType::Float,
        "soft_light_component",
        &component_pair_args(),
        "if (2.0 * s.x <= s.y) {\n\
         \x20   return d.x * d.x * (s.y - 2.0 * s.x) / d.y + (1.0 - d.y) * s.x + \
         d.x * (-s.y + 2.0 * s.x + 1.0);\n\
         }\n\
         if (4.0 * d.x <= d.y) {\n\
         \x20   float dSq = d.x * d.x;\n\
         \x20   float dCub = dSq * d.x;\n\
         \x20   float daSq = d.y * d.y;\n\
         \x20   float daCub = daSq * d.y;\n\
         \x20   return (daSq * (s.x - d.x * (3.0 * s.y - 6.0 * s.x - 1.0)) + \
         12.0 * d.y * dSq * (s.y - 2.0 * s.x) - 16.0 * dCub * (s.y - 2.0 * s.x) - \
         daCub * s.x) / daSq;\n\
         }\n\
         return d.x * (s.y - 2.0 * s.x + 1.0) + s.x - sqrt(d.y * d.x) * (s.y - 2.0 * s.x) - d.y * s.x;\n",
    )
}

/// Names of the helpers hue, saturation, color and luminosity build on.
struct NonSeparableHelpers {
    set_luminance: String,
    set_saturation: String,
}

fn non_separable_helpers(builder: &mut ProgramBuilder, with_saturation: bool) -> NonSeparableHelpers {
    let luminance = builder.emit_function(
        ShaderStage::Fragment,
        SlType::Float,
        "luminance",
        &[ShaderVar::param("color", SlType::Vec3)],
        "return dot(vec3(0.3, 0.59, 0.11), color);\n",
    );
    let set_luminance = builder.emit_function(
        ShaderStage::Fragment,
        SlType::Vec3,
        "set_luminance",
        &[
            ShaderVar::param("hueSat", SlType::Vec3),
            ShaderVar::param("alpha", SlType::Float),
            ShaderVar::param("lumColor", SlType::Vec3),
        ],
        &format!(
            "float diff = {luminance}(lumColor - hueSat);\n\
             vec3 outColor = hueSat + diff;\n\
             float outLum = {luminance}(outColor);\n\
             float minComp = min(min(outColor.r, outColor.g), outColor.b);\n\
             float maxComp = max(max(outColor.r, outColor.g), outColor.b);\n\
             if (minComp < 0.0 && outLum != minComp) {{\n\
             \x20   outColor = outLum + ((outColor - vec3(outLum)) * outLum) / (outLum - minComp);\n\
             }}\n\
             if (maxComp > alpha && maxComp != outLum) {{\n\
             \x20   outColor = outLum + ((outColor - vec3(outLum)) * (alpha - outLum)) / (maxComp - outLum);\n\
             }}\n\
             return outColor;\n"
        ),
    );
    if !with_saturation {
        return NonSeparableHelpers {
            set_luminance,
            set_saturation: String::new(),
        };
    }

    let saturation = builder.emit_function(
        ShaderStage::Fragment,
        SlType::Float,
        "saturation",
        &[ShaderVar::param("color", SlType::Vec3)],
        "return max(max(color.r, color.g), color.b) - min(min(color.r, color.g), color.b);\n",
    );
    let helper = builder.emit_function(
        ShaderStage::Fragment,
        SlType::Vec3,
        "set_saturation_helper",
        &[
            ShaderVar::param("minComp", SlType::Float),
            ShaderVar::param("midComp", SlType::Float),
            ShaderVar::param("maxComp", SlType::Float),
            ShaderVar::param("sat", SlType::Float),
        ],
        "if (minComp < maxComp) {\n\
         \x20   return vec3(0.0, sat * (midComp - minComp) / (maxComp - minComp), sat);\n\
         }\n\
         return vec3(0.0);\n",
    );
    let set_saturation = builder.emit_function(
        ShaderStage::Fragment,
        SlType::Vec3,
        "set_saturation",
        &[
            ShaderVar::param("hueLumColor", SlType::Vec3),
            ShaderVar::param("satColor", SlType::Vec3),
        ],
        &format!(
            "float sat = {saturation}(satColor);\n\
             vec3 c = hueLumColor;\n\
             if (c.r <= c.g) {{\n\
             \x20   if (c.g <= c.b) {{\n\
             \x20       c.rgb = {helper}(c.r, c.g, c.b, sat);\n\
             \x20   }} else if (c.r <= c.b) {{\n\
             \x20       c.rbg = {helper}(c.r, c.b, c.g, sat);\n\
             \x20   }} else {{\n\
             \x20       c.brg = {helper}(c.b, c.r, c.g, sat);\n\
             \x20   }}\n\
             }} else if (c.r <= c.b) {{\n\
             \x20   c.grb = {helper}(c.g, c.r, c.b, sat);\n\
             }} else if (c.g <= c.b) {{\n\
             \x20   c.gbr = {helper}(c.g, c.b, c.r, sat);\n\
             }} else {{\n\
             \x20   c.bgr = {helper}(c.b, c.g, c.r, sat);\n\
             }}\n\
             return c;\n"
        ),
    );
    NonSeparableHelpers {
        set_luminance,
        set_saturation,
    }
}

fn append_non_separable(
    builder: &mut ProgramBuilder,
    mode: BlendMode,
    src: &str,
    dst: &str,
    output: &str,
) {
    let with_saturation = matches!(mode, BlendMode::Hue | BlendMode::Saturation);
    let helpers = non_separable_helpers(builder, with_saturation);
    let set_lum = &helpers.set_luminance;
    let set_sat = &helpers.set_saturation;

    let scaled = builder.name_variable("scaledColor");
    let code = match mode {
        BlendMode::Hue => format!(
            "vec4 {scaled} = {dst} * {src}.a;\n\
             {output}.rgb = {set_lum}({set_sat}({src}.rgb * {dst}.a, {scaled}.rgb), {scaled}.a, {scaled}.rgb);\n"
        ),
        BlendMode::Saturation => format!(
            "vec4 {scaled} = {dst} * {src}.a;\n\
             {output}.rgb = {set_lum}({set_sat}({scaled}.rgb, {src}.rgb * {dst}.a), {scaled}.a, {scaled}.rgb);\n"
        ),
        BlendMode::Color => format!(
            "vec4 {scaled} = {src} * {dst}.a;\n\
             {output}.rgb = {set_lum}({scaled}.rgb, {scaled}.a, {dst}.rgb * {src}.a);\n"
        ),
        BlendMode::Luminosity => format!(
            "vec4 {scaled} = {src} * {dst}.a;\n\
             {output}.rgb = {set_lum}({dst}.rgb * {src}.a, {scaled}.a, {scaled}.rgb);\n"
        ),
        other => unreachable!("{} is not a non-separable mode", other.name()),
    };
    let fs = builder.fragment();
    fs.code_append(&code);
    fs.code_append(&format!(
        "{output}.rgb += (1.0 - {src}.a) * {dst}.rgb + (1.0 - {dst}.a) * {src}.rgb;\n"
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficient_terms_skip_zero() {
        assert_eq!(
            coeff_expression("s", BlendCoeff::One, "d", BlendCoeff::InvSrcAlpha),
            "s + d * (1.0 - s.a)"
        );
        assert_eq!(
            coeff_expression("s", BlendCoeff::Zero, "d", BlendCoeff::Zero),
            "vec4(0.0)"
        );
        assert_eq!(
            coeff_expression("s", BlendCoeff::Zero, "d", BlendCoeff::SrcColor),
            "d * s"
        );
    }
}
