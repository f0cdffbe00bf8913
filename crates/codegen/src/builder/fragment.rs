use crate::pipeline::DstReadMode;
use crate::types::{ShaderVar, SlType, TypeModifier};

use super::vertex::{DST_COPY_RECT, DST_COPY_SAMPLER, RT_HEIGHT};
use super::{GlslFeature, ProgramBuilder, TransformedCoord};

const FRAGMENT_OUTPUT: &str = "fsColorOut";

impl ProgramBuilder {
    /// Variable receiving the final color: a declared output on generations
    /// with `in`/`out`, `gl_FragColor` otherwise.
    pub(crate) fn fragment_output(&mut self) -> &'static str {
        if let Some(name) = self.fragment_output {
            return name;
        }
        let name = if self.caps.generation.uses_in_out() {
            // Framebuffer fetch reads the previous value through the output.
            let modifier = if self.analysis.dst_read == DstReadMode::FramebufferFetch {
                TypeModifier::InOut
            } else {
                TypeModifier::Out
            };
            self.reserve_name(FRAGMENT_OUTPUT);
            self.fragment
                .add_output(ShaderVar::new(FRAGMENT_OUTPUT, SlType::Vec4, modifier));
            FRAGMENT_OUTPUT
        } else {
            "gl_FragColor"
        };
        self.fragment_output = Some(name);
        name
    }

    /// Declares a `vec4` holding the destination color and returns its name.
    ///
    /// Panics when the draw was analyzed without a destination read.
    pub fn dst_color(&mut self) -> String {
        if let Some(name) = &self.dst_color {
            return name.clone();
        }
        let source = match self.analysis.dst_read {
            DstReadMode::None => panic!("destination color requested without a read strategy"),
            DstReadMode::FramebufferFetch => {
                self.fragment.enable_feature(GlslFeature::FRAMEBUFFER_FETCH);
                if self.caps.generation.uses_in_out() {
                    self.fragment_output().to_string()
                } else {
                    "gl_LastFragData[0]".to_string()
                }
            }
            mode @ (DstReadMode::CopyTopLeft | DstReadMode::CopyBottomLeft) => {
                // gl_FragCoord counts rows from the bottom; the copy offset
                // is in the target's own rows.
                let frag_pos = if self.analysis.flip_frag_coord {
                    let name = self.name_variable("dstFragPos");
                    self.fragment.code_append(&format!(
                        "vec2 {name} = vec2(gl_FragCoord.x, {RT_HEIGHT} - gl_FragCoord.y);\n"
                    ));
                    name
                } else {
                    "gl_FragCoord.xy".to_string()
                };
                let coord = self.name_variable("dstTexCoord");
                self.fragment.code_append(&format!(
                    "vec2 {coord} = ({frag_pos} - {DST_COPY_RECT}.xy) * {DST_COPY_RECT}.zw;\n"
                ));
                if mode == DstReadMode::CopyBottomLeft {
                    self.fragment
                        .code_append(&format!("{coord}.y = 1.0 - {coord}.y;\n"));
                }
                format!(
                    "{}({DST_COPY_SAMPLER}, {coord})",
                    self.caps.generation.texture_function()
                )
            }
        };
        let name = self.name_variable("dstColor");
        self.fragment
            .code_append(&format!("vec4 {name} = {source};\n"));
        self.dst_color = Some(name.clone());
        name
    }

    /// Returns a `vec2` expression for `coord`, dividing by `z` first when
    /// the varying carries perspective.
    pub fn ensure_coords_2d(&mut self, coord: &TransformedCoord) -> String {
        if coord.ty != SlType::Vec3 {
            return coord.name.clone();
        }
        let name = self.name_variable(&format!("{}_ensure2D", coord.name));
        self.fragment.code_append(&format!(
            "vec2 {name} = {coord}.xy / {coord}.z;\n",
            coord = coord.name
        ));
        name
    }
}
