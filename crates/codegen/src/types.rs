use effects::{AttribType, Precision};

use crate::backend::ShaderStage;
use crate::caps::{Caps, GlslGeneration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlType {
    Void,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Sampler2D,
}

impl SlType {
    pub fn name(self) -> &'static str {
        match self {
            SlType::Void => "void",
            SlType::Float => "float",
            SlType::Vec2 => "vec2",
            SlType::Vec3 => "vec3",
            SlType::Vec4 => "vec4",
            SlType::Mat3 => "mat3",
            SlType::Mat4 => "mat4",
            SlType::Sampler2D => "sampler2D",
        }
    }

    pub fn from_attrib(ty: AttribType) -> Self {
        match ty {
            AttribType::Float => SlType::Float,
            AttribType::Vec2 => SlType::Vec2,
            AttribType::Vec4 | AttribType::Vec4ub => SlType::Vec4,
        }
    }
}

/// Storage qualifier of a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeModifier {
    None,
    Attribute,
    VaryingIn,
    VaryingOut,
    Uniform,
    Out,
    InOut,
}

impl TypeModifier {
    fn keyword(self, generation: GlslGeneration, stage: ShaderStage) -> &'static str {
        let in_out = generation.uses_in_out();
        match self {
            TypeModifier::None => "",
            TypeModifier::Attribute if in_out => "in ",
            TypeModifier::Attribute => "attribute ",
            TypeModifier::VaryingIn | TypeModifier::VaryingOut if !in_out => "varying ",
            TypeModifier::VaryingIn => "in ",
            TypeModifier::VaryingOut => {
                debug_assert_eq!(stage, ShaderStage::Vertex);
                "out "
            }
            TypeModifier::Uniform => "uniform ",
            TypeModifier::Out => "out ",
            TypeModifier::InOut => "inout ",
        }
    }
}

/// A named, typed shader variable and how it is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderVar {
    pub name: String,
    pub ty: SlType,
    pub modifier: TypeModifier,
    pub precision: Precision,
}

impl ShaderVar {
    pub fn new(name: impl Into<String>, ty: SlType, modifier: TypeModifier) -> Self {
        Self {
            name: name.into(),
            ty,
            modifier,
            precision: Precision::Default,
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Parameter or local form, no storage qualifier.
    pub fn param(name: impl Into<String>, ty: SlType) -> Self {
        Self::new(name, ty, TypeModifier::None)
    }

    pub fn declaration(&self, caps: &Caps, stage: ShaderStage) -> String {
        format!(
            "{}{}{} {}",
            self.modifier.keyword(caps.generation, stage),
            precision_qualifier(caps, self.precision),
            self.ty.name(),
            self.name
        )
    }
}

pub(crate) fn precision_qualifier(caps: &Caps, precision: Precision) -> &'static str {
    if !caps.precision_qualifiers {
        return "";
    }
    match precision {
        Precision::Low => "lowp ",
        Precision::Medium => "mediump ",
        Precision::High => "highp ",
        Precision::Default => "",
    }
}
