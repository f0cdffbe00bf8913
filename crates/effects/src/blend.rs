/// Blend modes understood by compose and transfer processors.
///
/// The first block are the Porter-Duff coefficient modes that fixed-function
/// blending can express; the rest are the separable and non-separable
/// advanced modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Clear,
    Src,
    Dst,
    SrcOver,
    DstOver,
    SrcIn,
    DstIn,
    SrcOut,
    DstOut,
    SrcATop,
    DstATop,
    Xor,
    Plus,
    Modulate,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Multiply,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

/// Fixed-function blend coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendCoeff {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    DstColor,
    InvDstColor,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
}

impl BlendMode {
    pub const ALL: [BlendMode; 29] = [
        BlendMode::Clear,
        BlendMode::Src,
        BlendMode::Dst,
        BlendMode::SrcOver,
        BlendMode::DstOver,
        BlendMode::SrcIn,
        BlendMode::DstIn,
        BlendMode::SrcOut,
        BlendMode::DstOut,
        BlendMode::SrcATop,
        BlendMode::DstATop,
        BlendMode::Xor,
        BlendMode::Plus,
        BlendMode::Modulate,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::Darken,
        BlendMode::Lighten,
        BlendMode::ColorDodge,
        BlendMode::ColorBurn,
        BlendMode::HardLight,
        BlendMode::SoftLight,
        BlendMode::Difference,
        BlendMode::Exclusion,
        BlendMode::Multiply,
        BlendMode::Hue,
        BlendMode::Saturation,
        BlendMode::Color,
        BlendMode::Luminosity,
    ];

    /// Source and destination coefficients for modes fixed-function blending
    /// can express.
    pub fn coeffs(self) -> Option<(BlendCoeff, BlendCoeff)> {
        use BlendCoeff::*;
        let coeffs = match self {
            BlendMode::Clear => (Zero, Zero),
            BlendMode::Src => (One, Zero),
            BlendMode::Dst => (Zero, One),
            BlendMode::SrcOver => (One, InvSrcAlpha),
            BlendMode::DstOver => (InvDstAlpha, One),
            BlendMode::SrcIn => (DstAlpha, Zero),
            BlendMode::DstIn => (Zero, SrcAlpha),
            BlendMode::SrcOut => (InvDstAlpha, Zero),
            BlendMode::DstOut => (Zero, InvSrcAlpha),
            BlendMode::SrcATop => (DstAlpha, InvSrcAlpha),
            BlendMode::DstATop => (InvDstAlpha, SrcAlpha),
            BlendMode::Xor => (InvDstAlpha, InvSrcAlpha),
            BlendMode::Plus => (One, One),
            BlendMode::Modulate => (Zero, SrcColor),
            BlendMode::Screen => (One, InvSrcColor),
            _ => return None,
        };
        Some(coeffs)
    }

    pub fn is_coeff_mode(self) -> bool {
        self.coeffs().is_some()
    }

    pub fn is_advanced(self) -> bool {
        !self.is_coeff_mode()
    }

    /// Hue, saturation, color and luminosity operate on the whole RGB triple.
    pub fn is_non_separable(self) -> bool {
        matches!(
            self,
            BlendMode::Hue | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            BlendMode::Clear => "clear",
            BlendMode::Src => "src",
            BlendMode::Dst => "dst",
            BlendMode::SrcOver => "src-over",
            BlendMode::DstOver => "dst-over",
            BlendMode::SrcIn => "src-in",
            BlendMode::DstIn => "dst-in",
            BlendMode::SrcOut => "src-out",
            BlendMode::DstOut => "dst-out",
            BlendMode::SrcATop => "src-atop",
            BlendMode::DstATop => "dst-atop",
            BlendMode::Xor => "xor",
            BlendMode::Plus => "plus",
            BlendMode::Modulate => "modulate",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
            BlendMode::ColorDodge => "color-dodge",
            BlendMode::ColorBurn => "color-burn",
            BlendMode::HardLight => "hard-light",
            BlendMode::SoftLight => "soft-light",
            BlendMode::Difference => "difference",
            BlendMode::Exclusion => "exclusion",
            BlendMode::Multiply => "multiply",
            BlendMode::Hue => "hue",
            BlendMode::Saturation => "saturation",
            BlendMode::Color => "color",
            BlendMode::Luminosity => "luminosity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|mode| mode.name() == name)
    }
}
