use crate::blend::BlendMode;
use crate::ClassId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XferKind {
    /// Coefficient blending done by fixed-function hardware.
    PorterDuff { mode: BlendMode },
    /// Advanced blend mode: hardware blend equation when available, else
    /// blended in the shader against the destination color.
    Custom { mode: BlendMode },
}

/// Final stage of a draw, combining color and coverage with the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferProcessor {
    kind: XferKind,
}

impl TransferProcessor {
    /// Picks the cheapest transfer processor able to express `mode`.
    pub fn for_mode(mode: BlendMode) -> Self {
        let kind = if mode.is_coeff_mode() {
            XferKind::PorterDuff { mode }
        } else {
            XferKind::Custom { mode }
        };
        Self { kind }
    }

    pub fn src_over() -> Self {
        Self::for_mode(BlendMode::SrcOver)
    }

    pub fn kind(&self) -> &XferKind {
        &self.kind
    }

    pub fn mode(&self) -> BlendMode {
        match self.kind {
            XferKind::PorterDuff { mode } | XferKind::Custom { mode } => mode,
        }
    }

    pub fn class_id(&self) -> ClassId {
        match self.kind {
            XferKind::PorterDuff { .. } => ClassId::PORTER_DUFF,
            XferKind::Custom { .. } => ClassId::CUSTOM_XFER,
        }
    }
}

impl Default for TransferProcessor {
    fn default() -> Self {
        Self::src_over()
    }
}
