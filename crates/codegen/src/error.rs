use effects::ClassId;

use crate::backend::ShaderStage;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("unsupported composition: {0}")]
    Unsupported(String),
    #[error("program key of {0} bytes exceeds 16-bit offsets")]
    KeyTooLarge(usize),
    #[error("{stage} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("program failed to link: {log}")]
    Link { log: String },
}

impl BuildError {
    pub(crate) fn unregistered(family: &str, class: ClassId) -> Self {
        BuildError::Unsupported(format!(
            "no {family} emitter registered for class {:#06x}",
            class.0
        ))
    }

    /// Compile and link failures come from the driver; everything else is
    /// decided before any GPU work.
    pub fn is_driver_failure(&self) -> bool {
        matches!(self, BuildError::Compile { .. } | BuildError::Link { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{family} emitter for class {:#06x} registered twice", class.0)]
    Duplicate { family: &'static str, class: ClassId },
}
