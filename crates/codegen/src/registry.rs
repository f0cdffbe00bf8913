//! Class id to emitter lookup.
//!
//! Every processor class contributes a name, a key function and a factory.
//! The built-in table is assembled once; callers that add their own classes
//! build a registry of their own and register into it before first use.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use effects::{ClassId, FragmentProcessor, GeometryProcessor, TransferProcessor};

use crate::caps::Caps;
use crate::emitter::fragment::{
    ColorMatrixEmitter, ComposeEmitter, ConstColorEmitter, DisplacementMapEmitter,
    LinearGradientEmitter, SeriesEmitter, SimpleTextureEmitter, TextureDomainEmitter,
};
use crate::emitter::geometry::{DefaultGeometryEmitter, DistanceFieldEmitter};
use crate::emitter::xfer::{CustomXferEmitter, PorterDuffEmitter};
use crate::emitter::{FragmentEmitter, GeometryEmitter, XferEmitter};
use crate::error::{BuildError, RegistryError};
use crate::key::KeyBuilder;

pub type FragmentKeyFn = fn(&FragmentProcessor, &Caps, &mut KeyBuilder);
pub type FragmentCreateFn = fn(&FragmentProcessor) -> Box<dyn FragmentEmitter>;
pub type GeometryKeyFn = fn(&GeometryProcessor, &Caps, &mut KeyBuilder);
pub type GeometryCreateFn = fn(&GeometryProcessor) -> Box<dyn GeometryEmitter>;
pub type XferKeyFn = fn(&TransferProcessor, &Caps, &mut KeyBuilder);
pub type XferCreateFn = fn(&TransferProcessor) -> Box<dyn XferEmitter>;

#[derive(Clone, Copy)]
pub struct EmitterEntry<K, C> {
    pub name: &'static str,
    /// Appends the words that, together with the structural key, decide the
    /// generated code.
    pub gen_key: K,
    pub create: C,
}

pub type FragmentEntry = EmitterEntry<FragmentKeyFn, FragmentCreateFn>;
pub type GeometryEntry = EmitterEntry<GeometryKeyFn, GeometryCreateFn>;
pub type XferEntry = EmitterEntry<XferKeyFn, XferCreateFn>;

const BUILTIN_FRAGMENTS: [(ClassId, FragmentEntry); 8] = [
    (
        ClassId::CONST_COLOR,
        EmitterEntry {
            name: "const-color",
            gen_key: ConstColorEmitter::gen_key,
            create: ConstColorEmitter::create,
        },
    ),
    (
        ClassId::SIMPLE_TEXTURE,
        EmitterEntry {
            name: "simple-texture",
            gen_key: SimpleTextureEmitter::gen_key,
            create: SimpleTextureEmitter::create,
        },
    ),
    (
        ClassId::TEXTURE_DOMAIN,
        EmitterEntry {
            name: "texture-domain",
            gen_key: TextureDomainEmitter::gen_key,
            create: TextureDomainEmitter::create,
        },
    ),
    (
        ClassId::LINEAR_GRADIENT,
        EmitterEntry {
            name: "linear-gradient",
            gen_key: LinearGradientEmitter::gen_key,
            create: LinearGradientEmitter::create,
        },
    ),
    (
        ClassId::COLOR_MATRIX,
        EmitterEntry {
            name: "color-matrix",
            gen_key: ColorMatrixEmitter::gen_key,
            create: ColorMatrixEmitter::create,
        },
    ),
    (
        ClassId::DISPLACEMENT_MAP,
        EmitterEntry {
            name: "displacement-map",
            gen_key: DisplacementMapEmitter::gen_key,
            create: DisplacementMapEmitter::create,
        },
    ),
    (
        ClassId::COMPOSE,
        EmitterEntry {
            name: "compose",
            gen_key: ComposeEmitter::gen_key,
            create: ComposeEmitter::create,
        },
    ),
    (
        ClassId::SERIES,
        EmitterEntry {
            name: "series",
            gen_key: SeriesEmitter::gen_key,
            create: SeriesEmitter::create,
        },
    ),
];

const BUILTIN_GEOMETRY: [(ClassId, GeometryEntry); 2] = [
    (
        ClassId::DEFAULT_GEOMETRY,
        EmitterEntry {
            name: "default",
            gen_key: DefaultGeometryEmitter::gen_key,
            create: DefaultGeometryEmitter::create,
        },
    ),
    (
        ClassId::DISTANCE_FIELD,
        EmitterEntry {
            name: "distance-field",
            gen_key: DistanceFieldEmitter::gen_key,
            create: DistanceFieldEmitter::create,
        },
    ),
];

const BUILTIN_XFERS: [(ClassId, XferEntry); 2] = [
    (
        ClassId::PORTER_DUFF,
        EmitterEntry {
            name: "porter-duff",
            gen_key: PorterDuffEmitter::gen_key,
            create: PorterDuffEmitter::create,
        },
    ),
    (
        ClassId::CUSTOM_XFER,
        EmitterEntry {
            name: "custom",
            gen_key: CustomXferEmitter::gen_key,
            create: CustomXferEmitter::create,
        },
    ),
];

fn register<E>(
    table: &mut BTreeMap<ClassId, E>,
    family: &'static str,
    class: ClassId,
    entry: E,
) -> Result<(), RegistryError> {
    if table.contains_key(&class) {
        return Err(RegistryError::Duplicate { family, class });
    }
    table.insert(class, entry);
    Ok(())
}

fn lookup<'a, E>(
    table: &'a BTreeMap<ClassId, E>,
    family: &str,
    class: ClassId,
) -> Result<&'a E, BuildError> {
    table
        .get(&class)
        .ok_or_else(|| BuildError::unregistered(family, class))
}

#[derive(Default)]
pub struct EmitterRegistry {
    fragments: BTreeMap<ClassId, FragmentEntry>,
    geometry: BTreeMap<ClassId, GeometryEntry>,
    xfers: BTreeMap<ClassId, XferEntry>,
}

impl fmt::Debug for EmitterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitterRegistry")
            .field("fragments", &self.fragments.values().map(|e| e.name).collect::<Vec<_>>())
            .field("geometry", &self.geometry.values().map(|e| e.name).collect::<Vec<_>>())
            .field("xfers", &self.xfers.values().map(|e| e.name).collect::<Vec<_>>())
            .finish()
    }
}

impl EmitterRegistry {
    /// A registry with no classes at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every processor class shipped with the `effects` crate.
    pub fn builtin() -> Self {
        Self {
            fragments: BTreeMap::from(BUILTIN_FRAGMENTS),
            geometry: BTreeMap::from(BUILTIN_GEOMETRY),
            xfers: BTreeMap::from(BUILTIN_XFERS),
        }
    }

    pub fn register_fragment(
        &mut self,
        class: ClassId,
        entry: FragmentEntry,
    ) -> Result<(), RegistryError> {
        register(&mut self.fragments, "fragment", class, entry)
    }

    pub fn register_geometry(
        &mut self,
        class: ClassId,
        entry: GeometryEntry,
    ) -> Result<(), RegistryError> {
        register(&mut self.geometry, "geometry", class, entry)
    }

    pub fn register_xfer(&mut self, class: ClassId, entry: XferEntry) -> Result<(), RegistryError> {
        register(&mut self.xfers, "transfer", class, entry)
    }

    pub fn fragment(&self, class: ClassId) -> Result<&FragmentEntry, BuildError> {
        lookup(&self.fragments, "fragment", class)
    }

    pub fn geometry(&self, class: ClassId) -> Result<&GeometryEntry, BuildError> {
        lookup(&self.geometry, "geometry", class)
    }

    pub fn xfer(&self, class: ClassId) -> Result<&XferEntry, BuildError> {
        lookup(&self.xfers, "transfer", class)
    }

    pub(crate) fn create_fragment(
        &self,
        processor: &FragmentProcessor,
    ) -> Result<Box<dyn FragmentEmitter>, BuildError> {
        Ok((self.fragment(processor.class_id())?.create)(processor))
    }

    pub(crate) fn create_geometry(
        &self,
        processor: &GeometryProcessor,
    ) -> Result<Box<dyn GeometryEmitter>, BuildError> {
        Ok((self.geometry(processor.class_id())?.create)(processor))
    }

    pub(crate) fn create_xfer(
        &self,
        processor: &TransferProcessor,
    ) -> Result<Box<dyn XferEmitter>, BuildError> {
        Ok((self.xfer(processor.class_id())?.create)(processor))
    }

    /// `(class, name)` for every registered fragment class, ordered by id.
    pub fn fragment_classes(&self) -> impl Iterator<Item = (ClassId, &'static str)> + '_ {
        self.fragments.iter().map(|(class, entry)| (*class, entry.name))
    }
}

/// Shared built-in registry, created on first use.
pub fn builtin_registry() -> &'static EmitterRegistry {
    static REGISTRY: OnceLock<EmitterRegistry> = OnceLock::new();
    REGISTRY.get_or_init(EmitterRegistry::builtin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use effects::{InputMode, WHITE};

    #[test]
    fn builtin_class_ids_are_unique() {
        let registry = EmitterRegistry::builtin();
        assert_eq!(registry.fragments.len(), BUILTIN_FRAGMENTS.len());
        assert_eq!(registry.geometry.len(), BUILTIN_GEOMETRY.len());
        assert_eq!(registry.xfers.len(), BUILTIN_XFERS.len());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = EmitterRegistry::builtin();
        let (class, entry) = BUILTIN_FRAGMENTS[0];
        assert_eq!(
            registry.register_fragment(class, entry),
            Err(RegistryError::Duplicate {
                family: "fragment",
                class
            })
        );

        let mut empty = EmitterRegistry::empty();
        assert!(empty.register_fragment(class, entry).is_ok());
        assert!(empty.fragment(class).is_ok());
    }

    #[test]
    fn unknown_classes_are_unsupported() {
        let registry = EmitterRegistry::empty();
        let fp = FragmentProcessor::const_color(WHITE, InputMode::Ignore);
        assert!(matches!(
            registry.create_fragment(&fp),
            Err(BuildError::Unsupported(_))
        ));
        assert_eq!(builtin_registry().fragment_classes().count(), 8);
    }
}
