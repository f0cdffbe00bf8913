//! Canonical binary descriptor of everything that shapes generated code.
//!
//! ```text
//! [u32 length][u32 checksum][16-byte header][(u16 offset, u16 length) per processor][words]
//! ```
//!
//! Processors appear in the order code is generated for them: the geometry
//! processor, every color stage in pre-order, every coverage stage in
//! pre-order, then the transfer processor. For a fixed [`Caps`], two
//! pipelines with equal keys produce identical shader text.

use std::fmt;
use std::hash::{Hash, Hasher};

use bytemuck::{Pod, Zeroable};
use effects::{
    ClassId, CoordSet, CoordTransform, FragmentProcessor, Precision, TextureAccess,
    COLOR_ATTR, COVERAGE_ATTR, LOCAL_COORDS_ATTR, POSITION_ATTR,
};

use crate::builder::{alpha_remapped, effective_swizzle};
use crate::caps::Caps;
use crate::error::BuildError;
use crate::pipeline::{DrawAnalysis, DrawKind, DrawPipeline};
use crate::registry::EmitterRegistry;

const CHECKSUM_OFFSET: usize = 4;
const HEADER_OFFSET: usize = 8;
const HEADER_SIZE: usize = std::mem::size_of::<KeyHeader>();
const ENTRIES_OFFSET: usize = HEADER_OFFSET + HEADER_SIZE;

const TRANSFORM_BITS: usize = 4;
const TEXTURE_BITS: usize = 16;

/// Collects the 32-bit words one processor contributes to a key.
#[derive(Debug, Default, Clone)]
pub struct KeyBuilder {
    words: Vec<u32>,
}

impl KeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add32(&mut self, word: u32) {
        self.words.push(word);
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

/// Draw-wide fields of a key.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct KeyHeader {
    pub color_input: u8,
    pub coverage_input: u8,
    pub coverage_output: u8,
    pub dst_read: u8,
    pub explicit_local_coords: u8,
    pub draw_kind: u8,
    /// Attribute indices, `-1` when absent.
    pub position_attr: i8,
    pub local_coords_attr: i8,
    pub color_attr: i8,
    pub coverage_attr: i8,
    pub color_effect_count: u8,
    pub coverage_effect_count: u8,
    pub processor_count: u16,
    pub view_perspective: u8,
    pub flip_frag_coord: u8,
}

#[derive(Clone)]
pub struct ProgramKey {
    bytes: Vec<u8>,
}

fn too_many(what: &str, count: usize, max: usize) -> BuildError {
    BuildError::Unsupported(format!("{count} {what} exceed the key limit of {max}"))
}

fn narrow<T: TryFrom<usize>>(value: usize, what: &str, max: usize) -> Result<T, BuildError> {
    T::try_from(value).map_err(|_| too_many(what, value, max))
}

fn precision_bits(precision: Precision) -> u32 {
    match precision {
        Precision::Low => 0,
        Precision::Medium => 1,
        Precision::High => 2,
        Precision::Default => 3,
    }
}

/// Perspective, source set and precision of each transform, four bits
/// apiece, eight to a word.
fn transform_words(transforms: &[CoordTransform], analysis: &DrawAnalysis, key: &mut KeyBuilder) {
    let per_word = 32 / TRANSFORM_BITS;
    if transforms.is_empty() {
        key.add32(0);
    }
    for chunk in transforms.chunks(per_word) {
        let word = chunk.iter().enumerate().fold(0u32, |acc, (i, t)| {
            let bits = t.needs_perspective(&analysis.coord_change) as u32
                | ((t.source == CoordSet::Device) as u32) << 1
                | precision_bits(t.precision) << 2;
            acc | bits << (i * TRANSFORM_BITS)
        });
        key.add32(word);
    }
}

/// Swizzles only reach shader text when the sampler cannot apply them, so
/// they are keyed only then.
fn texture_words(textures: &[TextureAccess], caps: &Caps, key: &mut KeyBuilder) {
    let per_word = 32 / TEXTURE_BITS;
    if textures.is_empty() {
        key.add32(0);
    }
    for chunk in textures.chunks(per_word) {
        let word = chunk.iter().enumerate().fold(0u32, |acc, (i, access)| {
            let bits = if caps.shader_swizzling() {
                effective_swizzle(caps, access).key_bits()
                    | (alpha_remapped(caps, access) as u32) << 8
            } else {
                0
            };
            acc | bits << (i * TEXTURE_BITS)
        });
        key.add32(word);
    }
}

fn meta_word(
    class: ClassId,
    child_count: usize,
    transforms: usize,
    textures: usize,
) -> Result<u32, BuildError> {
    let children: u8 = narrow(child_count, "children", u8::MAX as usize)?;
    if transforms > 0xF {
        return Err(too_many("transforms on one processor", transforms, 0xF));
    }
    if textures > 0xF {
        return Err(too_many("textures on one processor", textures, 0xF));
    }
    Ok((class.0 as u32) << 16 | (children as u32) << 8 | (transforms as u32) << 4 | textures as u32)
}

struct KeyWriter {
    bytes: Vec<u8>,
    next_entry: usize,
}

impl KeyWriter {
    fn push(&mut self, words: &[u32]) -> Result<(), BuildError> {
        let offset = self.bytes.len();
        let length = words.len() * 4;
        let offset16 = u16::try_from(offset).map_err(|_| BuildError::KeyTooLarge(offset + length))?;
        let length16 = u16::try_from(length).map_err(|_| BuildError::KeyTooLarge(offset + length))?;
        let entry = ENTRIES_OFFSET + self.next_entry * 4;
        self.bytes[entry..entry + 2].copy_from_slice(&offset16.to_le_bytes());
        self.bytes[entry + 2..entry + 4].copy_from_slice(&length16.to_le_bytes());
        self.next_entry += 1;
        for word in words {
            self.bytes.extend_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }
}

/// Word-wise one-at-a-time hash.
fn checksum(bytes: &[u8]) -> u32 {
    let mut hash = 0u32;
    for chunk in bytes.chunks_exact(4) {
        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        hash = hash.wrapping_add(word);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

impl ProgramKey {
    pub fn build(
        pipeline: &DrawPipeline,
        draw_kind: DrawKind,
        caps: &Caps,
        registry: &EmitterRegistry,
    ) -> Result<ProgramKey, BuildError> {
        let analysis = DrawAnalysis::new(pipeline, caps)?;
        let gp = &pipeline.geometry;
        let attr_index = |name: &str| -> Result<i8, BuildError> {
            match gp.attribute_index(name) {
                Some(index) => narrow(index, "attributes", i8::MAX as usize),
                None => Ok(-1),
            }
        };

        let processor_count = pipeline.processor_count();
        let header = KeyHeader {
            color_input: pipeline.color_input.key_value(),
            coverage_input: pipeline.coverage_input.key_value(),
            coverage_output: analysis.coverage_output.key_value(),
            dst_read: analysis.dst_read.key_value(),
            explicit_local_coords: gp.has_explicit_local_coords() as u8,
            draw_kind: draw_kind.key_value(),
            position_attr: attr_index(POSITION_ATTR.name)?,
            local_coords_attr: attr_index(LOCAL_COORDS_ATTR.name)?,
            color_attr: attr_index(COLOR_ATTR.name)?,
            coverage_attr: attr_index(COVERAGE_ATTR.name)?,
            color_effect_count: narrow(pipeline.color_stages.len(), "color stages", 255)?,
            coverage_effect_count: narrow(pipeline.coverage_stages.len(), "coverage stages", 255)?,
            processor_count: narrow(processor_count, "processors", u16::MAX as usize)?,
            view_perspective: analysis.view_perspective as u8,
            flip_frag_coord: analysis.flip_frag_coord as u8,
        };

        let mut writer = KeyWriter {
            bytes: vec![0; ENTRIES_OFFSET + processor_count * 4],
            next_entry: 0,
        };
        writer.bytes[HEADER_OFFSET..ENTRIES_OFFSET].copy_from_slice(bytemuck::bytes_of(&header));

        let geometry = registry.geometry(gp.class_id())?;
        let mut key = KeyBuilder::new();
        key.add32(meta_word(gp.class_id(), 0, 0, gp.textures().len())?);
        transform_words(&[], &analysis, &mut key);
        texture_words(gp.textures(), caps, &mut key);
        (geometry.gen_key)(gp, caps, &mut key);
        writer.push(key.words())?;

        for stage in pipeline.fragment_stages() {
            for fp in stage.preorder() {
                writer.push(fragment_words(fp, &analysis, caps, registry)?.words())?;
            }
        }

        let xp = &pipeline.xfer;
        let xfer = registry.xfer(xp.class_id())?;
        let mut key = KeyBuilder::new();
        key.add32(meta_word(xp.class_id(), 0, 0, 0)?);
        transform_words(&[], &analysis, &mut key);
        texture_words(&[], caps, &mut key);
        (xfer.gen_key)(xp, caps, &mut key);
        writer.push(key.words())?;

        debug_assert_eq!(writer.next_entry, processor_count);
        let mut bytes = writer.bytes;
        let length = bytes.len();
        let length32 = u32::try_from(length).map_err(|_| BuildError::KeyTooLarge(length))?;
        bytes[..CHECKSUM_OFFSET].copy_from_slice(&length32.to_le_bytes());
        let sum = checksum(&bytes);
        bytes[CHECKSUM_OFFSET..HEADER_OFFSET].copy_from_slice(&sum.to_le_bytes());
        Ok(ProgramKey { bytes })
    }

    /// Total length in bytes, always a multiple of four.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn checksum(&self) -> u32 {
        self.read_u32(CHECKSUM_OFFSET)
    }

    pub fn header(&self) -> KeyHeader {
        bytemuck::pod_read_unaligned(&self.bytes[HEADER_OFFSET..ENTRIES_OFFSET])
    }

    pub fn processor_count(&self) -> usize {
        self.header().processor_count as usize
    }

    /// Words contributed by processor `index`, in key order.
    pub fn processor_key(&self, index: usize) -> &[u8] {
        assert!(index < self.processor_count(), "processor {index} out of range");
        let entry = ENTRIES_OFFSET + index * 4;
        let offset = u16::from_le_bytes([self.bytes[entry], self.bytes[entry + 1]]) as usize;
        let length = u16::from_le_bytes([self.bytes[entry + 2], self.bytes[entry + 3]]) as usize;
        &self.bytes[offset..offset + length]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ])
    }
}

fn fragment_words(
    fp: &FragmentProcessor,
    analysis: &DrawAnalysis,
    caps: &Caps,
    registry: &EmitterRegistry,
) -> Result<KeyBuilder, BuildError> {
    let entry = registry.fragment(fp.class_id())?;
    let mut key = KeyBuilder::new();
    key.add32(meta_word(
        fp.class_id(),
        fp.child_count(),
        fp.own_transforms().len(),
        fp.own_textures().len(),
    )?);
    transform_words(fp.own_transforms(), analysis, &mut key);
    texture_words(fp.own_textures(), caps, &mut key);
    (entry.gen_key)(fp, caps, &mut key);
    Ok(key)
}

impl PartialEq for ProgramKey {
    fn eq(&self, other: &Self) -> bool {
        if self.checksum() != other.checksum() || self.len() != other.len() {
            return false;
        }
        let length = self.len() & !3;
        self.bytes[..length] == other.bytes[..length]
    }
}

impl Eq for ProgramKey {}

impl Hash for ProgramKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.checksum());
    }
}

impl fmt::Debug for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramKey")
            .field("len", &self.len())
            .field("checksum", &format_args!("{:#010x}", self.checksum()))
            .field("processors", &self.processor_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::builtin_registry;
    use effects::{
        BlendMode, GeometryProcessor, InputMode, Matrix3, PixelConfig, SamplerParams,
        SurfaceOrigin, Swizzle, TextureHandle, TransferProcessor, VertexFlags, WHITE,
    };

    use crate::pipeline::{DstCopy, RenderTarget};

    fn texture(config: PixelConfig, swizzle: &str) -> TextureAccess {
        TextureAccess::new(TextureHandle::new(3, 32, 32, config), SamplerParams::default())
            .with_swizzle(Swizzle::parse(swizzle).unwrap())
    }

    fn pipeline(swizzle: &str) -> DrawPipeline {
        DrawPipeline::new(
            GeometryProcessor::default_geometry(VertexFlags::default(), Matrix3::IDENTITY),
            RenderTarget::new(64, 64),
        )
        .with_color_stage(FragmentProcessor::simple_texture(
            texture(PixelConfig::Rgba8888, swizzle),
            Matrix3::scale(0.5, 0.5),
        ))
        .with_coverage_stage(FragmentProcessor::const_color(WHITE, InputMode::ModulateA))
    }

    fn key(p: &DrawPipeline, caps: &Caps) -> ProgramKey {
        ProgramKey::build(p, DrawKind::Triangles, caps, builtin_registry()).unwrap()
    }

    #[test]
    fn header_is_sixteen_bytes() {
        assert_eq!(HEADER_SIZE, 16);
    }

    #[test]
    fn identical_pipelines_give_identical_bytes() {
        let a = key(&pipeline("rgba"), &Caps::default());
        let b = key(&pipeline("rgba"), &Caps::default());
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a, b);
        assert_eq!(a.len() % 4, 0);
        assert_eq!(a.processor_count(), 4);
        assert_eq!(a.header().color_effect_count, 1);
        assert_eq!(a.header().coverage_effect_count, 1);
        assert_eq!(a.header().position_attr, 0);
        assert_eq!(a.header().color_attr, -1);
    }

    #[test]
    fn checksum_covers_zeroed_checksum_field() {
        let k = key(&pipeline("rgba"), &Caps::default());
        let mut bytes = k.as_bytes().to_vec();
        bytes[CHECKSUM_OFFSET..HEADER_OFFSET].fill(0);
        assert_eq!(checksum(&bytes), k.checksum());
    }

    #[test]
    fn swizzles_are_keyed_only_when_applied_in_shader() {
        // gles2 cannot swizzle through sampler state
        let shader = Caps::gles2();
        assert!(shader.shader_swizzling());
        assert_ne!(key(&pipeline("rgba"), &shader), key(&pipeline("aaaa"), &shader));

        let sampler = Caps::desktop_gl();
        assert!(!sampler.shader_swizzling());
        assert_eq!(key(&pipeline("rgba"), &sampler), key(&pipeline("aaaa"), &sampler));
    }

    #[test]
    fn uniform_values_do_not_change_the_key() {
        let a = pipeline("rgba").with_color([1.0, 0.0, 0.0, 1.0]);
        let b = pipeline("rgba").with_color([0.0, 0.0, 1.0, 1.0]);
        assert_eq!(key(&a, &Caps::default()), key(&b, &Caps::default()));
    }

    #[test]
    fn processor_slices_follow_generation_order() {
        let p = pipeline("rgba").with_xfer(TransferProcessor::for_mode(BlendMode::Plus));
        let k = key(&p, &Caps::default());
        let class = |i: usize| u16::from_le_bytes([k.processor_key(i)[2], k.processor_key(i)[3]]);
        assert_eq!(class(0), ClassId::DEFAULT_GEOMETRY.0);
        assert_eq!(class(1), ClassId::SIMPLE_TEXTURE.0);
        assert_eq!(class(2), ClassId::CONST_COLOR.0);
        assert_eq!(class(3), ClassId::PORTER_DUFF.0);
    }

    #[test]
    fn oversized_keys_are_rejected() {
        let leaf = || FragmentProcessor::const_color(WHITE, InputMode::ModulateRgba);
        let inner = || FragmentProcessor::series((0..20).map(|_| leaf()).collect());
        let big = FragmentProcessor::series((0..200).map(|_| inner()).collect());
        let p = DrawPipeline::new(
            GeometryProcessor::default_geometry(VertexFlags::default(), Matrix3::IDENTITY),
            RenderTarget::new(8, 8),
        )
        .with_color_stage(big);
        let result = ProgramKey::build(&p, DrawKind::Triangles, &Caps::default(), builtin_registry());
        assert!(matches!(result, Err(BuildError::KeyTooLarge(_))));
    }

    #[test]
    fn target_origin_is_keyed_when_a_dst_copy_is_read() {
        let with_target = |origin: SurfaceOrigin| {
            let mut p = pipeline("rgba")
                .with_xfer(TransferProcessor::for_mode(BlendMode::Overlay))
                .with_dst_copy(DstCopy {
                    texture: TextureHandle::new(5, 64, 64, PixelConfig::Rgba8888),
                    offset: [0.0, 0.0],
                });
            p.render_target = RenderTarget::new(64, 64).with_origin(origin);
            p
        };
        let desktop = Caps::desktop_gl();
        let top = key(&with_target(SurfaceOrigin::TopLeft), &desktop);
        let bottom = key(&with_target(SurfaceOrigin::BottomLeft), &desktop);
        assert_ne!(top, bottom);
        assert_eq!(top.header().flip_frag_coord, 1);
        assert_eq!(bottom.header().flip_frag_coord, 0);

        // framebuffer fetch never looks at gl_FragCoord
        let gles2 = Caps::gles2();
        assert_eq!(
            key(&with_target(SurfaceOrigin::TopLeft), &gles2),
            key(&with_target(SurfaceOrigin::BottomLeft), &gles2)
        );
    }

    #[test]
    fn every_draw_kind_has_its_own_key() {
        let p = pipeline("rgba");
        let keys = [DrawKind::Triangles, DrawKind::Lines, DrawKind::Points]
            .map(|kind| ProgramKey::build(&p, kind, &Caps::default(), builtin_registry()).unwrap());
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
        assert_ne!(keys[0], keys[2]);
    }
}
