//! Immutable effect trees describing how a draw shades its pixels.
//!
//! A draw is described by one [`GeometryProcessor`] (vertex layout, view
//! matrix), ordered color and coverage stages made of [`FragmentProcessor`]
//! trees, and one [`TransferProcessor`] that blends the result into the
//! destination. Nothing here knows about shader text; `codegen` pairs every
//! processor class with an emitter through its registry.
//!
//! Fragment processors expose their coordinate transforms and texture accesses
//! flattened in pre-order (own items, then each child's subtree), and cache the
//! subtree totals so a parent can slice out any child's share in O(children).

mod blend;
mod fragment;
mod geometry;
mod matrix;
mod texture;
mod transform;
mod xfer;

pub use blend::{BlendCoeff, BlendMode};
pub use fragment::{
    ChannelSelector, ChildSlice, DomainMode, FragmentKind, FragmentProcessor, InputMode, Preorder,
};
pub use geometry::{
    AttribType, Attribute, GeometryKind, GeometryProcessor, VertexFlags, COLOR_ATTR,
    COVERAGE_ATTR, LOCAL_COORDS_ATTR, POSITION_ATTR, TEXTURE_COORDS_ATTR,
};
pub use matrix::Matrix3;
pub use texture::{
    ComponentMask, FilterMode, PixelConfig, SamplerParams, SurfaceOrigin, Swizzle, SwizzleError,
    TextureAccess, TextureHandle, TextureId, TileMode,
};
pub use transform::{CoordSet, CoordTransform, Precision};
pub use xfer::{TransferProcessor, XferKind};

/// Premultiplied RGBA.
pub type Color = [f32; 4];

pub const WHITE: Color = [1.0, 1.0, 1.0, 1.0];
pub const TRANSPARENT: Color = [0.0, 0.0, 0.0, 0.0];

/// Stable per-class identifier, mixed into program keys so two classes with
/// identical key words never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u16);

impl ClassId {
    pub const CONST_COLOR: ClassId = ClassId(1);
    pub const SIMPLE_TEXTURE: ClassId = ClassId(2);
    pub const TEXTURE_DOMAIN: ClassId = ClassId(3);
    pub const LINEAR_GRADIENT: ClassId = ClassId(4);
    pub const COLOR_MATRIX: ClassId = ClassId(5);
    pub const DISPLACEMENT_MAP: ClassId = ClassId(6);
    pub const COMPOSE: ClassId = ClassId(7);
    pub const SERIES: ClassId = ClassId(8);

    pub const DEFAULT_GEOMETRY: ClassId = ClassId(0x100);
    pub const DISTANCE_FIELD: ClassId = ClassId(0x101);

    pub const PORTER_DUFF: ClassId = ClassId(0x200);
    pub const CUSTOM_XFER: ClassId = ClassId(0x201);
}
