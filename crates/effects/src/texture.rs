use std::fmt;
use std::str::FromStr;

/// Opaque identity of a GPU texture owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Bit set describing which color components a pixel config stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentMask(u8);

impl ComponentMask {
    pub const R: ComponentMask = ComponentMask(0x1);
    pub const G: ComponentMask = ComponentMask(0x2);
    pub const B: ComponentMask = ComponentMask(0x4);
    pub const A: ComponentMask = ComponentMask(0x8);
    pub const RGB: ComponentMask = ComponentMask(0x7);
    pub const RGBA: ComponentMask = ComponentMask(0xF);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: ComponentMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_alpha_only(self) -> bool {
        self == Self::A
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelConfig {
    Alpha8,
    Rgb565,
    Rgba8888,
    Bgra8888,
}

impl PixelConfig {
    pub fn component_mask(self) -> ComponentMask {
        match self {
            PixelConfig::Alpha8 => ComponentMask::A,
            PixelConfig::Rgb565 => ComponentMask::RGB,
            PixelConfig::Rgba8888 | PixelConfig::Bgra8888 => ComponentMask::RGBA,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfaceOrigin {
    #[default]
    TopLeft,
    BottomLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
    pub config: PixelConfig,
    pub origin: SurfaceOrigin,
}

impl TextureHandle {
    pub fn new(id: u32, width: u32, height: u32, config: PixelConfig) -> Self {
        Self {
            id: TextureId(id),
            width,
            height,
            config,
            origin: SurfaceOrigin::TopLeft,
        }
    }

    pub fn with_origin(mut self, origin: SurfaceOrigin) -> Self {
        self.origin = origin;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileMode {
    #[default]
    Clamp,
    Repeat,
    Mirror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Bilerp,
    MipMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerParams {
    pub tile_x: TileMode,
    pub tile_y: TileMode,
    pub filter: FilterMode,
}

impl SamplerParams {
    pub fn new(tile: TileMode, filter: FilterMode) -> Self {
        Self {
            tile_x: tile,
            tile_y: tile,
            filter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwizzleError {
    #[error("swizzle '{0}' must have exactly four components")]
    Length(String),
    #[error("swizzle '{swizzle}' contains invalid component '{component}'")]
    Component { swizzle: String, component: char },
}

/// Four-component read swizzle over `r`, `g`, `b`, `a`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle([u8; 4]);

impl Swizzle {
    pub const RGBA: Swizzle = Swizzle(*b"rgba");
    pub const AAAA: Swizzle = Swizzle(*b"aaaa");

    pub fn parse(raw: &str) -> Result<Self, SwizzleError> {
        let bytes = raw.as_bytes();
        if bytes.len() != 4 {
            return Err(SwizzleError::Length(raw.to_string()));
        }
        let mut out = [0u8; 4];
        for (slot, &byte) in out.iter_mut().zip(bytes) {
            if !matches!(byte, b'r' | b'g' | b'b' | b'a') {
                return Err(SwizzleError::Component {
                    swizzle: raw.to_string(),
                    component: byte as char,
                });
            }
            *slot = byte;
        }
        Ok(Self(out))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII `rgba` bytes are ever stored.
        std::str::from_utf8(&self.0).unwrap_or("rgba")
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::RGBA
    }

    pub fn components(&self) -> [u8; 4] {
        self.0
    }

    /// Replaces every read of `from` with a read of `to`.
    pub fn remap(&self, from: u8, to: u8) -> Swizzle {
        let mut out = self.0;
        for c in &mut out {
            if *c == from {
                *c = to;
            }
        }
        Swizzle(out)
    }

    /// Packs the swizzle into 8 bits, two bits per output channel.
    pub fn key_bits(&self) -> u32 {
        self.0.iter().enumerate().fold(0, |acc, (i, c)| {
            let bits = match c {
                b'r' => 0,
                b'g' => 1,
                b'b' => 2,
                _ => 3,
            };
            acc | (bits << (i * 2))
        })
    }
}

impl Default for Swizzle {
    fn default() -> Self {
        Self::RGBA
    }
}

impl FromStr for Swizzle {
    type Err = SwizzleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Swizzle({})", self.as_str())
    }
}

impl fmt::Display for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One texture read performed by a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureAccess {
    pub texture: TextureHandle,
    pub params: SamplerParams,
    pub swizzle: Swizzle,
}

impl TextureAccess {
    pub fn new(texture: TextureHandle, params: SamplerParams) -> Self {
        Self {
            texture,
            params,
            swizzle: Swizzle::RGBA,
        }
    }

    pub fn with_swizzle(mut self, swizzle: Swizzle) -> Self {
        self.swizzle = swizzle;
        self
    }
}
