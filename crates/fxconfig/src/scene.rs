use codegen::{DrawKind, DrawPipeline, DstCopy, InputSource, RenderTarget};
use effects::{
    BlendMode, ChannelSelector, Color, CoordSet, CoordTransform, DomainMode, FilterMode,
    FragmentProcessor, GeometryProcessor, InputMode, Matrix3, PixelConfig, Precision,
    SamplerParams, SurfaceOrigin, Swizzle, TextureAccess, TextureHandle, TileMode,
    TransferProcessor, VertexFlags, WHITE,
};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, FxConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PixelFormatSpec {
    Alpha8,
    Rgb565,
    #[default]
    Rgba8888,
    Bgra8888,
}

impl From<PixelFormatSpec> for PixelConfig {
    fn from(value: PixelFormatSpec) -> Self {
        match value {
            PixelFormatSpec::Alpha8 => PixelConfig::Alpha8,
            PixelFormatSpec::Rgb565 => PixelConfig::Rgb565,
            PixelFormatSpec::Rgba8888 => PixelConfig::Rgba8888,
            PixelFormatSpec::Bgra8888 => PixelConfig::Bgra8888,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginSpec {
    #[default]
    TopLeft,
    BottomLeft,
}

impl From<OriginSpec> for SurfaceOrigin {
    fn from(value: OriginSpec) -> Self {
        match value {
            OriginSpec::TopLeft => SurfaceOrigin::TopLeft,
            OriginSpec::BottomLeft => SurfaceOrigin::BottomLeft,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextureSpec {
    pub name: String,
    pub id: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub format: PixelFormatSpec,
    #[serde(default)]
    pub origin: OriginSpec,
}

impl TextureSpec {
    fn handle(&self) -> TextureHandle {
        TextureHandle::new(self.id, self.width, self.height, self.format.into())
            .with_origin(self.origin.into())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimitiveSpec {
    #[default]
    Triangles,
    Lines,
    Points,
}

impl From<PrimitiveSpec> for DrawKind {
    fn from(value: PrimitiveSpec) -> Self {
        match value {
            PrimitiveSpec::Triangles => DrawKind::Triangles,
            PrimitiveSpec::Lines => DrawKind::Lines,
            PrimitiveSpec::Points => DrawKind::Points,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputSpec {
    #[default]
    AllOnes,
    Attribute,
    Uniform,
}

impl From<InputSpec> for InputSource {
    fn from(value: InputSpec) -> Self {
        match value {
            InputSpec::AllOnes => InputSource::AllOnes,
            InputSpec::Attribute => InputSource::Attribute,
            InputSpec::Uniform => InputSource::Uniform,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetSpec {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub origin: OriginSpec,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GeometrySpec {
    Default {
        #[serde(default)]
        local_coords: bool,
        #[serde(default)]
        color: bool,
        #[serde(default)]
        coverage: bool,
    },
    DistanceField {
        atlas: String,
        #[serde(default)]
        similarity: bool,
        #[serde(default)]
        color: bool,
    },
}

impl Default for GeometrySpec {
    fn default() -> Self {
        GeometrySpec::Default {
            local_coords: false,
            color: false,
            coverage: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DstCopySpec {
    pub texture: String,
    #[serde(default)]
    pub offset: [f32; 2],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoordsSpec {
    #[default]
    Local,
    Device,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrecisionSpec {
    Low,
    Medium,
    High,
    #[default]
    Default,
}

impl From<PrecisionSpec> for Precision {
    fn from(value: PrecisionSpec) -> Self {
        match value {
            PrecisionSpec::Low => Precision::Low,
            PrecisionSpec::Medium => Precision::Medium,
            PrecisionSpec::High => Precision::High,
            PrecisionSpec::Default => Precision::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TileSpec {
    #[default]
    Clamp,
    Repeat,
    Mirror,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterSpec {
    #[default]
    Nearest,
    Bilerp,
    Mipmap,
}

/// One texture read: which texture, how it is sampled, and the transform
/// producing its coordinates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SampleSpec {
    pub texture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<Vec<f32>>,
    #[serde(default)]
    pub coords: CoordsSpec,
    #[serde(default)]
    pub reverse_y: bool,
    #[serde(default)]
    pub precision: PrecisionSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swizzle: Option<String>,
    #[serde(default)]
    pub tile: TileSpec,
    #[serde(default)]
    pub filter: FilterSpec,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputModeSpec {
    #[default]
    Ignore,
    ModulateRgba,
    ModulateA,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomainModeSpec {
    #[default]
    Clamp,
    Decal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelSpec {
    R,
    G,
    B,
    A,
}

impl From<ChannelSpec> for ChannelSelector {
    fn from(value: ChannelSpec) -> Self {
        match value {
            ChannelSpec::R => ChannelSelector::R,
            ChannelSpec::G => ChannelSelector::G,
            ChannelSpec::B => ChannelSelector::B,
            ChannelSpec::A => ChannelSelector::A,
        }
    }
}

/// A fragment processor table. Children nest as inline tables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProcessorSpec {
    ConstColor {
        color: Color,
        #[serde(default)]
        mode: InputModeSpec,
    },
    Texture(SampleSpec),
    TextureDomain {
        sample: SampleSpec,
        domain: [f32; 4],
        #[serde(default)]
        mode: DomainModeSpec,
    },
    LinearGradient {
        start: Color,
        end: Color,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        matrix: Option<Vec<f32>>,
    },
    ColorMatrix {
        matrix: Vec<f32>,
    },
    DisplacementMap {
        x_channel: ChannelSpec,
        y_channel: ChannelSpec,
        scale: [f32; 2],
        displacement: SampleSpec,
        color: SampleSpec,
    },
    Compose {
        mode: String,
        src: Box<ProcessorSpec>,
        dst: Box<ProcessorSpec>,
    },
    Series {
        children: Vec<ProcessorSpec>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DrawSpec {
    #[serde(default)]
    pub primitive: PrimitiveSpec,
    pub target: TargetSpec,
    #[serde(default)]
    pub geometry: GeometrySpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_matrix: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_matrix: Option<Vec<f32>>,
    #[serde(default)]
    pub color_input: InputSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniform_color: Option<Color>,
    #[serde(default)]
    pub coverage_input: InputSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniform_coverage: Option<f32>,
    #[serde(default = "default_blend")]
    pub blend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_copy: Option<DstCopySpec>,
    #[serde(default)]
    pub color: Vec<ProcessorSpec>,
    #[serde(default)]
    pub coverage: Vec<ProcessorSpec>,
}

fn default_blend() -> String {
    BlendMode::SrcOver.name().to_string()
}

fn matrix(field: &str, values: Option<&[f32]>) -> Result<Matrix3, ConfigError> {
    let Some(values) = values else {
        return Ok(Matrix3::IDENTITY);
    };
    let row_major: [f32; 9] = values.try_into().map_err(|_| {
        ConfigError::Invalid(format!(
            "{field} must have 9 row-major entries, found {}",
            values.len()
        ))
    })?;
    Ok(Matrix3::from_row_major(row_major))
}

fn blend_mode(name: &str) -> Result<BlendMode, ConfigError> {
    BlendMode::from_name(name)
        .ok_or_else(|| ConfigError::Invalid(format!("unknown blend mode '{name}'")))
}

/// Resolves texture names while materializing a draw.
struct Materializer<'a> {
    config: &'a FxConfig,
}

impl Materializer<'_> {
    fn texture(&self, name: &str) -> Result<TextureHandle, ConfigError> {
        self.config
            .textures
            .iter()
            .find(|t| t.name == name)
            .map(TextureSpec::handle)
            .ok_or_else(|| ConfigError::Invalid(format!("unknown texture '{name}'")))
    }

    fn sample(
        &self,
        path: &str,
        spec: &SampleSpec,
    ) -> Result<(TextureAccess, CoordTransform), ConfigError> {
        let texture = self.texture(&spec.texture)?;
        let tile = match spec.tile {
            TileSpec::Clamp => TileMode::Clamp,
            TileSpec::Repeat => TileMode::Repeat,
            TileSpec::Mirror => TileMode::Mirror,
        };
        let filter = match spec.filter {
            FilterSpec::Nearest => FilterMode::Nearest,
            FilterSpec::Bilerp => FilterMode::Bilerp,
            FilterSpec::Mipmap => FilterMode::MipMap,
        };
        let mut access = TextureAccess::new(texture, SamplerParams::new(tile, filter));
        if let Some(raw) = &spec.swizzle {
            let swizzle = Swizzle::parse(raw)
                .map_err(|err| ConfigError::Invalid(format!("{path}: {err}")))?;
            access = access.with_swizzle(swizzle);
        }

        let source = match spec.coords {
            CoordsSpec::Local => CoordSet::Local,
            CoordsSpec::Device => CoordSet::Device,
        };
        let transform = CoordTransform::new(
            source,
            matrix(&format!("{path}.matrix"), spec.matrix.as_deref())?,
        )
        .with_reverse_y(spec.reverse_y)
        .with_precision(spec.precision.into());
        Ok((access, transform))
    }

    fn processor(&self, path: &str, spec: &ProcessorSpec) -> Result<FragmentProcessor, ConfigError> {
        let fp = match spec {
            ProcessorSpec::ConstColor { color, mode } => {
                let mode = match mode {
                    InputModeSpec::Ignore => InputMode::Ignore,
                    InputModeSpec::ModulateRgba => InputMode::ModulateRgba,
                    InputModeSpec::ModulateA => InputMode::ModulateA,
                };
                FragmentProcessor::const_color(*color, mode)
            }
            ProcessorSpec::Texture(sample) => {
                let (access, transform) = self.sample(path, sample)?;
                FragmentProcessor::simple_texture_with(access, transform)
            }
            ProcessorSpec::TextureDomain {
                sample,
                domain,
                mode,
            } => {
                let (access, transform) = self.sample(&format!("{path}.sample"), sample)?;
                let mode = match mode {
                    DomainModeSpec::Clamp => DomainMode::Clamp,
                    DomainModeSpec::Decal => DomainMode::Decal,
                };
                FragmentProcessor::texture_domain(access, transform, *domain, mode)
            }
            ProcessorSpec::LinearGradient { start, end, matrix: m } => {
                let m = matrix(&format!("{path}.matrix"), m.as_deref())?;
                FragmentProcessor::linear_gradient(*start, *end, m)
            }
            ProcessorSpec::ColorMatrix { matrix: values } => {
                let values: [f32; 20] = values.as_slice().try_into().map_err(|_| {
                    ConfigError::Invalid(format!(
                        "{path}.matrix must have 20 entries, found {}",
                        values.len()
                    ))
                })?;
                FragmentProcessor::color_matrix(values)
            }
            ProcessorSpec::DisplacementMap {
                x_channel,
                y_channel,
                scale,
                displacement,
                color,
            } => FragmentProcessor::displacement_map(
                (*x_channel).into(),
                (*y_channel).into(),
                *scale,
                self.sample(&format!("{path}.displacement"), displacement)?,
                self.sample(&format!("{path}.color"), color)?,
            ),
            ProcessorSpec::Compose { mode, src, dst } => FragmentProcessor::compose(
                blend_mode(mode)?,
                self.processor(&format!("{path}.src"), src)?,
                self.processor(&format!("{path}.dst"), dst)?,
            ),
            ProcessorSpec::Series { children } => {
                if children.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "{path}: a series needs at least one child"
                    )));
                }
                let children = children
                    .iter()
                    .enumerate()
                    .map(|(i, child)| self.processor(&format!("{path}.children[{i}]"), child))
                    .collect::<Result<Vec<_>, _>>()?;
                FragmentProcessor::series(children)
            }
        };
        Ok(fp)
    }

    fn geometry(&self, draw: &DrawSpec) -> Result<GeometryProcessor, ConfigError> {
        let view = matrix("draw.view_matrix", draw.view_matrix.as_deref())?;
        let local = matrix("draw.local_matrix", draw.local_matrix.as_deref())?;
        let gp = match &draw.geometry {
            GeometrySpec::Default {
                local_coords,
                color,
                coverage,
            } => GeometryProcessor::default_geometry(
                VertexFlags {
                    local_coords: *local_coords,
                    color: *color,
                    coverage: *coverage,
                },
                view,
            ),
            GeometrySpec::DistanceField {
                atlas,
                similarity,
                color,
            } => {
                let atlas = TextureAccess::new(
                    self.texture(atlas)?,
                    SamplerParams::new(TileMode::Clamp, FilterMode::Bilerp),
                );
                GeometryProcessor::distance_field(atlas, *similarity, *color, view)
            }
        };
        Ok(gp.with_local_matrix(local))
    }
}

impl FxConfig {
    pub fn draw_kind(&self) -> DrawKind {
        self.draw.primitive.into()
    }

    /// Builds the effect tree for the scene's draw.
    pub fn pipeline(&self) -> Result<DrawPipeline, ConfigError> {
        let m = Materializer { config: self };
        let draw = &self.draw;
        let target = RenderTarget::new(draw.target.width, draw.target.height)
            .with_origin(draw.target.origin.into());

        let mut pipeline = DrawPipeline::new(m.geometry(draw)?, target)
            .with_xfer(TransferProcessor::for_mode(blend_mode(&draw.blend)?))
            .with_color_input(draw.color_input.into())
            .with_coverage_input(draw.coverage_input.into());
        pipeline.color = draw.uniform_color.unwrap_or(WHITE);
        pipeline.coverage = draw.uniform_coverage.unwrap_or(1.0);

        for (i, spec) in draw.color.iter().enumerate() {
            pipeline = pipeline.with_color_stage(m.processor(&format!("draw.color[{i}]"), spec)?);
        }
        for (i, spec) in draw.coverage.iter().enumerate() {
            pipeline =
                pipeline.with_coverage_stage(m.processor(&format!("draw.coverage[{i}]"), spec)?);
        }

        if let Some(copy) = &draw.dst_copy {
            pipeline = pipeline.with_dst_copy(DstCopy {
                texture: m.texture(&copy.texture)?,
                offset: copy.offset,
            });
        }
        Ok(pipeline)
    }
}
