use crate::matrix::Matrix3;
use crate::texture::TextureAccess;
use crate::ClassId;

/// Vertex attribute layouts the built-in geometry processors understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttribType {
    Float,
    Vec2,
    Vec4,
    /// Four normalized unsigned bytes.
    Vec4ub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub name: &'static str,
    pub ty: AttribType,
}

pub const POSITION_ATTR: Attribute = Attribute {
    name: "inPosition",
    ty: AttribType::Vec2,
};
pub const LOCAL_COORDS_ATTR: Attribute = Attribute {
    name: "inLocalCoords",
    ty: AttribType::Vec2,
};
pub const COLOR_ATTR: Attribute = Attribute {
    name: "inColor",
    ty: AttribType::Vec4ub,
};
pub const COVERAGE_ATTR: Attribute = Attribute {
    name: "inCoverage",
    ty: AttribType::Float,
};
pub const TEXTURE_COORDS_ATTR: Attribute = Attribute {
    name: "inTextureCoords",
    ty: AttribType::Vec2,
};

/// Optional per-vertex inputs of the default geometry processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexFlags {
    pub local_coords: bool,
    pub color: bool,
    pub coverage: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// Positions plus optional local coordinates, color and coverage.
    Default { flags: VertexFlags },
    /// Coverage from a signed-distance-field glyph atlas. `similarity` means
    /// the view matrix is a uniform scale plus rotation.
    DistanceField { similarity: bool, color_attr: bool },
}

/// The per-draw vertex stage: attribute layout, view matrix, and the
/// coordinate change applied to local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryProcessor {
    kind: GeometryKind,
    view_matrix: Matrix3,
    local_matrix: Matrix3,
    textures: Vec<TextureAccess>,
    attributes: Vec<Attribute>,
}

impl GeometryProcessor {
    pub fn default_geometry(flags: VertexFlags, view_matrix: Matrix3) -> Self {
        let mut attributes = vec![POSITION_ATTR];
        if flags.local_coords {
            attributes.push(LOCAL_COORDS_ATTR);
        }
        if flags.color {
            attributes.push(COLOR_ATTR);
        }
        if flags.coverage {
            attributes.push(COVERAGE_ATTR);
        }
        Self {
            kind: GeometryKind::Default { flags },
            view_matrix,
            local_matrix: Matrix3::IDENTITY,
            textures: vec![],
            attributes,
        }
    }

    pub fn distance_field(
        atlas: TextureAccess,
        similarity: bool,
        color_attr: bool,
        view_matrix: Matrix3,
    ) -> Self {
        let mut attributes = vec![POSITION_ATTR];
        if color_attr {
            attributes.push(COLOR_ATTR);
        }
        attributes.push(TEXTURE_COORDS_ATTR);
        Self {
            kind: GeometryKind::DistanceField {
                similarity,
                color_attr,
            },
            view_matrix,
            local_matrix: Matrix3::IDENTITY,
            textures: vec![atlas],
            attributes,
        }
    }

    pub fn with_local_matrix(mut self, local_matrix: Matrix3) -> Self {
        self.local_matrix = local_matrix;
        self
    }

    pub fn kind(&self) -> &GeometryKind {
        &self.kind
    }

    pub fn class_id(&self) -> ClassId {
        match self.kind {
            GeometryKind::Default { .. } => ClassId::DEFAULT_GEOMETRY,
            GeometryKind::DistanceField { .. } => ClassId::DISTANCE_FIELD,
        }
    }

    pub fn view_matrix(&self) -> &Matrix3 {
        &self.view_matrix
    }

    pub fn local_matrix(&self) -> &Matrix3 {
        &self.local_matrix
    }

    pub fn textures(&self) -> &[TextureAccess] {
        &self.textures
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn has_explicit_local_coords(&self) -> bool {
        self.attribute_index(LOCAL_COORDS_ATTR.name).is_some()
    }

    pub fn has_color_attribute(&self) -> bool {
        self.attribute_index(COLOR_ATTR.name).is_some()
    }

    pub fn has_coverage_attribute(&self) -> bool {
        self.attribute_index(COVERAGE_ATTR.name).is_some()
    }

    /// Whether the processor computes coverage itself rather than taking it
    /// from the draw's coverage input.
    pub fn produces_coverage(&self) -> bool {
        matches!(self.kind, GeometryKind::DistanceField { .. })
    }

    /// The matrix local-coordinate transforms are composed with: identity
    /// when local coordinates arrive as an attribute.
    pub fn coord_change_matrix(&self) -> Matrix3 {
        if self.has_explicit_local_coords() {
            Matrix3::IDENTITY
        } else {
            self.local_matrix
        }
    }

    pub fn is_equal(&self, other: &GeometryProcessor) -> bool {
        self == other
    }
}
