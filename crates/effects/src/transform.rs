use crate::matrix::Matrix3;

/// Coordinate space a transform reads its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordSet {
    /// Per-vertex local coordinates (or positions when no explicit local
    /// coordinates are supplied), mapped through the ambient local matrix.
    Local,
    /// Device-space position after the view matrix.
    Device,
}

/// Shading-language precision hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Precision {
    Low,
    Medium,
    High,
    #[default]
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordTransform {
    pub source: CoordSet,
    pub matrix: Matrix3,
    pub reverse_y: bool,
    pub precision: Precision,
}

impl CoordTransform {
    pub fn new(source: CoordSet, matrix: Matrix3) -> Self {
        Self {
            source,
            matrix,
            reverse_y: false,
            precision: Precision::Default,
        }
    }

    pub fn local(matrix: Matrix3) -> Self {
        Self::new(CoordSet::Local, matrix)
    }

    pub fn device(matrix: Matrix3) -> Self {
        Self::new(CoordSet::Device, matrix)
    }

    pub fn with_reverse_y(mut self, reverse_y: bool) -> Self {
        self.reverse_y = reverse_y;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Whether the varying carrying this transform's output needs a third
    /// component, given the ambient local matrix of the draw.
    pub fn needs_perspective(&self, local_matrix: &Matrix3) -> bool {
        self.matrix.has_perspective()
            || (self.source == CoordSet::Local && local_matrix.has_perspective())
    }
}
