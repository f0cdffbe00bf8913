/// Row-major 3×3 matrix used for view, local, and coordinate transforms.
///
/// Element order follows the usual 2D convention:
///
/// ```text
/// | scale_x  skew_x   trans_x |
/// | skew_y   scale_y  trans_y |
/// | persp0   persp1   persp2  |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3 {
    m: [f32; 9],
}

pub const SCALE_X: usize = 0;
pub const SKEW_X: usize = 1;
pub const TRANS_X: usize = 2;
pub const SKEW_Y: usize = 3;
pub const SCALE_Y: usize = 4;
pub const TRANS_Y: usize = 5;
pub const PERSP_0: usize = 6;
pub const PERSP_1: usize = 7;
pub const PERSP_2: usize = 8;

impl Matrix3 {
    pub const IDENTITY: Matrix3 = Matrix3 {
        m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    };

    pub fn from_row_major(m: [f32; 9]) -> Self {
        Self { m }
    }

    pub fn translate(dx: f32, dy: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.m[TRANS_X] = dx;
        m.m[TRANS_Y] = dy;
        m
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.m[SCALE_X] = sx;
        m.m[SCALE_Y] = sy;
        m
    }

    /// Horizontal shear, `x' = x + k * y`.
    pub fn skew_x(k: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.m[SKEW_X] = k;
        m
    }

    /// Matrix with a non-trivial bottom row, mostly useful for tests.
    pub fn perspective(p0: f32, p1: f32) -> Self {
        Self::from_row_major([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, p0, p1, 1.0])
    }

    pub fn get(&self, index: usize) -> f32 {
        self.m[index]
    }

    pub fn set(&mut self, index: usize, value: f32) {
        self.m[index] = value;
    }

    pub fn row_major(&self) -> &[f32; 9] {
        &self.m
    }

    /// Column-major copy, the layout `mat3` uniforms expect.
    pub fn to_column_major(&self) -> [f32; 9] {
        let m = &self.m;
        [m[0], m[3], m[6], m[1], m[4], m[7], m[2], m[5], m[8]]
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn has_perspective(&self) -> bool {
        self.m[PERSP_0] != 0.0 || self.m[PERSP_1] != 0.0 || self.m[PERSP_2] != 1.0
    }

    /// Returns `self * other`, i.e. `other` is applied first.
    pub fn concat(&self, other: &Matrix3) -> Matrix3 {
        let a = &self.m;
        let b = &other.m;
        let mut out = [0.0f32; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = a[row * 3] * b[col]
                    + a[row * 3 + 1] * b[3 + col]
                    + a[row * 3 + 2] * b[6 + col];
            }
        }
        Matrix3 { m: out }
    }

    /// Equivalent to post-scaling by `(1, -1)` then post-translating by `(0, 1)`
    /// in homogeneous space: `y' = w - y`.
    pub fn flipped_y(&self) -> Matrix3 {
        let mut out = *self;
        out.m[SKEW_Y] = self.m[PERSP_0] - self.m[SKEW_Y];
        out.m[SCALE_Y] = self.m[PERSP_1] - self.m[SCALE_Y];
        out.m[TRANS_Y] = self.m[PERSP_2] - self.m[TRANS_Y];
        out
    }

    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.m;
        let px = m[SCALE_X] * x + m[SKEW_X] * y + m[TRANS_X];
        let py = m[SKEW_Y] * x + m[SCALE_Y] * y + m[TRANS_Y];
        let w = m[PERSP_0] * x + m[PERSP_1] * y + m[PERSP_2];
        if w == 0.0 {
            (px, py)
        } else {
            (px / w, py / w)
        }
    }
}

impl Default for Matrix3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_applies_right_operand_first() {
        let m = Matrix3::translate(10.0, 0.0).concat(&Matrix3::scale(2.0, 2.0));
        assert_eq!(m.map_point(1.0, 1.0), (12.0, 2.0));
    }

    #[test]
    fn perspective_detection() {
        assert!(!Matrix3::IDENTITY.has_perspective());
        assert!(!Matrix3::scale(3.0, 4.0).has_perspective());
        assert!(Matrix3::perspective(0.001, 0.0).has_perspective());
    }

    #[test]
    fn flip_maps_unit_square_upside_down() {
        let flipped = Matrix3::IDENTITY.flipped_y();
        assert_eq!(flipped.map_point(0.25, 0.0), (0.25, 1.0));
        assert_eq!(flipped.map_point(0.25, 1.0), (0.25, 0.0));
    }

    #[test]
    fn constructors_fill_named_slots() {
        let m = Matrix3::translate(5.0, 7.0).concat(&Matrix3::skew_x(0.5));
        assert_eq!(m.get(TRANS_X), 5.0);
        assert_eq!(m.get(TRANS_Y), 7.0);
        assert_eq!(m.get(SKEW_X), 0.5);
        assert_eq!(Matrix3::scale(3.0, 4.0).get(SCALE_X), 3.0);
        assert_eq!(m.map_point(2.0, 2.0), (8.0, 9.0));
        assert!(!m.has_perspective());
    }

    #[test]
    fn column_major_transposes() {
        let m = Matrix3::translate(5.0, 7.0);
        let cm = m.to_column_major();
        assert_eq!(&cm[6..], &[5.0, 7.0, 1.0]);
    }
}
