use effects::{Matrix3, SamplerParams, Swizzle, TextureHandle};

use crate::backend::{GpuBackend, UniformLocation, UniformValue};
use crate::types::ShaderVar;

/// Index of a uniform declared through the program builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformHandle(pub(crate) usize);

impl UniformHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Stages a uniform is declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Visibility(u8);

impl Visibility {
    pub const VERTEX: Visibility = Visibility(0x1);
    pub const FRAGMENT: Visibility = Visibility(0x2);
    pub const BOTH: Visibility = Visibility(0x3);

    pub fn contains(self, other: Visibility) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    pub var: ShaderVar,
    pub visibility: Visibility,
}

/// Uploads uniform values for one linked program.
///
/// Borrows the backend only for the duration of a `set_data` pass. Writes to
/// uniforms the driver optimized away are dropped.
pub struct ProgramDataManager<'a> {
    locations: &'a [Option<UniformLocation>],
    backend: &'a mut dyn GpuBackend,
}

impl<'a> ProgramDataManager<'a> {
    pub fn new(locations: &'a [Option<UniformLocation>], backend: &'a mut dyn GpuBackend) -> Self {
        Self { locations, backend }
    }

    fn set(&mut self, handle: UniformHandle, value: UniformValue) {
        if let Some(location) = self.locations.get(handle.0).copied().flatten() {
            self.backend.set_uniform(location, value);
        }
    }

    pub fn set1i(&mut self, handle: UniformHandle, value: i32) {
        self.set(handle, UniformValue::Int(value));
    }

    pub fn set1f(&mut self, handle: UniformHandle, value: f32) {
        self.set(handle, UniformValue::Float(value));
    }

    pub fn set2f(&mut self, handle: UniformHandle, x: f32, y: f32) {
        self.set(handle, UniformValue::Vec2([x, y]));
    }

    pub fn set4fv(&mut self, handle: UniformHandle, value: &[f32; 4]) {
        self.set(handle, UniformValue::Vec4(*value));
    }

    pub fn set_matrix3f(&mut self, handle: UniformHandle, matrix: &Matrix3) {
        self.set(handle, UniformValue::Mat3(matrix.to_column_major()));
    }

    pub fn set_matrix4f(&mut self, handle: UniformHandle, column_major: &[f32; 16]) {
        self.set(handle, UniformValue::Mat4(*column_major));
    }

    pub fn bind_texture(
        &mut self,
        unit: u32,
        params: &SamplerParams,
        swizzle: Swizzle,
        texture: &TextureHandle,
    ) {
        self.backend.bind_texture(unit, params, swizzle, texture);
    }
}
