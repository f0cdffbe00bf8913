//! The driver-facing call contract, plus an in-memory implementation that
//! records every call.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use effects::{SamplerParams, Swizzle, TextureHandle, TextureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub i32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    /// Column-major.
    Mat3([f32; 9]),
    /// Column-major.
    Mat4([f32; 16]),
}

/// Synchronous GPU driver calls needed to compile, link and feed programs.
pub trait GpuBackend {
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId;
    /// Compiles `source`, returning the driver log on failure.
    fn compile_shader(&mut self, shader: ShaderId, source: &str) -> Result<(), String>;
    fn create_program(&mut self) -> ProgramId;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn bind_attrib_location(&mut self, program: ProgramId, index: u32, name: &str);
    fn link_program(&mut self, program: ProgramId) -> Result<(), String>;
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn delete_shader(&mut self, shader: ShaderId);
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: ProgramId);
    fn bind_texture(
        &mut self,
        unit: u32,
        params: &SamplerParams,
        swizzle: Swizzle,
        texture: &TextureHandle,
    );
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateShader {
        shader: ShaderId,
        stage: ShaderStage,
    },
    CompileShader {
        shader: ShaderId,
        ok: bool,
    },
    CreateProgram {
        program: ProgramId,
    },
    AttachShader {
        program: ProgramId,
        shader: ShaderId,
    },
    BindAttribLocation {
        program: ProgramId,
        index: u32,
        name: String,
    },
    LinkProgram {
        program: ProgramId,
        ok: bool,
    },
    DeleteShader {
        shader: ShaderId,
    },
    DeleteProgram {
        program: ProgramId,
    },
    UseProgram {
        program: ProgramId,
    },
    BindTexture {
        unit: u32,
        texture: TextureId,
        params: SamplerParams,
        swizzle: Swizzle,
    },
    SetUniform {
        location: UniformLocation,
        value: UniformValue,
    },
}

/// Backend that performs no GPU work and keeps a log of every call.
///
/// Uniform locations are handed out per `(program, name)` pair. Compilation
/// and linking succeed unless a failure was scripted with
/// [`RecordingBackend::fail_next_compile`] or [`RecordingBackend::fail_next_link`].
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    next_id: u32,
    sources: HashMap<ShaderId, String>,
    locations: HashMap<(ProgramId, String), UniformLocation>,
    location_names: HashMap<UniformLocation, String>,
    live_programs: BTreeSet<ProgramId>,
    live_shaders: BTreeSet<ShaderId>,
    uniform_writes: usize,
    texture_binds: usize,
    fail_compile: Option<String>,
    fail_link: Option<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_compile(&mut self, log: impl Into<String>) {
        self.fail_compile = Some(log.into());
    }

    pub fn fail_next_link(&mut self, log: impl Into<String>) {
        self.fail_link = Some(log.into());
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn uniform_writes(&self) -> usize {
        self.uniform_writes
    }

    pub fn texture_binds(&self) -> usize {
        self.texture_binds
    }

    pub fn live_programs(&self) -> &BTreeSet<ProgramId> {
        &self.live_programs
    }

    pub fn live_shaders(&self) -> &BTreeSet<ShaderId> {
        &self.live_shaders
    }

    pub fn shader_source(&self, shader: ShaderId) -> Option<&str> {
        self.sources.get(&shader).map(String::as_str)
    }

    pub fn location_name(&self, location: UniformLocation) -> Option<&str> {
        self.location_names.get(&location).map(String::as_str)
    }

    /// Uniform names written since the call log was last cleared, in order.
    pub fn written_uniform_names(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetUniform { location, .. } => self.location_name(*location),
                _ => None,
            })
            .collect()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBackend for RecordingBackend {
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId {
        let shader = ShaderId(self.next());
        self.live_shaders.insert(shader);
        self.calls.push(BackendCall::CreateShader { shader, stage });
        shader
    }

    fn compile_shader(&mut self, shader: ShaderId, source: &str) -> Result<(), String> {
        self.sources.insert(shader, source.to_string());
        let result = match self.fail_compile.take() {
            Some(log) => Err(log),
            None => Ok(()),
        };
        self.calls.push(BackendCall::CompileShader {
            shader,
            ok: result.is_ok(),
        });
        result
    }

    fn create_program(&mut self) -> ProgramId {
        let program = ProgramId(self.next());
        self.live_programs.insert(program);
        self.calls.push(BackendCall::CreateProgram { program });
        program
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        self.calls.push(BackendCall::AttachShader { program, shader });
    }

    fn bind_attrib_location(&mut self, program: ProgramId, index: u32, name: &str) {
        self.calls.push(BackendCall::BindAttribLocation {
            program,
            index,
            name: name.to_string(),
        });
    }

    fn link_program(&mut self, program: ProgramId) -> Result<(), String> {
        let result = match self.fail_link.take() {
            Some(log) => Err(log),
            None => Ok(()),
        };
        self.calls.push(BackendCall::LinkProgram {
            program,
            ok: result.is_ok(),
        });
        result
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let key = (program, name.to_string());
        if let Some(location) = self.locations.get(&key) {
            return Some(*location);
        }
        let location = UniformLocation(self.locations.len() as i32);
        self.locations.insert(key, location);
        self.location_names.insert(location, name.to_string());
        Some(location)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.live_shaders.remove(&shader);
        self.calls.push(BackendCall::DeleteShader { shader });
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.live_programs.remove(&program);
        self.calls.push(BackendCall::DeleteProgram { program });
    }

    fn use_program(&mut self, program: ProgramId) {
        self.calls.push(BackendCall::UseProgram { program });
    }

    fn bind_texture(
        &mut self,
        unit: u32,
        params: &SamplerParams,
        swizzle: Swizzle,
        texture: &TextureHandle,
    ) {
        self.texture_binds += 1;
        self.calls.push(BackendCall::BindTexture {
            unit,
            texture: texture.id,
            params: *params,
            swizzle,
        });
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.uniform_writes += 1;
        self.calls.push(BackendCall::SetUniform { location, value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_compile_failure_is_one_shot() {
        let mut backend = RecordingBackend::new();
        let shader = backend.create_shader(ShaderStage::Fragment);
        backend.fail_next_compile("0:1: syntax error");
        assert_eq!(
            backend.compile_shader(shader, "void main() {}"),
            Err("0:1: syntax error".to_string())
        );
        assert!(backend.compile_shader(shader, "void main() {}").is_ok());
    }

    #[test]
    fn locations_are_stable_per_program_and_name() {
        let mut backend = RecordingBackend::new();
        let a = backend.create_program();
        let b = backend.create_program();
        let first = backend.uniform_location(a, "uColor");
        assert_eq!(backend.uniform_location(a, "uColor"), first);
        assert_ne!(backend.uniform_location(b, "uColor"), first);
        assert_eq!(backend.location_name(first.unwrap()), Some("uColor"));
    }
}
