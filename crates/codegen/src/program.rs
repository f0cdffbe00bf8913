use crate::backend::{GpuBackend, ProgramId, ShaderId, ShaderStage, UniformLocation};
use crate::builder::ProgramBuilder;
use crate::caps::Caps;
use crate::error::BuildError;
use crate::key::ProgramKey;
use crate::pipeline::{DrawKind, DrawPipeline};
use crate::registry::EmitterRegistry;
use crate::runtime::ProgramEffects;
use crate::uniform::ProgramDataManager;

/// Lifecycle of a cached program. A failed build never produces a
/// [`Program`], so every program starts out `Linked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramState {
    Linked,
    Bound,
    Evicted,
}

/// A linked GPU program plus the emitters that feed it.
pub struct Program {
    id: ProgramId,
    key: ProgramKey,
    draw_kind: DrawKind,
    state: ProgramState,
    vertex_source: String,
    fragment_source: String,
    locations: Vec<Option<UniformLocation>>,
    effects: ProgramEffects,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("draw_kind", &self.draw_kind)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn compile(
    backend: &mut dyn GpuBackend,
    stage: ShaderStage,
    source: &str,
) -> Result<ShaderId, BuildError> {
    let shader = backend.create_shader(stage);
    if let Err(log) = backend.compile_shader(shader, source) {
        tracing::warn!("{} shader failed to compile:\n{log}", stage.name());
        backend.delete_shader(shader);
        return Err(BuildError::Compile { stage, log });
    }
    Ok(shader)
}

impl Program {
    /// Generates, compiles and links the program for `pipeline`.
    ///
    /// On failure every driver object created along the way is deleted and
    /// the driver log is returned.
    pub fn build(
        key: ProgramKey,
        pipeline: &DrawPipeline,
        draw_kind: DrawKind,
        caps: &Caps,
        registry: &EmitterRegistry,
        backend: &mut dyn GpuBackend,
    ) -> Result<Self, BuildError> {
        let generated = ProgramBuilder::build(pipeline, draw_kind, caps, registry)?;

        let vertex = compile(backend, ShaderStage::Vertex, &generated.vertex)?;
        let fragment = match compile(backend, ShaderStage::Fragment, &generated.fragment) {
            Ok(shader) => shader,
            Err(err) => {
                backend.delete_shader(vertex);
                return Err(err);
            }
        };

        let id = backend.create_program();
        backend.attach_shader(id, vertex);
        backend.attach_shader(id, fragment);
        for (index, name) in generated.attributes.iter().enumerate() {
            backend.bind_attrib_location(id, index as u32, name);
        }
        let linked = backend.link_program(id);
        backend.delete_shader(vertex);
        backend.delete_shader(fragment);
        if let Err(log) = linked {
            tracing::warn!("program {} failed to link:\n{log}", id.0);
            backend.delete_program(id);
            return Err(BuildError::Link { log });
        }

        let locations = generated
            .uniforms
            .iter()
            .map(|uniform| backend.uniform_location(id, &uniform.var.name))
            .collect::<Vec<_>>();

        let mut effects = generated.effects;
        backend.use_program(id);
        let mut next_unit = 0;
        effects.init_samplers(&mut ProgramDataManager::new(&locations, backend), &mut next_unit);

        tracing::debug!(
            program = id.0,
            uniforms = locations.len(),
            samplers = next_unit,
            "linked program"
        );

        Ok(Self {
            id,
            key,
            draw_kind,
            state: ProgramState::Linked,
            vertex_source: generated.vertex,
            fragment_source: generated.fragment,
            locations,
            effects,
        })
    }

    pub fn bind(&mut self, backend: &mut dyn GpuBackend) {
        debug_assert_ne!(self.state, ProgramState::Evicted);
        backend.use_program(self.id);
        self.state = ProgramState::Bound;
    }

    /// Uploads per-draw state. The program must be bound and `pipeline` must
    /// produce this program's key.
    pub fn set_data(
        &mut self,
        backend: &mut dyn GpuBackend,
        draw_kind: DrawKind,
        pipeline: &DrawPipeline,
    ) {
        debug_assert_eq!(self.state, ProgramState::Bound);
        debug_assert_eq!(draw_kind, self.draw_kind);
        let mut dm = ProgramDataManager::new(&self.locations, backend);
        self.effects.set_data(&mut dm, pipeline);
    }

    pub fn delete(&mut self, backend: &mut dyn GpuBackend) {
        if self.state != ProgramState::Evicted {
            backend.delete_program(self.id);
            self.state = ProgramState::Evicted;
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn key(&self) -> &ProgramKey {
        &self.key
    }

    pub fn state(&self) -> ProgramState {
        self.state
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn sampler_count(&self) -> usize {
        self.effects.sampler_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use effects::{GeometryProcessor, Matrix3, VertexFlags};

    use crate::backend::{BackendCall, RecordingBackend};
    use crate::pipeline::RenderTarget;
    use crate::registry::builtin_registry;

    fn pipeline() -> DrawPipeline {
        let flags = VertexFlags {
            local_coords: true,
            color: true,
            coverage: false,
        };
        DrawPipeline::new(
            GeometryProcessor::default_geometry(flags, Matrix3::IDENTITY),
            RenderTarget::new(32, 32),
        )
    }

    fn build(backend: &mut RecordingBackend) -> Result<Program, BuildError> {
        let p = pipeline();
        let caps = Caps::default();
        let key = ProgramKey::build(&p, DrawKind::Triangles, &caps, builtin_registry())?;
        Program::build(key, &p, DrawKind::Triangles, &caps, builtin_registry(), backend)
    }

    #[test]
    fn attributes_are_bound_in_declaration_order() {
        let mut backend = RecordingBackend::new();
        let program = build(&mut backend).unwrap();
        assert_eq!(program.state(), ProgramState::Linked);

        let bound = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::BindAttribLocation { index, name, .. } => Some((*index, name.as_str())),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(bound[0], (0, "inPosition"));
        assert_eq!(bound.len(), 3);
        assert!(backend.live_shaders().is_empty());
        assert!(backend.live_programs().contains(&program.id()));
    }

    #[test]
    fn compile_failure_releases_everything() {
        let mut backend = RecordingBackend::new();
        backend.fail_next_compile("0:3: 'vec5' : undeclared identifier");
        let err = build(&mut backend).unwrap_err();
        assert_eq!(
            err,
            BuildError::Compile {
                stage: ShaderStage::Vertex,
                log: "0:3: 'vec5' : undeclared identifier".into()
            }
        );
        assert!(err.is_driver_failure());
        assert!(backend.live_shaders().is_empty());
        assert!(backend.live_programs().is_empty());
    }

    #[test]
    fn link_failure_releases_everything() {
        let mut backend = RecordingBackend::new();
        backend.fail_next_link("varying mismatch");
        assert!(matches!(build(&mut backend), Err(BuildError::Link { .. })));
        assert!(backend.live_shaders().is_empty());
        assert!(backend.live_programs().is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let mut backend = RecordingBackend::new();
        let mut program = build(&mut backend).unwrap();
        program.bind(&mut backend);
        assert_eq!(program.state(), ProgramState::Bound);
        program.delete(&mut backend);
        program.delete(&mut backend);
        assert_eq!(program.state(), ProgramState::Evicted);
        let deletes = backend
            .calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::DeleteProgram { .. }))
            .count();
        assert_eq!(deletes, 1);
    }
}
