//! Shader program generation for effect trees.
//!
//! The flow for one draw is:
//!
//! ```text
//!   DrawPipeline ──▶ ProgramKey::build ──▶ ProgramCache lookup
//!                                              │ miss
//!                                              ▼
//!                     ProgramBuilder::build (emitters append GLSL)
//!                                              │
//!                                              ▼
//!                     Program::build (compile, link, locate uniforms)
//!                                              │
//!                                              ▼
//!                     Program::set_data (emitters upload changed uniforms)
//! ```
//!
//! Keys and shader text are derived from the same processor walk, so two
//! pipelines with equal keys always share a program and only differ in the
//! uniform values and textures fed to it.

pub mod backend;
pub mod builder;
pub mod cache;
pub mod caps;
pub mod emitter;
pub mod error;
pub mod key;
pub mod pipeline;
pub mod program;
pub mod registry;
pub mod runtime;
pub mod types;
pub mod uniform;

pub use backend::{GpuBackend, RecordingBackend};
pub use builder::{GeneratedProgram, ProgramBuilder};
pub use cache::{CacheStats, ProgramCache, DEFAULT_CAPACITY};
pub use caps::{AdvancedBlendSupport, Caps, DstReadSupport, GlslGeneration};
pub use error::{BuildError, RegistryError};
pub use key::{KeyBuilder, KeyHeader, ProgramKey};
pub use pipeline::{DrawKind, DrawPipeline, DstCopy, InputSource, RenderTarget};
pub use program::{Program, ProgramState};
pub use registry::{builtin_registry, EmitterRegistry};
