//! Linked programs keyed by [`ProgramKey`], evicted least-recently-used.

use std::collections::HashMap;

use serde::Serialize;

use crate::backend::GpuBackend;
use crate::caps::Caps;
use crate::error::BuildError;
use crate::key::ProgramKey;
use crate::pipeline::{DrawKind, DrawPipeline};
use crate::program::Program;
use crate::registry::{builtin_registry, EmitterRegistry};

pub const DEFAULT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub builds: u64,
    /// Compile or link failures reported by the driver.
    pub compile_failures: u64,
    pub evictions: u64,
}

struct CacheEntry {
    program: Program,
    last_used: u64,
}

pub struct ProgramCache {
    caps: Caps,
    registry: &'static EmitterRegistry,
    capacity: usize,
    entries: HashMap<ProgramKey, CacheEntry>,
    access_counter: u64,
    stats: CacheStats,
}

impl ProgramCache {
    pub fn new(caps: Caps, capacity: usize) -> Self {
        Self::with_registry(caps, capacity, builtin_registry())
    }

    pub fn with_registry(caps: Caps, capacity: usize, registry: &'static EmitterRegistry) -> Self {
        Self {
            caps,
            registry,
            capacity: capacity.max(1),
            entries: HashMap::new(),
            access_counter: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn caps(&self) -> &Caps {
        &self.caps
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &ProgramKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }

    /// Returns the linked program for `pipeline`, building it on a miss.
    ///
    /// Failed builds are not cached; the next request for the same key tries
    /// again.
    pub fn program_for(
        &mut self,
        pipeline: &DrawPipeline,
        draw_kind: DrawKind,
        backend: &mut dyn GpuBackend,
    ) -> Result<&mut Program, BuildError> {
        let key = ProgramKey::build(pipeline, draw_kind, &self.caps, self.registry)?;
        self.access_counter += 1;
        let now = self.access_counter;

        if self.entries.contains_key(&key) {
            self.stats.hits += 1;
            tracing::debug!(checksum = key.checksum(), "program cache hit");
            let entry = self
                .entries
                .get_mut(&key)
                .unwrap_or_else(|| unreachable!("entry vanished between lookups"));
            entry.last_used = now;
            return Ok(&mut entry.program);
        }

        self.stats.misses += 1;
        tracing::debug!(
            checksum = key.checksum(),
            bytes = key.len(),
            "program cache miss"
        );
        let program = match Program::build(
            key.clone(),
            pipeline,
            draw_kind,
            &self.caps,
            self.registry,
            backend,
        ) {
            Ok(program) => program,
            Err(err) => {
                if err.is_driver_failure() {
                    self.stats.compile_failures += 1;
                }
                return Err(err);
            }
        };
        self.stats.builds += 1;

        while self.entries.len() >= self.capacity {
            self.evict_lru(backend);
        }

        let entry = self.entries.entry(key).or_insert(CacheEntry {
            program,
            last_used: now,
        });
        Ok(&mut entry.program)
    }

    /// Looks up or builds the program, binds it, and uploads the draw's
    /// uniforms and textures.
    pub fn prepare_draw(
        &mut self,
        pipeline: &DrawPipeline,
        draw_kind: DrawKind,
        backend: &mut dyn GpuBackend,
    ) -> Result<&Program, BuildError> {
        let program = self.program_for(pipeline, draw_kind, backend)?;
        program.bind(backend);
        program.set_data(backend, draw_kind, pipeline);
        Ok(program)
    }

    fn evict_lru(&mut self, backend: &mut dyn GpuBackend) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            if let Some(mut entry) = self.entries.remove(&key) {
                tracing::debug!(
                    program = entry.program.id().0,
                    checksum = key.checksum(),
                    "evicting program"
                );
                entry.program.delete(backend);
                self.stats.evictions += 1;
            }
        }
    }

    /// Deletes every cached program.
    pub fn clear(&mut self, backend: &mut dyn GpuBackend) {
        for (_, mut entry) in self.entries.drain() {
            entry.program.delete(backend);
        }
    }
}
