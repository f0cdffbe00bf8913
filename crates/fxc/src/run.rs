use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use codegen::{
    builtin_registry, Caps, ProgramBuilder, ProgramCache, ProgramKey, RecordingBackend,
};
use fxconfig::FxConfig;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{BuildArgs, CapsArgs, Cli, Command, SceneArgs, SimulateArgs, StageFilter};
use crate::paths;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let profile = cli.profile.as_deref();
    match cli.command {
        Command::Build(args) => build(profile, &args),
        Command::Key(args) => key(profile, &args),
        Command::Caps(args) => caps(profile, &args),
        Command::Simulate(args) => simulate(profile, &args),
        Command::Classes => {
            for (class, name) in builtin_registry().fragment_classes() {
                println!("{:#06x}  {name}", class.0);
            }
            Ok(())
        }
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

struct Scene {
    config: FxConfig,
    caps: Caps,
}

fn load_scene(path: &Path, profile: Option<&str>) -> Result<Scene> {
    let resolved = paths::resolve_scene(path)?;
    let raw = fs::read_to_string(&resolved)
        .with_context(|| format!("failed to read scene {}", resolved.display()))?;
    let config = FxConfig::from_toml_str(&raw)
        .with_context(|| format!("failed to load scene {}", resolved.display()))?;
    let caps = config
        .caps(profile)
        .context("failed to resolve capabilities")?;
    tracing::debug!(scene = %resolved.display(), generation = ?caps.generation, "loaded scene");
    Ok(Scene { config, caps })
}

fn build(profile: Option<&str>, args: &BuildArgs) -> Result<()> {
    let scene = load_scene(&args.scene.scene, profile)?;
    let pipeline = scene.config.pipeline()?;
    let draw_kind = scene.config.draw_kind();

    if args.key {
        let key = ProgramKey::build(&pipeline, draw_kind, &scene.caps, builtin_registry())
            .context("failed to build program key")?;
        println!("// key {}", key.to_hex());
    }

    let generated = ProgramBuilder::build(&pipeline, draw_kind, &scene.caps, builtin_registry())
        .context("failed to generate shaders")?;
    tracing::info!(
        uniforms = generated.uniforms.len(),
        attributes = generated.attributes.len(),
        "generated program"
    );

    if args.stage != StageFilter::Fragment {
        println!("// vertex");
        print!("{}", generated.vertex);
    }
    if args.stage != StageFilter::Vertex {
        println!("// fragment");
        print!("{}", generated.fragment);
    }
    Ok(())
}

fn key(profile: Option<&str>, args: &SceneArgs) -> Result<()> {
    let scene = load_scene(&args.scene, profile)?;
    let pipeline = scene.config.pipeline()?;
    let key = ProgramKey::build(
        &pipeline,
        scene.config.draw_kind(),
        &scene.caps,
        builtin_registry(),
    )
    .context("failed to build program key")?;

    println!("length: {}", key.len());
    println!("checksum: {:#010x}", key.checksum());
    println!("processors: {}", key.processor_count());
    println!("hex: {}", key.to_hex());
    Ok(())
}

fn caps(profile: Option<&str>, args: &CapsArgs) -> Result<()> {
    let caps = match &args.scene {
        Some(path) => load_scene(path, profile)?.caps,
        None => match profile {
            Some(name) => match Caps::from_profile(name) {
                Some(caps) => caps,
                None => bail!(
                    "unknown capability profile '{name}'; expected one of {}",
                    codegen::caps::PROFILE_NAMES.join(", ")
                ),
            },
            None => Caps::default(),
        },
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&caps).context("failed to encode capabilities")?
        );
    } else {
        print!(
            "{}",
            toml::to_string(&caps).context("failed to encode capabilities")?
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct DrawReport {
    draw: u32,
    hit: bool,
    uniform_writes: usize,
    texture_binds: usize,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    draws: Vec<DrawReport>,
    stats: codegen::CacheStats,
}

fn simulate(profile: Option<&str>, args: &SimulateArgs) -> Result<()> {
    let scene = load_scene(&args.scene.scene, profile)?;
    let pipeline = scene.config.pipeline()?;
    let draw_kind = scene.config.draw_kind();

    let mut backend = RecordingBackend::new();
    let mut cache = ProgramCache::new(scene.caps, scene.config.cache.capacity);
    let mut draws = Vec::with_capacity(args.draws as usize);

    for draw in 0..args.draws {
        let hits = cache.stats().hits;
        let writes = backend.uniform_writes();
        let binds = backend.texture_binds();
        cache
            .prepare_draw(&pipeline, draw_kind, &mut backend)
            .with_context(|| format!("draw {draw} failed"))?;
        draws.push(DrawReport {
            draw,
            hit: cache.stats().hits > hits,
            uniform_writes: backend.uniform_writes() - writes,
            texture_binds: backend.texture_binds() - binds,
        });
    }

    let report = SimulationReport {
        draws,
        stats: cache.stats(),
    };
    cache.clear(&mut backend);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to encode report")?
        );
        return Ok(());
    }

    for draw in &report.draws {
        println!(
            "draw {:>3}: {} uniform_writes={} texture_binds={}",
            draw.draw,
            if draw.hit { "hit " } else { "miss" },
            draw.uniform_writes,
            draw.texture_binds
        );
    }
    let stats = report.stats;
    println!(
        "cache: entries={} hits={} misses={} builds={} compile_failures={} evictions={}",
        stats.entries, stats.hits, stats.misses, stats.builds, stats.compile_failures, stats.evictions
    );
    Ok(())
}
