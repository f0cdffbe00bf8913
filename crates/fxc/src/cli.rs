use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "fxc",
    author,
    version,
    about = "Effect-tree shader program compiler",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Capability profile (`desktop`, `gles2`, `gles3`); overrides the scene's `[caps] profile`.
    #[arg(long, global = true, env = "FXC_PROFILE", value_name = "NAME")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate and print the vertex and fragment source for a scene.
    Build(BuildArgs),
    /// Print the program key of a scene.
    Key(SceneArgs),
    /// Print the resolved device capabilities.
    Caps(CapsArgs),
    /// Run repeated draws through the program cache against a recording backend.
    Simulate(SimulateArgs),
    /// List the registered processor classes.
    Classes,
}

#[derive(Parser, Debug)]
pub struct SceneArgs {
    /// Scene TOML file, or the name of a scene in the config directory.
    #[arg(value_name = "SCENE")]
    pub scene: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StageFilter {
    Vertex,
    Fragment,
    Both,
}

#[derive(Parser, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub scene: SceneArgs,

    /// Print the program key before the sources.
    #[arg(long)]
    pub key: bool,

    /// Which shader stage to print.
    #[arg(long, value_enum, default_value = "both")]
    pub stage: StageFilter,
}

#[derive(Parser, Debug)]
pub struct CapsArgs {
    /// Read `[caps]` from this scene instead of using the bare profile.
    #[arg(long, value_name = "SCENE")]
    pub scene: Option<PathBuf>,

    /// Print JSON instead of TOML.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub scene: SceneArgs,

    /// Number of draws to issue.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub draws: u32,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}
