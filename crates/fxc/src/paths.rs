use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "FXC_CONFIG_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Fxc";
const APPLICATION: &str = "fxc";

pub fn config_dir() -> Result<PathBuf> {
    if let Some(value) = env_override(ENV_CONFIG_DIR) {
        return Ok(value);
    }
    let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .ok_or_else(|| anyhow!("failed to determine user directories"))?;
    Ok(project_dirs.config_dir().to_path_buf())
}

/// Resolves a scene argument: an existing path is used as-is, otherwise
/// `<config>/scenes/<name>.toml` is tried.
pub fn resolve_scene(scene: &Path) -> Result<PathBuf> {
    if scene.is_file() {
        return Ok(scene.to_path_buf());
    }

    let scenes = config_dir()?.join("scenes");
    let mut candidate = scenes.join(scene);
    if candidate.extension().is_none() {
        candidate.set_extension("toml");
    }
    if candidate.is_file() {
        tracing::debug!(path = %candidate.display(), "resolved scene from config directory");
        return Ok(candidate);
    }

    bail!(
        "scene '{}' not found (also looked in {})",
        scene.display(),
        scenes.display()
    )
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
