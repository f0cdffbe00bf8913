use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const SCENE: &str = r#"
version = 1

[caps]
profile = "desktop"

[[textures]]
name = "checker"
id = 7
width = 64
height = 64

[draw]
target = { width = 320, height = 240 }
color_input = "uniform"
uniform_color = [1.0, 0.0, 0.0, 1.0]

[draw.geometry]
type = "default"
local_coords = true

[[draw.color]]
type = "compose"
mode = "src-over"
src = { type = "texture", texture = "checker" }
dst = { type = "series", children = [
    { type = "const-color", color = [0.0, 1.0, 0.0, 1.0], mode = "modulate-a" },
    { type = "texture", texture = "checker", coords = "device" },
] }
"#;

fn write_scene(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("scene.toml");
    fs::write(&path, contents).unwrap();
    path
}

fn fxc(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fxc"))
        .env("FXC_CONFIG_DIR", config_dir)
        .env_remove("FXC_PROFILE")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run fxc")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "fxc failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn build_prints_both_stages() {
    let root = TempDir::new().unwrap();
    let scene = write_scene(root.path(), SCENE);
    let out = stdout(&fxc(root.path(), &["build", scene.to_str().unwrap(), "--key"]));

    assert!(out.starts_with("// key "));
    assert!(out.contains("// vertex"));
    assert!(out.contains("// fragment"));
    assert!(out.contains("uniform vec4 uColor;"));
    assert!(out.contains("_Stage1_c1_c0"), "nested child names missing:\n{out}");
    assert_eq!(out.matches("void main()").count(), 2);

    let fragment_only = stdout(&fxc(
        root.path(),
        &["build", scene.to_str().unwrap(), "--stage", "fragment"],
    ));
    assert!(!fragment_only.contains("// vertex"));
}

#[test]
fn key_is_deterministic_and_named_scenes_resolve() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("scenes")).unwrap();
    fs::write(root.path().join("scenes/nested.toml"), SCENE).unwrap();

    let first = stdout(&fxc(root.path(), &["key", "nested"]));
    let second = stdout(&fxc(root.path(), &["key", "nested"]));
    assert_eq!(first, second);
    assert!(first.contains("processors: 7"), "{first}");
}

#[test]
fn caps_profile_round_trips_through_json() {
    let root = TempDir::new().unwrap();
    let out = stdout(&fxc(root.path(), &["--profile", "gles2", "caps", "--json"]));
    let caps: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(caps["generation"], "es100");
    assert_eq!(caps["dst_read"], "framebuffer-fetch");
    assert_eq!(caps["texture_swizzle"], false);
}

#[test]
fn simulate_reports_elided_uploads() {
    let root = TempDir::new().unwrap();
    let scene = write_scene(root.path(), SCENE);
    let out = stdout(&fxc(
        root.path(),
        &["simulate", scene.to_str().unwrap(), "--draws", "3", "--json"],
    ));
    let report: serde_json::Value = serde_json::from_str(&out).unwrap();

    let draws = report["draws"].as_array().unwrap();
    assert_eq!(draws.len(), 3);
    assert_eq!(draws[0]["hit"], false);
    assert!(draws[0]["uniform_writes"].as_u64().unwrap() > 0);
    assert_eq!(draws[1]["hit"], true);
    assert_eq!(draws[1]["uniform_writes"], 0);
    assert_eq!(draws[2]["texture_binds"], 2);
    assert_eq!(report["stats"]["builds"], 1);
    assert_eq!(report["stats"]["hits"], 2);
}

#[test]
fn invalid_scene_fails_with_message() {
    let root = TempDir::new().unwrap();
    let scene = write_scene(
        root.path(),
        r#"
version = 1

[draw]
target = { width = 8, height = 8 }

[[draw.color]]
type = "texture"
texture = "nowhere"
"#,
    );
    let output = fxc(root.path(), &["build", scene.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown texture 'nowhere'"), "{stderr}");
}
