// tests/config_loading.rs

mod common;
use crate::common::builders::ConfigFileBuilder;

use std::io::Write;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;

use eyerender::config::{load_and_validate, validate_config};
use eyerender::errors::RenderError;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_loads_with_relative_paths_resolved() {
    let file = write_config(
        r#"
[renderer]
model = "assets/eye.blend"
textures = "assets/textures"
cuda = false

[retry]
max_attempts = 4
backoff_ms = 250

[scene]
camera_position = [20, -50, -10]
camera_target = [0, -12, 0]
eye_closedness = 0.2
iris = "light"

[[scene.lights]]
location = [15, -50, -10]
target = [0, -12, 0]
strength = 3
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    let root = file.path().parent().unwrap();

    assert_eq!(cfg.renderer.model, root.join("assets/eye.blend"));
    assert_eq!(cfg.renderer.textures, root.join("assets/textures"));
    assert_eq!(cfg.renderer.template, root.join("blender_script.py.template"));
    assert_eq!(cfg.renderer.diagnostics_log, PathBuf::from("blender_err.log"));
    assert!(!cfg.renderer.cuda);
    assert!(cfg.renderer.background);

    assert_eq!(cfg.scene.iris, "light");
    assert_eq!(cfg.scene.lights.len(), 1);
    assert_eq!(cfg.scene.lights[0].strength, 3.0);
    assert_eq!(cfg.scene.lights[0].kind, "spot");

    let settings = cfg.render_settings();
    assert_eq!(settings.model_path, root.join("assets/eye.blend"));
    assert_eq!(settings.retry.max_attempts, NonZeroU32::new(4));
    assert_eq!(settings.retry.backoff, Duration::from_millis(250));
}

#[test]
fn retry_defaults_to_unlimited() {
    let file = write_config(
        r#"
[scene]
camera_position = [0, -50, 0]
camera_target = [0, 0, 0]
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    let policy = cfg.retry.policy();
    assert_eq!(policy.max_attempts, None);
    assert_eq!(policy.backoff, Duration::from_secs(1));
}

#[test]
fn zero_max_attempts_is_a_config_error() {
    let file = write_config(
        r#"
[retry]
max_attempts = 0

[scene]
camera_position = [0, -50, 0]
camera_target = [0, 0, 0]
"#,
    );

    match load_and_validate(file.path()) {
        Err(RenderError::ConfigError(msg)) => assert!(msg.contains("max_attempts")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn missing_camera_is_a_config_error() {
    let file = write_config("[renderer]\ncuda = true\n");

    match load_and_validate(file.path()) {
        Err(RenderError::ConfigError(msg)) => assert!(msg.contains("camera position")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn malformed_toml_returns_toml_error() {
    let file = write_config("[scene\ncamera_position = ");

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, RenderError::TomlError(_)), "got {err:?}");
}

#[test]
fn missing_file_returns_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("Eyerender.toml")).unwrap_err();
    assert!(matches!(err, RenderError::IoError(_)));
}

#[test]
fn builder_configs_validate() {
    let raw = ConfigFileBuilder::new().with_max_attempts(2).raw();
    assert!(validate_config(&raw).is_ok());

    let broken = ConfigFileBuilder::new().with_max_attempts(0).raw();
    assert!(validate_config(&broken).is_err());
}

#[test]
fn script_builder_reads_configured_template() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("scene.py.template");
    std::fs::write(&template, "import bpy\n$INPUTS\nrender()").unwrap();
    let textures = dir.path().join("textures");
    std::fs::create_dir(&textures).unwrap();
    std::fs::write(textures.join("ireye-dark.png"), b"png").unwrap();

    let mut cfg = ConfigFileBuilder::new().build();
    cfg.renderer.template = template;
    cfg.renderer.textures = textures;

    let script = cfg
        .script_builder()
        .unwrap()
        .build(&cfg.scene, &dir.path().join("eye.png"), None, cfg.renderer.cuda)
        .unwrap();
    assert!(script.contains("    input_render_seed = 1\n"));
    assert!(script.contains("    render()\nexcept:"));
}

#[test]
fn missing_template_is_reported() {
    let mut cfg = ConfigFileBuilder::new().build();
    cfg.renderer.template = PathBuf::from("/nonexistent/blender_script.py.template");

    let err = cfg.script_builder().unwrap_err();
    assert!(matches!(err, RenderError::MissingAsset(_)));
}
