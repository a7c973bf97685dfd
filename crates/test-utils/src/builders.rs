#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use eyerender::config::{ConfigFile, RawConfigFile};
use eyerender::exec::RenderSettings;
use eyerender::job::RetryPolicy;
use eyerender::scene::{Light, SceneParams};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from a scene with the camera placed and one spot light, so the
/// result passes validation unless a test deliberately breaks it.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                scene: placed_scene(),
                ..RawConfigFile::default()
            },
        }
    }

    pub fn with_model(mut self, model: &Path) -> Self {
        self.config.renderer.model = model.to_path_buf();
        self
    }

    pub fn with_binary(mut self, binary: &Path) -> Self {
        self.config.renderer.binary = Some(binary.to_path_buf());
        self
    }

    pub fn with_diagnostics_log(mut self, path: &Path) -> Self {
        self.config.renderer.diagnostics_log = path.to_path_buf();
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = Some(attempts);
        self
    }

    pub fn with_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry.backoff_ms = ms;
        self
    }

    pub fn with_scene(mut self, scene: SceneParams) -> Self {
        self.config.scene = scene;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Scene with the camera placed in front of the eye and a single light.
pub fn placed_scene() -> SceneParams {
    SceneParams {
        camera_position: Some([20.0, -50.0, -10.0]),
        camera_target: Some([0.0, -12.0, 0.0]),
        lights: vec![Light::spot([15.0, -50.0, -10.0], [0.0, -12.0, 0.0])],
        render_seed: Some(1),
        camera_noise_seed: Some(2),
        ..SceneParams::default()
    }
}

/// Supervisor settings with all files under `dir` and a short backoff.
pub fn fast_settings(dir: &Path, retry: RetryPolicy) -> RenderSettings {
    let mut settings = RenderSettings::new(dir.join("model.blend"));
    settings.diagnostics_path = dir.join("blender_err.log");
    settings.retry = retry.with_backoff(Duration::from_millis(10));
    settings.poll_interval = Duration::from_millis(20);
    settings.scratch_root = Some(dir.to_path_buf());
    settings
}
