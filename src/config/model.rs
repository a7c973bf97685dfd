// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::diagnostics::DEFAULT_DIAGNOSTICS_LOG;
use crate::errors::Result;
use crate::exec::RenderSettings;
use crate::job::RetryPolicy;
use crate::locate::DefaultLocator;
use crate::scene::{SceneParams, ScriptBuilder};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [renderer]
/// model = "Swirski-EyeModel.blend"
/// textures = "textures"
/// template = "blender_script.py.template"
///
/// [retry]
/// max_attempts = 5
/// backoff_ms = 1000
///
/// [scene]
/// camera_position = [20, -50, -10]
/// camera_target = [0, -12, 0]
///
/// [[scene.lights]]
/// location = [15, -50, -10]
/// target = [0, -12, 0]
/// ```
///
/// All sections are optional and have reasonable defaults, but the scene's
/// camera placement must be set for validation to pass.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub renderer: RendererSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub scene: SceneParams,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub renderer: RendererSection,
    pub retry: RetrySection,
    pub scene: SceneParams,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        renderer: RendererSection,
        retry: RetrySection,
        scene: SceneParams,
    ) -> Self {
        Self {
            renderer,
            retry,
            scene,
        }
    }

    /// Supervisor settings derived from `[renderer]` and `[retry]`.
    pub fn render_settings(&self) -> RenderSettings {
        let mut settings = RenderSettings::new(&self.renderer.model);
        settings.diagnostics_path = self.renderer.diagnostics_log.clone();
        settings.retry = self.retry.policy();
        settings
    }

    /// Binary search honouring `BLENDER_PATH` and `[renderer].binary`.
    pub fn locator(&self) -> DefaultLocator {
        DefaultLocator::from_env(self.renderer.binary.clone())
    }

    /// Read the script template named in `[renderer].template`.
    pub fn script_builder(&self) -> Result<ScriptBuilder> {
        ScriptBuilder::from_template_file(
            &self.renderer.template,
            &self.renderer.textures,
            &self.renderer.diagnostics_log,
        )
    }
}

/// `[renderer]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererSection {
    /// Explicit renderer executable; `BLENDER_PATH` still takes precedence.
    pub binary: Option<PathBuf>,
    /// Scene file loaded before the generated script runs.
    pub model: PathBuf,
    /// Directory holding `ireye-<iris>.png` textures.
    pub textures: PathBuf,
    /// Script template containing a `$INPUTS` line.
    pub template: PathBuf,
    /// Warn when the renderer is not a 4.x release.
    pub check_version: bool,
    pub diagnostics_log: PathBuf,
    /// Run without UI and render frame 0 to the output path.
    pub background: bool,
    pub cuda: bool,
}

impl Default for RendererSection {
    fn default() -> Self {
        Self {
            binary: None,
            model: PathBuf::from("Swirski-EyeModel.blend"),
            textures: PathBuf::from("textures"),
            template: PathBuf::from("blender_script.py.template"),
            check_version: true,
            diagnostics_log: PathBuf::from(DEFAULT_DIAGNOSTICS_LOG),
            background: true,
            cuda: true,
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Total attempts per job; unlimited when absent.
    pub max_attempts: Option<u32>,
    pub backoff_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff_ms: 1000,
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        let policy = match self.max_attempts {
            Some(n) => RetryPolicy::bounded(n),
            None => RetryPolicy::unlimited(),
        };
        policy.with_backoff(Duration::from_millis(self.backoff_ms))
    }
}
