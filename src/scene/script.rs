// src/scene/script.rs

//! Turns [`SceneParams`] into the Python script the renderer executes.
//!
//! The template is an ordinary Python file containing a `$INPUTS` line.
//! That line is replaced by one `name = value` assignment per input, and the
//! whole script is wrapped so any Python exception is appended to the
//! diagnostics log before the renderer exits with status 1.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{RenderError, Result};
use crate::scene::params::{Light, SceneParams, Vec3};

/// Placeholder in the template that receives the input assignments.
pub const INPUTS_PLACEHOLDER: &str = "$INPUTS";

#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    template: String,
    texture_dir: PathBuf,
    error_log: PathBuf,
}

impl ScriptBuilder {
    pub fn new(
        template: impl Into<String>,
        texture_dir: impl Into<PathBuf>,
        error_log: impl Into<PathBuf>,
    ) -> Result<Self> {
        let template = template.into();
        if !template.contains(INPUTS_PLACEHOLDER) {
            return Err(RenderError::ConfigError(format!(
                "script template has no {INPUTS_PLACEHOLDER} placeholder"
            )));
        }
        Ok(Self {
            template,
            texture_dir: texture_dir.into(),
            error_log: error_log.into(),
        })
    }

    /// Read the template from disk.
    pub fn from_template_file(
        path: impl AsRef<Path>,
        texture_dir: impl Into<PathBuf>,
        error_log: impl Into<PathBuf>,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RenderError::MissingAsset(path.to_path_buf()));
        }
        let template = fs::read_to_string(path)?;
        Self::new(template, texture_dir, error_log)
    }

    /// Path of the iris texture the scene will load.
    pub fn iris_texture(&self, params: &SceneParams) -> PathBuf {
        self.texture_dir.join(format!("ireye-{}.png", params.iris))
    }

    /// Build the complete script for rendering `params` to `output`.
    ///
    /// `params_path`, when given, is where the script dumps the resolved
    /// scene parameters.
    pub fn build(
        &self,
        params: &SceneParams,
        output: &Path,
        params_path: Option<&Path>,
        cuda: bool,
    ) -> Result<String> {
        params.validate()?;

        let texture = self.iris_texture(params);
        if !texture.is_file() {
            return Err(RenderError::MissingAsset(texture));
        }

        let inputs = render_inputs(params, output, params_path, cuda);
        let body = self.template.replace(INPUTS_PLACEHOLDER, &inputs);
        let script = wrap_with_error_handler(&body, &self.error_log);
        debug!(lines = script.lines().count(), "scene script built");
        Ok(script)
    }
}

/// One assignment per line, in a stable order.
fn render_inputs(
    params: &SceneParams,
    output: &Path,
    params_path: Option<&Path>,
    cuda: bool,
) -> String {
    let focus_distance = params.effective_focus_distance().unwrap_or_default();
    let render_seed = params.render_seed.unwrap_or_else(random_seed);
    let camera_noise_seed = params.camera_noise_seed.unwrap_or_else(random_seed);
    let camera_position = params.camera_position.unwrap_or_default();
    let camera_target = params.camera_target.unwrap_or_default();

    let lights = params.lights.iter().map(py_light).collect::<Vec<_>>().join(",");

    let inputs: Vec<(&str, String)> = vec![
        ("input_use_cuda", py_bool(cuda)),
        ("input_eye_radius", py_float(params.eye_radius)),
        ("input_eye_pos", py_vector(params.eye_position)),
        ("input_eye_target", py_vector(params.eye_target)),
        ("input_eye_up", py_vector(params.eye_up)),
        ("input_eye_closedness", py_float(params.eye_closedness)),
        ("input_iris", py_str(&params.iris)),
        (
            "input_eye_cornea_refrative_index",
            py_float(params.cornea_refractive_index),
        ),
        ("input_pupil_radius", py_float(params.pupil_radius)),
        ("input_cam_pos", py_vector(camera_position)),
        ("input_cam_target", py_vector(camera_target)),
        ("input_cam_up", py_vector(params.camera_up)),
        (
            "input_cam_image_size",
            format!("[{},{}]", params.image_size[0], params.image_size[1]),
        ),
        ("input_cam_focal_length", py_float(params.focal_length)),
        ("input_cam_focus_distance", py_float(focus_distance)),
        ("input_cam_fstop", py_float(params.fstop)),
        ("input_lights", format!("[{lights}]")),
        ("input_render_samples", params.render_samples.to_string()),
        ("input_render_seed", render_seed.to_string()),
        ("input_camera_noise_seed", camera_noise_seed.to_string()),
        ("output_render_path", py_path(output)),
        (
            "output_params_path",
            params_path.map(py_path).unwrap_or_else(|| "None".to_string()),
        ),
    ];

    let mut out = String::new();
    for (name, value) in inputs {
        let _ = writeln!(out, "{name} = {value}");
    }
    out.truncate(out.trim_end().len());
    out
}

fn wrap_with_error_handler(body: &str, error_log: &Path) -> String {
    let indented = body
        .split('\n')
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "import sys\n\
         try:\n\
         {indented}\n\
         except:\n\
         \x20   import traceback\n\
         \x20   with open(r'{log}','a') as f:\n\
         \x20       f.write('\\n'.join(traceback.format_exception(*sys.exc_info())))\n\
         \x20   sys.exit(1)",
        log = error_log.display()
    )
}

fn random_seed() -> u32 {
    rand::random_range(0..=i32::MAX as u32)
}

fn py_bool(b: bool) -> String {
    let literal = if b { "True" } else { "False" };
    literal.to_string()
}

/// `Debug` for `f64` always keeps a decimal point, so Python sees a float.
fn py_float(x: f64) -> String {
    format!("{x:?}")
}

fn py_vector(v: Vec3) -> String {
    format!("Vector([{},{},{}])", py_float(v[0]), py_float(v[1]), py_float(v[2]))
}

fn py_str(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Paths are passed with forward slashes so Windows separators never turn
/// into escape sequences.
fn py_path(p: &Path) -> String {
    format!("'{}'", p.display().to_string().replace('\\', "/"))
}

fn py_light(light: &Light) -> String {
    format!(
        "Light(location={},target={},type=\"{}\",size={},strength={},view_angle={})",
        py_vector(light.location),
        py_vector(light.target),
        light.kind,
        py_float(light.size),
        py_float(light.strength),
        py_float(light.view_angle)
    )
}
