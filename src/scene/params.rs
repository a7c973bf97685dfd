// src/scene/params.rs

use serde::Deserialize;
use tracing::warn;

use crate::errors::{RenderError, Result};

/// A point or direction in scene units (millimetres).
///
/// Axes: +X is the subject's left, +Y points backwards out of the head, +Z
/// is up. The eye sits at the origin looking down -Y by default.
pub type Vec3 = [f64; 3];

/// Typed scene description: eye geometry, camera, lights and sampling.
///
/// Every field has a default except the camera placement, which must be set
/// before a script can be built.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneParams {
    pub eye_radius: f64,
    pub eye_position: Vec3,
    pub eye_target: Vec3,
    pub eye_up: Vec3,
    /// 0.0 is fully open, 1.0 fully closed.
    pub eye_closedness: f64,

    /// Selects the texture `ireye-<iris>.png`.
    pub iris: String,
    pub cornea_refractive_index: f64,
    pub pupil_radius: f64,

    pub camera_position: Option<Vec3>,
    pub camera_target: Option<Vec3>,
    pub camera_up: Vec3,

    pub image_size: [u32; 2],
    /// In pixels.
    pub focal_length: f64,
    /// Distance to the focal plane; camera-to-target distance when unset.
    pub focus_distance: Option<f64>,
    pub fstop: f64,

    pub lights: Vec<Light>,

    pub render_samples: u32,
    /// Random when unset.
    pub render_seed: Option<u32>,
    /// Random when unset.
    pub camera_noise_seed: Option<u32>,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            eye_radius: 24.0 / 2.0,
            eye_position: [0.0, 0.0, 0.0],
            eye_target: [0.0, -1000.0, 0.0],
            eye_up: [0.0, 0.0, 1.0],
            eye_closedness: 0.0,
            iris: "dark".to_string(),
            cornea_refractive_index: 1.336,
            pupil_radius: 4.0 / 2.0,
            camera_position: None,
            camera_target: None,
            camera_up: [0.0, 0.0, 1.0],
            image_size: [640, 480],
            focal_length: default_focal_length(640),
            focus_distance: None,
            fstop: 2.0,
            lights: Vec::new(),
            render_samples: 20,
            render_seed: None,
            camera_noise_seed: None,
        }
    }
}

/// Focal length in pixels for a 45° horizontal field of view.
pub fn default_focal_length(image_width: u32) -> f64 {
    (f64::from(image_width) / 2.0) / (45f64.to_radians() / 2.0).tan()
}

impl SceneParams {
    /// Check the parameters that have no usable default.
    pub fn validate(&self) -> Result<()> {
        if self.camera_position.is_none() {
            return Err(RenderError::ConfigError("camera position not set".to_string()));
        }
        if self.camera_target.is_none() {
            return Err(RenderError::ConfigError("camera target not set".to_string()));
        }
        if self.image_size.contains(&0) {
            return Err(RenderError::ConfigError(format!(
                "image size must be non-zero (got {}x{})",
                self.image_size[0], self.image_size[1]
            )));
        }
        if self.iris.trim().is_empty() {
            return Err(RenderError::ConfigError("iris name must not be empty".to_string()));
        }
        if self.lights.is_empty() {
            warn!("no lights in scene");
        }
        Ok(())
    }

    /// The configured focus distance, or the camera-to-target distance.
    pub fn effective_focus_distance(&self) -> Option<f64> {
        if let Some(d) = self.focus_distance {
            return Some(d);
        }
        let (pos, target) = (self.camera_position?, self.camera_target?);
        Some(
            pos.iter()
                .zip(target.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt(),
        )
    }
}

/// A light aimed at a target point.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Light {
    pub location: Vec3,
    pub target: Vec3,
    #[serde(rename = "type", default = "default_light_kind")]
    pub kind: String,
    #[serde(default = "default_light_size")]
    pub size: f64,
    #[serde(default = "default_light_strength")]
    pub strength: f64,
    /// Spot cone angle in degrees.
    #[serde(default = "default_view_angle")]
    pub view_angle: f64,
}

impl Light {
    /// A spot light with default size, strength and cone.
    pub fn spot(location: Vec3, target: Vec3) -> Self {
        Self {
            location,
            target,
            kind: default_light_kind(),
            size: default_light_size(),
            strength: default_light_strength(),
            view_angle: default_view_angle(),
        }
    }
}

fn default_light_kind() -> String {
    "spot".to_string()
}

fn default_light_size() -> f64 {
    2.0
}

fn default_light_strength() -> f64 {
    2.0
}

fn default_view_angle() -> f64 {
    45.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed() -> SceneParams {
        SceneParams {
            camera_position: Some([20.0, -50.0, -10.0]),
            camera_target: Some([0.0, -12.0, 0.0]),
            ..SceneParams::default()
        }
    }

    #[test]
    fn defaults_describe_an_open_eye_looking_forward() {
        let p = SceneParams::default();
        assert_eq!(p.eye_radius, 12.0);
        assert_eq!(p.pupil_radius, 2.0);
        assert_eq!(p.iris, "dark");
        assert_eq!(p.render_samples, 20);
        assert!((p.focal_length - 772.5483).abs() < 1e-3);
    }

    #[test]
    fn camera_placement_is_required() {
        let err = SceneParams::default().validate().unwrap_err();
        assert!(matches!(err, RenderError::ConfigError(ref m) if m.contains("camera position")));

        let no_target = SceneParams {
            camera_position: Some([0.0, -50.0, 0.0]),
            ..SceneParams::default()
        };
        assert!(no_target.validate().is_err());
        assert!(placed().validate().is_ok());
    }

    #[test]
    fn focus_distance_defaults_to_camera_target_distance() {
        let p = SceneParams {
            camera_position: Some([0.0, -50.0, 0.0]),
            camera_target: Some([0.0, -20.0, 40.0]),
            ..SceneParams::default()
        };
        assert_eq!(p.effective_focus_distance(), Some(50.0));

        let fixed = SceneParams {
            focus_distance: Some(33.0),
            ..p
        };
        assert_eq!(fixed.effective_focus_distance(), Some(33.0));
    }

    #[test]
    fn lights_deserialize_with_defaults() {
        let light: Light = toml::from_str("location = [15, -50, -10]\ntarget = [0, -12, 0]").unwrap();
        assert_eq!(light, Light::spot([15.0, -50.0, -10.0], [0.0, -12.0, 0.0]));

        let area: Light =
            toml::from_str("location = [0, 0, 0]\ntarget = [0, 1, 0]\ntype = \"area\"\nsize = 5")
                .unwrap();
        assert_eq!(area.kind, "area");
        assert_eq!(area.size, 5.0);
    }
}
