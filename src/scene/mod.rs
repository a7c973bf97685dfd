// src/scene/mod.rs

//! Scene description for the eye model.
//!
//! - [`params`] holds the typed scene parameters (eye, camera, lights).
//! - [`script`] renders them into the Python script handed to the renderer.
//!
//! The render supervisor never looks inside the script; it only receives the
//! finished text.

pub mod params;
pub mod script;

pub use params::{Light, SceneParams, Vec3};
pub use script::ScriptBuilder;
