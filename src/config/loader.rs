// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks retry bounds and the scene parameters.
///
/// Relative paths inside the file are resolved against the file's directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw_config = load_from_path(path)?;
    let mut config = ConfigFile::try_from(raw_config)?;
    resolve_relative_paths(&mut config, &config_root_dir(path));
    Ok(config)
}

/// Default config location in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Eyerender.toml")
}

fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn resolve_relative_paths(config: &mut ConfigFile, root: &Path) {
    let r = &mut config.renderer;
    for path in [&mut r.model, &mut r.textures, &mut r.template] {
        if path.is_relative() {
            *path = root.join(&*path);
        }
    }
    if let Some(binary) = r.binary.as_mut() {
        if binary.is_relative() && binary.components().count() > 1 {
            *binary = root.join(&*binary);
        }
    }
}
