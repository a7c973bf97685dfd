// src/locate.rs

//! Finding the renderer executable.
//!
//! Search order:
//! 1. the `BLENDER_PATH` environment variable,
//! 2. the `[renderer].binary` config value,
//! 3. `blender` on `PATH`,
//! 4. the usual install locations for the platform.
//!
//! Candidates must be existing, executable regular files.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::{RenderError, Result};

/// Environment variable overriding the renderer location.
pub const BINARY_ENV_VAR: &str = "BLENDER_PATH";

const BINARY_NAME: &str = if cfg!(windows) { "blender.exe" } else { "blender" };

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Blender\s+(\d+\.\d+)").expect("version regex is valid"));

/// Resolves the renderer executable for each job.
pub trait BinaryLocator: Send + Sync {
    fn locate(&self) -> Result<PathBuf>;
}

impl<F> BinaryLocator for F
where
    F: Fn() -> Result<PathBuf> + Send + Sync,
{
    fn locate(&self) -> Result<PathBuf> {
        self()
    }
}

/// The standard search described in the module docs.
#[derive(Debug, Clone, Default)]
pub struct DefaultLocator {
    pub env_override: Option<PathBuf>,
    pub configured: Option<PathBuf>,
    pub path_var: Option<OsString>,
    pub fallbacks: Vec<PathBuf>,
}

impl DefaultLocator {
    /// Build a locator from the process environment plus an optional
    /// configured path.
    pub fn from_env(configured: Option<PathBuf>) -> Self {
        Self {
            env_override: std::env::var_os(BINARY_ENV_VAR).map(PathBuf::from),
            configured,
            path_var: std::env::var_os("PATH"),
            fallbacks: platform_fallbacks(),
        }
    }

    fn candidates(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        out.extend(self.env_override.iter().cloned());
        out.extend(self.configured.iter().cloned());
        if let Some(path_var) = &self.path_var {
            out.extend(std::env::split_paths(path_var).map(|dir| dir.join(BINARY_NAME)));
        }
        out.extend(self.fallbacks.iter().cloned());
        out
    }
}

impl BinaryLocator for DefaultLocator {
    fn locate(&self) -> Result<PathBuf> {
        if let Some(env) = &self.env_override {
            if !is_executable(env) {
                warn!(
                    path = %env.display(),
                    "{BINARY_ENV_VAR} does not point to an executable; continuing search"
                );
            }
        }

        for candidate in self.candidates() {
            if is_executable(&candidate) {
                debug!(binary = %candidate.display(), "renderer binary located");
                return Ok(candidate);
            }
        }

        Err(RenderError::BinaryNotFound(format!(
            "no executable '{BINARY_NAME}' found; try setting the {BINARY_ENV_VAR} environment variable"
        )))
    }
}

fn platform_fallbacks() -> Vec<PathBuf> {
    let paths: &[&str] = if cfg!(windows) {
        &[
            "C:/Program Files/Blender Foundation/Blender/blender.exe",
            "C:/Program Files (x86)/Blender Foundation/Blender/blender.exe",
        ]
    } else {
        &[
            "/usr/local/bin/blender",
            "/usr/bin/blender",
            "/bin/blender",
            "/Applications/Blender/blender.app/Contents/MacOS/blender",
        ]
    };
    paths.iter().map(PathBuf::from).collect()
}

/// Whether `path` is a regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Run `<binary> --version` and extract the `major.minor` version.
///
/// Returns `Ok(None)` when the output carries no recognisable version.
pub async fn check_version(binary: &Path) -> Result<Option<String>> {
    let output = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_version(&stdout))
}

/// Extract `major.minor` from renderer `--version` output.
pub fn parse_version(output: &str) -> Option<String> {
    VERSION_RE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The scene scripts target the 4.x Python API.
pub fn is_supported_version(version: &str) -> bool {
    version.split('.').next() == Some("4")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn make_executable(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn env_override_wins_over_everything() {
        let dir = tempfile::tempdir().unwrap();
        let env = make_executable(dir.path(), "from-env");
        let cfg = make_executable(dir.path(), "from-config");

        let locator = DefaultLocator {
            env_override: Some(env.clone()),
            configured: Some(cfg),
            path_var: None,
            fallbacks: vec![],
        };
        assert_eq!(locator.locate().unwrap(), env);
    }

    #[cfg(unix)]
    #[test]
    fn falls_through_to_path_search() {
        let dir = tempfile::tempdir().unwrap();
        let bin_dir = dir.path().join("bin");
        std::fs::create_dir(&bin_dir).unwrap();
        let blender = make_executable(&bin_dir, "blender");

        let locator = DefaultLocator {
            env_override: Some(dir.path().join("missing")),
            configured: Some(dir.path().join("also-missing")),
            path_var: Some(std::env::join_paths([&bin_dir]).unwrap()),
            fallbacks: vec![],
        };
        assert_eq!(locator.locate().unwrap(), blender);
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("blender");
        std::fs::write(&plain, "not a program").unwrap();
        assert!(!is_executable(&plain));
        assert!(!is_executable(dir.path()));
    }

    #[test]
    fn missing_binary_is_a_configuration_error() {
        let locator = DefaultLocator::default();
        let err = locator.locate().unwrap_err();
        assert!(matches!(err, RenderError::BinaryNotFound(ref msg) if msg.contains(BINARY_ENV_VAR)));
        assert!(err.is_configuration());
    }

    #[test]
    fn closures_are_locators() {
        let locator = || -> Result<PathBuf> { Ok(PathBuf::from("/opt/blender/blender")) };
        assert_eq!(
            BinaryLocator::locate(&locator).unwrap(),
            PathBuf::from("/opt/blender/blender")
        );
    }

    #[test]
    fn version_parsing() {
        assert_eq!(
            parse_version("Blender 4.1.1\n\tbuild date: 2024-04-15\n").as_deref(),
            Some("4.1")
        );
        assert_eq!(parse_version("Blender  3.6.5 LTS").as_deref(), Some("3.6"));
        assert_eq!(parse_version("command not recognised"), None);
        assert!(is_supported_version("4.1"));
        assert!(!is_supported_version("3.6"));
        assert!(!is_supported_version("14.0"));
    }
}
