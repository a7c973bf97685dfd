// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `eyerender`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "eyerender",
    version,
    about = "Render synthetic eye images with Blender.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Eyerender.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Eyerender.toml", global = true)]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `EYERENDER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Render the configured scene to an image.
    Render(RenderArgs),

    /// Print the generated scene script without running the renderer.
    Script(ScriptArgs),

    /// Print the renderer binary that would be used, and its version.
    Locate,
}

#[derive(Debug, Clone, clap::Args)]
pub struct RenderArgs {
    /// Output image; the extension selects the format (png, jpg, bmp).
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// Where the scene script dumps the resolved parameters.
    #[arg(long, value_name = "PATH")]
    pub params: Option<PathBuf>,

    /// Open the renderer UI instead of rendering in the background.
    #[arg(long)]
    pub foreground: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ScriptArgs {
    /// Output image path written into the script.
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub params: Option<PathBuf>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_subcommand_with_global_flags() {
        let args = CliArgs::try_parse_from([
            "eyerender",
            "render",
            "--output",
            "eye.png",
            "--foreground",
            "--config",
            "cfg/Eyerender.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.config, PathBuf::from("cfg/Eyerender.toml"));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        match args.command {
            Command::Render(r) => {
                assert_eq!(r.output, PathBuf::from("eye.png"));
                assert!(r.foreground);
                assert!(r.params.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn config_defaults_to_working_directory() {
        let args = CliArgs::try_parse_from(["eyerender", "locate"]).unwrap();
        assert_eq!(args.config, PathBuf::from("Eyerender.toml"));
        assert!(matches!(args.command, Command::Locate));
    }

    #[test]
    fn render_requires_output() {
        assert!(CliArgs::try_parse_from(["eyerender", "render"]).is_err());
    }
}
