// src/lib.rs

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod exec;
pub mod job;
pub mod lease;
pub mod locate;
pub mod logging;
pub mod progress;
pub mod scene;
pub mod types;

use std::process::ExitCode;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command, RenderArgs, ScriptArgs};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::exec::Supervisor;
use crate::job::{JobOutcome, JobSpec};
use crate::lease::RendererSlot;
use crate::locate::BinaryLocator;

/// Exit status used when a render is interrupted with Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - scene script generation
/// - renderer lookup and version check
/// - the supervisor, with a console progress callback
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<ExitCode> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    debug!(config = %args.config.display(), "config loaded");

    match args.command {
        Command::Render(render) => run_render(&cfg, render).await,
        Command::Script(script) => {
            print_script(&cfg, script)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Locate => {
            print_location(&cfg).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_render(cfg: &ConfigFile, args: RenderArgs) -> Result<ExitCode> {
    let builder = cfg.script_builder()?;
    let script = builder.build(
        &cfg.scene,
        &args.output,
        args.params.as_deref(),
        cfg.renderer.cuda,
    )?;

    let mut spec = JobSpec::new(script, &args.output)?
        .in_background(cfg.renderer.background && !args.foreground)
        .with_sample_count(cfg.scene.render_samples);
    if let Some(params) = &args.params {
        spec = spec.with_params_path(params);
    }

    let locator = cfg.locator();
    if cfg.renderer.check_version {
        let binary = locator.locate()?;
        warn_on_unsupported_version(&binary).await;
    }

    let supervisor = Supervisor::new(cfg.render_settings(), locator);
    let slot = RendererSlot::new();
    let lease = slot.acquire().await;

    let cancel = CancellationToken::new();
    // Ctrl-C → cancel the running job.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            cancel.cancel();
        });
    }

    let outcome = supervisor
        .run(&lease, &spec, |record| println!("{record}"), &cancel)
        .await?;

    match outcome {
        JobOutcome::Success { artifact } => {
            info!(output = %artifact.display(), "render complete");
            println!("Rendered {}", artifact.display());
            Ok(ExitCode::SUCCESS)
        }
        JobOutcome::Failed {
            exit_code,
            attempts,
            diagnostics_path,
            report,
        } => {
            eprintln!(
                "render failed after {attempts} attempt(s), last exit code {exit_code}; log kept at {}",
                diagnostics_path.display()
            );
            eprintln!("{report}");
            Ok(ExitCode::FAILURE)
        }
        JobOutcome::Cancelled => {
            eprintln!("render cancelled");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
    }
}

fn print_script(cfg: &ConfigFile, args: ScriptArgs) -> Result<()> {
    let builder = cfg.script_builder()?;
    let script = builder.build(
        &cfg.scene,
        &args.output,
        args.params.as_deref(),
        cfg.renderer.cuda,
    )?;
    println!("{script}");
    Ok(())
}

async fn print_location(cfg: &ConfigFile) -> Result<()> {
    let binary = cfg.locator().locate()?;
    println!("{}", binary.display());
    match locate::check_version(&binary).await? {
        Some(version) => println!("Blender {version}"),
        None => println!("unknown version"),
    }
    Ok(())
}

async fn warn_on_unsupported_version(binary: &std::path::Path) {
    match locate::check_version(binary).await {
        Ok(Some(version)) if locate::is_supported_version(&version) => {
            debug!(%version, "renderer version ok");
        }
        Ok(Some(version)) => {
            warn!(%version, "renderer is not a 4.x release; the scene script may not work");
        }
        Ok(None) => warn!(binary = %binary.display(), "could not determine renderer version"),
        Err(e) => warn!(binary = %binary.display(), error = %e, "running renderer --version failed"),
    }
}
