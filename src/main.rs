//! elm-doc-preview - offline documentation preview for Elm projects.

mod actor;
mod cli;
mod compiler;
mod config;
mod core;
mod docs;
mod embed;
mod logger;
mod manifest;
mod preview;
mod server;
mod synth;
mod utils;

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};

use cli::Cli;
use compiler::Compiler;
use config::PreviewConfig;
use docs::{BuildOptions, Docs};
use preview::Preview;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            log!("error"; "{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let start = utils::path::normalize_path(cli.path.as_deref().unwrap_or(Path::new(".")));
    let manifest_path = manifest::find_manifest(&start)
        .with_context(|| format!("no elm.json found in {} or its parents", start.display()))?;
    let root = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let config = PreviewConfig::load(&root, &cli)?;
    let compiler = Compiler::locate()?;
    log!("elm"; "compiler {}", compiler.version());

    let options = BuildOptions {
        clean: !config.build.debug,
        verbose: cli.verbose,
    };
    let preview = Preview::open(&manifest_path, Arc::new(compiler), options)?;
    log!(
        "preview";
        "{} {}",
        preview.manifest().name.as_deref().unwrap_or("?"),
        preview.manifest().version.as_deref().unwrap_or("")
    );

    if let Some(output) = &cli.output {
        return build_once(&preview, output);
    }

    let snapshot = preview.snapshot();
    actor::build::report_docs(&snapshot.docs);
    server::serve(preview, snapshot, &config.serve)?;
    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// One-shot Build
// =============================================================================

/// Build once and write the documentation JSON to `output` (`-` for stdout).
///
/// Exits with failure when the build produced a compiler report.
fn build_once(preview: &Preview, output: &Path) -> Result<ExitCode> {
    let docs = preview.build_docs();
    let json = serde_json::to_string(&docs).context("cannot encode documentation")?;

    if output.as_os_str() == "-" {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{json}")?;
        stdout.flush()?;
    } else {
        std::fs::write(output, json)
            .with_context(|| format!("cannot write {}", output.display()))?;
        log!("build"; "wrote {}", output.display());
    }

    if let Docs::Report(report) = &docs {
        log!("error"; "{}", report.summary());
        eprintln!("{}", report.plain_text());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
