//! Documentation builder.
//!
//! Produces the documentation artifact for a project, or a structured error
//! report when the compiler refuses it. Never fails: every problem becomes
//! a renderable [`Docs`] value.
//!
//! ```text
//! package      ──► elm make --docs=<tmp> --report=json ──► Docs
//! application  ──► synthesize ──► (package branch in tmp dir) ──► Docs
//! ```

pub mod report;

pub use report::{CompilerReport, MessageChunk};

use crate::compiler::Invoke;
use crate::manifest::{Manifest, error_chain};
use crate::synth::{self, Synthesis};
use crate::{debug, log};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Build output: module documentation or a compiler report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Docs {
    /// Per-module documentation records, passed through untouched.
    Modules(Vec<Value>),
    Report(CompilerReport),
}

impl Default for Docs {
    fn default() -> Self {
        Self::Modules(Vec::new())
    }
}

impl Docs {
    #[cfg(test)]
    pub fn is_report(&self) -> bool {
        matches!(self, Self::Report(_))
    }

    fn from_error(title: &str, err: &dyn std::error::Error) -> Self {
        Self::Report(CompilerReport::Error {
            path: None,
            title: title.to_string(),
            message: vec![MessageChunk::Plain(error_chain(err))],
        })
    }
}

/// Per-build switches.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Remove the synthesized package afterwards.
    pub clean: bool,
    /// Echo compiler progress output.
    pub verbose: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            clean: true,
            verbose: false,
        }
    }
}

/// Build the documentation of the project described by `manifest` in `dir`.
pub fn build(manifest: &Manifest, dir: &Path, elm: &dyn Invoke, options: BuildOptions) -> Docs {
    if manifest.is_application() {
        build_application(manifest, dir, elm, options)
    } else {
        build_package(dir, elm, options)
    }
}

fn build_application(app: &Manifest, root: &Path, elm: &dyn Invoke, options: BuildOptions) -> Docs {
    let synthesis = match synth::synthesize(app, root) {
        Ok(synthesis) => synthesis,
        Err(e) => {
            log!("synth"; "cannot prepare package: {}", e);
            return Docs::from_error("CANNOT PREPARE PACKAGE", &e);
        }
    };

    report_synthesis(&synthesis);
    let docs = match build_package(synthesis.path(), elm, options) {
        // Point problems at the files the user edits, not their mirrors.
        Docs::Report(report) => {
            Docs::Report(report.map_paths(|path| synthesis.source_path(path, root)))
        }
        docs => docs,
    };

    if options.clean {
        let path = synthesis.path().to_path_buf();
        if let Err(e) = synthesis.remove() {
            log!("synth"; "cannot remove {}: {}", path.display(), e);
        }
    } else {
        let kept = synthesis.keep();
        log!("synth"; "kept {}", kept.display());
    }

    docs
}

fn report_synthesis(synthesis: &Synthesis) {
    debug!(
        "synth";
        "package at {} exposes {} module(s)",
        synthesis.path().display(),
        synthesis.manifest.modules().len()
    );
    let outcome = &synthesis.log;
    if !outcome.has_warnings() {
        return;
    }

    let failed = outcome.failures().count();
    let unmatched = outcome.unmatched_ports();
    let mut parts = Vec::new();
    if failed > 0 {
        parts.push(format!("{failed} file(s) skipped"));
    }
    if !unmatched.is_empty() {
        parts.push(format!("unstubbed port(s): {}", unmatched.join(", ")));
    }
    if !outcome.missing_dirs.is_empty() {
        parts.push(format!("{} missing source dir(s)", outcome.missing_dirs.len()));
    }
    log!("warning"; "synthesis: {}", parts.join("; "));
}

fn build_package(dir: &Path, elm: &dyn Invoke, options: BuildOptions) -> Docs {
    let output = match tempfile::Builder::new()
        .prefix("edp-docs-")
        .suffix(".json")
        .tempfile()
    {
        Ok(file) => file.into_temp_path(),
        Err(e) => {
            log!("build"; "cannot create docs file: {}", e);
            return Docs::default();
        }
    };

    let args = vec![
        "make".to_string(),
        format!("--docs={}", output.display()),
        "--report=json".to_string(),
    ];

    let result = match elm.invoke(&args, dir) {
        Ok(result) => result,
        Err(e) => {
            log!("build"; "compiler failed to run: {:#}", e);
            return Docs::default();
        }
    };

    if options.verbose {
        for line in result.stdout.lines().filter(|l| !l.trim().is_empty()) {
            log!("elm"; "{}", line);
        }
    }

    if result.is_clean() {
        match read_modules(&output) {
            Ok(modules) => {
                debug!("build"; "{} module(s) documented", modules.len());
                return Docs::Modules(modules);
            }
            Err(e) => log!("build"; "unreadable docs output: {}", e),
        }
    }

    match CompilerReport::parse(&result.stderr) {
        Some(report) => {
            let report = report.relativize(dir);
            debug!("build"; "compiler reported: {}", report.summary());
            Docs::Report(report)
        }
        None => {
            if !result.stderr.trim().is_empty() {
                log!("build"; "unrecognized compiler output:\n{}", result.stderr.trim_end());
            }
            Docs::default()
        }
    }
}

fn read_modules(path: &Path) -> anyhow::Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

// ============================================================================
// tests
// ============================================================================
