//! Elm compiler discovery and invocation.
//!
//! The compiler is tried through `npx --no-install elm` first (project-local
//! toolchains), then as `elm` from `PATH`. Only the 0.19 family is accepted.
//!
//! Callers never spawn the compiler directly: they go through the [`Invoke`]
//! trait so builds can run against a fake compiler in tests.

use crate::debug;
use crate::manifest::version::is_supported_compiler;
use crate::utils::exec::{Cmd, describe_failure};
use anyhow::Result;
use std::path::Path;
use thiserror::Error;

/// Supported compiler family, for messages.
pub const SUPPORTED_FAMILY: &str = "0.19";

// ============================================================================
// Errors
// ============================================================================

/// Fatal compiler discovery errors.
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("cannot run the elm compiler ({0})")]
    NotRunnable(String),

    #[error("unsupported elm version {0}, expected {SUPPORTED_FAMILY}.x")]
    UnsupportedVersion(String),
}

// ============================================================================
// Invocation
// ============================================================================

/// Captured result of one compiler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerOutput {
    /// Exit code, `None` if killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CompilerOutput {
    /// Exit status 0 and nothing on the diagnostic stream.
    pub fn is_clean(&self) -> bool {
        self.code == Some(0) && self.stderr.trim().is_empty()
    }
}

/// Synchronous "run compiler with args in directory".
pub trait Invoke: Send + Sync {
    fn invoke(&self, args: &[String], cwd: &Path) -> Result<CompilerOutput>;
}

/// A located, version-checked compiler.
#[derive(Debug, Clone)]
pub struct Compiler {
    /// Program plus leading arguments, e.g. `["npx", "--no-install", "elm"]`.
    launcher: Vec<String>,
    version: String,
}

impl Compiler {
    /// Locate a runnable compiler and validate its version.
    pub fn locate() -> Result<Self, CompilerError> {
        let mut failures = Vec::new();

        for launcher in candidate_launchers(&mut failures) {
            match probe(&launcher) {
                Ok(version) => {
                    debug!("elm"; "using `{}` ({})", launcher.join(" "), version);
                    return Self::validated(launcher, version);
                }
                Err(reason) => {
                    debug!("elm"; "`{}` unusable: {}", launcher.join(" "), reason);
                    failures.push(reason);
                }
            }
        }

        Err(CompilerError::NotRunnable(failures.join("; ")))
    }

    /// Accept `launcher` if `version` is in the supported family.
    fn validated(launcher: Vec<String>, version: String) -> Result<Self, CompilerError> {
        if !is_supported_compiler(&version) {
            return Err(CompilerError::UnsupportedVersion(version));
        }
        Ok(Self { launcher, version })
    }

    /// Reported compiler version, e.g. `0.19.1`.
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl Invoke for Compiler {
    fn invoke(&self, args: &[String], cwd: &Path) -> Result<CompilerOutput> {
        debug!("elm"; "{} {}", self.launcher.join(" "), args.join(" "));
        let output = Cmd::from_slice(&self.launcher).args(args).cwd(cwd).output()?;
        Ok(CompilerOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Launchers in preference order; lookup failures are recorded.
fn candidate_launchers(failures: &mut Vec<String>) -> Vec<Vec<String>> {
    let mut launchers = Vec::new();

    match which::which("npx") {
        Ok(npx) => launchers.push(vec![display(&npx), "--no-install".into(), "elm".into()]),
        Err(e) => failures.push(format!("npx: {e}")),
    }
    match which::which("elm") {
        Ok(elm) => launchers.push(vec![display(&elm)]),
        Err(e) => failures.push(format!("elm: {e}")),
    }

    launchers
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Run `<launcher> --version`.
///
/// Fails on launch error, non-zero exit, or anything on stderr.
fn probe(launcher: &[String]) -> Result<String, String> {
    let name = launcher.join(" ");
    let output = Cmd::from_slice(launcher)
        .arg("--version")
        .output()
        .map_err(|e| format!("{name}: {e}"))?;

    if !output.status.success() || !output.stderr.is_empty() {
        return Err(describe_failure(&name, &output));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

// ============================================================================
// Tests
// ============================================================================
