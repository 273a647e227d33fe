//! Compiler `--report=json` error reports.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// A message fragment: plain text or styled text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageChunk {
    Plain(String),
    Styled {
        #[serde(default)]
        bold: bool,
        #[serde(default)]
        underline: bool,
        #[serde(default)]
        color: Option<String>,
        string: String,
    },
}

/// One problem inside a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub region: Value,
    pub message: Vec<MessageChunk>,
}

/// All problems of one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleProblems {
    pub path: String,
    pub name: String,
    pub problems: Vec<Problem>,
}

/// Structured compiler failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CompilerReport {
    /// A general problem not tied to a module (bad manifest, missing deps, ...).
    Error {
        #[serde(default)]
        path: Option<String>,
        title: String,
        message: Vec<MessageChunk>,
    },
    /// Per-module problems.
    CompileErrors { errors: Vec<ModuleProblems> },
}

impl CompilerReport {
    /// Parse a report from the compiler's diagnostic stream.
    pub fn parse(stderr: &str) -> Option<Self> {
        serde_json::from_str(stderr.trim()).ok()
    }

    /// Rewrite absolute paths to be relative to the build directory.
    pub fn relativize(self, dir: &Path) -> Self {
        self.map_paths(|path| relative_to(path, dir))
    }

    /// Rewrite every reported path with `f`.
    pub fn map_paths(mut self, f: impl Fn(&str) -> String) -> Self {
        match &mut self {
            Self::Error { path, .. } => {
                if let Some(path) = path {
                    *path = f(path);
                }
            }
            Self::CompileErrors { errors } => {
                for module in errors {
                    module.path = f(&module.path);
                }
            }
        }
        self
    }

    /// Short title for terminal status lines.
    pub fn summary(&self) -> String {
        match self {
            Self::Error { title, .. } => title.clone(),
            Self::CompileErrors { errors } => {
                let count: usize = errors.iter().map(|m| m.problems.len()).sum();
                format!("{count} problem(s) in {} module(s)", errors.len())
            }
        }
    }

    /// Plain-text rendering of the report, without styling.
    pub fn plain_text(&self) -> String {
        fn chunks(message: &[MessageChunk]) -> String {
            message
                .iter()
                .map(|chunk| match chunk {
                    MessageChunk::Plain(s) => s.as_str(),
                    MessageChunk::Styled { string, .. } => string.as_str(),
                })
                .collect()
        }

        match self {
            Self::Error { path, title, message } => {
                let location = path.as_deref().unwrap_or_default();
                format!("-- {title} -- {location}\n\n{}", chunks(message))
            }
            Self::CompileErrors { errors } => errors
                .iter()
                .flat_map(|module| {
                    module.problems.iter().map(move |problem| {
                        format!(
                            "-- {} -- {}\n\n{}",
                            problem.title,
                            module.path,
                            chunks(&problem.message)
                        )
                    })
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// Express `path` relative to `dir` when it lives inside it.
fn relative_to(path: &str, dir: &Path) -> String {
    let candidate = Path::new(path);
    let canonical_dir = dir.canonicalize().ok();

    [Some(dir), canonical_dir.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|base| candidate.strip_prefix(base).ok())
        .map(|rel| rel.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
