//! Synthetic package builder.
//!
//! The compiler only emits documentation for packages, so an application is
//! previewed through a throwaway package that mirrors it:
//!
//! ```text
//! <root>/elm-stuff/elm-doc-preview/edp-XXXXXX/
//! ├── elm.json     # package manifest derived from the application
//! └── src/         # every source directory merged, files symlinked
//! ```
//!
//! Modules declaring ports are written as patched copies (see [`ports`]).
//! Per-file failures never abort synthesis; they are collected in a
//! [`SynthesisLog`] for the caller to report.

mod link;
pub mod ports;

use crate::manifest::{
    self, Dependencies, ExposedModules, Manifest, ProjectKind, version::to_constraint,
};
use crate::{debug, log};
use jwalk::WalkDir;
use link::{LinkMode, link_or_copy};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch area for synthesized packages, relative to the project root.
pub const SCRATCH_DIR: &str = "elm-stuff/elm-doc-preview";

const SOURCE_EXT: &str = "elm";

/// Source directory of the synthesized package.
const PACKAGE_SRC: &str = "src";

// ============================================================================
// Outcomes
// ============================================================================

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Linked(PathBuf),
    Copied(PathBuf),
    Patched {
        path: PathBuf,
        stubbed: usize,
        unmatched: Vec<String>,
    },
    Failed {
        path: PathBuf,
        error: String,
    },
}

/// Per-file outcomes of one synthesis.
#[derive(Debug, Default)]
pub struct SynthesisLog {
    pub outcomes: Vec<FileOutcome>,
    /// Source directories that do not exist.
    pub missing_dirs: Vec<PathBuf>,
    /// Package-relative path of each mirrored file to its original.
    pub sources: BTreeMap<PathBuf, PathBuf>,
}

impl SynthesisLog {
    fn push(&mut self, outcome: FileOutcome) {
        match &outcome {
            FileOutcome::Linked(path) => debug!("synth"; "linked {}", path.display()),
            FileOutcome::Copied(path) => debug!("synth"; "copied {}", path.display()),
            FileOutcome::Patched { path, stubbed, unmatched } => {
                debug!("synth"; "stubbed {} port(s) in {}", stubbed, path.display());
                for name in unmatched {
                    log!("synth"; "port `{}` in {} is neither Cmd nor Sub, left as-is", name, path.display());
                }
            }
            FileOutcome::Failed { path, error } => {
                log!("synth"; "skipped {}: {}", path.display(), error);
            }
        }
        self.outcomes.push(outcome);
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    /// Names of ports left unstubbed.
    pub fn unmatched_ports(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .flat_map(|o| match o {
                FileOutcome::Patched { unmatched, .. } => unmatched.as_slice(),
                _ => &[],
            })
            .map(String::as_str)
            .collect()
    }

    /// Whether anything should be surfaced as a build warning.
    pub fn has_warnings(&self) -> bool {
        self.failures().next().is_some()
            || !self.unmatched_ports().is_empty()
            || !self.missing_dirs.is_empty()
    }
}

// ============================================================================
// Synthesis
// ============================================================================

/// A synthesized package on disk.
///
/// The directory is removed on drop unless [`Synthesis::keep`] is called.
#[derive(Debug)]
pub struct Synthesis {
    dir: TempDir,
    pub manifest: Manifest,
    pub log: SynthesisLog,
}

impl Synthesis {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Keep the directory for inspection and return its path.
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }

    /// Remove the directory now, reporting failures.
    pub fn remove(self) -> io::Result<()> {
        self.dir.close()
    }

    /// Map a package-relative path back to the file it mirrors, relative
    /// to the application `root`. Unknown paths are returned unchanged.
    pub fn source_path(&self, path: &str, root: &Path) -> String {
        let Some(original) = self.log.sources.get(Path::new(path)) else {
            return path.to_string();
        };
        original
            .strip_prefix(root)
            .unwrap_or(original)
            .to_string_lossy()
            .into_owned()
    }
}

/// Materialize a package equivalent to the application `app` rooted at `root`.
pub fn synthesize(app: &Manifest, root: &Path) -> io::Result<Synthesis> {
    let scratch = root.join(SCRATCH_DIR);
    fs::create_dir_all(&scratch)?;
    let dir = tempfile::Builder::new()
        .prefix("edp-")
        .tempdir_in(&scratch)?;

    let src = dir.path().join(PACKAGE_SRC);
    fs::create_dir_all(&src)?;

    let mut log = SynthesisLog::default();
    let mut modules = app.modules();
    let mut seen_parents = FxHashSet::default();

    for source_dir in &app.source_directories {
        let source_root = root.join(source_dir);
        if !source_root.is_dir() {
            log!("synth"; "source directory {} not found", source_root.display());
            log.missing_dirs.push(source_root);
            continue;
        }

        mirror_sources(&source_root, &src, &mut log);

        // Vendored package: `<pkg>/src` listed as a source directory.
        if let Some(parent) = source_root.parent()
            && seen_parents.insert(parent.to_path_buf())
            && let Some(vendored) = manifest::load_package(parent)
        {
            debug!("synth"; "exposing modules of vendored {}", parent.display());
            modules.extend(vendored.modules());
        }
    }

    let manifest = package_manifest(app, modules);
    write_manifest(dir.path(), &manifest)?;

    Ok(Synthesis { dir, manifest, log })
}

/// Derive the package manifest for `app` exposing `modules`.
pub fn package_manifest(app: &Manifest, modules: Vec<String>) -> Manifest {
    let dependencies: BTreeMap<String, String> = app
        .dependencies
        .direct()
        .iter()
        .map(|(name, version)| (name.clone(), to_constraint(version)))
        .collect();

    Manifest {
        kind: ProjectKind::Package,
        name: app.name.clone(),
        summary: app.summary.clone(),
        license: app.license.clone(),
        version: app.version.clone(),
        exposed_modules: ExposedModules::List(modules),
        elm_version: to_constraint(&app.elm_version),
        dependencies: Dependencies::Flat(dependencies),
        test_dependencies: Dependencies::default(),
        source_directories: Vec::new(),
        timestamp: app.timestamp,
    }
}

/// `elm.json` as the compiler expects it for a package.
#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct PackageJson<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    summary: &'a str,
    license: &'a str,
    version: &'a str,
    exposed_modules: Vec<String>,
    elm_version: &'a str,
    dependencies: &'a BTreeMap<String, String>,
    test_dependencies: BTreeMap<String, String>,
}

fn write_manifest(dir: &Path, manifest: &Manifest) -> io::Result<()> {
    let json = PackageJson {
        kind: "package",
        name: manifest.name.as_deref().unwrap_or_default(),
        summary: manifest.summary.as_deref().unwrap_or_default(),
        license: manifest.license.as_deref().unwrap_or_default(),
        version: manifest.version.as_deref().unwrap_or_default(),
        exposed_modules: manifest.modules(),
        elm_version: &manifest.elm_version,
        dependencies: manifest.dependencies.direct(),
        test_dependencies: BTreeMap::new(),
    };
    let content = serde_json::to_string_pretty(&json).map_err(io::Error::other)?;
    fs::write(dir.join(manifest::MANIFEST_FILE), content)
}

/// Mirror every `.elm` file under `source_root` into `target_root`.
fn mirror_sources(source_root: &Path, target_root: &Path, log: &mut SynthesisLog) {
    for entry in WalkDir::new(source_root).sort(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log.push(FileOutcome::Failed {
                    path: source_root.to_path_buf(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXT)
        {
            continue;
        }

        let Ok(relative) = path.strip_prefix(source_root) else {
            continue;
        };
        let outcome = mirror_file(&path, &target_root.join(relative));
        if !matches!(outcome, FileOutcome::Failed { .. }) {
            log.sources
                .insert(Path::new(PACKAGE_SRC).join(relative), path.to_path_buf());
        }
        log.push(outcome);
    }
}

fn mirror_file(original: &Path, target: &Path) -> FileOutcome {
    let failed = |e: io::Error| FileOutcome::Failed {
        path: original.to_path_buf(),
        error: e.to_string(),
    };

    if let Some(parent) = target.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        return failed(e);
    }

    let source = match fs::read_to_string(original) {
        Ok(source) => source,
        Err(e) => return failed(e),
    };

    if ports::declares_ports(&source) {
        let patch = ports::stub_ports(&source);
        if let Err(e) = fs::write(target, &patch.source) {
            return failed(e);
        }
        return FileOutcome::Patched {
            path: original.to_path_buf(),
            stubbed: patch.stubbed.len(),
            unmatched: patch.unmatched,
        };
    }

    match link_or_copy(original, target) {
        Ok(LinkMode::Symlink) => FileOutcome::Linked(original.to_path_buf()),
        Ok(LinkMode::Copy) => FileOutcome::Copied(original.to_path_buf()),
        Err(e) => failed(e),
    }
}

// ============================================================================
// tests
// ============================================================================
