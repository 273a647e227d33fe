//! Project manifest (`elm.json`) loading and normalization.
//!
//! # Module Structure
//!
//! ```text
//! manifest/
//! ├── exposed    # ExposedModules (list or categorized map)
//! ├── version    # exact version -> tight constraint rewriting
//! └── mod.rs     # Manifest, load, defaults (this file)
//! ```
//!
//! Application manifests may be complemented by an `elm-application.json`
//! next to them, whose top-level keys win over `elm.json`.

mod exposed;
pub mod version;

pub use exposed::ExposedModules;

use crate::log;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Manifest file name.
pub const MANIFEST_FILE: &str = "elm.json";
/// Optional application metadata override.
pub const OVERRIDE_FILE: &str = "elm-application.json";
/// Readme rendered on the package overview page.
pub const README_FILE: &str = "README.md";

const DEFAULT_APP_NAME: &str = "my/application";
const DEFAULT_APP_VERSION: &str = "1.0.0";
const DEFAULT_APP_SUMMARY: &str = "Elm application";
const DEFAULT_APP_LICENSE: &str = "Fair";

// ============================================================================
// Errors
// ============================================================================

/// Manifest-related errors
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("`{0}` not found")]
    NotFound(PathBuf),

    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid manifest `{0}`")]
    Parse(PathBuf, #[source] serde_json::Error),
}

// ============================================================================
// Types
// ============================================================================

/// Project kind, discriminated by the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectKind {
    #[serde(rename = "package", alias = "library")]
    Package,
    #[serde(rename = "application")]
    Application,
}

/// Dependency table.
///
/// Applications pin exact versions split into `direct`/`indirect`;
/// packages use a flat map of version constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dependencies {
    Split {
        direct: BTreeMap<String, String>,
        #[serde(default)]
        indirect: BTreeMap<String, String>,
    },
    Flat(BTreeMap<String, String>),
}

impl Default for Dependencies {
    fn default() -> Self {
        Self::Flat(BTreeMap::new())
    }
}

impl Dependencies {
    /// Dependencies the project imports itself.
    pub fn direct(&self) -> &BTreeMap<String, String> {
        match self {
            Self::Split { direct, .. } => direct,
            Self::Flat(deps) => deps,
        }
    }
}

/// Normalized project manifest.
///
/// Immutable once loaded; a reload produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    #[serde(rename = "type", alias = "kind")]
    pub kind: ProjectKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub exposed_modules: ExposedModules,

    #[serde(default)]
    pub elm_version: String,

    #[serde(default)]
    pub dependencies: Dependencies,

    #[serde(default)]
    pub test_dependencies: Dependencies,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_directories: Vec<String>,

    /// Manifest mtime in seconds since epoch (freshness signal only).
    #[serde(default)]
    pub timestamp: u64,
}

impl Manifest {
    pub fn is_application(&self) -> bool {
        self.kind == ProjectKind::Application
    }

    /// Flat, ordered exposed module list.
    pub fn modules(&self) -> Vec<String> {
        self.exposed_modules.flatten()
    }

    /// Fill in the convenience fields applications usually lack.
    fn apply_application_defaults(&mut self) {
        fn fill(field: &mut Option<String>, default: &str) {
            if field.is_none() {
                *field = Some(default.to_string());
            }
        }
        fill(&mut self.name, DEFAULT_APP_NAME);
        fill(&mut self.version, DEFAULT_APP_VERSION);
        fill(&mut self.summary, DEFAULT_APP_SUMMARY);
        fill(&mut self.license, DEFAULT_APP_LICENSE);
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load and normalize the manifest at `path`.
///
/// For applications, `elm-application.json` in the same directory is merged
/// on top (override wins). A broken override is logged and ignored.
pub fn load(path: &Path) -> Result<Manifest, ManifestError> {
    let mut value = read_json(path)?;

    let kind = value
        .get("type")
        .or_else(|| value.get("kind"))
        .and_then(Value::as_str);
    if kind == Some("application") {
        let override_path = path.with_file_name(OVERRIDE_FILE);
        if override_path.exists() {
            match read_json(&override_path) {
                Ok(overlay) => merge_objects(&mut value, overlay),
                Err(e) => log!("warning"; "ignoring {}: {}", override_path.display(), error_chain(&e)),
            }
        }
    }

    let mut manifest: Manifest =
        serde_json::from_value(value).map_err(|e| ManifestError::Parse(path.to_path_buf(), e))?;

    if manifest.is_application() {
        manifest.apply_application_defaults();
    }
    manifest.timestamp = modified_secs(path);

    Ok(manifest)
}

/// Find the manifest for `start`.
///
/// `start` may be the manifest itself or any directory inside the project;
/// parent directories are searched upward.
pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    if start.is_file() {
        return Some(start.to_path_buf());
    }

    start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_FILE))
        .find(|candidate| candidate.is_file())
}

/// Read the manifest of a vendored package, if `dir` holds one.
///
/// Returns `None` for missing, unreadable, or application manifests.
pub fn load_package(dir: &Path) -> Option<Manifest> {
    let path = dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return None;
    }
    load(&path)
        .ok()
        .filter(|manifest| manifest.kind == ProjectKind::Package)
}

fn read_json(path: &Path) -> Result<Value, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ManifestError::NotFound(path.to_path_buf())
        } else {
            ManifestError::Io(path.to_path_buf(), e)
        }
    })?;
    serde_json::from_str(&content).map_err(|e| ManifestError::Parse(path.to_path_buf(), e))
}

/// Shallow merge: keys of `overlay` replace keys of `base`.
fn merge_objects(base: &mut Value, overlay: Value) {
    if let (Value::Object(base), Value::Object(overlay)) = (base, overlay) {
        for (key, value) in overlay {
            base.insert(key, value);
        }
    }
}

fn modified_secs(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Render an error with its sources, `a: b: c`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const APPLICATION: &str = r#"{
        "type": "application",
        "source-directories": ["src"],
        "elm-version": "0.19.1",
        "dependencies": {
            "direct": {"elm/core": "1.0.5", "elm/html": "1.0.0"},
            "indirect": {"elm/json": "1.1.3"}
        },
        "test-dependencies": {"direct": {}, "indirect": {}}
    }"#;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_package_list_form() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            MANIFEST_FILE,
            r#"{"kind":"library","name":"a/b","version":"1.0.0","exposed-modules":["Main"]}"#,
        );

        let manifest = load(&path).unwrap();
        assert_eq!(manifest.kind, ProjectKind::Package);
        assert_eq!(manifest.name.as_deref(), Some("a/b"));
        assert_eq!(manifest.modules(), vec!["Main"]);
        assert!(manifest.summary.is_none());
        assert!(manifest.timestamp > 0);
    }

    #[test]
    fn test_load_package_categorized_form() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            MANIFEST_FILE,
            r#"{
                "type": "package",
                "name": "elm/json",
                "summary": "Encode and decode JSON values",
                "license": "BSD-3-Clause",
                "version": "1.1.3",
                "exposed-modules": {"Primitives": ["Json.Decode", "Json.Encode"]},
                "elm-version": "0.19.0 <= v < 0.20.0",
                "dependencies": {"elm/core": "1.0.0 <= v < 2.0.0"},
                "test-dependencies": {}
            }"#,
        );

        let manifest = load(&path).unwrap();
        assert_eq!(manifest.modules(), vec!["Json.Decode", "Json.Encode"]);
        assert_eq!(
            manifest.dependencies.direct().get("elm/core").map(String::as_str),
            Some("1.0.0 <= v < 2.0.0")
        );
    }

    #[test]
    fn test_application_defaults() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), MANIFEST_FILE, APPLICATION);

        let manifest = load(&path).unwrap();
        assert!(manifest.is_application());
        assert_eq!(manifest.name.as_deref(), Some(DEFAULT_APP_NAME));
        assert_eq!(manifest.version.as_deref(), Some(DEFAULT_APP_VERSION));
        assert_eq!(manifest.summary.as_deref(), Some(DEFAULT_APP_SUMMARY));
        assert_eq!(manifest.license.as_deref(), Some(DEFAULT_APP_LICENSE));
        assert_eq!(manifest.source_directories, vec!["src"]);
        assert_eq!(manifest.dependencies.direct().len(), 2);
    }

    #[test]
    fn test_application_override_wins() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), MANIFEST_FILE, APPLICATION);
        write(
            temp.path(),
            OVERRIDE_FILE,
            r#"{"name":"me/app","summary":"My app","exposed-modules":["Main","Api"]}"#,
        );

        let manifest = load(&path).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("me/app"));
        assert_eq!(manifest.summary.as_deref(), Some("My app"));
        assert_eq!(manifest.modules(), vec!["Main", "Api"]);
        // untouched fields keep defaults
        assert_eq!(manifest.license.as_deref(), Some(DEFAULT_APP_LICENSE));
    }

    #[test]
    fn test_broken_override_ignored() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), MANIFEST_FILE, APPLICATION);
        write(temp.path(), OVERRIDE_FILE, "{ not json");

        let manifest = load(&path).unwrap();
        assert_eq!(manifest.name.as_deref(), Some(DEFAULT_APP_NAME));
    }

    #[test]
    fn test_override_ignored_for_packages() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            MANIFEST_FILE,
            r#"{"type":"package","name":"a/b","version":"1.0.0","exposed-modules":[]}"#,
        );
        write(temp.path(), OVERRIDE_FILE, r#"{"name":"x/y"}"#);

        assert_eq!(load(&path).unwrap().name.as_deref(), Some("a/b"));
    }

    #[test]
    fn test_missing_manifest() {
        let temp = TempDir::new().unwrap();
        let err = load(&temp.path().join(MANIFEST_FILE)).unwrap_err();
        assert!(matches!(err, ManifestError::NotFound(_)));
    }

    #[test]
    fn test_invalid_manifest() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), MANIFEST_FILE, r#"{"type":"widget"}"#);
        assert!(matches!(load(&path), Err(ManifestError::Parse(..))));
    }

    #[test]
    fn test_find_manifest_upward() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), MANIFEST_FILE, APPLICATION);
        let nested = temp.path().join("src/Page");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_manifest(&nested), Some(path.clone()));
        assert_eq!(find_manifest(&path), Some(path));
    }

    #[test]
    fn test_load_package_skips_applications() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), MANIFEST_FILE, APPLICATION);
        assert!(load_package(temp.path()).is_none());
    }

    #[test]
    fn test_serialize_uses_elm_field_names() {
        let manifest: Manifest = serde_json::from_str(
            r#"{"type":"package","name":"a/b","exposed-modules":["A"],"elm-version":"0.19.0 <= v < 0.20.0"}"#,
        )
        .unwrap();
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["type"], "package");
        assert_eq!(json["exposed-modules"][0], "A");
        assert_eq!(json["elm-version"], "0.19.0 <= v < 0.20.0");
    }
}
