//! Preview session: the current project state and how it is refreshed.
//!
//! Owns the manifest, readme, and build settings for one project. The
//! BuildActor drives it from rebuild requests; one-shot mode uses it once.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::actor::messages::RebuildRequest;
use crate::actor::watch::WatchPlan;
use crate::compiler::Invoke;
use crate::docs::{self, BuildOptions, Docs};
use crate::logger::status_warning;
use crate::manifest::{self, Manifest, ManifestError, README_FILE, error_chain};
use crate::server::message::{Snapshot, Update};
use crate::{debug, log};

pub struct Preview {
    root: PathBuf,
    manifest_path: PathBuf,
    elm: Arc<dyn Invoke>,
    options: BuildOptions,
    manifest: Manifest,
    readme: String,
}

impl Preview {
    /// Load the project at `manifest_path`. A bad manifest is fatal here.
    pub fn open(
        manifest_path: &Path,
        elm: Arc<dyn Invoke>,
        options: BuildOptions,
    ) -> Result<Self, ManifestError> {
        let manifest = manifest::load(manifest_path)?;
        let root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut preview = Self {
            root,
            manifest_path: manifest_path.to_path_buf(),
            elm,
            options,
            manifest,
            readme: String::new(),
        };
        if let Some(readme) = preview.read_readme() {
            preview.readme = readme;
        }
        Ok(preview)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn watch_plan(&self) -> WatchPlan {
        WatchPlan::from_manifest(&self.manifest, &self.root)
    }

    pub fn build_docs(&self) -> Docs {
        docs::build(&self.manifest, &self.root, self.elm.as_ref(), self.options)
    }

    /// Build everything for the first time.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            readme: self.readme.clone(),
            manifest: self.manifest.clone(),
            docs: self.build_docs(),
        }
    }

    /// Refresh what `request` asks for.
    ///
    /// Read failures keep the previous value and leave it out of the update.
    pub fn rebuild(&mut self, request: RebuildRequest) -> Update {
        let mut update = Update::default();

        if request.readme
            && let Some(readme) = self.read_readme()
        {
            self.readme = readme.clone();
            update.readme = Some(readme);
        }

        if request.manifest {
            match manifest::load(&self.manifest_path) {
                Ok(manifest) => {
                    debug!("build"; "manifest reloaded");
                    self.manifest = manifest.clone();
                    update.manifest = Some(manifest);
                }
                Err(e) => {
                    status_warning(&format!("keeping previous manifest: {}", error_chain(&e)));
                }
            }
        }

        if request.docs {
            update.docs = Some(self.build_docs());
        }

        update
    }

    /// Current readme, `Some("")` once deleted, `None` on a read error.
    fn read_readme(&self) -> Option<String> {
        let path = self.root.join(README_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Some(String::new()),
            Err(e) => {
                log!("error"; "cannot read {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::compiler::fake::{FakeElm, Script};
    use std::fs;
    use tempfile::TempDir;

    pub(crate) const APPLICATION: &str = r#"{
        "type": "application",
        "source-directories": ["src"],
        "elm-version": "0.19.1",
        "dependencies": {"direct": {"elm/core": "1.0.5"}, "indirect": {}},
        "test-dependencies": {"direct": {}, "indirect": {}},
        "exposed-modules": ["Main"]
    }"#;

    pub(crate) fn app_project() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("elm.json"), APPLICATION).unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/Main.elm"), "module Main exposing (main)\n").unwrap();
        fs::write(temp.path().join("README.md"), "# App").unwrap();
        temp
    }

    fn open(temp: &TempDir) -> Preview {
        let elm: Arc<dyn Invoke> = Arc::new(FakeElm::new(Script::Document));
        Preview::open(&temp.path().join("elm.json"), elm, BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_open_and_snapshot() {
        let temp = app_project();
        let preview = open(&temp);

        let snapshot = preview.snapshot();
        assert_eq!(snapshot.readme, "# App");
        assert_eq!(snapshot.manifest.name.as_deref(), Some("my/application"));
        let Docs::Modules(modules) = snapshot.docs else {
            panic!("expected modules");
        };
        assert_eq!(modules[0]["name"], "Main");
    }

    #[test]
    fn test_open_missing_manifest_fails() {
        let temp = TempDir::new().unwrap();
        let elm: Arc<dyn Invoke> = Arc::new(FakeElm::new(Script::Document));
        let result = Preview::open(&temp.path().join("elm.json"), elm, BuildOptions::default());
        assert!(matches!(result, Err(ManifestError::NotFound(_))));
    }

    #[test]
    fn test_readme_only_rebuild() {
        let temp = app_project();
        let mut preview = open(&temp);
        fs::write(temp.path().join("README.md"), "# Changed").unwrap();

        let update = preview.rebuild(RebuildRequest {
            readme: true,
            ..Default::default()
        });

        assert_eq!(update.readme.as_deref(), Some("# Changed"));
        assert!(update.manifest.is_none());
        assert!(update.docs.is_none());
    }

    #[test]
    fn test_deleted_readme_is_empty() {
        let temp = app_project();
        let mut preview = open(&temp);
        fs::remove_file(temp.path().join("README.md")).unwrap();

        let update = preview.rebuild(RebuildRequest {
            readme: true,
            ..Default::default()
        });
        assert_eq!(update.readme.as_deref(), Some(""));
    }

    #[test]
    fn test_broken_manifest_keeps_previous() {
        let temp = app_project();
        let mut preview = open(&temp);
        fs::write(temp.path().join("elm.json"), "{ broken").unwrap();

        let update = preview.rebuild(RebuildRequest {
            manifest: true,
            docs: true,
            ..Default::default()
        });

        assert!(update.manifest.is_none());
        assert!(update.docs.is_some());
        assert!(preview.manifest().is_application());
    }

    #[test]
    fn test_manifest_change_updates_watch_plan() {
        let temp = app_project();
        let mut preview = open(&temp);
        let before = preview.watch_plan();

        let changed = APPLICATION.replace(r#"["src"]"#, r#"["src", "lib"]"#);
        fs::write(temp.path().join("elm.json"), changed).unwrap();
        let update = preview.rebuild(RebuildRequest::FULL);

        assert_eq!(
            update.manifest.unwrap().source_directories,
            vec!["src", "lib"]
        );
        assert_ne!(preview.watch_plan(), before);
    }
}
