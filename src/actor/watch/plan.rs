use std::path::{Component, Path, PathBuf};

use crate::manifest::{MANIFEST_FILE, Manifest, OVERRIDE_FILE, README_FILE, load_package};
use crate::utils::path::lexical_join;

/// Directories never worth a rebuild: dependency cache, build scratch, VCS.
const IGNORED_DIRS: &[&str] = &["elm-stuff", "node_modules", ".git"];

/// Source file extension.
const SOURCE_EXT: &str = "elm";

/// Source directory of a package project.
const PACKAGE_SOURCE_DIR: &str = "src";

/// What a changed path means for the next rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeClass {
    Readme,
    Manifest,
    Source,
}

/// A directory to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot {
    pub path: PathBuf,
    pub recursive: bool,
}

/// The watch subscription derived from a manifest.
///
/// Two plans compare equal exactly when the watcher needs no
/// re-subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchPlan {
    root: PathBuf,
    readme: PathBuf,
    manifests: Vec<PathBuf>,
    sources: Vec<PathBuf>,
}

impl WatchPlan {
    pub fn from_manifest(manifest: &Manifest, root: &Path) -> Self {
        let mut manifests = vec![root.join(MANIFEST_FILE)];
        let sources: Vec<PathBuf> = if manifest.is_application() {
            manifests.push(root.join(OVERRIDE_FILE));
            manifest
                .source_directories
                .iter()
                .map(|dir| lexical_join(root, dir))
                .collect()
        } else {
            vec![root.join(PACKAGE_SOURCE_DIR)]
        };

        if manifest.is_application() {
            // Vendored packages: `<pkg>/src` listed with `<pkg>/elm.json` next to it.
            for source in &sources {
                if let Some(parent) = source.parent()
                    && parent != root
                    && load_package(parent).is_some()
                {
                    let vendored = parent.join(MANIFEST_FILE);
                    if !manifests.contains(&vendored) {
                        manifests.push(vendored);
                    }
                }
            }
        }

        Self {
            root: root.to_path_buf(),
            readme: root.join(README_FILE),
            manifests,
            sources,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directories to subscribe to, deduplicated.
    ///
    /// Manifest directories are watched shallowly, source directories
    /// recursively.
    pub fn roots(&self) -> Vec<WatchRoot> {
        let mut roots: Vec<WatchRoot> = Vec::new();

        for source in &self.sources {
            if !roots.iter().any(|r| r.recursive && source.starts_with(&r.path)) {
                roots.retain(|r| !r.path.starts_with(source));
                roots.push(WatchRoot {
                    path: source.clone(),
                    recursive: true,
                });
            }
        }

        let shallow = std::iter::once(&self.readme)
            .chain(&self.manifests)
            .filter_map(|file| file.parent());
        for dir in shallow {
            let covered = roots
                .iter()
                .any(|r| r.path == dir || (r.recursive && dir.starts_with(&r.path)));
            if !covered {
                roots.push(WatchRoot {
                    path: dir.to_path_buf(),
                    recursive: false,
                });
            }
        }

        roots
    }

    /// Classify a changed path, `None` when it is irrelevant.
    pub fn classify(&self, path: &Path) -> Option<ChangeClass> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if is_ignored(relative) || is_temp_file(path) {
            return None;
        }
        if path == self.readme {
            return Some(ChangeClass::Readme);
        }
        if self.manifests.iter().any(|m| m == path) {
            return Some(ChangeClass::Manifest);
        }
        let is_source = path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXT)
            && self.sources.iter().any(|dir| path.starts_with(dir));
        is_source.then_some(ChangeClass::Source)
    }
}

fn is_ignored(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name.to_str().is_some_and(|n| IGNORED_DIRS.contains(&n)),
        _ => false,
    })
}

/// Editor artifacts (swap, backup files).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn application(source_dirs: &[&str]) -> Manifest {
        let dirs: Vec<String> = source_dirs.iter().map(|d| d.to_string()).collect();
        serde_json::from_value(serde_json::json!({
            "type": "application",
            "source-directories": dirs,
            "elm-version": "0.19.1",
            "dependencies": {"direct": {}, "indirect": {}}
        }))
        .unwrap()
    }

    fn package() -> Manifest {
        serde_json::from_str(r#"{"type":"package","name":"a/b","exposed-modules":["Main"]}"#)
            .unwrap()
    }

    #[test]
    fn test_classify_application() {
        let root = Path::new("/work/app");
        let plan = WatchPlan::from_manifest(&application(&["src", "lib"]), root);

        assert_eq!(plan.classify(&root.join("README.md")), Some(ChangeClass::Readme));
        assert_eq!(plan.classify(&root.join("elm.json")), Some(ChangeClass::Manifest));
        assert_eq!(
            plan.classify(&root.join("elm-application.json")),
            Some(ChangeClass::Manifest)
        );
        assert_eq!(plan.classify(&root.join("src/Main.elm")), Some(ChangeClass::Source));
        assert_eq!(plan.classify(&root.join("lib/Util/Str.elm")), Some(ChangeClass::Source));
        assert_eq!(plan.classify(&root.join("other/Main.elm")), None);
        assert_eq!(plan.classify(&root.join("src/style.css")), None);
    }

    #[test]
    fn test_ignore_list_always_applies() {
        let root = Path::new("/work/app");
        let plan = WatchPlan::from_manifest(&application(&["."]), root);

        assert_eq!(plan.classify(&root.join("Main.elm")), Some(ChangeClass::Source));
        assert_eq!(
            plan.classify(&root.join("elm-stuff/elm-doc-preview/edp-1/src/Main.elm")),
            None
        );
        assert_eq!(plan.classify(&root.join("node_modules/x/Main.elm")), None);
        assert_eq!(plan.classify(&root.join(".git/Main.elm")), None);
        assert_eq!(plan.classify(&root.join("Main.elm.swp")), None);
    }

    #[test]
    fn test_package_watches_src() {
        let root = Path::new("/work/pkg");
        let plan = WatchPlan::from_manifest(&package(), root);

        assert_eq!(plan.classify(&root.join("src/Main.elm")), Some(ChangeClass::Source));
        assert_eq!(plan.classify(&root.join("elm-application.json")), None);
        assert_eq!(
            plan.roots(),
            vec![
                WatchRoot { path: root.join("src"), recursive: true },
                WatchRoot { path: root.to_path_buf(), recursive: false },
            ]
        );
    }

    #[test]
    fn test_roots_deduplicated() {
        let root = Path::new("/work/app");
        let plan = WatchPlan::from_manifest(&application(&["src", "src/generated", "."]), root);

        assert_eq!(
            plan.roots(),
            vec![WatchRoot { path: root.to_path_buf(), recursive: true }]
        );
    }

    #[test]
    fn test_vendored_manifest_watched() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("vendor/ui/src")).unwrap();
        fs::write(
            root.join("vendor/ui/elm.json"),
            r#"{"type":"package","name":"acme/ui","exposed-modules":["Ui"]}"#,
        )
        .unwrap();

        let plan = WatchPlan::from_manifest(&application(&["src", "vendor/ui/src"]), root);

        assert_eq!(
            plan.classify(&root.join("vendor/ui/elm.json")),
            Some(ChangeClass::Manifest)
        );
        assert!(plan.roots().contains(&WatchRoot {
            path: root.join("vendor/ui"),
            recursive: false,
        }));
    }

    #[test]
    fn test_plan_changes_with_source_dirs() {
        let root = Path::new("/work/app");
        let a = WatchPlan::from_manifest(&application(&["src"]), root);
        let b = WatchPlan::from_manifest(&application(&["src"]), root);
        let c = WatchPlan::from_manifest(&application(&["src", "lib"]), root);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, WatchPlan::from_manifest(&package(), root));
    }

}
