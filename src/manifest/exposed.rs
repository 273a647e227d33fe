//! `exposed-modules` in its two shapes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Module list as written in `elm.json`.
///
/// Packages may either list modules directly or group them under
/// documentation categories. Both shapes flatten to the same ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExposedModules {
    List(Vec<String>),
    Categorized(IndexMap<String, Vec<String>>),
}

impl Default for ExposedModules {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl ExposedModules {
    /// Flatten to an ordered module list (category order, then list order).
    pub fn flatten(&self) -> Vec<String> {
        match self {
            Self::List(modules) => modules.clone(),
            Self::Categorized(categories) => categories.values().flatten().cloned().collect(),
        }
    }
}
