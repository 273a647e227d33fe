//! Actor Message Definitions
//!
//! ```text
//! WatchActor --Rebuild--> BuildActor --publish--> Hub
//!     ^                       |
//!     +------Resubscribe------+
//! ```

use super::watch::{ChangeClass, WatchPlan};

// =============================================================================
// BuildActor Messages
// =============================================================================

/// What a rebuild cycle has to refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildRequest {
    pub readme: bool,
    pub manifest: bool,
    pub docs: bool,
}

impl RebuildRequest {
    /// Everything at once.
    #[cfg(test)]
    pub const FULL: Self = Self {
        readme: true,
        manifest: true,
        docs: true,
    };

    pub fn for_change(class: ChangeClass) -> Self {
        match class {
            ChangeClass::Readme => Self {
                readme: true,
                ..Self::default()
            },
            // A manifest change can alter modules, dependencies, or sources.
            ChangeClass::Manifest => Self {
                manifest: true,
                docs: true,
                ..Self::default()
            },
            ChangeClass::Source => Self {
                docs: true,
                ..Self::default()
            },
        }
    }

    /// Union of two requests queued behind a running build.
    pub fn merge(self, other: Self) -> Self {
        Self {
            readme: self.readme || other.readme,
            manifest: self.manifest || other.manifest,
            docs: self.docs || other.docs,
        }
    }
}

/// Messages to Build Actor
#[derive(Debug)]
pub enum BuildMsg {
    Rebuild(RebuildRequest),
    Shutdown,
}

// =============================================================================
// WatchActor Messages
// =============================================================================

/// Messages to Watch Actor
#[derive(Debug)]
pub enum WatchMsg {
    /// Tear down the watcher and subscribe to a new plan.
    Resubscribe(WatchPlan),
    Shutdown,
}
