//! Actor System for Live Preview
//!
//! Message-passing concurrency for serve mode:
//!
//! ```text
//! WatchActor --> BuildActor --> Hub
//!  (notify)      (compiler)   (broadcast)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `watch` - File system watcher with debouncing
//! - `build` - Rebuilds the preview and publishes updates
//! - `coordinator` - Wires up and runs actors

pub mod build;
pub mod coordinator;
pub mod messages;
pub mod watch;

pub use coordinator::Coordinator;
