//! `[serve]` and `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 8000                 # HTTP port number
//! ws_port = 35729             # WebSocket port for live updates
//! browser = true              # Open the preview on startup
//! reload = true               # Rebuild on file changes
//!
//! [build]
//! debug = false               # Keep temporary build directories
//! ```
//!
//! Use `interface = "0.0.0.0"` to make the server accessible from LAN.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// Preview server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// First WebSocket port to try.
    pub ws_port: u16,

    /// Open the preview in the default browser.
    pub browser: bool,

    /// Watch the project and push rebuilds.
    pub reload: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8000,
            ws_port: 35729,
            browser: true,
            reload: true,
        }
    }
}

/// Documentation build settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Keep synthesized packages and docs output for inspection.
    pub debug: bool,
}
