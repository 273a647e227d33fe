//! Project configuration from the optional `edp.toml`.
//!
//! Precedence: CLI flags, then `edp.toml` next to the manifest, then
//! defaults. Unknown keys are reported and ignored.

mod error;
mod section;

pub use error::ConfigError;
pub use section::{BuildConfig, ServeConfig};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::log;

/// Config file name, looked up in the project root.
pub const CONFIG_FILE: &str = "edp.toml";

/// Root configuration structure representing edp.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Preview server settings
    pub serve: ServeConfig,

    /// Build settings
    pub build: BuildConfig,
}

impl PreviewConfig {
    /// Load `edp.toml` from `root` (defaults when absent) and apply CLI flags.
    pub fn load(root: &Path, cli: &Cli) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        let mut config = if path.is_file() {
            Self::from_path(&path)?
        } else {
            Self::default()
        };
        config.apply_cli(cli);
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            log!("warning"; "ignoring unknown fields in {}: {}", CONFIG_FILE, ignored.join(", "));
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn apply_cli(&mut self, cli: &Cli) {
        Self::update_option(&mut self.serve.interface, cli.address.as_ref());
        Self::update_option(&mut self.serve.port, cli.port.as_ref());
        Self::update_option(&mut self.serve.ws_port, cli.ws_port.as_ref());
        Self::update_option(&mut self.serve.browser, cli.browser().as_ref());
        Self::update_option(&mut self.serve.reload, cli.reload().as_ref());
        Self::update_option(&mut self.build.debug, cli.debug().as_ref());
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::net::{IpAddr, Ipv4Addr};
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("edp").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_without_file() {
        let temp = TempDir::new().unwrap();
        let config = PreviewConfig::load(temp.path(), &cli(&[])).unwrap();

        assert_eq!(config, PreviewConfig::default());
        assert_eq!(config.serve.port, 8000);
        assert_eq!(config.serve.ws_port, 35729);
        assert!(config.serve.browser);
        assert!(config.serve.reload);
        assert!(!config.build.debug);
    }

    #[test]
    fn test_file_values() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            "[serve]\ninterface = \"0.0.0.0\"\nport = 9000\nbrowser = false\n[build]\ndebug = true\n",
        )
        .unwrap();

        let config = PreviewConfig::load(temp.path(), &cli(&[])).unwrap();
        assert_eq!(config.serve.interface, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.serve.port, 9000);
        assert!(!config.serve.browser);
        assert!(config.serve.reload);
        assert!(config.build.debug);
    }

    #[test]
    fn test_cli_overrides_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "[serve]\nport = 9000\n").unwrap();

        let config = PreviewConfig::load(temp.path(), &cli(&["-p", "7000", "-r"])).unwrap();
        assert_eq!(config.serve.port, 7000);
        assert!(!config.serve.reload);
    }

    #[test]
    fn test_unknown_fields_collected() {
        let (config, ignored) =
            PreviewConfig::parse_with_ignored("[serve]\nport = 1234\nwatch = true\n[site]\n")
                .unwrap();
        assert_eq!(config.serve.port, 1234);
        assert_eq!(ignored, vec!["serve.watch", "site"]);
    }

    #[test]
    fn test_invalid_toml() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "[serve\n").unwrap();
        assert!(matches!(
            PreviewConfig::load(temp.path(), &cli(&[])),
            Err(ConfigError::Toml(_))
        ));
    }
}
