//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::net::IpAddr;
use std::path::PathBuf;

/// Offline documentation previewer for Elm packages and applications
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    /// Project directory or elm.json (searched upward, default: current directory)
    #[arg(value_hint = clap::ValueHint::AnyPath)]
    pub path: Option<PathBuf>,

    /// HTTP port number to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// WebSocket port for live updates (next free port is used if taken)
    #[arg(long)]
    pub ws_port: Option<u16>,

    /// Network address to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub address: Option<IpAddr>,

    /// Do not open the preview in a browser
    #[arg(short, long)]
    pub no_browser: bool,

    /// Do not watch files for changes
    #[arg(short = 'r', long)]
    pub no_reload: bool,

    /// Keep temporary build directories for inspection
    #[arg(short, long)]
    pub debug: bool,

    /// Build once, write the documentation JSON to this file (`-` for stdout), and exit
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Show compiler output and debug logs
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// Print version
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    pub version: Option<bool>,
}

impl Cli {
    /// Browser override: `Some(false)` when `--no-browser` is given.
    pub fn browser(&self) -> Option<bool> {
        self.no_browser.then_some(false)
    }

    /// Reload override: `Some(false)` when `--no-reload` is given.
    pub fn reload(&self) -> Option<bool> {
        self.no_reload.then_some(false)
    }

    /// Debug override: `Some(true)` when `--debug` is given.
    pub fn debug(&self) -> Option<bool> {
        self.debug.then_some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "edp", "-p", "9000", "-a", "0.0.0.0", "-n", "-r", "-d", "-V", "proj",
        ])
        .unwrap();
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.address, Some("0.0.0.0".parse().unwrap()));
        assert_eq!(cli.browser(), Some(false));
        assert_eq!(cli.reload(), Some(false));
        assert_eq!(cli.debug(), Some(true));
        assert!(cli.verbose);
        assert_eq!(cli.path, Some(PathBuf::from("proj")));
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let cli = Cli::try_parse_from(["edp"]).unwrap();
        assert_eq!(cli.browser(), None);
        assert_eq!(cli.reload(), None);
        assert_eq!(cli.debug(), None);
        assert!(cli.output.is_none());
    }

    #[test]
    fn test_output_stdout() {
        let cli = Cli::try_parse_from(["edp", "--output", "-"]).unwrap();
        assert_eq!(cli.output, Some(PathBuf::from("-")));
    }
}
