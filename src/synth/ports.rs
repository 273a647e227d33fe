//! Port declaration stubbing.
//!
//! Packages may not declare ports, so every `port name : ...` declaration of
//! an application module is turned into a plain value with a no-op body:
//!
//! ```text
//! port sendMessage : String -> Cmd msg
//! ```
//!
//! becomes
//!
//! ```text
//! sendMessage : String -> Cmd msg
//! sendMessage _ = Cmd.none
//! ```
//!
//! Declarations may span several lines as long as continuation lines are
//! indented. A declaration whose type mentions neither `Cmd` nor `Sub` is
//! left alone and reported.

use regex::Regex;
use std::sync::LazyLock;

static PORT_MODULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^port\s+module\s").expect("valid port module regex"));

static PORT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^port\s+([a-z][A-Za-z0-9_]*)\s*:").expect("valid port declaration regex")
});

static SUB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bSub\b").expect("valid Sub regex"));
static CMD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bCmd\b").expect("valid Cmd regex"));

/// Which way a port talks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    /// JavaScript to Elm, typed `... -> Sub msg`.
    Inbound,
    /// Elm to JavaScript, typed `... -> Cmd msg`.
    Outbound,
}

impl PortDirection {
    /// Classify a port by its type signature.
    pub fn classify(signature: &str) -> Option<Self> {
        if SUB.is_match(signature) {
            Some(Self::Inbound)
        } else if CMD.is_match(signature) {
            Some(Self::Outbound)
        } else {
            None
        }
    }

    fn stub_body(self) -> &'static str {
        match self {
            Self::Inbound => "Sub.none",
            Self::Outbound => "Cmd.none",
        }
    }
}

/// Result of stubbing one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortsPatch {
    pub source: String,
    pub stubbed: Vec<(String, PortDirection)>,
    /// Ports whose direction could not be detected (left as-is).
    pub unmatched: Vec<String>,
}

/// Does this module start with `port module`?
pub fn declares_ports(source: &str) -> bool {
    source.lines().any(|line| PORT_MODULE.is_match(line))
}

/// Replace every port declaration in `source` by a no-op stub.
///
/// Unmatched declarations are kept verbatim. The `port module` header is
/// only demoted to `module` when every declaration was stubbed, since the
/// remaining ports still need it.
pub fn stub_ports(source: &str) -> PortsPatch {
    let lines: Vec<&str> = source.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut stubbed = Vec::new();
    let mut unmatched = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let Some(caps) = PORT_DECL.captures(line) else {
            out.push(line.to_string());
            i += 1;
            continue;
        };

        // Declaration plus indented continuation lines.
        let end = lines[i + 1..]
            .iter()
            .position(|l| !is_continuation(l))
            .map_or(lines.len(), |n| i + 1 + n);
        let block = &lines[i..end];
        let name = caps[1].to_string();
        let signature = block.join(" ");

        match PortDirection::classify(&signature) {
            Some(direction) => {
                out.push(strip_port_keyword(line));
                out.extend(block[1..].iter().map(|l| l.to_string()));
                out.push(format!("{name} _ = {}", direction.stub_body()));
                stubbed.push((name, direction));
            }
            None => {
                out.extend(block.iter().map(|l| l.to_string()));
                unmatched.push(name);
            }
        }
        i = end;
    }

    if unmatched.is_empty()
        && let Some(header) = out.iter_mut().find(|line| PORT_MODULE.is_match(line))
    {
        *header = strip_port_keyword(header);
    }

    let mut patched = out.join("\n");
    if source.ends_with('\n') {
        patched.push('\n');
    }

    PortsPatch {
        source: patched,
        stubbed,
        unmatched,
    }
}

fn strip_port_keyword(line: &str) -> String {
    line.strip_prefix("port").unwrap_or(line).trim_start().to_string()
}

fn is_continuation(line: &str) -> bool {
    line.starts_with([' ', '\t']) && !line.trim().is_empty()
}
