//! Mirror files into the synthesized package.

use std::io;
use std::path::Path;

/// How a source file reached the mirrored tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    Symlink,
    Copy,
}

/// Symlink `link` to `original`, copying when symlinks are not permitted.
///
/// Symlinks keep the mirrored tree live: edits to `original` are seen by the
/// next compile without re-synthesizing.
pub fn link_or_copy(original: &Path, link: &Path) -> io::Result<LinkMode> {
    match symlink(original, link) {
        Ok(()) => Ok(LinkMode::Symlink),
        Err(e) if symlink_forbidden(&e) => {
            std::fs::copy(original, link)?;
            Ok(LinkMode::Copy)
        }
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(original, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_original: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

/// Windows refuses unprivileged symlinks with ERROR_PRIVILEGE_NOT_HELD (1314).
fn symlink_forbidden(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::Unsupported
    ) || err.raw_os_error() == Some(1314) && cfg!(windows)
}
