//! Exact-version to constraint rewriting.

/// Parse an exact `MAJOR.MINOR.PATCH` version.
fn parse_exact(version: &str) -> Option<(u64, u64, u64)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

/// Rewrite an exact version into the tightest package constraint.
///
/// `"2.3.4"` becomes `"2.3.4 <= v < 2.3.5"`. Returns `None` for anything
/// that is not an exact version (e.g. an existing range).
pub fn tight_range(version: &str) -> Option<String> {
    let (major, minor, patch) = parse_exact(version)?;
    Some(format!(
        "{major}.{minor}.{patch} <= v < {major}.{minor}.{}",
        patch + 1
    ))
}

/// Like [`tight_range`], but passes non-exact strings through untouched.
pub fn to_constraint(version: &str) -> String {
    tight_range(version).unwrap_or_else(|| version.to_string())
}

/// Check that a compiler version string belongs to the supported family.
pub fn is_supported_compiler(version: &str) -> bool {
    parse_exact(version).is_some_and(|(major, minor, _)| major == 0 && minor == 19)
}
