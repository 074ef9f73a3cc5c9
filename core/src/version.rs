use semver::Version;

use crate::error::{BuildError, Result};

const DIRECTIVE: &str = "bygg:";

/// Returns the version requirement declared on the first line of a byggfil,
/// e.g. `## bygg: ^0.6.0`.
pub fn declared_requirement(script: &str) -> Option<&str> {
    let first = script.lines().next()?;
    if !first.starts_with("##") {
        return None;
    }
    first
        .trim_start_matches(|c: char| c == '#' || c.is_whitespace())
        .strip_prefix(DIRECTIVE)
        .map(str::trim)
}

/// Fails with [`BuildError::VersionIncompatible`] when the script requires a
/// version of the tool other than `current`.
pub fn check_script(script: &str, current: &str) -> Result<()> {
    let Some(required) = declared_requirement(script) else {
        return Ok(());
    };

    if is_compatible(required, current)? {
        Ok(())
    } else {
        Err(BuildError::VersionIncompatible(format!(
            "script requires {} but this is bygg {}",
            required, current
        )))
    }
}

/// Compares a requirement (`=1.2.3`, `^1.2.3` or `~1.2.3`, anything before the
/// operator ignored) against a version such as `v1.2.3`.
pub fn is_compatible(required: &str, current: &str) -> Result<bool> {
    let start = required
        .find(|c| matches!(c, '=' | '^' | '~'))
        .ok_or_else(|| incompatible("requirement prefix not found, expected '=', '^' or '~'"))?;
    let required = &required[start..];
    let operator = required.as_bytes()[0];

    let wanted = parse_version(&required[1..])
        .map_err(|e| incompatible(&format!("failed to parse required version: {}", e)))?;

    let current = match current.find('v') {
        Some(pos) => &current[pos + 1..],
        None => current,
    };
    let actual = parse_version(current)
        .map_err(|e| incompatible(&format!("failed to parse current version: {}", e)))?;

    let compatible = match operator {
        b'=' => wanted == actual,
        b'^' => {
            wanted.major == actual.major
                && (wanted.minor < actual.minor
                    || (wanted.minor == actual.minor && wanted.patch <= actual.patch))
        }
        _ => {
            wanted.major == actual.major
                && wanted.minor == actual.minor
                && wanted.patch <= actual.patch
        }
    };

    Ok(compatible)
}

fn parse_version(text: &str) -> std::result::Result<Version, semver::Error> {
    Version::parse(text.trim())
}

fn incompatible(message: &str) -> BuildError {
    BuildError::VersionIncompatible(message.to_string())
}
