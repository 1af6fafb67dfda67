//! Semantic-version constraint evaluation for skill dependencies.
//!
//! Constraints are plain strings attached to a dependency in a manifest:
//! `"1.2.3"` (exact), `">=1.2.0"`, `"^1.2.3"`, `"~1.2.3"`, and so on.
//! Pre-release suffixes on installed versions are ignored for comparison.

use crate::error::{HostError, Result};

/// A parsed `(major, minor, patch)` triple.
pub type VersionTriple = (u64, u64, u64);

/// Parse the numeric triple out of a version string, ignoring any
/// pre-release (`-rc.1`) or build (`+abc`) suffix.
pub fn parse_triple(version: &str) -> Result<VersionTriple> {
    let core = version
        .trim()
        .split(['-', '+'])
        .next()
        .unwrap_or_default();

    let mut parts = core.split('.');
    let mut next_component = |what: &str| -> Result<u64> {
        parts
            .next()
            .ok_or_else(|| HostError::VersionParse {
                version: version.to_string(),
                reason: format!("missing {what} component"),
            })?
            .parse::<u64>()
            .map_err(|_| HostError::VersionParse {
                version: version.to_string(),
                reason: format!("non-numeric {what} component"),
            })
    };

    let major = next_component("major")?;
    let minor = next_component("minor")?;
    let patch = next_component("patch")?;
    Ok((major, minor, patch))
}

/// Comparison operators recognized in a constraint string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Exact,
    Ge,
    Le,
    Gt,
    Lt,
    Caret,
    Tilde,
}

fn split_constraint(constraint: &str) -> Option<(Op, &str)> {
    let c = constraint.trim();
    for (prefix, op) in [
        (">=", Op::Ge),
        ("<=", Op::Le),
        ("==", Op::Exact),
        (">", Op::Gt),
        ("<", Op::Lt),
        ("^", Op::Caret),
        ("~", Op::Tilde),
    ] {
        if let Some(rest) = c.strip_prefix(prefix) {
            return Some((op, rest));
        }
    }
    // Bare version means exact match
    if c.starts_with(|ch: char| ch.is_ascii_digit()) {
        return Some((Op::Exact, c));
    }
    None
}

/// Check whether `installed` satisfies `constraint`.
///
/// An unrecognized constraint prefix evaluates as satisfied but logs a WARN
/// naming the constraint, so typos surface without breaking existing
/// manifests.
pub fn check(installed: &str, constraint: &str) -> Result<bool> {
    let inst = parse_triple(installed)?;

    let Some((op, required_str)) = split_constraint(constraint) else {
        tracing::warn!(
            constraint = %constraint,
            installed = %installed,
            "Unrecognized version constraint prefix, treating as satisfied"
        );
        return Ok(true);
    };

    let req = parse_triple(required_str)?;

    let satisfied = match op {
        Op::Exact => inst == req,
        Op::Ge => inst >= req,
        Op::Le => inst <= req,
        Op::Gt => inst > req,
        Op::Lt => inst < req,
        Op::Caret => caret_match(inst, req),
        Op::Tilde => inst >= req && inst.0 == req.0 && inst.1 == req.1,
    };
    Ok(satisfied)
}

/// Caret semantics: compatible within the leftmost non-zero component.
fn caret_match(inst: VersionTriple, req: VersionTriple) -> bool {
    if req.0 > 0 {
        inst >= req && inst.0 == req.0
    } else if req.1 > 0 {
        inst >= req && inst.0 == 0 && inst.1 == req.1
    } else {
        inst == req
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_triple() {
        assert_eq!(parse_triple("1.2.3").unwrap(), (1, 2, 3));
        assert_eq!(parse_triple("0.10.0").unwrap(), (0, 10, 0));
        assert_eq!(parse_triple("1.2.3-rc.1").unwrap(), (1, 2, 3));
        assert_eq!(parse_triple("1.2.3+build5").unwrap(), (1, 2, 3));
        assert_eq!(parse_triple("  2.0.0 ").unwrap(), (2, 0, 0));
    }

    #[test]
    fn test_parse_triple_malformed() {
        assert!(parse_triple("1.2").is_err());
        assert!(parse_triple("a.b.c").is_err());
        assert!(parse_triple("").is_err());
        assert!(parse_triple("1.x.3").is_err());
    }

    #[test]
    fn test_exact() {
        assert!(check("1.2.3", "1.2.3").unwrap());
        assert!(check("1.2.3", "==1.2.3").unwrap());
        assert!(!check("1.2.4", "1.2.3").unwrap());
    }

    #[test]
    fn test_ordered_comparisons() {
        assert!(check("1.2.3", ">=1.2.3").unwrap());
        assert!(check("1.3.0", ">=1.2.3").unwrap());
        assert!(!check("1.2.2", ">=1.2.3").unwrap());
        assert!(check("1.2.2", "<=1.2.3").unwrap());
        assert!(check("2.0.0", ">1.9.9").unwrap());
        assert!(!check("1.2.3", ">1.2.3").unwrap());
        assert!(check("0.9.0", "<1.0.0").unwrap());
    }

    #[test]
    fn test_caret() {
        assert!(check("1.2.4", "^1.2.3").unwrap());
        assert!(check("1.9.0", "^1.2.3").unwrap());
        assert!(!check("2.0.0", "^1.2.3").unwrap());
        assert!(!check("1.2.2", "^1.2.3").unwrap());
        // 0.y.z: minor is the compatibility boundary
        assert!(check("0.3.5", "^0.3.1").unwrap());
        assert!(!check("0.4.0", "^0.3.1").unwrap());
        // 0.0.z: exact only
        assert!(check("0.0.7", "^0.0.7").unwrap());
        assert!(!check("0.0.8", "^0.0.7").unwrap());
    }

    #[test]
    fn test_tilde() {
        assert!(check("1.2.9", "~1.2.3").unwrap());
        assert!(!check("1.3.0", "~1.2.3").unwrap());
        assert!(!check("1.2.2", "~1.2.3").unwrap());
    }

    #[test]
    fn test_unknown_prefix_is_permissive() {
        assert!(check("1.0.0", "=>2.0.0").unwrap());
        assert!(check("1.0.0", "compatible-with 2.0").unwrap());
    }

    #[test]
    fn test_malformed_installed_version_errors() {
        assert!(check("not-a-version", "1.2.3").is_err());
        assert!(check("1.2.3", ">=1.2").is_err());
    }
}
