//! Skill manifest loading and discovery.
//!
//! Each installed skill carries a `skill.toml` at the root of its directory.
//! Manifests are immutable once loaded; discovery order is preserved because
//! the resolver uses it to break ties deterministically.

use crate::error::{HostError, Result};
use crate::version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MANIFEST_FILE: &str = "skill.toml";

fn default_requires_db() -> bool {
    true
}

/// Declarative description of a skill: identity, version, entry point, and
/// dependency constraints.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillManifest {
    /// Unique skill name.
    pub name: String,
    /// Semver version string (`major.minor.patch`, optional suffix).
    pub version: String,
    /// Entry reference resolved through the host's factory table.
    pub entry: String,
    /// Dependencies: either a bare list of names or a map name -> constraint.
    #[serde(default)]
    pub requires: Requires,
    /// Whether the skill needs the shared database collaborator.
    #[serde(default = "default_requires_db")]
    pub requires_db: bool,
}

/// Dependency declarations accept two shapes in TOML:
/// `requires = ["a", "b"]` or `[requires]\na = "^1.0.0"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Requires {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl Default for Requires {
    fn default() -> Self {
        Requires::List(Vec::new())
    }
}

impl Requires {
    /// Dependency names paired with their optional version constraint.
    pub fn entries(&self) -> Vec<(&str, Option<&str>)> {
        match self {
            Requires::List(names) => {
                names.iter().map(|n| (n.as_str(), None)).collect()
            }
            Requires::Map(map) => map
                .iter()
                .map(|(n, c)| (n.as_str(), Some(c.as_str())))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Requires::List(names) => names.is_empty(),
            Requires::Map(map) => map.is_empty(),
        }
    }
}

impl SkillManifest {
    /// Parse and validate a manifest from TOML text.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let manifest: SkillManifest =
            toml::from_str(content).map_err(|e| HostError::InvalidManifest {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        manifest.validate(path)?;
        Ok(manifest)
    }

    /// Load a manifest from a `skill.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(HostError::InvalidManifest {
                path: path.to_path_buf(),
                reason: "manifest field 'name' must be non-empty".to_string(),
            });
        }
        version::parse_triple(&self.version).map_err(|e| HostError::InvalidManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

/// Scan the skills directory for installed manifests.
///
/// Each immediate subdirectory is expected to contain a `skill.toml`; entries
/// without one are skipped, and unparsable manifests are logged and skipped so
/// one broken skill cannot block the rest (per-skill failure isolation).
pub fn discover_manifests(skills_dir: &Path) -> Result<Vec<SkillManifest>> {
    let mut manifests = Vec::new();

    if !skills_dir.exists() {
        debug!(dir = %skills_dir.display(), "Skills directory does not exist");
        return Ok(manifests);
    }

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(skills_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    // read_dir order is filesystem-dependent; sort for a stable discovery order
    dirs.sort();

    for dir in dirs {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            continue;
        }
        match SkillManifest::load(&manifest_path) {
            Ok(manifest) => {
                debug!(skill = %manifest.name, version = %manifest.version, "Discovered skill");
                manifests.push(manifest);
            }
            Err(e) => {
                warn!(path = %manifest_path.display(), error = %e, "Skipping unloadable manifest");
            }
        }
    }

    Ok(manifests)
}
