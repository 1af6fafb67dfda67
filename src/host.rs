//! The skill host: discovery, ordering, and activation of installed skills.
//!
//! There is no process-wide registry; a [`SkillHost`] is created once at
//! startup and passed to whatever needs it, which keeps tests hermetic.
//! Skill entry points are typed factories registered up front, looked up by
//! the manifest's `entry` string.

use crate::clienv;
use crate::config::HostConfig;
use crate::error::{HostError, Result};
use crate::manifest::{self, SkillManifest};
use crate::resolver::DependencyResolver;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// An activated skill instance.
pub trait Skill: Send {
    fn name(&self) -> &str;
    fn activate(&mut self) -> anyhow::Result<()>;
    fn deactivate(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Constructs a skill instance from its manifest.
pub type SkillFactory =
    Box<dyn Fn(&SkillManifest) -> anyhow::Result<Box<dyn Skill>> + Send + Sync>;

/// Outcome of an activation pass. One failing skill never blocks the
/// independent rest.
#[derive(Default)]
pub struct ActivationReport {
    pub activated: Vec<String>,
    pub failed: Vec<(String, String)>,
}

pub struct SkillHost {
    config: HostConfig,
    skills_dir: PathBuf,
    factories: HashMap<String, SkillFactory>,
    manifests: Vec<SkillManifest>,
    active: Vec<Box<dyn Skill>>,
}

impl SkillHost {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            skills_dir: clienv::skills_dir(),
            factories: HashMap::new(),
            manifests: Vec::new(),
            active: Vec::new(),
        }
    }

    pub fn with_skills_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skills_dir = dir.into();
        self
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn skills_dir(&self) -> &PathBuf {
        &self.skills_dir
    }

    /// Register the factory for a manifest `entry` reference.
    pub fn register_factory(&mut self, entry: impl Into<String>, factory: SkillFactory) {
        self.factories.insert(entry.into(), factory);
    }

    /// Scan the skills directory and cache the discovered manifests.
    pub fn discover(&mut self) -> Result<&[SkillManifest]> {
        self.manifests = manifest::discover_manifests(&self.skills_dir)?;
        info!(count = self.manifests.len(), dir = %self.skills_dir.display(), "Discovered skills");
        Ok(&self.manifests)
    }

    pub fn manifests(&self) -> &[SkillManifest] {
        &self.manifests
    }

    /// Dependency-first activation order for the discovered manifests.
    pub fn activation_order(&self) -> Result<Vec<String>> {
        let mut order = DependencyResolver::resolve(&self.manifests)?;
        order.reverse();
        Ok(order)
    }

    /// Activate every discovered skill in dependency order. A skill that
    /// fails resolution or activation is dropped from this pass, together
    /// with nothing else: independent skills still come up.
    pub fn activate_all(&mut self) -> ActivationReport {
        let mut report = ActivationReport::default();
        let mut manifests = self.manifests.clone();

        // Retry resolution, shedding one offender at a time, so a broken
        // skill cannot take the whole host down with it.
        let order = loop {
            match DependencyResolver::resolve(&manifests) {
                Ok(mut order) => {
                    order.reverse();
                    break order;
                }
                Err(e) => {
                    let Some(offender) = resolution_offender(&e, &manifests) else {
                        warn!(error = %e, "Resolution failed without an attributable skill");
                        return report;
                    };
                    warn!(skill = %offender, error = %e, "Skill failed resolution, skipping it");
                    report.failed.push((offender.clone(), e.to_string()));
                    manifests.retain(|m| m.name != offender);
                }
            }
        };

        for name in order {
            let Some(manifest) = manifests.iter().find(|m| m.name == name) else {
                continue;
            };
            match self.instantiate(manifest) {
                Ok(mut skill) => match skill.activate() {
                    Ok(()) => {
                        debug!(skill = %name, "Skill activated");
                        report.activated.push(name);
                        self.active.push(skill);
                    }
                    Err(e) => {
                        warn!(skill = %name, error = %e, "Skill activation failed");
                        report.failed.push((name, e.to_string()));
                    }
                },
                Err(e) => {
                    warn!(skill = %name, error = %e, "Skill instantiation failed");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        info!(
            activated = report.activated.len(),
            failed = report.failed.len(),
            "Activation pass complete"
        );
        report
    }

    fn instantiate(&self, manifest: &SkillManifest) -> Result<Box<dyn Skill>> {
        let factory = self
            .factories
            .get(&manifest.entry)
            .ok_or_else(|| HostError::UnknownSkill(manifest.entry.clone()))?;
        factory(manifest).map_err(|e| HostError::Config(e.to_string()))
    }

    /// Deactivate in reverse activation order (dependents first).
    pub fn deactivate_all(&mut self) {
        while let Some(mut skill) = self.active.pop() {
            if let Err(e) = skill.deactivate() {
                warn!(skill = %skill.name(), error = %e, "Skill deactivation failed");
            }
        }
    }

    pub fn active_skills(&self) -> Vec<&str> {
        self.active.iter().map(|s| s.name()).collect()
    }
}

/// Pick the manifest to shed for a failed resolution pass.
fn resolution_offender(error: &HostError, manifests: &[SkillManifest]) -> Option<String> {
    match error {
        HostError::MissingDependency { skill, .. }
        | HostError::VersionConstraint { skill, .. } => Some(skill.clone()),
        HostError::CycleDetected { path } => {
            let first = path.split(" -> ").next()?;
            manifests
                .iter()
                .find(|m| m.name == first)
                .map(|m| m.name.clone())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Requires;
    use std::sync::{Arc, Mutex};

    struct RecordingSkill {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
        fail_activation: bool,
    }

    impl Skill for RecordingSkill {
        fn name(&self) -> &str {
            &self.name
        }

        fn activate(&mut self) -> anyhow::Result<()> {
            if self.fail_activation {
                anyhow::bail!("activation refused")
            }
            self.log.lock().unwrap().push(self.name.clone());
            Ok(())
        }
    }

    fn write_skill(dir: &std::path::Path, name: &str, requires: &[&str]) {
        let skill_dir = dir.join(name);
        std::fs::create_dir_all(&skill_dir).unwrap();
        let requires_line = if requires.is_empty() {
            String::new()
        } else {
            let quoted: Vec<String> = requires.iter().map(|r| format!("\"{r}\"")).collect();
            format!("requires = [{}]\n", quoted.join(", "))
        };
        std::fs::write(
            skill_dir.join("skill.toml"),
            format!(
                "name = \"{name}\"\nversion = \"1.0.0\"\nentry = \"test::skill\"\n{requires_line}"
            ),
        )
        .unwrap();
    }

    fn host_with_factory(
        tmp: &tempfile::TempDir,
        fail_for: &'static [&'static str],
    ) -> (SkillHost, Arc<Mutex<Vec<String>>>) {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let mut host = SkillHost::new(HostConfig::default()).with_skills_dir(tmp.path());
        host.register_factory(
            "test::skill",
            Box::new(move |m: &SkillManifest| {
                Ok(Box::new(RecordingSkill {
                    name: m.name.clone(),
                    log: Arc::clone(&sink),
                    fail_activation: fail_for.contains(&m.name.as_str()),
                }) as Box<dyn Skill>)
            }),
        );
        (host, log)
    }

    #[test]
    fn test_activation_respects_dependency_order() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "app", &["core"]);
        write_skill(tmp.path(), "core", &[]);

        let (mut host, log) = host_with_factory(&tmp, &[]);
        host.discover().unwrap();
        let report = host.activate_all();

        assert_eq!(report.failed.len(), 0);
        assert_eq!(*log.lock().unwrap(), vec!["core", "app"]);
        assert_eq!(host.active_skills().len(), 2);
    }

    #[test]
    fn test_broken_skill_does_not_block_independent_ones() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "broken", &["ghost"]);
        write_skill(tmp.path(), "fine", &[]);

        let (mut host, log) = host_with_factory(&tmp, &[]);
        host.discover().unwrap();
        let report = host.activate_all();

        assert_eq!(report.activated, vec!["fine"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
        assert_eq!(*log.lock().unwrap(), vec!["fine"]);
    }

    #[test]
    fn test_activation_failure_is_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "flaky", &[]);
        write_skill(tmp.path(), "solid", &[]);

        let (mut host, _log) = host_with_factory(&tmp, &["flaky"]);
        host.discover().unwrap();
        let report = host.activate_all();

        assert_eq!(report.activated, vec!["solid"]);
        assert_eq!(report.failed[0].0, "flaky");
    }

    #[test]
    fn test_unregistered_entry_reported() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "orphan", &[]);

        let mut host = SkillHost::new(HostConfig::default()).with_skills_dir(tmp.path());
        host.discover().unwrap();
        let report = host.activate_all();

        assert!(report.activated.is_empty());
        assert_eq!(report.failed[0].0, "orphan");
    }

    #[test]
    fn test_activation_order_is_dependency_first() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "a", &["b"]);
        write_skill(tmp.path(), "b", &["c"]);
        write_skill(tmp.path(), "c", &[]);

        let (mut host, _log) = host_with_factory(&tmp, &[]);
        host.discover().unwrap();
        assert_eq!(host.activation_order().unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_cycle_sheds_a_member_and_continues() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "x", &["y"]);
        write_skill(tmp.path(), "y", &["x"]);
        write_skill(tmp.path(), "free", &[]);

        let (mut host, _log) = host_with_factory(&tmp, &[]);
        host.discover().unwrap();
        let report = host.activate_all();

        assert!(report.activated.contains(&"free".to_string()));
        assert!(!report.failed.is_empty());
    }

    #[test]
    fn test_cycle_dependency_activates_despite_the_cycle() {
        // leaf sits under a cycle member but is not part of the cycle;
        // shedding the cycle must leave it activatable
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "leaf", &[]);
        write_skill(tmp.path(), "x", &["leaf", "y"]);
        write_skill(tmp.path(), "y", &["x"]);

        let (mut host, _log) = host_with_factory(&tmp, &[]);
        host.discover().unwrap();
        let report = host.activate_all();

        assert_eq!(report.activated, vec!["leaf"]);
        assert!(report.failed.iter().all(|(name, _)| name != "leaf"));
        assert_eq!(report.failed.len(), 2);
    }

    #[test]
    fn test_deactivate_all_unwinds() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "core", &[]);

        let (mut host, _log) = host_with_factory(&tmp, &[]);
        host.discover().unwrap();
        host.activate_all();
        assert_eq!(host.active_skills().len(), 1);
        host.deactivate_all();
        assert!(host.active_skills().is_empty());
    }

    #[test]
    fn test_requires_map_manifest_parses_through_host() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("pinned");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("skill.toml"),
            "name = \"pinned\"\nversion = \"1.0.0\"\nentry = \"test::skill\"\n\n[requires]\ncore = \"^1.0.0\"\n",
        )
        .unwrap();
        write_skill(tmp.path(), "core", &[]);

        let (mut host, _log) = host_with_factory(&tmp, &[]);
        host.discover().unwrap();
        let manifests = host.manifests();
        let pinned = manifests.iter().find(|m| m.name == "pinned").unwrap();
        assert!(matches!(pinned.requires, Requires::Map(_)));
        let report = host.activate_all();
        assert_eq!(report.activated.len(), 2);
    }
}
