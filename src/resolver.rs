//! Dependency resolution for skill activation.
//!
//! Builds a directed graph from the discovered manifests, validates that every
//! declared dependency exists and satisfies its version constraint, then runs
//! Kahn's algorithm. The returned order is dependents-first; callers reverse it
//! to get dependency-first activation order (see `SkillHost::activation_order`).

use crate::error::{HostError, Result};
use crate::manifest::SkillManifest;
use crate::version;
use std::collections::{HashMap, HashSet, VecDeque};

pub struct DependencyResolver;

impl DependencyResolver {
    /// Validate constraints and compute a deterministic topological order.
    ///
    /// Ties between nodes of equal in-degree are broken by discovery order
    /// (the order of `manifests`), not by name, so resolution is stable per
    /// run without imposing an alphabetical activation policy.
    pub fn resolve(manifests: &[SkillManifest]) -> Result<Vec<String>> {
        let by_name: HashMap<&str, &SkillManifest> =
            manifests.iter().map(|m| (m.name.as_str(), m)).collect();

        Self::validate_constraints(manifests, &by_name)?;

        // Discovery-ordered adjacency: name -> declared dependency names.
        // An edge dependent -> dependency contributes to the dependency's
        // in-degree, so zero in-degree nodes are the ones nothing depends on.
        let mut graph: Vec<(&str, Vec<&str>)> = Vec::with_capacity(manifests.len());
        let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(manifests.len());
        for manifest in manifests {
            in_degree.entry(manifest.name.as_str()).or_insert(0);
        }
        for manifest in manifests {
            let deps: Vec<&str> = manifest
                .requires
                .entries()
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            for dep in &deps {
                *in_degree.get_mut(dep).expect("validated above") += 1;
            }
            graph.push((manifest.name.as_str(), deps));
        }
        let adjacency: HashMap<&str, &[&str]> = graph
            .iter()
            .map(|(name, deps)| (*name, deps.as_slice()))
            .collect();

        // Kahn's algorithm, FIFO queue seeded in discovery order.
        let mut queue: VecDeque<&str> = graph
            .iter()
            .filter(|(name, _)| in_degree[name] == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut result: Vec<String> = Vec::with_capacity(manifests.len());

        while let Some(name) = queue.pop_front() {
            result.push(name.to_string());
            for dep in adjacency[name] {
                let degree = in_degree.get_mut(dep).expect("validated above");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dep);
                }
            }
        }

        if result.len() != manifests.len() {
            let path = Self::cycle_path(&graph, &result);
            return Err(HostError::CycleDetected { path });
        }

        Ok(result)
    }

    fn validate_constraints(
        manifests: &[SkillManifest],
        by_name: &HashMap<&str, &SkillManifest>,
    ) -> Result<()> {
        for manifest in manifests {
            for (dep, constraint) in manifest.requires.entries() {
                let Some(found) = by_name.get(dep) else {
                    return Err(HostError::MissingDependency {
                        skill: manifest.name.clone(),
                        dependency: dep.to_string(),
                    });
                };
                if let Some(constraint) = constraint {
                    if !version::check(&found.version, constraint)? {
                        return Err(HostError::VersionConstraint {
                            skill: manifest.name.clone(),
                            dependency: dep.to_string(),
                            required: constraint.to_string(),
                            found: found.version.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Reconstruct a human-readable cycle from the nodes Kahn left behind.
    ///
    /// Kahn strands more than the cycle itself: a dependency of a cycle
    /// member never reaches zero in-degree either, yet it lies on no cycle.
    /// The leftover set is therefore pruned to a fixed point first, dropping
    /// nodes whose remaining dependencies are all resolved; every survivor
    /// has an unresolved dependency, so a walk along those dependencies
    /// cannot dead-end and must close on itself.
    fn cycle_path(graph: &[(&str, Vec<&str>)], resolved: &[String]) -> String {
        let deps_of: HashMap<&str, &Vec<&str>> =
            graph.iter().map(|(name, deps)| (*name, deps)).collect();

        let mut remaining: HashSet<&str> = graph
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| !resolved.iter().any(|r| r == name))
            .collect();
        loop {
            let dead_ends: Vec<&str> = remaining
                .iter()
                .filter(|name| deps_of[*name].iter().all(|d| !remaining.contains(d)))
                .copied()
                .collect();
            if dead_ends.is_empty() {
                break;
            }
            for name in dead_ends {
                remaining.remove(name);
            }
        }

        // First surviving node in discovery order, so reports are stable
        let Some(start) = graph
            .iter()
            .map(|(name, _)| *name)
            .find(|name| remaining.contains(name))
        else {
            return "<unknown>".to_string();
        };

        let mut trail: Vec<&str> = vec![start];
        let mut current = start;
        loop {
            let Some(next) = deps_of[current].iter().find(|d| remaining.contains(*d)) else {
                break;
            };
            if let Some(pos) = trail.iter().position(|n| n == next) {
                let mut cycle: Vec<&str> = trail[pos..].to_vec();
                cycle.push(next);
                return cycle.join(" -> ");
            }
            trail.push(next);
            current = next;
        }
        trail.join(" -> ")
    }
}
