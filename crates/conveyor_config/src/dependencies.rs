//! Pipeline dependency graph and cycle detection.
//!
//! The graph is name-based: a [`DependencyTable`] maps each pipeline to the
//! `(pipeline, stage)` targets of its dependency materials. The detector
//! walks it with a three-state depth-first search; meeting a node that is
//! still in progress closes a cycle. Targets naming pipelines the table
//! does not know are skipped, since broken references are material
//! validation's job.

use std::collections::HashMap;

use crate::errors::{ConfigError, ConfigResult};
use crate::name::CaseInsensitiveName;

/// A dependency target, the upstream `(pipeline, stage)` pair a dependency
/// material points at.
pub type DependencyTarget = (CaseInsensitiveName, CaseInsensitiveName);

/// Pipeline name to dependency targets, for every pipeline in a
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyTable {
    entries: HashMap<CaseInsensitiveName, Vec<DependencyTarget>>,
}

impl DependencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pipeline` with its dependency targets, replacing any
    /// previous entry. Pipelines without dependencies still get an entry,
    /// so the table doubles as the set of known pipelines.
    pub fn insert(&mut self, pipeline: CaseInsensitiveName, targets: Vec<DependencyTarget>) {
        self.entries.insert(pipeline, targets);
    }

    pub fn contains(&self, pipeline: &CaseInsensitiveName) -> bool {
        self.entries.contains_key(pipeline)
    }

    pub fn targets_of(&self, pipeline: &CaseInsensitiveName) -> &[DependencyTarget] {
        self.entries
            .get(pipeline)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &CaseInsensitiveName> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `other` is reachable from `pipeline` through dependency
    /// targets, in any number of hops. Cycles terminate through the visited
    /// set.
    pub fn closure_contains(
        &self,
        pipeline: &CaseInsensitiveName,
        other: &CaseInsensitiveName,
    ) -> bool {
        let mut visited: Vec<&CaseInsensitiveName> = Vec::new();
        let mut frontier: Vec<&CaseInsensitiveName> = vec![pipeline];

        while let Some(current) = frontier.pop() {
            if visited.contains(&current) {
                continue;
            }
            visited.push(current);
            for (target, _stage) in self.targets_of(current) {
                if target == other {
                    return true;
                }
                frontier.push(target);
            }
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

/// Depth-first cycle detector over a [`DependencyTable`].
#[derive(Debug, Default)]
pub struct DfsCycleDetector;

impl DfsCycleDetector {
    /// Sorts the pipelines reachable from `start` so that every pipeline
    /// comes after the pipelines it depends on.
    ///
    /// A dependency chain that returns to a pipeline still being explored
    /// is a cycle, reported as `Circular dependency: a <- b <- a` with the
    /// repeated pipeline at both ends. A pipeline depending on itself reads
    /// `Circular dependency: p <- p`.
    pub fn topo_sort(
        start: &CaseInsensitiveName,
        table: &DependencyTable,
    ) -> ConfigResult<Vec<CaseInsensitiveName>> {
        let mut states = HashMap::new();
        let mut visiting = Vec::new();
        let mut order = Vec::new();
        Self::sort_from(start, table, &mut states, &mut visiting, &mut order)?;
        Ok(order)
    }

    fn sort_from(
        node: &CaseInsensitiveName,
        table: &DependencyTable,
        states: &mut HashMap<CaseInsensitiveName, VisitState>,
        visiting: &mut Vec<CaseInsensitiveName>,
        order: &mut Vec<CaseInsensitiveName>,
    ) -> ConfigResult<()> {
        states.insert(node.clone(), VisitState::InProgress);
        visiting.push(node.clone());

        for (target, _stage) in table.targets_of(node) {
            match states.get(target) {
                None => {
                    if table.contains(target) {
                        Self::sort_from(target, table, states, visiting, order)?;
                    }
                }
                Some(VisitState::InProgress) => {
                    return Err(ConfigError::CircularDependency {
                        path: cycle_path(visiting, target),
                    });
                }
                Some(VisitState::Done) => {}
            }
        }

        visiting.pop();
        states.insert(node.clone(), VisitState::Done);
        order.push(node.clone());
        Ok(())
    }
}

/// Renders the cycle closed at `repeated`: the repeated name, then the
/// chain under exploration from the nearest node back to the repeated one.
fn cycle_path(visiting: &[CaseInsensitiveName], repeated: &CaseInsensitiveName) -> String {
    let mut path = repeated.to_string();
    for node in visiting.iter().rev() {
        path.push_str(" <- ");
        path.push_str(node.as_str());
        if node == repeated {
            break;
        }
    }
    path
}

#[cfg(test)]
#[path = "dependencies_tests.rs"]
mod tests;
