// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::validate::validate_job_id;
use crate::errors::{Result, TickdagError};
use crate::schedule::JobDefinition;
use crate::types::JobId;

/// In-memory dependency graph keyed by job id.
///
/// Built only from definitions that passed [`validate_definitions`], so it
/// is known to be acyclic and closed over its ids.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    /// Direct dependents: jobs that list the key in `depends_on`.
    dependents: HashMap<JobId, Vec<JobId>>,
    /// Dependencies before dependents.
    topo_order: Vec<JobId>,
}

impl DagGraph {
    /// All job ids, dependencies first.
    pub fn topological_order(&self) -> &[JobId] {
        &self.topo_order
    }

    /// Immediate dependents of a job (jobs that list it in `depends_on`).
    pub fn dependents_of(&self, id: &str) -> &[JobId] {
        self.dependents
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Validate a full set of definitions and build their dependency graph.
///
/// Checks, in order:
/// - every id is well formed and unique,
/// - every dependency refers to a job in the same set and is not the job itself,
/// - the graph has no cycles.
pub fn validate_definitions(defs: &[JobDefinition]) -> Result<DagGraph> {
    let mut seen: HashSet<&str> = HashSet::new();
    for def in defs {
        validate_job_id(&def.id)?;
        if !seen.insert(def.id.as_str()) {
            return Err(TickdagError::DuplicateJob(def.id.clone()));
        }
    }

    for def in defs {
        for dep in def.dependency_ids() {
            if dep == def.id {
                return Err(TickdagError::ConfigError(format!(
                    "job '{}' cannot depend on itself",
                    def.id
                )));
            }
            if !seen.contains(dep) {
                return Err(TickdagError::ConfigError(format!(
                    "job '{}' has unknown dependency '{}' in `depends_on`",
                    def.id, dep
                )));
            }
        }
    }

    // Edge direction: dep -> job, so a topological order runs upstream first.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for def in defs {
        graph.add_node(def.id.as_str());
    }
    for def in defs {
        for dep in def.dependency_ids() {
            graph.add_edge(dep, def.id.as_str(), ());
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| {
        TickdagError::DagCycle(format!(
            "cycle detected in job dependencies involving job '{}'",
            cycle.node_id()
        ))
    })?;

    let mut dependents: HashMap<JobId, Vec<JobId>> = HashMap::new();
    for def in defs {
        for dep in def.dependency_ids() {
            dependents
                .entry(dep.to_string())
                .or_default()
                .push(def.id.clone());
        }
    }

    Ok(DagGraph {
        dependents,
        topo_order: order.into_iter().map(str::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::test_support::definition;

    #[test]
    fn builds_reverse_edges_and_upstream_first_order() {
        let defs = vec![
            definition("start", &[]),
            definition("evaluate", &["start"]),
            definition("report", &["start", "evaluate"]),
        ];
        let graph = validate_definitions(&defs).unwrap();

        assert_eq!(graph.dependents_of("start"), ["evaluate", "report"]);
        assert!(graph.dependents_of("report").is_empty());

        let order = graph.topological_order();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("start") < pos("evaluate"));
        assert!(pos("evaluate") < pos("report"));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let defs = vec![
            definition("a", &[]),
            definition("b", &["a"]),
            definition("c", &["a"]),
            definition("d", &["b", "c"]),
        ];
        assert!(validate_definitions(&defs).is_ok());
    }

    #[test]
    fn rejects_two_job_cycle() {
        let defs = vec![definition("a", &["b"]), definition("b", &["a"])];
        match validate_definitions(&defs) {
            Err(TickdagError::DagCycle(msg)) => assert!(msg.contains("cycle detected")),
            other => panic!("expected DagCycle, got {other:?}"),
        }
    }

    #[test]
    fn rejects_longer_cycle() {
        let defs = vec![
            definition("a", &[]),
            definition("b", &["a", "d"]),
            definition("c", &["b"]),
            definition("d", &["c"]),
        ];
        assert!(matches!(
            validate_definitions(&defs),
            Err(TickdagError::DagCycle(_))
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let defs = vec![definition("a", &[]), definition("a", &[])];
        assert!(matches!(
            validate_definitions(&defs),
            Err(TickdagError::DuplicateJob(id)) if id == "a"
        ));
    }

    #[test]
    fn rejects_unknown_and_self_dependencies() {
        let unknown = vec![definition("a", &["ghost"])];
        let err = validate_definitions(&unknown).unwrap_err();
        assert!(err.to_string().contains("unknown dependency 'ghost'"));

        let own = vec![definition("a", &["a"])];
        let err = validate_definitions(&own).unwrap_err();
        assert!(err.to_string().contains("cannot depend on itself"));
    }
}
