//! Blast-radius analysis.
//!
//! Answers "who breaks if this service regresses": the direct
//! dependents, the transitive dependent closure, and the longest
//! dependent chain (critical path). Unlike stage ordering, every
//! declared edge counts here regardless of its ordering hint; a
//! `parallel_with` dependency still breaks when its dependency does.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use shiftgate_core::DependencyEdge;

/// The set of services whose correctness depends on the service under
/// change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlastRadius {
    /// Services with a declared edge onto the service.
    pub direct: Vec<String>,
    /// Services reachable through the dependents relation beyond the
    /// direct set.
    pub transitive: Vec<String>,
    /// Longest dependent chain rooted at the service, the service
    /// itself included.
    pub critical_path: Vec<String>,
}

impl BlastRadius {
    /// Total number of affected services.
    pub fn affected_count(&self) -> usize {
        self.direct.len() + self.transitive.len()
    }
}

/// Compute the blast radius of `service` under the declared edges.
pub fn blast_radius(service: &str, edges: &[DependencyEdge]) -> BlastRadius {
    let dependents = dependents_map(edges);

    let direct: Vec<String> = dependents
        .get(service)
        .cloned()
        .unwrap_or_default();

    // Breadth-first closure over the dependents relation. The
    // membership check before enqueue keeps this cycle-safe.
    let mut seen: HashSet<&str> = direct.iter().map(String::as_str).collect();
    seen.insert(service);
    let mut transitive = Vec::new();
    let mut queue: VecDeque<&str> = direct.iter().map(String::as_str).collect();

    while let Some(current) = queue.pop_front() {
        for dependent in dependents.get(current).into_iter().flatten() {
            if seen.insert(dependent.as_str()) {
                transitive.push(dependent.clone());
                queue.push_back(dependent.as_str());
            }
        }
    }

    let critical_path = longest_chain(service, &dependents);

    BlastRadius {
        direct,
        transitive,
        critical_path,
    }
}

/// dependency -> dependents, in input order, deduplicated.
fn dependents_map(edges: &[DependencyEdge]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for edge in edges {
        if edge.dependent == edge.dependency {
            continue;
        }
        let dependents = map.entry(edge.dependency.clone()).or_default();
        if !dependents.contains(&edge.dependent) {
            dependents.push(edge.dependent.clone());
        }
    }
    map
}

/// Depth-first search for the longest dependent chain starting at
/// `root`. The on-path set guards against cycles.
fn longest_chain(root: &str, dependents: &HashMap<String, Vec<String>>) -> Vec<String> {
    fn descend<'a>(
        node: &'a str,
        dependents: &'a HashMap<String, Vec<String>>,
        on_path: &mut HashSet<&'a str>,
    ) -> Vec<String> {
        let mut best: Vec<String> = Vec::new();
        for next in dependents.get(node).into_iter().flatten() {
            if !on_path.insert(next.as_str()) {
                continue;
            }
            let mut chain = vec![next.clone()];
            chain.extend(descend(next, dependents, on_path));
            if chain.len() > best.len() {
                best = chain;
            }
            on_path.remove(next.as_str());
        }
        best
    }

    let mut on_path = HashSet::from([root]);
    let mut path = vec![root.to_string()];
    path.extend(descend(root, dependents, &mut on_path));
    path
}
