//! Dependency resolution.
//!
//! [`Resolver::resolve`] walks the catalog breadth-first from a root name,
//! then orders the reachable formulae with Kahn's algorithm so that every
//! dependency comes before its dependents. Ties are broken by taking the
//! lexicographically smallest ready name, so the order is deterministic.

use anyhow::{Context, Result};
use log::debug;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;

use crate::formula::{Catalog, CatalogError, Formula};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("formula {dependency:?} not found")]
    RootNotFound { dependency: String },
    #[error("dependency {dependency:?} required by {required_by:?} not found")]
    NotFound {
        dependency: String,
        required_by: String,
    },
    #[error("circular dependency detected: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },
}

/// Formulae reachable from one root, with their direct dependencies.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub root: String,
    pub formulae: BTreeMap<String, Formula>,
    pub edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Direct dependencies of `name`, sorted.
    pub fn dependencies(&self, name: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(name)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }
}

pub struct Resolver<'a, C: Catalog> {
    catalog: &'a C,
}

impl<'a, C: Catalog> Resolver<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Installation order for `root`, dependencies first, root last.
    #[tracing::instrument(skip(self))]
    pub fn resolve(&self, root: &str) -> Result<Vec<Formula>> {
        let mut graph = self.graph(root)?;
        let order = topo_sort(&graph.edges)?;
        debug!("Resolved {} -> {:?}", root, order);

        let mut result = Vec::with_capacity(order.len());
        for name in order {
            if let Some(formula) = graph.formulae.remove(&name) {
                result.push(formula);
            }
        }
        Ok(result)
    }

    /// Load every formula reachable from `root`, each exactly once.
    #[tracing::instrument(skip(self))]
    pub fn graph(&self, root: &str) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph {
            root: root.to_string(),
            ..Default::default()
        };
        let mut queue: VecDeque<(String, Option<String>)> = VecDeque::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();

        queue.push_back((root.to_string(), None));
        seen.insert(root.to_string());

        while let Some((name, required_by)) = queue.pop_front() {
            let formula = self.load(&name, required_by.as_deref())?;
            let deps: BTreeSet<String> = formula.dependencies.iter().cloned().collect();

            for dep in &formula.dependencies {
                if seen.insert(dep.clone()) {
                    queue.push_back((dep.clone(), Some(name.clone())));
                }
            }

            graph.edges.insert(name.clone(), deps);
            graph.formulae.insert(name, formula);
        }

        Ok(graph)
    }

    fn load(&self, name: &str, required_by: Option<&str>) -> Result<Formula> {
        match self.catalog.load_by_name(name) {
            Ok(formula) => Ok(formula),
            Err(e) if e.downcast_ref::<CatalogError>().is_some() => {
                debug!("Lookup of {} failed: {:#}", name, e);
                Err(match required_by {
                    Some(parent) => ResolveError::NotFound {
                        dependency: name.to_string(),
                        required_by: parent.to_string(),
                    },
                    None => ResolveError::RootNotFound {
                        dependency: name.to_string(),
                    },
                }
                .into())
            }
            Err(e) => Err(e).with_context(|| match required_by {
                Some(parent) => format!("load dependency {} of {}", name, parent),
                None => format!("load formula {}", name),
            }),
        }
    }
}

/// Kahn's algorithm over `node -> direct dependencies`.
///
/// Every node named as a dependency must also be a key of `graph`.
pub(crate) fn topo_sort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>> {
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (node, deps) in graph {
        in_degree.insert(node.as_str(), deps.len());
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(node.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(node, _)| *node)
        .collect();

    let mut sorted = Vec::with_capacity(graph.len());
    while let Some(node) = ready.pop_first() {
        sorted.push(node.to_string());
        for dependent in dependents.get(node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if sorted.len() != graph.len() {
        return Err(ResolveError::Cycle {
            chain: find_cycle(graph, &in_degree),
        }
        .into());
    }
    Ok(sorted)
}

/// Report an actual cycle among the nodes Kahn's algorithm could not place.
fn find_cycle(
    graph: &BTreeMap<String, BTreeSet<String>>,
    in_degree: &BTreeMap<&str, usize>,
) -> Vec<String> {
    let residual: Vec<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree > 0)
        .map(|(node, _)| *node)
        .collect();

    let Some(start) = residual.first().copied() else {
        return Vec::new();
    };

    trace_cycle(graph, start).unwrap_or_else(|| residual.iter().map(|n| n.to_string()).collect())
}

/// Depth-first search with an explicit stack. Returns the path suffix from the
/// first repeated node, closed with the repeat.
fn trace_cycle(graph: &BTreeMap<String, BTreeSet<String>>, start: &str) -> Option<Vec<String>> {
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    let mut path: Vec<&str> = vec![start];
    let mut stack: Vec<std::collections::btree_set::Iter<'_, String>> = Vec::new();

    visited.insert(start);
    stack.push(graph.get(start)?.iter());

    while let Some(deps) = stack.last_mut() {
        let Some(dep) = deps.next() else {
            stack.pop();
            path.pop();
            continue;
        };
        let dep = dep.as_str();

        if let Some(pos) = path.iter().position(|n| *n == dep) {
            let mut chain: Vec<String> = path[pos..].iter().map(|n| n.to_string()).collect();
            chain.push(dep.to_string());
            return Some(chain);
        }
        if !visited.insert(dep) {
            continue;
        }
        let Some(next) = graph.get(dep) else {
            continue;
        };
        path.push(dep);
        stack.push(next.iter());
    }

    None
}
