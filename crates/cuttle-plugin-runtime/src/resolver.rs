//! Dependency graph resolution
//!
//! Pure functions over a name -> declared-dependency-names map: cycle
//! detection, missing-dependency detection, deterministic topological
//! ordering, and transitive closure collection. [`topological_sort`] is the
//! single gate deciding whether a dependency graph is installable — it
//! re-validates before producing an order.

use crate::error::{Result, RuntimeError};
use std::collections::{HashMap, HashSet, VecDeque};

/// Detect a dependency cycle
///
/// Returns the cycle as an ordered list of names (the first element
/// conceptually repeats at the end), or `None` when the graph is acyclic.
/// Only edges to known plugin names are followed; an edge to an unregistered
/// name is diagnosed by [`detect_missing`], not here.
pub fn detect_cycle(graph: &HashMap<String, Vec<String>>) -> Option<Vec<String>> {
    let mut names: Vec<&String> = graph.keys().collect();
    names.sort();

    let mut done: HashSet<&str> = HashSet::new();
    let mut stack: Vec<String> = Vec::new();

    for name in names {
        if done.contains(name.as_str()) {
            continue;
        }
        if let Some(cycle) = cycle_visit(graph, name, &mut stack, &mut done) {
            return Some(cycle);
        }
    }

    None
}

fn cycle_visit<'a>(
    graph: &'a HashMap<String, Vec<String>>,
    node: &'a str,
    stack: &mut Vec<String>,
    done: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    if let Some(pos) = stack.iter().position(|n| n == node) {
        // The cycle is the stack slice from the node's first occurrence
        // through the current node.
        return Some(stack[pos..].to_vec());
    }
    if done.contains(node) {
        return None;
    }

    stack.push(node.to_string());
    if let Some(deps) = graph.get(node) {
        for dep in deps {
            if graph.contains_key(dep) {
                if let Some(cycle) = cycle_visit(graph, dep, stack, done) {
                    return Some(cycle);
                }
            }
        }
    }
    stack.pop();
    done.insert(node);

    None
}

/// Detect declared dependencies absent from the registry
///
/// Returns, per plugin, the list of its declared dependency names that are
/// not registered. Duplicate declarations are reported once. Results are
/// ordered by plugin name so error payloads are reproducible.
pub fn detect_missing(graph: &HashMap<String, Vec<String>>) -> Vec<(String, Vec<String>)> {
    let mut names: Vec<&String> = graph.keys().collect();
    names.sort();

    let mut missing = Vec::new();
    for name in names {
        let absent = missing_for(graph, &graph[name]);
        if !absent.is_empty() {
            missing.push((name.clone(), absent));
        }
    }

    missing
}

fn missing_for(graph: &HashMap<String, Vec<String>>, deps: &[String]) -> Vec<String> {
    let mut absent: Vec<String> = Vec::new();
    for dep in deps {
        if !graph.contains_key(dep) && !absent.contains(dep) {
            absent.push(dep.clone());
        }
    }
    absent
}

/// Topologically sort `subset` so every dependency precedes its dependents
///
/// Re-validates first: a cycle among the subset raises
/// [`RuntimeError::DependencyCycle`] and a subset member declaring an
/// unregistered dependency raises [`RuntimeError::MissingDependencies`].
/// Dependency edges are followed only when the dependency is also inside
/// `subset`, so sorting a partial subset never pulls in unrelated nodes.
/// Ties among independent plugins are broken by the input order of `subset`.
pub fn topological_sort(
    graph: &HashMap<String, Vec<String>>,
    subset: &[String],
) -> Result<Vec<String>> {
    // Missing dependencies of any subset member fail the sort outright.
    let mut missing = Vec::new();
    for name in subset {
        if let Some(deps) = graph.get(name) {
            let absent = missing_for(graph, deps);
            if !absent.is_empty() {
                missing.push((name.clone(), absent));
            }
        }
    }
    if !missing.is_empty() {
        return Err(RuntimeError::MissingDependencies { missing });
    }

    let members: HashSet<&str> = subset.iter().map(String::as_str).collect();
    let subgraph: HashMap<String, Vec<String>> = subset
        .iter()
        .filter_map(|name| {
            graph.get(name).map(|deps| {
                let kept = deps
                    .iter()
                    .filter(|d| members.contains(d.as_str()))
                    .cloned()
                    .collect();
                (name.clone(), kept)
            })
        })
        .collect();

    if let Some(path) = detect_cycle(&subgraph) {
        return Err(RuntimeError::DependencyCycle { path });
    }

    let mut order = Vec::with_capacity(subset.len());
    let mut visiting: Vec<String> = Vec::new();
    let mut done: HashSet<String> = HashSet::new();

    for name in subset {
        if subgraph.contains_key(name) {
            sort_visit(&subgraph, name, &mut visiting, &mut done, &mut order)?;
        }
    }

    Ok(order)
}

fn sort_visit(
    graph: &HashMap<String, Vec<String>>,
    node: &str,
    visiting: &mut Vec<String>,
    done: &mut HashSet<String>,
    order: &mut Vec<String>,
) -> Result<()> {
    if done.contains(node) {
        return Ok(());
    }
    if let Some(pos) = visiting.iter().position(|n| n == node) {
        // Unreachable after the pre-check above, but the sort must never
        // loop if handed a graph that was mutated in between.
        return Err(RuntimeError::DependencyCycle {
            path: visiting[pos..].to_vec(),
        });
    }

    visiting.push(node.to_string());
    if let Some(deps) = graph.get(node) {
        for dep in deps {
            sort_visit(graph, dep, visiting, done, order)?;
        }
    }
    visiting.pop();

    done.insert(node.to_string());
    order.push(node.to_string());

    Ok(())
}

/// Collect the transitive dependency closure reachable from `root`
///
/// BFS over declared dependency arrays, following only edges to registered
/// names; the result starts with `root` and preserves discovery order.
pub fn transitive_closure(graph: &HashMap<String, Vec<String>>, root: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::new();

    seen.insert(root.to_string());
    queue.push_back(root.to_string());

    while let Some(name) = queue.pop_front() {
        if let Some(deps) = graph.get(&name) {
            for dep in deps {
                if graph.contains_key(dep) && seen.insert(dep.clone()) {
                    queue.push_back(dep.clone());
                }
            }
        }
        order.push(name);
    }

    order
}
