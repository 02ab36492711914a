//! Component F: eager-propagation grouping (`spec.md §4.F`).
//!
//! DFS from every unvisited node; recursion happens into every callee so
//! cyclic graphs terminate (the visited bit is set before recursing, so
//! the first visitor to reach a node "owns" its imported-module set),
//! but only edges meeting the hot cutoff actually propagate weight.

use std::collections::HashMap;

use crate::callgraph::{CallGraph, NodeIdx};
use crate::context::Stats;
use crate::cutoff::is_hot;
use crate::error::Result;
use crate::ids::ModuleId;
use crate::profile::Profile;

use super::{accumulate_import, new_import_set, sorted_imports, ImportSet};

/// Run eager-propagation grouping over `graph`, mutating each node's
/// per-function imported-module set, then union those into a per-module
/// set. Marks every module reachable from another module's set as
/// exported on `profile`.
pub fn run(
    graph: &mut CallGraph,
    profile: &mut Profile,
    cutoff: i64,
    propagate_scale: u32,
    stats: &mut Stats,
) -> Result<HashMap<ModuleId, ImportSet>> {
    for idx in graph.node_indices() {
        visit(graph, cutoff, propagate_scale, stats, idx)?;
    }

    let mut module_sets: HashMap<ModuleId, ImportSet> = HashMap::new();
    for idx in graph.node_indices() {
        let module_id = graph.node(idx).guid.module_id();
        let entry = module_sets.entry(module_id).or_insert_with(new_import_set);
        if let Some(node_set) = &graph.node(idx).imported_modules {
            for imp in node_set.iter() {
                accumulate_import(entry, imp.module_id, imp.weight)?;
            }
        }
    }

    // Uniform reflexivity (`spec.md §3`, Testable Property 3): every
    // module's set contains itself at weight 0, regardless of whether
    // any function in it had callees.
    for module in profile.modules() {
        let entry = module_sets.entry(module.id).or_insert_with(new_import_set);
        accumulate_import(entry, module.id, 0.0)?;
    }

    for module in profile.modules().to_vec() {
        let Some(imports) = module_sets.get(&module.id) else {
            continue;
        };
        for imp in sorted_imports(imports) {
            if imp.module_id != module.id {
                if let Some(m) = profile.module_mut(imp.module_id) {
                    m.set_exported(true);
                }
            }
        }
    }
    stats.num_modules_exported = profile
        .modules()
        .iter()
        .filter(|m| m.is_exported())
        .count() as u64;

    Ok(module_sets)
}

fn visit(
    graph: &mut CallGraph,
    cutoff: i64,
    propagate_scale: u32,
    stats: &mut Stats,
    idx: NodeIdx,
) -> Result<()> {
    if graph.node(idx).visited {
        return Ok(());
    }
    graph.node_mut(idx).visited = true;

    let callee_edges = graph.node(idx).callees().to_vec();
    for &edge_idx in &callee_edges {
        let callee = graph.edge(edge_idx).callee;
        visit(graph, cutoff, propagate_scale, stats, callee)?;
    }

    if graph.node(idx).imported_modules.is_none() {
        graph.node_mut(idx).imported_modules = Some(new_import_set());
    }
    let my_module = graph.node(idx).guid.module_id();

    for &edge_idx in &callee_edges {
        let edge = *graph.edge(edge_idx);
        if !is_hot(edge.count, cutoff) {
            continue;
        }
        stats.num_hot_edges += 1;

        let callee_module = graph.node(edge.callee).guid.module_id();
        let sum_in_c = graph.node(edge.callee).sum_in_count;
        if sum_in_c == 0 {
            continue;
        }
        let s = edge.count as f64 / sum_in_c as f64;
        let s_prime = if callee_module != my_module {
            s * (f64::from(propagate_scale) / 100.0)
        } else {
            s
        };

        let callee_entries: Vec<_> = graph
            .node(edge.callee)
            .imported_modules
            .as_ref()
            .map(|set| set.iter().cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        let mut propagated_sum = 0.0f64;
        for entry in &callee_entries {
            let scaled = entry.weight * s_prime;
            accumulate_import(
                graph.node_mut(idx).imported_modules.as_mut().unwrap(),
                entry.module_id,
                scaled,
            )?;
            propagated_sum += scaled;
        }
        accumulate_import(
            graph.node_mut(idx).imported_modules.as_mut().unwrap(),
            callee_module,
            edge.count as f64 + propagated_sum,
        )?;
    }

    Ok(())
}
