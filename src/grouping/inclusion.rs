//! Component G: inclusion-priority grouping (`spec.md §4.G`).
//!
//! Builds a module-level meta-graph from hot function edges, then
//! repeatedly pulls the highest-count meta-edge from a [`FibHeap`] and
//! tries to add the callee module (and everything it already imports)
//! to the caller's import set, respecting the memory budget and the
//! strict/weak inclusion policy.
//!
//! Terminology note (see `DESIGN.md`): `spec.md` uses "X exports to M" and
//! "exported_to(M)" inconsistently across §3 and §4.G; this implementation
//! follows the explicit gloss in §4.G step 4 ("X ... already imports M")
//! and treats `exported_to(M)` as the set of modules that currently
//! import `M` — i.e. the reverse-import index.

use std::collections::{HashMap, HashSet};

use log::trace;

use crate::callgraph::CallGraph;
use crate::context::Stats;
use crate::cutoff::is_hot;
use crate::error::Result;
use crate::fibheap::FibHeap;
use crate::ids::ModuleId;
use crate::profile::Profile;

use super::{accumulate_import, new_import_set, ImportEntry, ImportSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaEdgeState {
    InHeap,
    VisitedSkipped,
    Consumed,
}

struct MetaEdge {
    from: ModuleId,
    to: ModuleId,
    sum_count: i64,
    n_edges: u32,
    state: MetaEdgeState,
}

/// Run inclusion-priority grouping. Returns the per-module import set and
/// mutates `profile`'s exported flags and `include_all_aux` bits.
pub fn run(
    graph: &CallGraph,
    profile: &mut Profile,
    cutoff: i64,
    mem_budget: u64,
    weak_inclusion: bool,
    merge_modu_edges: bool,
    stats: &mut Stats,
) -> Result<HashMap<ModuleId, ImportSet>> {
    let ggc: HashMap<ModuleId, u64> = profile
        .modules()
        .iter()
        .map(|m| (m.id, u64::from(m.ggc_memory)))
        .collect();

    let mut meta_edges = build_meta_edges(graph, cutoff, merge_modu_edges, stats);

    let mut imports: HashMap<ModuleId, ImportSet> = HashMap::new();
    let mut group_mem: HashMap<ModuleId, u64> = HashMap::new();
    let mut exported_to: HashMap<ModuleId, HashSet<ModuleId>> = HashMap::new();
    for module in profile.modules() {
        let mut set = new_import_set();
        accumulate_import(&mut set, module.id, 0.0)?;
        imports.insert(module.id, set);
        group_mem.insert(module.id, ggc[&module.id]);
    }

    let mut heap: FibHeap<usize> = FibHeap::new();
    for (i, edge) in meta_edges.iter().enumerate() {
        heap.insert(-edge.sum_count, i)?;
    }

    while let Some(id) = heap.extract_min() {
        if meta_edges[id].state != MetaEdgeState::InHeap {
            continue;
        }
        process_edge(
            id,
            &mut meta_edges,
            &ggc,
            mem_budget,
            weak_inclusion,
            &mut imports,
            &mut group_mem,
            &mut exported_to,
        )?;
    }

    for module in profile.modules().to_vec() {
        let exported = exported_to.get(&module.id).is_some_and(|s| !s.is_empty());
        let include_all_aux = module.is_primary();
        if let Some(m) = profile.module_mut(module.id) {
            m.set_exported(exported);
            m.set_include_all_aux(include_all_aux);
        }
    }
    stats.num_modules_exported = profile
        .modules()
        .iter()
        .filter(|m| m.is_exported())
        .count() as u64;

    Ok(imports)
}

fn build_meta_edges(
    graph: &CallGraph,
    cutoff: i64,
    merge_modu_edges: bool,
    stats: &mut Stats,
) -> Vec<MetaEdge> {
    let mut coalesced: HashMap<(ModuleId, ModuleId), usize> = HashMap::new();
    let mut edges: Vec<MetaEdge> = Vec::new();

    for edge_idx in graph.edge_indices() {
        let edge = graph.edge(edge_idx);
        if !is_hot(edge.count, cutoff) {
            continue;
        }
        stats.num_hot_edges += 1;
        let from = graph.node(edge.caller).guid.module_id();
        let to = graph.node(edge.callee).guid.module_id();
        if from == to {
            continue;
        }
        if merge_modu_edges {
            match coalesced.get(&(from, to)) {
                Some(&i) => {
                    edges[i].sum_count = edges[i].sum_count.saturating_add(edge.count);
                    edges[i].n_edges += 1;
                }
                None => {
                    coalesced.insert((from, to), edges.len());
                    edges.push(MetaEdge {
                        from,
                        to,
                        sum_count: edge.count,
                        n_edges: 1,
                        state: MetaEdgeState::InHeap,
                    });
                }
            }
        } else {
            edges.push(MetaEdge {
                from,
                to,
                sum_count: edge.count,
                n_edges: 1,
                state: MetaEdgeState::InHeap,
            });
        }
    }

    edges
}

#[allow(clippy::too_many_arguments)]
fn process_edge(
    id: usize,
    meta_edges: &mut [MetaEdge],
    ggc: &HashMap<ModuleId, u64>,
    mem_budget: u64,
    weak_inclusion: bool,
    imports: &mut HashMap<ModuleId, ImportSet>,
    group_mem: &mut HashMap<ModuleId, u64>,
    exported_to: &mut HashMap<ModuleId, HashSet<ModuleId>>,
) -> Result<()> {
    let (m, m_prime, sum_count) = (meta_edges[id].from, meta_edges[id].to, meta_edges[id].sum_count);

    if group_mem[&m] >= mem_budget {
        trace!("skip meta-edge {m:?}->{m_prime:?}: {m:?} already at budget");
        meta_edges[id].state = MetaEdgeState::VisitedSkipped;
        return Ok(());
    }
    if imports[&m].contains(m_prime.0) {
        trace!("skip meta-edge {m:?}->{m_prime:?}: already imported");
        meta_edges[id].state = MetaEdgeState::VisitedSkipped;
        return Ok(());
    }

    let mut union_m: HashSet<ModuleId> = imports[&m].iter().map(|e| e.module_id).collect();
    union_m.extend(imports[&m_prime].iter().map(|e| e.module_id));
    union_m.insert(m_prime);
    let new_size: u64 = union_m.iter().map(|id| ggc[id]).sum();
    if new_size > mem_budget {
        trace!("skip meta-edge {m:?}->{m_prime:?}: new size {new_size} exceeds budget {mem_budget}");
        meta_edges[id].state = MetaEdgeState::VisitedSkipped;
        return Ok(());
    }

    let mut new_targets: Vec<ImportEntry> = vec![ImportEntry {
        module_id: m_prime,
        weight: sum_count as f64,
    }];
    for entry in imports[&m_prime].iter() {
        if entry.module_id != m_prime {
            new_targets.push(entry.clone());
        }
    }

    let mut candidates: Vec<ModuleId> = vec![m];
    if let Some(existing_importers) = exported_to.get(&m) {
        candidates.extend(existing_importers.iter().copied());
    }

    let mut fits: Vec<ModuleId> = Vec::new();
    let mut any_overflow = false;
    for &x in &candidates {
        let mut union_x: HashSet<ModuleId> = imports[&x].iter().map(|e| e.module_id).collect();
        for t in &new_targets {
            union_x.insert(t.module_id);
        }
        let size_x: u64 = union_x.iter().map(|id| ggc[id]).sum();
        if size_x <= mem_budget {
            fits.push(x);
        } else {
            any_overflow = true;
        }
    }

    if any_overflow && !weak_inclusion {
        trace!("skip meta-edge {m:?}->{m_prime:?}: strict inclusion would overflow an existing importer");
        meta_edges[id].state = MetaEdgeState::VisitedSkipped;
        return Ok(());
    }

    for x in &fits {
        for t in &new_targets {
            accumulate_import(imports.get_mut(x).expect("seeded for every module"), t.module_id, t.weight)?;
            exported_to.entry(t.module_id).or_default().insert(*x);
        }
        let size: u64 = imports[x].iter().map(|e| ggc[&e.module_id]).sum();
        group_mem.insert(*x, size);
    }

    trace!("consume meta-edge {m:?}->{m_prime:?}: added to {} group(s)", fits.len());
    meta_edges[id].state = MetaEdgeState::Consumed;
    Ok(())
}
