//! Component D: walks every function's counters and materialises call
//! graph nodes and edges.

use log::{debug, warn};

use crate::context::Stats;
use crate::ids::{CounterKind, FunctionId, Guid, ModuleId};
use crate::keyed_set::KeyedSet;
use crate::profile::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIdx(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeIdx(pub usize);

/// One call-graph node per function (`spec.md §3`).
#[derive(Debug)]
pub struct Node {
    pub guid: Guid,
    pub(crate) callees: Vec<EdgeIdx>,
    pub(crate) callers: Vec<EdgeIdx>,
    /// Populated by the grouping phase (F or G); `None` beforehand.
    pub imported_modules: Option<KeyedSet<super::grouping::ImportEntry, fn(&super::grouping::ImportEntry) -> u32>>,
    pub sum_in_count: i64,
    pub visited: bool,
}

impl Node {
    fn new(guid: Guid) -> Self {
        Self {
            guid,
            callees: Vec::new(),
            callers: Vec::new(),
            imported_modules: None,
            sum_in_count: 0,
            visited: false,
        }
    }

    #[must_use]
    pub fn callees(&self) -> &[EdgeIdx] {
        &self.callees
    }

    #[must_use]
    pub fn callers(&self) -> &[EdgeIdx] {
        &self.callers
    }
}

/// A call-graph edge (`spec.md §3`). Duplicates from multiple counters
/// are never merged at this level — two edges can exist for the same
/// `(caller, callee)` pair if they came from distinct counters.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub caller: NodeIdx,
    pub callee: NodeIdx,
    pub count: i64,
    pub indirect: bool,
}

#[derive(Default)]
pub struct CallGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    node_by_guid: std::collections::HashMap<Guid, NodeIdx>,
}

impl CallGraph {
    #[must_use]
    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx.0]
    }

    pub fn node_mut(&mut self, idx: NodeIdx) -> &mut Node {
        &mut self.nodes[idx.0]
    }

    #[must_use]
    pub fn edge(&self, idx: EdgeIdx) -> &Edge {
        &self.edges[idx.0]
    }

    #[must_use]
    pub fn find_node(&self, guid: Guid) -> Option<NodeIdx> {
        self.node_by_guid.get(&guid).copied()
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIdx> {
        (0..self.nodes.len()).map(NodeIdx)
    }

    pub fn edge_indices(&self) -> impl Iterator<Item = EdgeIdx> {
        (0..self.edges.len()).map(EdgeIdx)
    }

    fn alloc_node(&mut self, guid: Guid) -> NodeIdx {
        let idx = NodeIdx(self.nodes.len());
        self.nodes.push(Node::new(guid));
        self.node_by_guid.insert(guid, idx);
        idx
    }

    fn alloc_edge(&mut self, caller: NodeIdx, callee: NodeIdx, count: i64, indirect: bool) -> EdgeIdx {
        let idx = EdgeIdx(self.edges.len());
        self.edges.push(Edge {
            caller,
            callee,
            count,
            indirect,
        });
        self.nodes[caller.0].callees.push(idx);
        self.nodes[callee.0].callers.push(idx);
        idx
    }

    /// Build the call graph from every module's counters (`spec.md §4.D`).
    ///
    /// `indirect_call_topn` is the configured top-N size used to parse
    /// `CounterKind::IndirectCall` blocks. `fixup_enabled` controls whether
    /// zero-count arcs are worth tracking for H1 (in this implementation
    /// H1 recomputes zero-ness directly from the arcs counters rather
    /// than consulting a flag threaded through the builder — see
    /// `DESIGN.md`), so it only affects whether `Stats::num_nodes_executed`
    /// bookkeeping happens eagerly; it is always computed here regardless,
    /// since the cost of doing so is negligible.
    pub fn build(profile: &Profile, indirect_call_topn: usize, stats: &mut Stats) -> Self {
        let mut graph = Self::default();

        for module in profile.modules() {
            for function in module.functions() {
                graph.alloc_node(Guid::new(module.id, function.id));
            }
        }

        for module in profile.modules() {
            for function in module.functions() {
                let caller_guid = Guid::new(module.id, function.id);
                let caller_idx = graph.node_by_guid[&caller_guid];

                if let Some(values) = function.counters(CounterKind::DirectCall) {
                    for pair in values.chunks_exact(2) {
                        graph.add_call_edge(
                            profile,
                            caller_idx,
                            pair[0] as u64,
                            pair[1],
                            false,
                            stats,
                        );
                    }
                }

                if let Some(values) = function.counters(CounterKind::IndirectCall) {
                    let block_len = CounterKind::indirect_call_block_len(indirect_call_topn);
                    if values.len() >= block_len {
                        // values[0] is the eviction counter, skipped.
                        for pair in values[1..block_len].chunks_exact(2) {
                            graph.add_call_edge(
                                profile,
                                caller_idx,
                                pair[0] as u64,
                                pair[1],
                                true,
                                stats,
                            );
                        }
                    }
                }

                if let Some(values) = function.counters(CounterKind::Arcs) {
                    let sum: i64 = values.iter().fold(0i64, |acc, v| acc.wrapping_add(*v));
                    if sum != 0 {
                        stats.num_nodes_executed += 1;
                    }
                }
            }
        }

        debug!(
            "callgraph build complete: {} nodes, {} edges, {} executed, {} insane, {} zero-count",
            graph.num_nodes(),
            graph.num_edges(),
            stats.num_nodes_executed,
            stats.total_insane_count,
            stats.total_zero_count,
        );

        graph
    }

    fn add_call_edge(
        &mut self,
        profile: &Profile,
        caller_idx: NodeIdx,
        callee_guid_raw: u64,
        count: i64,
        indirect: bool,
        stats: &mut Stats,
    ) {
        if count == 0 {
            stats.total_zero_count += 1;
            warn!("dropping zero-count call entry from caller {}", self.nodes[caller_idx.0].guid);
            return;
        }
        let callee_guid = Guid(callee_guid_raw);
        let callee_module = profile.module(ModuleId(callee_guid.module_id().0));
        let in_range = callee_module
            .is_some_and(|m| callee_guid.function_id().0 != 0 && callee_guid.function_id().0 <= m.max_function_id());
        if !in_range {
            stats.total_insane_count += 1;
            warn!(
                "dropping insane call target {callee_guid} from caller {}",
                self.nodes[caller_idx.0].guid
            );
            return;
        }
        let Some(&callee_idx) = self.node_by_guid.get(&callee_guid) else {
            stats.total_insane_count += 1;
            warn!(
                "dropping call target {callee_guid} with no matching node from caller {}",
                self.nodes[caller_idx.0].guid
            );
            return;
        };
        self.alloc_edge(caller_idx, callee_idx, count, indirect);
    }

    /// `sum_in_count` for every node: the sum of its incoming edges'
    /// counts (§4.F step 2). Computed once, ahead of eager propagation.
    pub fn compute_sum_in_counts(&mut self) {
        for idx in 0..self.nodes.len() {
            let sum: i64 = self.nodes[idx]
                .callers
                .iter()
                .map(|&e| self.edges[e.0].count)
                .fold(0, i64::wrapping_add);
            self.nodes[idx].sum_in_count = sum;
        }
    }

    #[cfg(test)]
    pub(crate) fn function_id_of(&self, idx: NodeIdx) -> FunctionId {
        self.nodes[idx.0].guid.function_id()
    }
}
