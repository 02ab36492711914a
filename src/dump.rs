//! Optional textual/DOT call-graph dump (`spec.md §6` output boundary:
//! "Optional textual/DOT dump of the call graph on stderr").
//!
//! Scoped out as a *front-end* diagnostic-rendering concern by `spec.md
//! §1`, but the call-graph dump specifically is named as part of this
//! component's own output boundary, so it lives here rather than in a
//! later compilation pass (`SPEC_FULL.md` F.6).

use std::io::{self, Write};

use crate::callgraph::CallGraph;
use crate::context::DumpMode;
use crate::profile::Profile;

/// Write `graph` in `mode` to `w`. A no-op for [`DumpMode::None`].
pub fn write(mode: DumpMode, w: &mut impl Write, profile: &Profile, graph: &CallGraph) -> io::Result<()> {
    match mode {
        DumpMode::None => Ok(()),
        DumpMode::Text => write_text(w, profile, graph),
        DumpMode::Dot => write_dot(w, profile, graph),
    }
}

fn write_text(w: &mut impl Write, profile: &Profile, graph: &CallGraph) -> io::Result<()> {
    writeln!(w, "call graph: {} nodes, {} edges", graph.num_nodes(), graph.num_edges())?;
    for idx in graph.node_indices() {
        let node = graph.node(idx);
        let filename = profile
            .module(node.guid.module_id())
            .map_or("?", |m| m.source_filename.as_str());
        writeln!(w, "{} ({})", node.guid, filename)?;
        for &edge_idx in node.callees() {
            let edge = graph.edge(edge_idx);
            let callee_guid = graph.node(edge.callee).guid;
            let kind = if edge.indirect { "indirect" } else { "direct" };
            writeln!(w, "  -> {} [{kind}, count={}]", callee_guid, edge.count)?;
        }
    }
    Ok(())
}

fn write_dot(w: &mut impl Write, profile: &Profile, graph: &CallGraph) -> io::Result<()> {
    writeln!(w, "digraph callgraph {{")?;
    for idx in graph.node_indices() {
        let node = graph.node(idx);
        let filename = profile
            .module(node.guid.module_id())
            .map_or("?", |m| m.source_filename.as_str());
        writeln!(w, "  \"{}\" [label=\"{}\\n{}\"];", node.guid, node.guid, filename)?;
    }
    for idx in graph.edge_indices() {
        let edge = graph.edge(idx);
        let caller = graph.node(edge.caller).guid;
        let callee = graph.node(edge.callee).guid;
        let style = if edge.indirect { ", style=dashed" } else { "" };
        writeln!(w, "  \"{caller}\" -> \"{callee}\" [label=\"{}\"{style}];", edge.count)?;
    }
    writeln!(w, "}}")
}
