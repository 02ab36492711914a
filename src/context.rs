//! The single threaded value this pipeline is built around (`spec.md §9`,
//! "Global mutable state"): tunable parameters, environment-variable
//! overrides, and the diagnostic stat counters accumulated across a run.

use std::collections::HashMap;
use std::env;

use log::debug;

use crate::callgraph::CallGraph;
use crate::comdat;
use crate::cutoff;
use crate::dump;
use crate::error::Result;
use crate::export::{self, ModuleGroup};
use crate::grouping::{eager, inclusion, random};
use crate::profile::Profile;
use crate::retarget;

/// Which grouping algorithm to run (§4.F vs §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingAlgorithm {
    Eager,
    InclusionPriority,
}

/// COMDAT fixup mode, a bitmask in the input boundary (§6
/// `lipo_comdat_algorithm`): bit 0 retarget (H2/I), bit 1 zero-count
/// fixup (H1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComdatMode {
    pub retarget: bool,
    pub zero_count_fixup: bool,
}

impl ComdatMode {
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        Self {
            retarget: bits & 0b01 != 0,
            zero_count_fixup: bits & 0b10 != 0,
        }
    }
}

/// Call-graph dump verbosity (§6 `lipo_dump_cgraph`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpMode {
    #[default]
    None,
    Text,
    Dot,
}

impl DumpMode {
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Text,
            2 => Self::Dot,
            _ => Self::None,
        }
    }
}

/// Raw input-boundary parameter block (`spec.md §6`), field for field.
/// Sentinel values ("use env or default") are documented per field and
/// resolved by [`GroupingContext::from_params`].
#[derive(Debug, Clone, Copy)]
pub struct Params {
    /// `0..=100`; `100` means "read `GCOV_DYN_CGRAPH_CUTOFF` or default 80".
    pub lipo_cutoff: u32,
    pub lipo_random_seed: u32,
    /// `0` disables random grouping.
    pub lipo_random_group_size: u32,
    /// Percent, default 50; used to additionally scale cross-module
    /// propagation weight in eager grouping (§4.F step 3).
    pub lipo_propagate_scale: u32,
    /// kB; multiplied by 1.25 in practice per `spec.md §4.G`.
    pub lipo_max_mem: u32,
    /// Bitmask: 1 = retarget, 2 = zero-count fixup.
    pub lipo_comdat_algorithm: u32,
    /// 0 = eager, 1 = inclusion-priority.
    pub lipo_grouping_algorithm: u32,
    pub lipo_merge_modu_edges: bool,
    pub lipo_weak_inclusion: bool,
    /// 0 = none, 1 = text, 2 = DOT.
    pub lipo_dump_cgraph: u32,
    /// Top-N size of the indirect-call counter block (not itself named
    /// as a `lipo_*` tunable in §6, but needed to parse `CounterKind::IndirectCall`
    /// blocks in §4.D; carried here since it is as ambient as the rest).
    pub indirect_call_topn: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            lipo_cutoff: 100,
            lipo_random_seed: 0,
            lipo_random_group_size: 0,
            lipo_propagate_scale: 50,
            lipo_max_mem: u32::MAX,
            lipo_comdat_algorithm: 0,
            lipo_grouping_algorithm: 1,
            lipo_merge_modu_edges: true,
            lipo_weak_inclusion: false,
            lipo_dump_cgraph: 0,
            indirect_call_topn: 4,
        }
    }
}

/// Resolved cutoff percentages (`p_cut`, `p_min`) per §4.E.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cutoff {
    pub p_cut: u32,
    pub p_min: u32,
}

impl Default for Cutoff {
    fn default() -> Self {
        Self { p_cut: 80, p_min: 0 }
    }
}

/// Diagnostic counters accumulated over a run (§4.D, §7, §9 "Stats block").
/// Not spec-mandated beyond `total_insane_count`/`total_zero_count`, but
/// the dump format wants the rest and they cost nothing to track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_insane_count: u64,
    pub total_zero_count: u64,
    pub num_nodes_executed: u64,
    pub num_edges: u64,
    pub num_hot_edges: u64,
    pub num_modules_exported: u64,
}

/// The single value threaded through every entry point of the pipeline,
/// replacing the legacy implementation's module-level globals (`spec.md
/// §9`).
#[derive(Debug, Clone)]
pub struct GroupingContext {
    pub params: Params,
    pub cutoff: Cutoff,
    pub algorithm: GroupingAlgorithm,
    pub comdat_mode: ComdatMode,
    pub dump_mode: DumpMode,
    pub random_grouping: Option<(u32, u32)>,
    pub stats: Stats,
}

impl GroupingContext {
    /// Resolve a [`Params`] block plus environment-variable overrides
    /// (§6) into a ready-to-run context. Each override only takes effect
    /// when the corresponding parameter carries its documented sentinel.
    #[must_use]
    pub fn from_params(params: Params) -> Self {
        let cutoff = Self::resolve_cutoff(&params);
        let algorithm = Self::resolve_algorithm(&params);
        let merge_modu_edges = env_bool("GCOV_DYN_MERGE_EDGES").unwrap_or(params.lipo_merge_modu_edges);
        let weak_inclusion = env_bool("GCOV_DYN_WEAK_INCLUSION").unwrap_or(params.lipo_weak_inclusion);
        let mut resolved = params;
        resolved.lipo_merge_modu_edges = merge_modu_edges;
        resolved.lipo_weak_inclusion = weak_inclusion;
        if let Some(scale) = env_u32("GCOV_DYN_IMPORT_SCALE") {
            resolved.lipo_propagate_scale = scale;
        }

        let comdat_mode = if env_bool("GCOV_DYN_DO_FIXUP") == Some(false) {
            ComdatMode::default()
        } else {
            ComdatMode::from_bits(resolved.lipo_comdat_algorithm)
        };

        let dump_mode = match env::var("GCOV_DYN_CGRAPH_DUMP").ok().as_deref() {
            Some("1") => DumpMode::Text,
            Some("2") => DumpMode::Dot,
            Some(_) | None => DumpMode::from_code(resolved.lipo_dump_cgraph),
        };

        let random_grouping = Self::resolve_random_grouping(&resolved);

        Self {
            params: resolved,
            cutoff,
            algorithm,
            comdat_mode,
            dump_mode,
            random_grouping,
            stats: Stats::default(),
        }
    }

    fn resolve_cutoff(params: &Params) -> Cutoff {
        if params.lipo_cutoff != 100 {
            return Cutoff {
                p_cut: params.lipo_cutoff,
                p_min: 0,
            };
        }
        if let Some(spec) = env::var("GCOV_DYN_CGRAPH_CUTOFF").ok() {
            if let Some((p, n)) = spec.split_once(':') {
                if let (Ok(p_cut), Ok(p_min)) = (p.trim().parse(), n.trim().parse()) {
                    return Cutoff { p_cut, p_min };
                }
            }
        }
        Cutoff::default()
    }

    fn resolve_algorithm(params: &Params) -> GroupingAlgorithm {
        let code = env::var("GCOV_DYN_ALG")
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(params.lipo_grouping_algorithm);
        match code {
            0 => GroupingAlgorithm::Eager,
            _ => GroupingAlgorithm::InclusionPriority,
        }
    }

    /// `LIPO_RANDOM_GROUPING` is `"seed:size"`; absent or unparsable falls
    /// back to the `lipo_random_seed`/`lipo_random_group_size` params.
    /// `None` means random grouping is disabled (`size == 0`).
    fn resolve_random_grouping(params: &Params) -> Option<(u32, u32)> {
        if let Some(spec) = env::var("LIPO_RANDOM_GROUPING").ok() {
            if let Some((s, n)) = spec.split_once(':') {
                if let (Ok(seed), Ok(size)) = (s.trim().parse(), n.trim().parse::<u32>()) {
                    return (size != 0).then_some((seed, size));
                }
            }
        }
        (params.lipo_random_group_size != 0)
            .then_some((params.lipo_random_seed, params.lipo_random_group_size))
    }

    /// Effective memory budget in kB: `lipo_max_mem` scaled ×1.25, per
    /// `spec.md §4.G` ("multiplied by 1.25 in practice").
    #[must_use]
    pub fn mem_budget(&self) -> u64 {
        (u64::from(self.params.lipo_max_mem) * 5) / 4
    }

    /// Run the full pipeline — D → E → (F | G) → H → I → J — over
    /// `profile`, mutating its exported/`include_all_aux` flags and, if
    /// COMDAT fixup or retargeting is enabled, its counter arrays. This is
    /// the single entry point a loader drives (`spec.md §9`, "Global
    /// mutable state": the driver threading `GroupingContext` through
    /// every phase).
    ///
    /// Returns the per-module export view (component J). Check
    /// `self.stats` or `profile.any_dirty()` afterwards to learn whether
    /// counter arrays were mutated and gcda files need re-emitting.
    pub fn run(&mut self, profile: &mut Profile) -> Result<Vec<ModuleGroup>> {
        let mut graph = CallGraph::build(profile, self.params.indirect_call_topn, &mut self.stats);
        self.stats.num_edges = graph.num_edges() as u64;
        debug!(
            "built call graph: {} nodes, {} edges ({} insane, {} zero-count dropped)",
            graph.num_nodes(),
            graph.num_edges(),
            self.stats.total_insane_count,
            self.stats.total_zero_count,
        );

        let cutoff = cutoff::compute_hot_cutoff(&graph, self.cutoff.p_cut, self.cutoff.p_min);
        debug!("computed hot cutoff: {cutoff} (p_cut={}, p_min={})", self.cutoff.p_cut, self.cutoff.p_min);

        let module_sets = if let Some((seed, max_group_size)) = self.random_grouping {
            let sets = random::run(profile, seed, max_group_size)?;
            mark_exported_from_sets(profile, &sets);
            self.stats.num_modules_exported = profile.modules().iter().filter(|m| m.is_exported()).count() as u64;
            sets
        } else {
            graph.compute_sum_in_counts();
            match self.algorithm {
                GroupingAlgorithm::Eager => eager::run(&mut graph, profile, cutoff, self.params.lipo_propagate_scale, &mut self.stats)?,
                GroupingAlgorithm::InclusionPriority => inclusion::run(
                    &graph,
                    profile,
                    cutoff,
                    self.mem_budget(),
                    self.params.lipo_weak_inclusion,
                    self.params.lipo_merge_modu_edges,
                    &mut self.stats,
                )?,
            }
        };
        debug!("grouping complete: {} modules exported", self.stats.num_modules_exported);

        if self.comdat_mode.zero_count_fixup {
            comdat::fixup_zero_count(profile);
        }
        if self.comdat_mode.retarget {
            let membership = export::membership_sets(&module_sets);
            retarget::retarget_indirect_calls(profile, &membership, self.params.indirect_call_topn);
        }

        if !matches!(self.dump_mode, DumpMode::None) {
            let stderr = std::io::stderr();
            let _ = dump::write(self.dump_mode, &mut stderr.lock(), profile, &graph);
        }

        Ok(export::build(profile, &module_sets))
    }
}

/// Mark every module that appears in some *other* module's import set as
/// exported. Used by the random-grouping path, which (like eager
/// propagation) derives the exported flag from set membership rather than
/// the `exported_to` reverse index inclusion-priority grouping maintains
/// (`SPEC_FULL.md` F.7, "Self-reflexivity vs. the exported flag").
fn mark_exported_from_sets(profile: &mut Profile, sets: &HashMap<crate::ids::ModuleId, crate::grouping::ImportSet>) {
    for (&owner, set) in sets {
        for entry in set.iter() {
            if entry.module_id != owner {
                if let Some(m) = profile.module_mut(entry.module_id) {
                    m.set_exported(true);
                }
            }
        }
    }
}

fn env_u32(name: &str) -> Option<u32> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    match env::var(name).ok().as_deref() {
        Some("1") | Some("true") | Some("yes") => Some(true),
        Some("0") | Some("false") | Some("no") => Some(false),
        _ => None,
    }
}
