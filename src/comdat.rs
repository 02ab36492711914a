//! Component H: COMDAT counter fixup (`spec.md §4.H`).
//!
//! Functions that are COMDAT (or otherwise duplicated, e.g. inline
//! functions with external linkage) can appear as multiple copies across
//! modules, each with independently-collected — and often zero — counts.
//! This groups copies by `(lineno_checksum, cfg_checksum)` and overwrites
//! the zero-count copies from a merge of the non-zero ones, so every copy
//! reports a consistent profile regardless of which translation unit the
//! linker happened to keep.

use std::collections::HashMap;

use crate::ids::{CounterKind, Guid};
use crate::profile::Profile;

/// H1: zero-count fixup. Returns whether any counter array was mutated.
///
/// A copy is "zero-count" if its `Arcs` counters sum to zero (or it has
/// no `Arcs` counters at all — never executed is indistinguishable from
/// never instrumented, for this purpose). Idempotent: running this twice
/// is a no-op the second time, because the previously-zero copies are no
/// longer zero-count once fixed up, so the partition collapses to "all
/// non-zero" and nothing is overwritten (Testable Property 9).
#[must_use]
pub fn fixup_zero_count(profile: &mut Profile) -> bool {
    let classes = checksum_classes(profile);
    let mut mutated = false;

    for guids in classes.values() {
        if guids.len() < 2 {
            continue;
        }
        let (zero, nonzero): (Vec<Guid>, Vec<Guid>) =
            guids.iter().partition(|&&g| is_zero_count(profile, g));
        if zero.is_empty() || nonzero.is_empty() {
            continue;
        }

        for kind in CounterKind::ALL {
            let Some(merged) = merge_kind_across(profile, &nonzero, kind) else {
                continue;
            };
            for &g in &zero {
                let active = profile.function(g).is_some_and(|f| f.has_kind(kind));
                if active && profile.overwrite_counters(g, kind, merged.clone()) {
                    mutated = true;
                }
            }
        }
    }

    mutated
}

fn is_zero_count(profile: &Profile, guid: Guid) -> bool {
    profile
        .function(guid)
        .and_then(|f| f.counters(CounterKind::Arcs))
        .is_none_or(|arcs| arcs.iter().all(|&v| v == 0))
}

/// Merge `kind`'s counters across every copy in `guids` that has it
/// active, using the kind's merge law. `None` if no copy has it active.
fn merge_kind_across(profile: &Profile, guids: &[Guid], kind: CounterKind) -> Option<Vec<i64>> {
    let mut merged: Option<Vec<i64>> = None;
    for &g in guids {
        let Some(values) = profile.function(g).and_then(|f| f.counters(kind)) else {
            continue;
        };
        match &mut merged {
            None => merged = Some(values.to_vec()),
            Some(acc) => {
                // Length mismatches are tolerated (`spec.md §4.C`): the
                // merge is silently skipped, not fatal.
                kind.merge(acc, values);
            }
        }
    }
    merged
}

/// Group every function by `(lineno_checksum, cfg_checksum)` — the
/// checksum-alias table of `spec.md §3`.
pub fn checksum_classes(profile: &Profile) -> HashMap<(u32, u32), Vec<Guid>> {
    let mut classes: HashMap<(u32, u32), Vec<Guid>> = HashMap::new();
    for module in profile.modules() {
        for function in module.functions() {
            classes
                .entry((function.lineno_checksum, function.cfg_checksum))
                .or_default()
                .push(Guid::new(module.id, function.id));
        }
    }
    classes
}
