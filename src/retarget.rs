//! Component I (spec.md calls the same routine H2 in §4.H, split out here
//! since §4.I calls it out as its own component): rewrites indirect-call
//! top-N entries whose target lies outside the caller's module group to
//! an equivalent copy inside the group, so the retained target survives
//! into the compilation that actually has its body available.
//!
//! Must run after grouping is finalized — it consults each caller's
//! module group.

use std::collections::{HashMap, HashSet};

use crate::comdat::checksum_classes;
use crate::ids::{CounterKind, FunctionId, Guid, ModuleId};
use crate::profile::Profile;

/// For every indirect-call entry whose target module is not in the
/// caller's group, look up the checksum-alias class of the target and
/// rewrite to the unique alias that *is* in the group. Leaves the entry
/// alone if zero or more than one such alias exists (Testable Property
/// 8: deterministic iff the alias is unique).
///
/// `groups` maps each module to the set of module ids it imports
/// (inclusive of itself); `indirect_call_topn` is the configured top-N
/// size needed to parse the counter blocks. Returns whether any counter
/// array was mutated.
#[must_use]
pub fn retarget_indirect_calls(
    profile: &mut Profile,
    groups: &HashMap<ModuleId, HashSet<ModuleId>>,
    indirect_call_topn: usize,
) -> bool {
    let classes = checksum_classes(profile);
    let block_len = CounterKind::indirect_call_block_len(indirect_call_topn);
    let mut mutated = false;

    let module_ids: Vec<ModuleId> = profile.modules().iter().map(|m| m.id).collect();
    for module_id in module_ids {
        let function_ids: Vec<FunctionId> = profile
            .module(module_id)
            .expect("module_id taken from profile.modules()")
            .functions()
            .iter()
            .map(|f| f.id)
            .collect();

        let empty = HashSet::new();
        let caller_group = groups.get(&module_id).unwrap_or(&empty);

        for function_id in function_ids {
            let caller_guid = Guid::new(module_id, function_id);
            let Some(values) = profile
                .function(caller_guid)
                .and_then(|f| f.counters(CounterKind::IndirectCall))
            else {
                continue;
            };
            if values.len() < block_len {
                continue;
            }

            let mut values = values.to_vec();
            let mut changed = false;
            for pair in values[1..block_len].chunks_exact_mut(2) {
                let target = Guid(pair[0] as u64);
                if target.is_none() {
                    continue;
                }
                if caller_group.contains(&target.module_id()) {
                    continue;
                }
                let Some(target_fn) = profile.function(target) else {
                    continue;
                };
                let key = (target_fn.lineno_checksum, target_fn.cfg_checksum);
                let Some(class) = classes.get(&key) else {
                    continue;
                };
                let in_group: Vec<Guid> = class
                    .iter()
                    .copied()
                    .filter(|g| caller_group.contains(&g.module_id()))
                    .collect();
                if let [only] = in_group[..] {
                    pair[0] = only.0 as i64;
                    changed = true;
                }
            }

            if changed && profile.overwrite_counters(caller_guid, CounterKind::IndirectCall, values) {
                mutated = true;
            }
        }
    }

    mutated
}
