//! Component J: export / serialise (`spec.md §4.J`).
//!
//! Flattens each module's imported-module set (as produced by F or G)
//! into the per-module view downstream consumers see: a primary module,
//! its ordered auxiliary list, and an is-exported bit.

use std::collections::HashMap;

use crate::grouping::{sorted_imports, ImportSet};
use crate::ids::ModuleId;
use crate::profile::Profile;

/// One auxiliary module entry in a primary's ordered list.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxModule {
    pub module_id: ModuleId,
    pub source_filename: String,
    pub weight: f64,
}

/// The grouping result for a single primary module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleGroup {
    pub primary_module_id: ModuleId,
    pub is_exported: bool,
    pub include_all_aux: bool,
    pub aux: Vec<AuxModule>,
}

/// Build the per-module export view for every module in `profile`, given
/// the import sets produced by a grouping algorithm.
#[must_use]
pub fn build(profile: &Profile, module_sets: &HashMap<ModuleId, ImportSet>) -> Vec<ModuleGroup> {
    profile
        .modules()
        .iter()
        .map(|module| {
            let aux = module_sets
                .get(&module.id)
                .map(|set| {
                    sorted_imports(set)
                        .into_iter()
                        .filter(|entry| entry.module_id != module.id)
                        .filter_map(|entry| {
                            profile.module(entry.module_id).map(|m| AuxModule {
                                module_id: entry.module_id,
                                source_filename: m.source_filename.clone(),
                                weight: entry.weight,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();

            ModuleGroup {
                primary_module_id: module.id,
                is_exported: module.is_exported(),
                include_all_aux: module.include_all_aux(),
                aux,
            }
        })
        .collect()
}

/// Convenience: each primary's imported module ids including itself,
/// used by the retargeter (`src/retarget.rs`) to test group membership.
#[must_use]
pub fn membership_sets(
    module_sets: &HashMap<ModuleId, ImportSet>,
) -> HashMap<ModuleId, std::collections::HashSet<ModuleId>> {
    module_sets
        .iter()
        .map(|(&id, set)| (id, set.iter().map(|e| e.module_id).collect()))
        .collect()
}
