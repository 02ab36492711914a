//! Components F and G: module grouping under a per-group memory budget.
//!
//! Both algorithms share the same output shape — each node (F) or module
//! (G) accumulates an [`ImportSet`] of `(module, weight)` pairs — and the
//! same accumulate-on-insert semantics from `spec.md §3`: inserting a
//! module that is already present adds to its weight rather than
//! replacing it.

pub mod eager;
pub mod inclusion;
pub mod random;

use crate::error::Result;
use crate::ids::ModuleId;
use crate::keyed_set::KeyedSet;

/// `(module, weight)`, keyed by `module_id` in an [`ImportSet`].
#[derive(Debug, Clone)]
pub struct ImportEntry {
    pub module_id: ModuleId,
    pub weight: f64,
}

fn import_entry_key(e: &ImportEntry) -> u32 {
    e.module_id.0
}

pub type ImportSet = KeyedSet<ImportEntry, fn(&ImportEntry) -> u32>;

#[must_use]
pub fn new_import_set() -> ImportSet {
    KeyedSet::new(import_entry_key as fn(&ImportEntry) -> u32)
}

/// Insert `(module_id, weight)`, accumulating into an existing entry's
/// weight rather than overwriting it (`spec.md §3`).
pub fn accumulate_import(set: &mut ImportSet, module_id: ModuleId, weight: f64) -> Result<()> {
    let entry = set.occupy(module_id.0, || ImportEntry {
        module_id,
        weight: 0.0,
    })?;
    entry.weight += weight;
    Ok(())
}

/// Flatten `set` into entries sorted by weight descending, ties broken
/// by `module_id` ascending (`spec.md §4.J`).
#[must_use]
pub fn sorted_imports(set: &ImportSet) -> Vec<ImportEntry> {
    let mut entries: Vec<ImportEntry> = set.iter().cloned().collect();
    entries.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.module_id.cmp(&b.module_id))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_adds_not_replaces() {
        let mut set = new_import_set();
        accumulate_import(&mut set, ModuleId(3), 10.0).unwrap();
        accumulate_import(&mut set, ModuleId(3), 5.0).unwrap();
        assert_eq!(set.get(3).unwrap().weight, 15.0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn sorted_imports_orders_by_weight_then_module_id() {
        let mut set = new_import_set();
        accumulate_import(&mut set, ModuleId(1), 5.0).unwrap();
        accumulate_import(&mut set, ModuleId(2), 10.0).unwrap();
        accumulate_import(&mut set, ModuleId(3), 10.0).unwrap();
        let sorted = sorted_imports(&set);
        let ids: Vec<u32> = sorted.iter().map(|e| e.module_id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
