//! Component C: the in-memory profile model.
//!
//! Exposes the read-only accessors the call-graph builder (D) and
//! grouping algorithms (F, G) need, plus the mutating interface COMDAT
//! fixup (H) and the retargeter (I) use to rewrite counter arrays in
//! place.

use std::collections::HashMap;

use bitflags::bitflags;
use num_enum::TryFromPrimitive;

use crate::ids::{CounterKind, FunctionId, Guid, ModuleId};

bitflags! {
    /// Module flag bitfield (`spec.md §3`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleFlags: u8 {
        const IS_PRIMARY       = 0b0001;
        const IS_EXPORTED      = 0b0010;
        const INCLUDE_ALL_AUX  = 0b0100;
        const CONTAINS_ASM     = 0b1000;
    }
}

/// Source language tag, independent of the `CONTAINS_ASM` flag bit
/// (`spec.md §6`: `{C, CPP, UNKNOWN} | ASM_STMTS_BIT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Language {
    C = 0,
    Cpp = 1,
    Unknown = 2,
}

/// One function's counter arrays, keyed by [`CounterKind`].
#[derive(Debug, Clone, Default)]
pub struct Function {
    pub id: FunctionId,
    pub lineno_checksum: u32,
    pub cfg_checksum: u32,
    counters: [Option<Vec<i64>>; CounterKind::ALL.len()],
    dirty: bool,
}

impl Function {
    #[must_use]
    pub fn new(id: FunctionId, lineno_checksum: u32, cfg_checksum: u32) -> Self {
        Self {
            id,
            lineno_checksum,
            cfg_checksum,
            counters: Default::default(),
            dirty: false,
        }
    }

    pub fn set_counters(&mut self, kind: CounterKind, values: Vec<i64>) {
        self.counters[kind as usize] = Some(values);
    }

    #[must_use]
    pub fn counters(&self, kind: CounterKind) -> Option<&[i64]> {
        self.counters[kind as usize].as_deref()
    }

    #[must_use]
    pub fn has_kind(&self, kind: CounterKind) -> bool {
        self.counters[kind as usize].is_some()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Overwrite the counter array for `kind`, marking the function dirty.
    ///
    /// Returns `false` (no-op) when `kind` is not active for this function
    /// or the new array's length does not match the existing one — the
    /// length-mismatch tolerance of `spec.md §4.C` applies symmetrically
    /// to writes, not just merges.
    pub fn overwrite_counters(&mut self, kind: CounterKind, values: Vec<i64>) -> bool {
        match &mut self.counters[kind as usize] {
            Some(existing) if existing.len() == values.len() => {
                *existing = values;
                self.dirty = true;
                true
            }
            _ => false,
        }
    }
}

/// One loaded compilation module (`spec.md §3`).
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub source_filename: String,
    pub flags: ModuleFlags,
    pub language: Language,
    /// Estimate (kB) of front-end memory required to parse this module;
    /// the sole capacity metric for inclusion-priority grouping (§4.G).
    pub ggc_memory: u32,
    functions: Vec<Function>,
    function_index: HashMap<FunctionId, usize>,
}

impl Module {
    #[must_use]
    pub fn new(
        id: ModuleId,
        source_filename: impl Into<String>,
        flags: ModuleFlags,
        language: Language,
        ggc_memory: u32,
        functions: Vec<Function>,
    ) -> Self {
        let function_index = functions
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id, i))
            .collect();
        Self {
            id,
            source_filename: source_filename.into(),
            flags,
            language,
            ggc_memory,
            functions,
            function_index,
        }
    }

    #[must_use]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.function_index.get(&id).map(|&i| &self.functions[i])
    }

    pub fn function_mut(&mut self, id: FunctionId) -> Option<&mut Function> {
        if let Some(&i) = self.function_index.get(&id) {
            Some(&mut self.functions[i])
        } else {
            None
        }
    }

    /// Highest `function_id` present in this module; used by the
    /// call-graph builder's bounds check for malformed GUIDs.
    #[must_use]
    pub fn max_function_id(&self) -> u32 {
        self.functions.iter().map(|f| f.id.0).max().unwrap_or(0)
    }

    #[must_use]
    pub fn is_exported(&self) -> bool {
        self.flags.contains(ModuleFlags::IS_EXPORTED)
    }

    pub fn set_exported(&mut self, exported: bool) {
        self.flags.set(ModuleFlags::IS_EXPORTED, exported);
    }

    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.flags.contains(ModuleFlags::IS_PRIMARY)
    }

    #[must_use]
    pub fn include_all_aux(&self) -> bool {
        self.flags.contains(ModuleFlags::INCLUDE_ALL_AUX)
    }

    pub fn set_include_all_aux(&mut self, value: bool) {
        self.flags.set(ModuleFlags::INCLUDE_ALL_AUX, value);
    }
}

/// The profile: every loaded module, immutable apart from flags and
/// counter arrays once construction finishes (`spec.md §3` lifetime note).
#[derive(Debug, Clone, Default)]
pub struct Profile {
    modules: Vec<Module>,
    module_index: HashMap<ModuleId, usize>,
}

impl Profile {
    #[must_use]
    pub fn new(modules: Vec<Module>) -> Self {
        let module_index = modules.iter().enumerate().map(|(i, m)| (m.id, i)).collect();
        Self {
            modules,
            module_index,
        }
    }

    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    #[must_use]
    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.module_index.get(&id).map(|&i| &self.modules[i])
    }

    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        if let Some(&i) = self.module_index.get(&id) {
            Some(&mut self.modules[i])
        } else {
            None
        }
    }

    #[must_use]
    pub fn function(&self, guid: Guid) -> Option<&Function> {
        self.module(guid.module_id())?.function(guid.function_id())
    }

    #[must_use]
    pub fn counter_array(&self, guid: Guid, kind: CounterKind) -> Option<&[i64]> {
        self.function(guid)?.counters(kind)
    }

    #[must_use]
    pub fn is_kind_active(&self, module_id: ModuleId, kind: CounterKind) -> bool {
        self.module(module_id)
            .is_some_and(|m| m.functions().iter().any(|f| f.has_kind(kind)))
    }

    /// Overwrite a function's counter array for `kind`. Returns whether a
    /// mutation actually happened (component H/I use the OR of these to
    /// decide whether gcda files must be re-emitted).
    pub fn overwrite_counters(&mut self, guid: Guid, kind: CounterKind, values: Vec<i64>) -> bool {
        let Some(module) = self.module_mut(guid.module_id()) else {
            return false;
        };
        let Some(function) = module.function_mut(guid.function_id()) else {
            return false;
        };
        function.overwrite_counters(kind, values)
    }

    #[must_use]
    pub fn any_dirty(&self) -> bool {
        self.modules
            .iter()
            .flat_map(Module::functions)
            .any(Function::is_dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: u32, ggc: u32) -> Module {
        Module::new(
            ModuleId(id),
            format!("m{id}.c"),
            ModuleFlags::empty(),
            Language::C,
            ggc,
            vec![Function::new(FunctionId(1), 7, 9)],
        )
    }

    #[test]
    fn lookup_by_id_round_trips() {
        let profile = Profile::new(vec![module(1, 100), module(2, 200)]);
        assert_eq!(profile.module(ModuleId(2)).unwrap().ggc_memory, 200);
        assert!(profile.module(ModuleId(3)).is_none());
    }

    #[test]
    fn overwrite_marks_dirty_and_checks_length() {
        let mut profile = Profile::new(vec![module(1, 100)]);
        let guid = Guid::new(ModuleId(1), FunctionId(1));
        profile
            .module_mut(ModuleId(1))
            .unwrap()
            .function_mut(FunctionId(1))
            .unwrap()
            .set_counters(CounterKind::Arcs, vec![0, 0, 0]);
        assert!(!profile.any_dirty());
        // wrong length: no-op
        assert!(!profile.overwrite_counters(guid, CounterKind::Arcs, vec![1, 2]));
        assert!(!profile.any_dirty());
        assert!(profile.overwrite_counters(guid, CounterKind::Arcs, vec![1, 2, 3]));
        assert!(profile.any_dirty());
        assert_eq!(
            profile.counter_array(guid, CounterKind::Arcs),
            Some([1, 2, 3].as_slice())
        );
    }
}
