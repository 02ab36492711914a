//! End-to-end scenarios S1-S6 from `spec.md §8`, plus the cross-cutting
//! testable properties (4: strict inclusion, 5: memory budget, 10: dump
//! round-trip) that only make sense exercised against the full pipeline.

use lipo_grouping::context::{GroupingAlgorithm, GroupingContext, Params};
use lipo_grouping::ids::{CounterKind, FunctionId, Guid, ModuleId};
use lipo_grouping::imports_file;
use lipo_grouping::profile::{Function, Language, Module, ModuleFlags, Profile};

fn leaf(id: u32, ggc: u32) -> Module {
    Module::new(
        ModuleId(id),
        format!("m{id}.c"),
        ModuleFlags::empty(),
        Language::C,
        ggc,
        vec![Function::new(FunctionId(1), 1, 1)],
    )
}

fn with_direct_call(id: u32, ggc: u32, callee: Guid, count: i64) -> Module {
    let mut f = Function::new(FunctionId(1), 1, 1);
    f.set_counters(CounterKind::DirectCall, vec![callee.0 as i64, count]);
    Module::new(ModuleId(id), format!("m{id}.c"), ModuleFlags::empty(), Language::C, ggc, vec![f])
}

fn ctx_with(mut f: impl FnMut(&mut Params)) -> GroupingContext {
    let mut params = Params::default();
    f(&mut params);
    GroupingContext::from_params(params)
}

/// S1 — trivial: no cross-module calls, neither module exported, nothing
/// mutated.
#[test]
fn s1_trivial_no_cross_module_calls() {
    let mut profile = Profile::new(vec![leaf(1, 100), leaf(2, 100)]);
    let mut ctx = ctx_with(|_| {});
    let groups = ctx.run(&mut profile).unwrap();

    let g1 = groups.iter().find(|g| g.primary_module_id == ModuleId(1)).unwrap();
    let g2 = groups.iter().find(|g| g.primary_module_id == ModuleId(2)).unwrap();
    assert!(g1.aux.is_empty());
    assert!(g2.aux.is_empty());
    assert!(!g1.is_exported);
    assert!(!g2.is_exported);
    assert!(!profile.any_dirty());
}

/// S2 — one hot direct edge: M1 imports M2 at the edge's weight, M2 is
/// exported.
#[test]
fn s2_one_hot_direct_edge() {
    let m1 = with_direct_call(1, 100, Guid::new(ModuleId(2), FunctionId(1)), 1000);
    let m2 = leaf(2, 100);
    let mut profile = Profile::new(vec![m1, m2]);

    let mut ctx = ctx_with(|p| {
        p.lipo_cutoff = 0;
        p.lipo_grouping_algorithm = 1;
        p.lipo_max_mem = u32::MAX;
    });
    let groups = ctx.run(&mut profile).unwrap();

    let g1 = groups.iter().find(|g| g.primary_module_id == ModuleId(1)).unwrap();
    assert_eq!(g1.aux.len(), 1);
    assert_eq!(g1.aux[0].module_id, ModuleId(2));
    assert_eq!(g1.aux[0].weight, 1000.0);

    let g2 = groups.iter().find(|g| g.primary_module_id == ModuleId(2)).unwrap();
    assert!(g2.aux.is_empty());
    assert!(g2.is_exported);
}

/// S3 — zero-count direct-call entry: no edge created, stat bumped.
#[test]
fn s3_zero_count_entry_dropped() {
    let m1 = with_direct_call(1, 100, Guid::new(ModuleId(2), FunctionId(1)), 0);
    let m2 = leaf(2, 100);
    let mut profile = Profile::new(vec![m1, m2]);

    let mut ctx = ctx_with(|p| p.lipo_cutoff = 0);
    let groups = ctx.run(&mut profile).unwrap();
    assert_eq!(ctx.stats.total_zero_count, 1);

    let g1 = groups.iter().find(|g| g.primary_module_id == ModuleId(1)).unwrap();
    assert!(g1.aux.is_empty());
}

/// S4 — insane target module: out-of-range module id, no edge, stat bumped.
#[test]
fn s4_insane_target_module() {
    let m1 = with_direct_call(1, 100, Guid::new(ModuleId(99), FunctionId(1)), 5);
    let m2 = leaf(2, 100);
    let mut profile = Profile::new(vec![m1, m2]);

    let mut ctx = ctx_with(|p| p.lipo_cutoff = 0);
    ctx.run(&mut profile).unwrap();
    assert_eq!(ctx.stats.total_insane_count, 1);
}

/// S5 — COMDAT fixup: the zero-count copy picks up the non-zero copy's
/// counters, and the mutation is reported.
#[test]
fn s5_comdat_fixup() {
    let mut f1 = Function::new(FunctionId(1), 7, 9);
    f1.set_counters(CounterKind::Arcs, vec![0, 0, 0]);
    let m1 = Module::new(ModuleId(1), "m1.c", ModuleFlags::empty(), Language::C, 10, vec![f1]);

    let mut f2 = Function::new(FunctionId(1), 7, 9);
    f2.set_counters(CounterKind::Arcs, vec![3, 5, 2]);
    let m2 = Module::new(ModuleId(2), "m2.c", ModuleFlags::empty(), Language::C, 10, vec![f2]);

    let mut profile = Profile::new(vec![m1, m2]);
    let mut ctx = ctx_with(|p| p.lipo_comdat_algorithm = 2);
    ctx.run(&mut profile).unwrap();

    let fixed = profile
        .counter_array(Guid::new(ModuleId(1), FunctionId(1)), CounterKind::Arcs)
        .unwrap();
    assert_eq!(fixed, [3, 5, 2]);
    assert!(profile.any_dirty());
}

/// S6 — indirect-call retarget: an IC entry pointing outside the caller's
/// group is rewritten to the unique in-group alias.
#[test]
fn s6_indirect_call_retarget() {
    let target_outside = Guid::new(ModuleId(3), FunctionId(1));
    let mut f1 = Function::new(FunctionId(1), 1, 1);
    f1.set_counters(
        CounterKind::DirectCall,
        vec![Guid::new(ModuleId(2), FunctionId(1)).0 as i64, 5000],
    );
    // eviction counter + one (guid, count) slot, N=1.
    f1.set_counters(CounterKind::IndirectCall, vec![0, target_outside.0 as i64, 20]);
    let m1 = Module::new(ModuleId(1), "m1.c", ModuleFlags::empty(), Language::C, 100, vec![f1]);

    // M2 shares M3's (lineno, cfg) checksum class and gets pulled into
    // M1's group by the hot direct call above.
    let m2 = Module::new(
        ModuleId(2),
        "m2.c",
        ModuleFlags::empty(),
        Language::C,
        100,
        vec![Function::new(FunctionId(1), 9, 9)],
    );
    let m3 = Module::new(
        ModuleId(3),
        "m3.c",
        ModuleFlags::empty(),
        Language::C,
        100,
        vec![Function::new(FunctionId(1), 9, 9)],
    );

    let mut profile = Profile::new(vec![m1, m2, m3]);
    let mut ctx = ctx_with(|p| {
        p.lipo_cutoff = 0;
        p.lipo_comdat_algorithm = 1;
        p.indirect_call_topn = 1;
        p.lipo_max_mem = u32::MAX;
    });
    ctx.run(&mut profile).unwrap();

    let values = profile
        .counter_array(Guid::new(ModuleId(1), FunctionId(1)), CounterKind::IndirectCall)
        .unwrap();
    // Retargeted to the in-group alias (M2/f1, which shares M3/f1's
    // checksum class) rather than left pointing at M3.
    assert_eq!(values[1], Guid::new(ModuleId(2), FunctionId(1)).0 as i64);
    assert_eq!(values[2], 20);
}

/// Property 4 — strict inclusion: if M exports to M' (i.e. M' imports M),
/// then everything M imports, M' also imports.
#[test]
fn property_4_strict_inclusion_holds_by_default() {
    let g1 = Guid::new(ModuleId(1), FunctionId(1));
    let g2 = Guid::new(ModuleId(2), FunctionId(1));
    let m10 = with_direct_call(10, 10, g1, 900);
    let m1 = with_direct_call(1, 10, g2, 800);
    let m2 = leaf(2, 10);
    let mut profile = Profile::new(vec![m10, m1, m2]);

    let mut ctx = ctx_with(|p| {
        p.lipo_cutoff = 0;
        p.lipo_max_mem = u32::MAX;
        p.lipo_weak_inclusion = false;
    });
    let groups = ctx.run(&mut profile).unwrap();

    let g10 = groups.iter().find(|g| g.primary_module_id == ModuleId(10)).unwrap();
    let g1g = groups.iter().find(|g| g.primary_module_id == ModuleId(1)).unwrap();
    let imports_of: fn(&[lipo_grouping::export::AuxModule]) -> Vec<ModuleId> =
        |aux| aux.iter().map(|a| a.module_id).collect();
    let m10_imports = imports_of(&g10.aux);
    let m1_imports = imports_of(&g1g.aux);
    // M10 imports M1; strict inclusion requires everything M1 imports to
    // also be imported by M10.
    assert!(m10_imports.contains(&ModuleId(1)));
    for id in &m1_imports {
        assert!(m10_imports.contains(id), "M10 must also import {id:?}");
    }
}

/// Property 5 — memory budget: under a tight budget, grouping never
/// exceeds it (the offending import is simply skipped).
#[test]
fn property_5_memory_budget_is_respected() {
    let m1 = with_direct_call(1, 50, Guid::new(ModuleId(2), FunctionId(1)), 1000);
    let m2 = leaf(2, 10_000);
    let mut profile = Profile::new(vec![m1, m2]);

    let mut ctx = ctx_with(|p| {
        p.lipo_cutoff = 0;
        p.lipo_max_mem = 400; // budget = 500 after the 1.25x multiplier
    });
    let groups = ctx.run(&mut profile).unwrap();

    let g1 = groups.iter().find(|g| g.primary_module_id == ModuleId(1)).unwrap();
    assert!(g1.aux.is_empty(), "importing M2 would exceed the memory budget");
}

/// Property 10 — dump round-trip: writing a module's aux list to the
/// `.gcda.imports` text format and reading it back yields the same
/// ordered list of module ids.
#[test]
fn property_10_imports_file_round_trip() {
    let m1 = with_direct_call(1, 100, Guid::new(ModuleId(2), FunctionId(1)), 1000);
    let m2 = leaf(2, 100);
    let m3 = leaf(3, 100);
    let mut profile = Profile::new(vec![m1, m2, m3]);

    let mut ctx = ctx_with(|p| {
        p.lipo_cutoff = 0;
        p.lipo_max_mem = u32::MAX;
    });
    let groups = ctx.run(&mut profile).unwrap();
    let g1 = groups.iter().find(|g| g.primary_module_id == ModuleId(1)).unwrap();

    let mut buf = Vec::new();
    imports_file::write(&mut buf, g1).unwrap();
    let roundtripped = imports_file::read(buf.as_slice(), &profile).unwrap();

    let original: Vec<ModuleId> = g1.aux.iter().map(|a| a.module_id).collect();
    assert_eq!(roundtripped, original);
}

/// Eager-propagation grouping runs the same scenario set through the
/// alternate algorithm without panicking and produces a reflexive set.
#[test]
fn eager_algorithm_end_to_end() {
    let m1 = with_direct_call(1, 100, Guid::new(ModuleId(2), FunctionId(1)), 1000);
    let m2 = leaf(2, 100);
    let mut profile = Profile::new(vec![m1, m2]);

    let mut ctx = ctx_with(|p| {
        p.lipo_cutoff = 0;
        p.lipo_grouping_algorithm = 0;
    });
    assert_eq!(ctx.algorithm, GroupingAlgorithm::Eager);
    let groups = ctx.run(&mut profile).unwrap();
    let g1 = groups.iter().find(|g| g.primary_module_id == ModuleId(1)).unwrap();
    assert_eq!(g1.aux[0].module_id, ModuleId(2));
}

/// Random-grouping mode (differential-testing aid, `SPEC_FULL.md` F.7) is
/// reachable end-to-end through the driver and every module still ends up
/// self-reflexive.
#[test]
fn random_grouping_mode_end_to_end() {
    let mut profile = Profile::new(vec![leaf(1, 10), leaf(2, 10), leaf(3, 10)]);
    let mut ctx = ctx_with(|p| {
        p.lipo_random_seed = 3;
        p.lipo_random_group_size = 2;
    });
    let groups = ctx.run(&mut profile).unwrap();
    for group in &groups {
        assert!(
            group.aux.iter().all(|a| a.module_id != group.primary_module_id),
            "aux list should never list the primary module itself"
        );
    }
}
