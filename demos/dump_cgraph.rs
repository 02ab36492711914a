//! Builds a tiny in-process profile, runs the full grouping pipeline, and
//! prints each module's resulting auxiliary-module list, mirroring the
//! teacher crate's `examples/parse_records.rs` shape: no CLI arguments,
//! just a self-contained demonstration of the library's output.

use lipo_grouping::context::{GroupingContext, Params};
use lipo_grouping::ids::{CounterKind, FunctionId, Guid, ModuleId};
use lipo_grouping::profile::{Function, Language, Module, ModuleFlags, Profile};

fn main() {
    #[cfg(feature = "logging")]
    env_logger::init();

    let mut caller = Function::new(FunctionId(1), 11, 22);
    caller.set_counters(
        CounterKind::DirectCall,
        vec![Guid::new(ModuleId(2), FunctionId(1)).0 as i64, 5_000],
    );
    let m1 = Module::new(ModuleId(1), "render.c", ModuleFlags::empty(), Language::C, 400, vec![caller]);

    let callee = Function::new(FunctionId(1), 33, 44);
    let m2 = Module::new(ModuleId(2), "math.c", ModuleFlags::empty(), Language::C, 200, vec![callee]);

    let leaf = Function::new(FunctionId(1), 55, 66);
    let m3 = Module::new(ModuleId(3), "unrelated.c", ModuleFlags::empty(), Language::C, 150, vec![leaf]);

    let mut profile = Profile::new(vec![m1, m2, m3]);

    let mut params = Params::default();
    params.lipo_cutoff = 0;
    params.lipo_max_mem = 10_000;
    let mut ctx = GroupingContext::from_params(params);

    let groups = ctx.run(&mut profile).expect("pipeline does not allocate beyond available memory here");

    for group in &groups {
        let filename = profile
            .module(group.primary_module_id)
            .map_or("?", |m| m.source_filename.as_str());
        println!(
            "{filename} (exported={}, include_all_aux={}):",
            group.is_exported, group.include_all_aux
        );
        for aux in &group.aux {
            println!("  + {} (weight={})", aux.source_filename, aux.weight);
        }
    }
}
