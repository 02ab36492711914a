//! Differential-testing aid carried over from
//! `original_source/libgcc/dyn-ipa.c`'s `gcov_compute_random_module_groups`
//! (`SPEC_FULL.md` F.7): assigns each module a random import set instead
//! of a profile-driven one, gated behind `lipo_random_group_size != 0`.
//!
//! Per-module and asymmetric, not a symmetric bucket partition: for each
//! module `M`, draw `group_size = rand() % max_group_size`, then insert
//! that many distinct *other* modules (each drawn uniformly at random,
//! retried on a repeat or self-hit) into `M`'s own set at weight `1.0`.
//!
//! A small `std`-only LCG stands in for the original's `rand()` — this is
//! a debug/test aid, not a quality-sensitive random source, and the
//! teacher crate carries no RNG dependency to reach for instead.

use std::collections::HashMap;

use crate::error::Result;
use crate::ids::ModuleId;
use crate::profile::Profile;

use super::{accumulate_import, new_import_set, ImportSet};

struct Lcg(u64);

impl Lcg {
    fn new(seed: u32) -> Self {
        // Numerical Recipes LCG constants; period is plenty for this use.
        Self(u64::from(seed).wrapping_mul(6364136223846793005).wrapping_add(1))
    }

    fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }
}

/// Build a random per-module import set, self-seeded per the uniform
/// reflexivity rule (`SPEC_FULL.md` F.7).
pub fn run(profile: &Profile, seed: u32, max_group_size: u32) -> Result<HashMap<ModuleId, ImportSet>> {
    let module_ids: Vec<ModuleId> = profile.modules().iter().map(|m| m.id).collect();
    let mut rng = Lcg::new(seed);
    let mut sets = HashMap::new();

    for &m in &module_ids {
        let mut set = new_import_set();
        accumulate_import(&mut set, m, 0.0)?;

        if max_group_size != 0 && module_ids.len() > 1 {
            let group_size = rng.next_u32() % max_group_size;
            let mut inserted = 0u32;
            let mut attempts = 0usize;
            let max_attempts = module_ids.len() * 4 + 16;
            while inserted < group_size && attempts < max_attempts {
                attempts += 1;
                let candidate = module_ids[(rng.next_u32() as usize) % module_ids.len()];
                if candidate == m || set.contains(candidate.0) {
                    continue;
                }
                accumulate_import(&mut set, candidate, 1.0)?;
                inserted += 1;
            }
        }

        sets.insert(m, set);
    }

    Ok(sets)
}
