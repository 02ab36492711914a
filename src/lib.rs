//! LIPO dynamic module-grouping engine.
//!
//! Consumes a loaded [`profile::Profile`] (per-module counters reconstructed
//! from `.gcda`-shaped data) and produces, for every module, an ordered list
//! of auxiliary modules whose function bodies should be imported during that
//! module's compilation so cross-module inlining becomes possible. See
//! `spec.md` for the full component breakdown; [`context::GroupingContext`]
//! is the single value threaded through every phase.

pub mod callgraph;
pub mod comdat;
pub mod context;
pub mod cutoff;
pub mod dump;
pub mod error;
pub mod export;
pub mod fibheap;
pub mod grouping;
pub mod ids;
pub mod imports_file;
pub mod keyed_set;
pub mod profile;
pub mod retarget;

pub use self::context::{GroupingContext, Params};
pub use self::error::{Error, Result};
pub use self::export::ModuleGroup;
pub use self::profile::Profile;
