//! Copy coalescing for SSA-based register allocation
//!
//! Takes a function in SSA form whose values already carry physical
//! registers and repaints them so that fewer copies are needed when phis,
//! permutations and two-address operands are lowered.
//!
//! The pipeline for one register class:
//! 1. [`liveness`] computes per-block liveness on the scheduled function
//! 2. [`interference`] answers "can these two values share a register" and
//!    builds the interference graph of the class
//! 3. [`copy_opt`] collects optimization units and recolors them
//!
//! [`run_copy_opt`] runs all of it and reports the copy costs before and
//! after.

pub mod cfg;
pub mod copy_opt;
pub mod error;
pub mod interference;
pub mod ir;
pub mod liveness;

pub use copy_opt::{CopyOptConfig, CopyOptReport, CostModel, run_copy_opt};
pub use error::CoalesceError;
pub use ir::{Coloring, Function};
