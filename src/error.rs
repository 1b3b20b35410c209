//! Errors reported at the coalescer's API boundary
//!
//! The heuristic itself never fails: a unit that cannot be improved keeps its
//! original registers. These errors cover malformed input handed to the
//! driver and the diagnostic side channels.

use std::io;

use thiserror::Error;

use crate::ir::{BlockId, PReg, RegClassId, ValueId};

#[derive(Debug, Error)]
pub enum CoalesceError {
    #[error("phi {phi} has {args} arguments but {block} has {preds} predecessors")]
    PhiArity {
        phi: ValueId,
        block: BlockId,
        args: usize,
        preds: usize,
    },

    #[error("{user} uses undefined value {operand}")]
    UndefinedOperand { user: ValueId, operand: ValueId },

    #[error("{user} is scheduled in {block}, which does not exist")]
    UndefinedBlock { user: ValueId, block: BlockId },

    #[error("{block} schedules {value}, which does not exist")]
    UnknownScheduledValue { block: BlockId, value: ValueId },

    #[error("{value} is scheduled in {block} but belongs to {home}")]
    MisplacedValue {
        value: ValueId,
        block: BlockId,
        home: BlockId,
    },

    #[error("{value} appears {count} times in the schedules")]
    ScheduleCount { value: ValueId, count: usize },

    #[error("projection {proj} does not refer to a permutation")]
    NotAPermutation { proj: ValueId },

    #[error("projection {proj} selects component {index} of {perm}, which has {len}")]
    ProjectionOutOfRange {
        proj: ValueId,
        perm: ValueId,
        index: usize,
        len: usize,
    },

    #[error("unknown register class {0:?}")]
    UnknownClass(RegClassId),

    #[error("{0} has no register assigned")]
    Unassigned(ValueId),

    #[error("{value} is assigned {reg}, which is outside class {class}")]
    RegisterOutOfClass {
        value: ValueId,
        reg: PReg,
        class: String,
    },

    #[error("interfering values {a} and {b} share register {reg}")]
    InterferingColors { a: ValueId, b: ValueId, reg: PReg },

    #[error("failed to write dump: {0}")]
    Io(#[from] io::Error),
}
