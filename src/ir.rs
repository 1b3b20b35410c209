//! Allocated SSA form consumed by the coalescer
//!
//! This is the slice of the backend's instruction graph that copy coalescing
//! needs to see:
//! - Values with a single definition, an owning block and a register class
//! - Basic blocks with explicit predecessor lists and a schedule
//! - Register requirements (limited sets, two-address and must-differ operands)
//! - A separate, mutable register assignment ([`Coloring`])
//!
//! Phi arguments are positional: `args[i]` flows in over the block's `preds[i]`.

use std::collections::HashMap;
use std::fmt;

mod function_impl;
mod regs;

pub use regs::{OperandMask, PReg, RegClass, RegClassId, RegSet, RegSetIter, Requirement};

/// SSA value identifier - dense, stable, ordered by creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl ValueId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Basic block identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// How a value is produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// Function parameter or other value without operands
    Param,
    /// Ordinary operation
    Op { operands: Vec<ValueId> },
    /// SSA phi; `args[i]` arrives over the owning block's `preds[i]`
    Phi { args: Vec<ValueId> },
    /// Parallel permutation of its sources; produces a tuple
    Perm { sources: Vec<ValueId> },
    /// Component `index` of a permutation's tuple
    PermProj { perm: ValueId, index: usize },
}

/// A single SSA value
#[derive(Debug, Clone)]
pub struct Value {
    pub id: ValueId,
    pub block: BlockId,
    pub kind: ValueKind,
    /// Register class, `None` for tuples and other non-register values
    pub class: Option<RegClassId>,
    pub requirement: Requirement,
}

/// Basic block with explicit predecessors and a schedule
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub preds: Vec<BlockId>,
    /// Values in execution order, phis first
    pub schedule: Vec<ValueId>,
}

/// Whether values are bound to a position in their block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Floating,
    Pinned,
}

/// A function in allocated SSA form
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Option<String>,
    pub blocks: Vec<BasicBlock>,
    pub values: Vec<Value>,
    pub entry: BlockId,
    pub classes: Vec<RegClass>,
    pub schedule_state: ScheduleState,
}

/// A use of a value: operand `pos` of `user`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    pub user: ValueId,
    pub pos: usize,
}

/// Physical register assignment (value -> register)
///
/// Kept apart from [`Function`] so the coalescer can rewrite registers while
/// the instruction graph stays borrowed by the analyses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coloring {
    regs: HashMap<ValueId, PReg>,
}

impl Coloring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, value: ValueId) -> Option<PReg> {
        self.regs.get(&value).copied()
    }

    pub fn set(&mut self, value: ValueId, reg: PReg) {
        self.regs.insert(value, reg);
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ValueId, PReg)> + '_ {
        self.regs.iter().map(|(&v, &r)| (v, r))
    }
}

impl FromIterator<(ValueId, PReg)> for Coloring {
    fn from_iter<T: IntoIterator<Item = (ValueId, PReg)>>(iter: T) -> Self {
        Self {
            regs: iter.into_iter().collect(),
        }
    }
}
