//! Per-block liveness for SSA values
//!
//! Every block carries a live set: a map from value to the flags
//! [`LiveFlags::IN`], [`LiveFlags::OUT`] and [`LiveFlags::END`], kept sorted
//! by value id with at most one entry per value.
//!
//! `END` means "live at the end of the block", which includes values only
//! needed by a phi in a successor. `OUT` is the stricter "live on entry to
//! some successor". A value flowing into a phi is therefore `END` but not
//! `OUT` in the corresponding predecessor.
//!
//! Sets are computed one value at a time by walking from each use back
//! towards the definition. Since an SSA value can only be live in blocks its
//! definition dominates, dropping a value only touches the dominator subtree
//! of its definition block.

use std::collections::{BTreeMap, HashMap, HashSet};

use bitflags::bitflags;

use crate::cfg::AnalysisCfg;
use crate::ir::{BlockId, Function, ScheduleState, Use, ValueId};

mod compute;

bitflags! {
    /// Liveness state of one value at one block
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LiveFlags: u8 {
        /// Live on entry to the block
        const IN = 0b001;
        /// Live on entry to some successor
        const OUT = 0b010;
        /// Live at the end of the block (superset of `OUT`)
        const END = 0b100;
    }
}

/// Live set of one block, sorted by value id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockLiveSet {
    entries: BTreeMap<ValueId, LiveFlags>,
}

impl BlockLiveSet {
    pub fn flags(&self, value: ValueId) -> LiveFlags {
        self.entries.get(&value).copied().unwrap_or_default()
    }

    pub fn contains(&self, value: ValueId) -> bool {
        self.entries.contains_key(&value)
    }

    fn mark(&mut self, value: ValueId, flags: LiveFlags) {
        *self.entries.entry(value).or_default() |= flags;
    }

    fn remove(&mut self, value: ValueId) -> bool {
        self.entries.remove(&value).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ValueId, LiveFlags)> + '_ {
        self.entries.iter().map(|(&v, &f)| (v, f))
    }

    /// Values carrying all of `flags`, ascending
    pub fn values_with(&self, flags: LiveFlags) -> impl Iterator<Item = ValueId> + '_ {
        self.entries
            .iter()
            .filter(move |(_, f)| f.contains(flags))
            .map(|(&v, _)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Computed liveness of a function
#[derive(Debug, Clone)]
pub struct LivenessInfo {
    pub cfg: AnalysisCfg,
    sets: HashMap<BlockId, BlockLiveSet>,
}

impl LivenessInfo {
    pub fn flags(&self, block: BlockId, value: ValueId) -> LiveFlags {
        self.sets
            .get(&block)
            .map(|set| set.flags(value))
            .unwrap_or_default()
    }

    pub fn is_live_in(&self, block: BlockId, value: ValueId) -> bool {
        self.flags(block, value).contains(LiveFlags::IN)
    }

    pub fn is_live_out(&self, block: BlockId, value: ValueId) -> bool {
        self.flags(block, value).contains(LiveFlags::OUT)
    }

    pub fn is_live_end(&self, block: BlockId, value: ValueId) -> bool {
        self.flags(block, value).contains(LiveFlags::END)
    }

    pub fn block_set(&self, block: BlockId) -> Option<&BlockLiveSet> {
        self.sets.get(&block)
    }
}

/// Lazily computed, incrementally maintained liveness
///
/// Queries recompute on demand after [`Liveness::invalidate`]; they never
/// answer from a stale analysis.
#[derive(Debug, Default)]
pub struct Liveness {
    info: Option<LivenessInfo>,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.info.is_some()
    }

    /// The current analysis, if one is valid
    pub fn info(&self) -> Option<&LivenessInfo> {
        self.info.as_ref()
    }

    /// Compute live sets for all blocks; a no-op while the analysis is valid.
    ///
    /// # Panics
    ///
    /// Panics if the function's schedule is still floating.
    pub fn compute(&mut self, func: &Function) -> &LivenessInfo {
        assert_pinned(func);
        self.info.get_or_insert_with(|| LivenessInfo::build(func))
    }

    /// Drop all computed sets
    pub fn invalidate(&mut self) {
        self.info = None;
    }

    pub fn is_live_in(&mut self, func: &Function, block: BlockId, value: ValueId) -> bool {
        self.compute(func).is_live_in(block, value)
    }

    pub fn is_live_out(&mut self, func: &Function, block: BlockId, value: ValueId) -> bool {
        self.compute(func).is_live_out(block, value)
    }

    pub fn is_live_end(&mut self, func: &Function, block: BlockId, value: ValueId) -> bool {
        self.compute(func).is_live_end(block, value)
    }

    /// Forget `value` in every block dominated by its definition
    pub fn remove(&mut self, func: &Function, value: ValueId) {
        assert_pinned(func);
        if let Some(info) = self.info.as_mut() {
            info.remove_value(func, value);
        }
    }

    /// Add the live ranges of a value created after the last full compute
    ///
    /// The control flow must be unchanged since then; otherwise call
    /// [`Liveness::invalidate`].
    pub fn introduce(&mut self, func: &Function, value: ValueId) {
        assert_pinned(func);
        if let Some(info) = self.info.as_mut() {
            let uses = func.users_of(value);
            info.introduce_value(func, value, &uses);
        }
    }

    /// Recompute the live ranges of a value whose uses changed
    pub fn update(&mut self, func: &Function, value: ValueId) {
        self.remove(func, value);
        self.introduce(func, value);
    }
}

fn assert_pinned(func: &Function) {
    assert!(
        func.schedule_state == ScheduleState::Pinned,
        "liveness requires a pinned schedule"
    );
}
