//! Interference between SSA values
//!
//! In SSA form two values interfere exactly when one is live at the
//! definition of the other. Since a value's definition dominates all its
//! uses, only the dominating value can be live at the other's definition,
//! which turns the check into a dominance test plus a local liveness lookup.
//!
//! [`Interference`] answers single queries straight from the live sets.
//! [`InterferenceGraph`] materializes all edges of one register class for
//! callers that enumerate neighbors.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::ir::{Function, RegClassId, Requirement, Use, ValueId};
use crate::liveness::{LiveFlags, LivenessInfo};

mod graph;

/// Interference predicate over a function with computed liveness
pub struct Interference<'a> {
    func: &'a Function,
    info: &'a LivenessInfo,
    /// Position of every value in its block's schedule
    positions: Vec<usize>,
    users: Vec<Vec<Use>>,
}

impl<'a> Interference<'a> {
    pub fn new(func: &'a Function, info: &'a LivenessInfo) -> Self {
        let mut positions = vec![usize::MAX; func.values.len()];
        for block in &func.blocks {
            for (pos, &value) in block.schedule.iter().enumerate() {
                if let Some(slot) = positions.get_mut(value.index()) {
                    *slot = pos;
                }
            }
        }

        Self {
            func,
            info,
            positions,
            users: func.users(),
        }
    }

    pub fn func(&self) -> &'a Function {
        self.func
    }

    pub fn liveness(&self) -> &'a LivenessInfo {
        self.info
    }

    /// Whether `a`'s definition comes strictly before `b`'s on every path to `b`
    pub fn strictly_dominates(&self, a: ValueId, b: ValueId) -> bool {
        if a == b {
            return false;
        }
        let block_a = self.func.value(a).block;
        let block_b = self.func.value(b).block;
        if block_a == block_b {
            self.positions[a.index()] < self.positions[b.index()]
        } else {
            self.info.cfg.strictly_dominates(block_a, block_b)
        }
    }

    /// Whether the live ranges of `a` and `b` overlap
    pub fn values_interfere(&self, a: ValueId, b: ValueId) -> bool {
        let cfg = &self.info.cfg;
        let reachable = |v: ValueId| cfg.is_reachable(self.func.value(v).block);
        if !reachable(a) || !reachable(b) {
            return false;
        }

        let (a, b) = if self.strictly_dominates(a, b) {
            (a, b)
        } else if self.strictly_dominates(b, a) {
            (b, a)
        } else {
            return false;
        };

        let block = self.func.value(b).block;
        if self.info.is_live_end(block, a) {
            return true;
        }

        // `a` dies inside b's block; check for a use after b's definition.
        let b_pos = self.positions[b.index()];
        self.users[a.index()].iter().any(|u| {
            let user = self.func.value(u.user);
            u.user != b
                && user.block == block
                && !self.func.is_phi(u.user)
                && self.positions[u.user.index()] > b_pos
        })
    }
}

/// Interference graph for one register class
#[derive(Debug, Clone)]
pub struct InterferenceGraph {
    class: RegClassId,
    /// All managed values of the class in reachable code
    nodes: BTreeSet<ValueId>,
    /// Canonically ordered edge set
    adj_set: HashSet<(ValueId, ValueId)>,
    /// Adjacency lists, sorted for deterministic iteration
    adj_list: HashMap<ValueId, BTreeSet<ValueId>>,
}
