//! Control Flow Graph analysis
//!
//! Builds the block-level views the coalescer needs from an allocated
//! function:
//! - Predecessor/successor relationships
//! - Reverse post-order of the reachable blocks
//! - Dominator tree (immediate dominators and children)
//! - Natural loops and loop depth, used by the loop-depth cost model

use std::collections::{HashMap, HashSet, VecDeque};

use crate::ir::{BlockId, Function};

mod analysis;

/// Function adapter for generic CFG analysis.
pub trait CfgFunction {
    fn entry(&self) -> BlockId;
    fn block_ids(&self) -> Vec<BlockId>;
    fn predecessors(&self, id: BlockId) -> &[BlockId];
    fn has_block(&self, id: BlockId) -> bool;
}

impl CfgFunction for Function {
    fn entry(&self) -> BlockId {
        self.entry
    }

    fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|b| b.id).collect()
    }

    fn predecessors(&self, id: BlockId) -> &[BlockId] {
        &self.block(id).preds
    }

    fn has_block(&self, id: BlockId) -> bool {
        Function::has_block(self, id)
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisCfg {
    pub entry: BlockId,
    pub predecessors: HashMap<BlockId, Vec<BlockId>>,
    pub successors: HashMap<BlockId, Vec<BlockId>>,
    /// Immediate dominator for each reachable block except the entry
    pub idom: HashMap<BlockId, BlockId>,
    /// Dominator tree children, in reverse post-order
    pub dom_children: HashMap<BlockId, Vec<BlockId>>,
    pub rpo: Vec<BlockId>,
    pub post_order: Vec<BlockId>,
    /// Dominator-tree preorder number and end of the subtree's range
    dom_interval: HashMap<BlockId, (usize, usize)>,
}

/// Loop information
#[derive(Debug, Clone)]
pub struct LoopInfo {
    /// Natural loops: header -> set of blocks in loop
    pub loops: HashMap<BlockId, HashSet<BlockId>>,
    /// Loop depth for each block (0 = not in a loop)
    pub loop_depth: HashMap<BlockId, usize>,
}

#[cfg(test)]
mod tests;
