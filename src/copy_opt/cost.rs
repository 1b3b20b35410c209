use super::*;

/// Weighs the copy a unit saves between `root` and its argument at `pos`
///
/// `pos` is the phi argument index for phis, the component index for
/// permutation projections and the operand index for two-address results.
pub trait CostOracle {
    fn cost(&self, func: &Function, root: ValueId, pos: usize) -> Cost;
}

impl<F> CostOracle for F
where
    F: Fn(&Function, ValueId, usize) -> Cost,
{
    fn cost(&self, func: &Function, root: ValueId, pos: usize) -> Cost {
        self(func, root, pos)
    }
}

/// Block a copy for `root`'s argument `pos` would be placed in
///
/// Phi copies go to the end of the matching predecessor; all others sit
/// next to the root.
pub fn copy_block(func: &Function, root: ValueId, pos: usize) -> BlockId {
    let value = func.value(root);
    if func.is_phi(root) {
        func.block(value.block)
            .preds
            .get(pos)
            .copied()
            .unwrap_or(value.block)
    } else {
        value.block
    }
}

/// Every copy costs the same
#[derive(Debug, Clone, Copy, Default)]
pub struct AllOneCost;

impl CostOracle for AllOneCost {
    fn cost(&self, _func: &Function, _root: ValueId, _pos: usize) -> Cost {
        1
    }
}

/// Copies inside loops are more expensive: `1 + depth²`
#[derive(Debug, Clone)]
pub struct LoopDepthCost {
    loops: LoopInfo,
}

impl LoopDepthCost {
    pub fn new(cfg: &AnalysisCfg) -> Self {
        Self {
            loops: LoopInfo::compute(cfg),
        }
    }
}

impl CostOracle for LoopDepthCost {
    fn cost(&self, func: &Function, root: ValueId, pos: usize) -> Cost {
        let depth = self.loops.depth(copy_block(func, root, pos));
        let depth = Cost::try_from(depth).unwrap_or(Cost::MAX);
        depth.saturating_mul(depth).saturating_add(1)
    }
}

/// Copies cost as often as their block executes
#[derive(Debug, Clone, Default)]
pub struct ExecFreqCost {
    freq: HashMap<BlockId, Cost>,
}

impl ExecFreqCost {
    pub fn new(freq: HashMap<BlockId, Cost>) -> Self {
        Self { freq }
    }
}

impl CostOracle for ExecFreqCost {
    fn cost(&self, func: &Function, root: ValueId, pos: usize) -> Cost {
        let block = copy_block(func, root, pos);
        self.freq.get(&block).copied().unwrap_or(0).max(1)
    }
}
