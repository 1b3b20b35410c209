use super::*;

impl AnalysisCfg {
    pub fn build<F: CfgFunction>(func: &F) -> Self {
        let entry = func.entry();
        let blocks = func.block_ids();

        let mut predecessors: HashMap<BlockId, Vec<BlockId>> =
            blocks.iter().map(|&b| (b, Vec::new())).collect();
        let mut successors = predecessors.clone();
        for &block in &blocks {
            for &pred in func.predecessors(block) {
                if !func.has_block(pred) {
                    continue;
                }
                predecessors.entry(block).or_default().push(pred);
                let succs = successors.entry(pred).or_default();
                if !succs.contains(&block) {
                    succs.push(block);
                }
            }
        }

        let post_order = if func.has_block(entry) {
            depth_first_post_order(entry, &successors)
        } else {
            Vec::new()
        };
        let rpo: Vec<BlockId> = post_order.iter().rev().copied().collect();
        let idom = immediate_dominators(&rpo, &predecessors);

        let mut dom_children: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        for &block in &rpo {
            if let Some(&parent) = idom.get(&block) {
                dom_children.entry(parent).or_default().push(block);
            }
        }

        let mut cfg = AnalysisCfg {
            entry,
            predecessors,
            successors,
            idom,
            dom_children,
            rpo,
            post_order,
            dom_interval: HashMap::new(),
        };
        cfg.number_dom_tree();
        cfg
    }

    /// Give every reachable block its preorder range in the dominator tree
    fn number_dom_tree(&mut self) {
        let Some(&root) = self.rpo.first() else {
            return;
        };
        let mut clock = 0;
        let mut stack = vec![(root, false)];
        while let Some((block, finished)) = stack.pop() {
            if finished {
                if let Some(interval) = self.dom_interval.get_mut(&block) {
                    interval.1 = clock;
                }
                continue;
            }
            self.dom_interval.insert(block, (clock, clock));
            clock += 1;
            stack.push((block, true));
            if let Some(children) = self.dom_children.get(&block) {
                stack.extend(children.iter().rev().map(|&c| (c, false)));
            }
        }
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.dom_interval.contains_key(&block)
    }

    /// Every block dominates itself, reachable or not
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return true;
        }
        match (self.dom_interval.get(&a), self.dom_interval.get(&b)) {
            (Some(&(start, end)), Some(&(pre, _))) => start <= pre && pre < end,
            _ => false,
        }
    }

    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    pub fn preds(&self, block: BlockId) -> &[BlockId] {
        self.predecessors
            .get(&block)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Blocks dominated by `root` (including itself), in dominator-tree preorder
    pub fn dom_subtree(&self, root: BlockId) -> Vec<BlockId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(block) = stack.pop() {
            order.push(block);
            if let Some(children) = self.dom_children.get(&block) {
                stack.extend(children.iter().rev().copied());
            }
        }
        order
    }
}

impl LoopInfo {
    /// Natural loops of the reachable CFG
    ///
    /// All back edges into one header form a single loop.
    pub fn compute(cfg: &AnalysisCfg) -> Self {
        let mut loops: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();

        for &header in &cfg.rpo {
            let mut body = HashSet::from([header]);
            let mut worklist: VecDeque<BlockId> = cfg
                .preds(header)
                .iter()
                .copied()
                .filter(|&latch| cfg.is_reachable(latch) && cfg.dominates(header, latch))
                .filter(|&latch| body.insert(latch))
                .collect();
            let has_back_edge = body.len() > 1 || cfg.preds(header).contains(&header);
            if !has_back_edge {
                continue;
            }

            while let Some(block) = worklist.pop_front() {
                for &pred in cfg.preds(block) {
                    if cfg.is_reachable(pred) && body.insert(pred) {
                        worklist.push_back(pred);
                    }
                }
            }
            loops.insert(header, body);
        }

        let mut loop_depth: HashMap<BlockId, usize> = cfg.rpo.iter().map(|&b| (b, 0)).collect();
        for body in loops.values() {
            for &block in body {
                *loop_depth.entry(block).or_default() += 1;
            }
        }

        LoopInfo { loops, loop_depth }
    }

    pub fn is_loop_header(&self, block: BlockId) -> bool {
        self.loops.contains_key(&block)
    }

    /// 0 outside of loops
    pub fn depth(&self, block: BlockId) -> usize {
        self.loop_depth.get(&block).copied().unwrap_or(0)
    }
}

/// Iterative DFS; deep CFGs must not overflow the stack
fn depth_first_post_order(
    entry: BlockId,
    successors: &HashMap<BlockId, Vec<BlockId>>,
) -> Vec<BlockId> {
    let mut order = Vec::new();
    let mut visited = HashSet::from([entry]);
    let mut stack = vec![(entry, 0usize)];
    while let Some(top) = stack.last_mut() {
        let (block, next) = *top;
        match successors.get(&block).and_then(|succs| succs.get(next)) {
            Some(&succ) => {
                top.1 += 1;
                if visited.insert(succ) {
                    stack.push((succ, 0));
                }
            }
            None => {
                order.push(block);
                stack.pop();
            }
        }
    }
    order
}

/// Cooper-Harvey-Kennedy over RPO indices; `rpo[0]` is the entry
fn immediate_dominators(
    rpo: &[BlockId],
    predecessors: &HashMap<BlockId, Vec<BlockId>>,
) -> HashMap<BlockId, BlockId> {
    if rpo.is_empty() {
        return HashMap::new();
    }
    let index: HashMap<BlockId, usize> = rpo.iter().enumerate().map(|(i, &b)| (b, i)).collect();

    // doms[i]: RPO index of the dominator of rpo[i]
    let mut doms: Vec<Option<usize>> = vec![None; rpo.len()];
    doms[0] = Some(0);

    let mut changed = true;
    while changed {
        changed = false;
        for (i, block) in rpo.iter().enumerate().skip(1) {
            let mut new_idom = None;
            for pred in predecessors.get(block).into_iter().flatten() {
                let Some(&p) = index.get(pred) else {
                    continue;
                };
                if doms[p].is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => p,
                    Some(current) => intersect(&doms, p, current),
                });
            }
            if new_idom.is_some() && doms[i] != new_idom {
                doms[i] = new_idom;
                changed = true;
            }
        }
    }

    doms.iter()
        .enumerate()
        .skip(1)
        .filter_map(|(i, dom)| dom.map(|d| (rpo[i], rpo[d])))
        .collect()
}

fn intersect(doms: &[Option<usize>], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while a > b {
            a = doms[a].unwrap_or(0);
        }
        while b > a {
            b = doms[b].unwrap_or(0);
        }
    }
    a
}
