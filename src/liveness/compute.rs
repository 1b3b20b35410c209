use super::*;

impl LivenessInfo {
    pub(super) fn build(func: &Function) -> Self {
        let cfg = AnalysisCfg::build(func);
        let mut info = LivenessInfo {
            sets: cfg
                .rpo
                .iter()
                .map(|&b| (b, BlockLiveSet::default()))
                .collect(),
            cfg,
        };

        let users = func.users();
        for value in &func.values {
            info.introduce_value(func, value.id, &users[value.id.index()]);
        }

        info
    }

    /// Values that occupy a register and are defined in reachable code
    fn is_relevant(&self, func: &Function, value: ValueId) -> bool {
        let v = func.value(value);
        v.class.is_some() && self.cfg.is_reachable(v.block)
    }

    pub(super) fn introduce_value(&mut self, func: &Function, value: ValueId, uses: &[Use]) {
        if !self.is_relevant(func, value) {
            return;
        }

        let def_block = func.value(value).block;
        let mut visited = HashSet::new();

        for u in uses {
            let user = func.value(u.user);
            if !self.cfg.is_reachable(user.block) {
                continue;
            }

            if func.is_phi(u.user) {
                // The copy for a phi argument happens at the end of the
                // matching predecessor, not in the phi's block.
                let Some(&pred) = func.block(user.block).preds.get(u.pos) else {
                    continue;
                };
                self.live_end_at_block(value, def_block, pred, false, &mut visited);
            } else if user.block != def_block {
                self.mark(user.block, value, LiveFlags::IN);
                for &pred in func.block(user.block).preds.iter() {
                    self.live_end_at_block(value, def_block, pred, true, &mut visited);
                }
            }
        }
    }

    /// Mark `value` live at the end of `block` and propagate towards the definition.
    fn live_end_at_block(
        &mut self,
        value: ValueId,
        def_block: BlockId,
        block: BlockId,
        is_true_out: bool,
        visited: &mut HashSet<BlockId>,
    ) {
        let mut worklist = vec![(block, is_true_out)];
        while let Some((block, is_true_out)) = worklist.pop() {
            if !self.cfg.is_reachable(block) {
                continue;
            }

            let mut flags = LiveFlags::END;
            if is_true_out {
                flags |= LiveFlags::OUT;
            }
            self.mark(block, value, flags);

            if visited.insert(block) && block != def_block {
                self.mark(block, value, LiveFlags::IN);
                for &pred in self.cfg.preds(block) {
                    worklist.push((pred, true));
                }
            }
        }
    }

    pub(super) fn remove_value(&mut self, func: &Function, value: ValueId) {
        let def_block = func.value(value).block;
        for block in self.cfg.dom_subtree(def_block) {
            if let Some(set) = self.sets.get_mut(&block) {
                set.remove(value);
            }
        }
    }

    fn mark(&mut self, block: BlockId, value: ValueId, flags: LiveFlags) {
        self.sets.entry(block).or_default().mark(value, flags);
    }
}
