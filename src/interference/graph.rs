use super::*;

impl InterferenceGraph {
    fn new(class: RegClassId) -> Self {
        Self {
            class,
            nodes: BTreeSet::new(),
            adj_set: HashSet::new(),
            adj_list: HashMap::new(),
        }
    }

    /// Build the graph of `class` from computed liveness
    pub fn build(func: &Function, info: &LivenessInfo, class: RegClassId) -> Self {
        let mut graph = Self::new(class);
        let in_class = |v: ValueId| {
            let value = func.value(v);
            value.class == Some(class) && !value.requirement.is_ignore()
        };

        for &block_id in &info.cfg.rpo {
            let block = func.block(block_id);
            for &v in &block.schedule {
                if in_class(v) {
                    graph.add_node(v);
                }
            }

            // Walk the schedule backwards, starting from what survives the block.
            let mut live: BTreeSet<ValueId> = info
                .block_set(block_id)
                .map(|set| set.values_with(LiveFlags::END).filter(|&v| in_class(v)).collect())
                .unwrap_or_default();

            for &v in block.schedule.iter().rev() {
                if in_class(v) {
                    live.remove(&v);
                    for &other in &live {
                        graph.add_edge(v, other);
                    }
                }

                // Phi operands are read at the end of the predecessors.
                if !func.is_phi(v) {
                    for &operand in func.operands(v) {
                        if func.has_value(operand) && in_class(operand) {
                            live.insert(operand);
                        }
                    }
                }
            }
        }

        // Must-differ constraints hold even when the ranges only touch.
        let must_differ: Vec<(ValueId, ValueId)> = graph
            .nodes
            .iter()
            .filter_map(|&v| match func.value(v).requirement {
                Requirement::DifferentFrom(mask) => Some((v, mask)),
                _ => None,
            })
            .flat_map(|(v, mask)| {
                let operands = func.operands(v);
                mask.positions()
                    .filter_map(move |pos| operands.get(pos).copied())
                    .map(move |operand| (v, operand))
            })
            .collect();
        for (v, operand) in must_differ {
            if graph.nodes.contains(&operand) {
                graph.add_edge(v, operand);
            }
        }

        graph
    }

    fn add_node(&mut self, value: ValueId) {
        if self.nodes.insert(value) {
            self.adj_list.entry(value).or_default();
        }
    }

    fn add_edge(&mut self, u: ValueId, v: ValueId) {
        if u == v {
            return;
        }
        let (a, b) = if u < v { (u, v) } else { (v, u) };
        if self.adj_set.insert((a, b)) {
            self.adj_list.entry(u).or_default().insert(v);
            self.adj_list.entry(v).or_default().insert(u);
        }
    }

    pub fn class(&self) -> RegClassId {
        self.class
    }

    /// Check if two values interfere
    pub fn interferes(&self, u: ValueId, v: ValueId) -> bool {
        let (a, b) = if u < v { (u, v) } else { (v, u) };
        self.adj_set.contains(&(a, b))
    }

    pub fn contains(&self, value: ValueId) -> bool {
        self.nodes.contains(&value)
    }

    /// Values of the class, ascending
    pub fn nodes(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.nodes.iter().copied()
    }

    /// Interfering values, ascending
    pub fn neighbors(&self, value: ValueId) -> impl Iterator<Item = ValueId> + '_ {
        self.adj_list
            .get(&value)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    pub fn degree(&self, value: ValueId) -> usize {
        self.adj_list.get(&value).map_or(0, BTreeSet::len)
    }

    /// All edges `(a, b)` with `a < b`, ascending
    pub fn edges(&self) -> Vec<(ValueId, ValueId)> {
        let mut edges: Vec<_> = self.adj_set.iter().copied().collect();
        edges.sort_unstable();
        edges
    }

    pub fn edge_count(&self) -> usize {
        self.adj_set.len()
    }
}
