use super::*;

/// Weighted wish of two values to share a register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffinityEdge {
    pub neighbor: ValueId,
    pub cost: Cost,
}

/// Affinity summary against a coloring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AffinityStats {
    /// Values with at least one affinity
    pub aff_nodes: usize,
    pub aff_edges: usize,
    /// Sum of all edge costs
    pub max_costs: Cost,
    /// Sum of the costs of edges whose ends have different registers
    pub costs: Cost,
    pub unsatisfied_edges: usize,
}

/// Symmetric affinity graph of one register class
///
/// Only non-interfering pairs are connected; repeated wishes between the
/// same pair accumulate their costs.
#[derive(Debug, Clone, Default)]
pub struct AffinityGraph {
    nodes: BTreeMap<ValueId, Vec<AffinityEdge>>,
}

impl AffinityGraph {
    pub fn build<C>(
        func: &Function,
        interference: &Interference<'_>,
        class: RegClassId,
        cost: &C,
    ) -> Self
    where
        C: CostOracle + ?Sized,
    {
        let cfg = &interference.liveness().cfg;
        let mut graph = Self::default();

        for value in &func.values {
            let root = value.id;
            if value.class != Some(class)
                || value.requirement.is_ignore()
                || !cfg.is_reachable(value.block)
            {
                continue;
            }

            match (&value.kind, value.requirement) {
                (ValueKind::Phi { args }, _) => {
                    for (pos, &arg) in args.iter().enumerate() {
                        let c = cost.cost(func, root, pos);
                        graph.add_affinity(func, interference, class, root, arg, c);
                    }
                }
                (ValueKind::PermProj { index, .. }, _) => {
                    if let Some(source) = func.perm_source(root) {
                        let c = cost.cost(func, root, *index);
                        graph.add_affinity(func, interference, class, root, source, c);
                    }
                }
                (_, Requirement::SameAs(mask)) => {
                    let operands = func.operands(root);
                    for pos in mask.positions() {
                        if let Some(&operand) = operands.get(pos) {
                            let c = cost.cost(func, root, pos);
                            graph.add_affinity(func, interference, class, root, operand, c);
                        }
                    }
                }
                _ => {}
            }
        }

        graph
    }

    fn add_affinity(
        &mut self,
        func: &Function,
        interference: &Interference<'_>,
        class: RegClassId,
        a: ValueId,
        b: ValueId,
        cost: Cost,
    ) {
        let other = func.value(b);
        if a == b || other.class != Some(class) || other.requirement.is_ignore() {
            return;
        }
        if interference.values_interfere(a, b) {
            return;
        }
        self.add_half_edge(a, b, cost);
        self.add_half_edge(b, a, cost);
    }

    fn add_half_edge(&mut self, from: ValueId, to: ValueId, cost: Cost) {
        let edges = self.nodes.entry(from).or_default();
        match edges.iter_mut().find(|e| e.neighbor == to) {
            Some(edge) => edge.cost = edge.cost.saturating_add(cost),
            None => edges.push(AffinityEdge { neighbor: to, cost }),
        }
    }

    /// Whether `value` has any affinity left to satisfy
    pub fn is_optimizable(&self, value: ValueId) -> bool {
        self.nodes.get(&value).is_some_and(|edges| !edges.is_empty())
    }

    pub fn neighbors(&self, value: ValueId) -> &[AffinityEdge] {
        self.nodes.get(&value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Values with affinities, ascending
    pub fn nodes(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.nodes.keys().copied()
    }

    /// Accumulated cost between `a` and `b`, if they are connected
    pub fn cost(&self, a: ValueId, b: ValueId) -> Option<Cost> {
        self.neighbors(a)
            .iter()
            .find(|e| e.neighbor == b)
            .map(|e| e.cost)
    }

    /// Each edge once, as `(a, b, cost)` with `a < b`, ascending
    pub fn edges(&self) -> Vec<(ValueId, ValueId, Cost)> {
        let mut edges: Vec<_> = self
            .nodes
            .iter()
            .flat_map(|(&a, list)| {
                list.iter()
                    .filter(move |e| a < e.neighbor)
                    .map(move |e| (a, e.neighbor, e.cost))
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    pub fn stats(&self, coloring: &Coloring) -> AffinityStats {
        let mut stats = AffinityStats {
            aff_nodes: self.nodes.len(),
            ..AffinityStats::default()
        };
        for (a, b, cost) in self.edges() {
            stats.aff_edges += 1;
            stats.max_costs = stats.max_costs.saturating_add(cost);
            if coloring.get(a) != coloring.get(b) {
                stats.costs = stats.costs.saturating_add(cost);
                stats.unsatisfied_edges += 1;
            }
        }
        stats
    }
}
