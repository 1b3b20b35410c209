use super::*;

/// Whether `value` wants to share its register with some of its inputs
pub fn is_optimizable_root(func: &Function, value: ValueId) -> bool {
    let v = func.value(value);
    if v.class.is_none() || v.requirement.is_ignore() {
        return false;
    }
    match (&v.kind, v.requirement) {
        (ValueKind::Phi { .. } | ValueKind::PermProj { .. }, _) => true,
        (_, Requirement::SameAs(mask)) => !mask.is_empty(),
        _ => false,
    }
}

/// Collect the optimization units of `class` with the default exact-search limit
pub fn build_units<C>(
    func: &Function,
    interference: &Interference<'_>,
    class: RegClassId,
    cost: &C,
) -> UnitSet
where
    C: CostOracle + ?Sized,
{
    build_units_with_limit(func, interference, class, cost, DEFAULT_EXACT_MIS_LIMIT)
}

/// Collect the optimization units of `class`, most expensive first
pub fn build_units_with_limit<C>(
    func: &Function,
    interference: &Interference<'_>,
    class: RegClassId,
    cost: &C,
    exact_mis_limit: usize,
) -> UnitSet
where
    C: CostOracle + ?Sized,
{
    let cfg = &interference.liveness().cfg;
    let mut units = Vec::new();

    for value in &func.values {
        let root = value.id;
        if value.class != Some(class)
            || !cfg.is_reachable(value.block)
            || !is_optimizable_root(func, root)
        {
            continue;
        }

        let mut draft = UnitDraft::new(root);
        match (&value.kind, value.requirement) {
            (ValueKind::Phi { args }, _) => {
                for (pos, &arg) in args.iter().enumerate() {
                    let c = cost.cost(func, root, pos);
                    draft.add(func, interference, class, arg, c);
                }
            }
            (ValueKind::PermProj { index, .. }, _) => {
                if let Some(source) = func.perm_source(root) {
                    let c = cost.cost(func, root, *index);
                    draft.add(func, interference, class, source, c);
                }
            }
            (_, Requirement::SameAs(mask)) => {
                let operands = func.operands(root);
                for pos in mask.positions() {
                    if let Some(&operand) = operands.get(pos) {
                        let c = cost.cost(func, root, pos);
                        draft.add(func, interference, class, operand, c);
                    }
                }
            }
            _ => {}
        }

        match draft.finish(interference, exact_mis_limit) {
            Some(unit) => {
                trace!(
                    "unit {}: {} nodes, inevitable {}, all {}, min {}",
                    root,
                    unit.node_count(),
                    unit.inevitable_costs,
                    unit.all_nodes_costs,
                    unit.min_nodes_costs
                );
                units.push(unit);
            }
            None => trace!("unit {}: nothing to coalesce", root),
        }
    }

    // Stable, so equal keys keep definition order.
    units.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));

    UnitSet {
        class: Some(class),
        units,
    }
}

struct UnitDraft {
    nodes: Vec<ValueId>,
    costs: Vec<Cost>,
    inevitable_costs: Cost,
}

impl UnitDraft {
    fn new(root: ValueId) -> Self {
        Self {
            nodes: vec![root],
            costs: vec![0],
            inevitable_costs: 0,
        }
    }

    fn add(
        &mut self,
        func: &Function,
        interference: &Interference<'_>,
        class: RegClassId,
        arg: ValueId,
        cost: Cost,
    ) {
        let root = self.nodes[0];
        let value = func.value(arg);
        if arg == root || value.class != Some(class) {
            return;
        }
        if interference.values_interfere(root, arg) {
            self.inevitable_costs = self.inevitable_costs.saturating_add(cost);
            return;
        }
        if value.requirement.is_ignore() {
            return;
        }

        match self.nodes.iter().skip(1).position(|&n| n == arg) {
            Some(i) => self.costs[i + 1] = self.costs[i + 1].saturating_add(cost),
            None => {
                self.nodes.push(arg);
                self.costs.push(cost);
            }
        }
    }

    fn finish(self, interference: &Interference<'_>, exact_mis_limit: usize) -> Option<OptUnit> {
        if self.nodes.len() < 2 {
            return None;
        }

        let args: Vec<(ValueId, Cost)> = self
            .nodes
            .iter()
            .copied()
            .zip(self.costs.iter().copied())
            .skip(1)
            .collect();
        let all_nodes_costs = args.iter().map(|&(_, c)| c).fold(0, Cost::saturating_add);
        let sort_key = args.iter().map(|&(_, c)| c).max().unwrap_or(0);
        let mis = mis::max_independent_set(
            self.nodes[0],
            &args,
            |a, b| interference.values_interfere(a, b),
            exact_mis_limit,
        );

        Some(OptUnit {
            nodes: self.nodes,
            costs: self.costs,
            inevitable_costs: self.inevitable_costs,
            all_nodes_costs,
            min_nodes_costs: all_nodes_costs.saturating_sub(mis.weight),
            sort_key,
        })
    }
}
