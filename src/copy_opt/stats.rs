use super::*;

// Sums saturate; an oracle may hand out costs near `Cost::MAX`.

impl OptUnit {
    /// Costs this unit causes under `coloring`, inevitable ones included
    pub fn copy_costs(&self, coloring: &Coloring) -> Cost {
        let root_color = coloring.get(self.root());
        let broken: Cost = self
            .args()
            .filter(|&(arg, _)| coloring.get(arg) != root_color)
            .map(|(_, cost)| cost)
            .fold(0, Cost::saturating_add);
        self.inevitable_costs.saturating_add(broken)
    }

    /// Unsaturated costs with colors looked up through `color_of`
    pub(crate) fn copy_costs_by<F>(&self, color_of: F) -> u64
    where
        F: Fn(ValueId) -> Option<PReg>,
    {
        let root_color = color_of(self.root());
        let broken: u64 = self
            .args()
            .filter(|&(arg, _)| color_of(arg) != root_color)
            .map(|(_, cost)| u64::from(cost))
            .sum();
        u64::from(self.inevitable_costs) + broken
    }
}

impl UnitSet {
    /// Costs if no argument shares its root's register
    pub fn max_copy_costs(&self) -> Cost {
        self.units
            .iter()
            .map(|u| u.inevitable_costs.saturating_add(u.all_nodes_costs))
            .fold(0, Cost::saturating_add)
    }

    /// Costs of copies between interfering values, which no coloring avoids
    pub fn inevitable_copy_costs(&self) -> Cost {
        self.units
            .iter()
            .map(|u| u.inevitable_costs)
            .fold(0, Cost::saturating_add)
    }

    /// Costs realized by `coloring`
    pub fn copy_costs(&self, coloring: &Coloring) -> Cost {
        self.units
            .iter()
            .map(|u| u.copy_costs(coloring))
            .fold(0, Cost::saturating_add)
    }

    /// Costs no coloring can go below
    pub fn lower_bound(&self) -> Cost {
        self.units
            .iter()
            .map(|u| u.inevitable_costs.saturating_add(u.min_nodes_costs))
            .fold(0, Cost::saturating_add)
    }
}
