use super::*;

/// Why a value could not take a color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conflict {
    /// The value is pinned to its current color
    Pinned(ValueId),
    /// The color is not admissible for the value
    Impossible,
    /// Recoloring ran back into a value it is still moving
    Cycle,
}

/// One attempt to give a unit the color `color`
#[derive(Debug)]
struct QNode {
    color: PReg,
    /// Conflicts learned by failed attempts, canonically ordered; `(v, v)`
    /// removes `v` from every independent set
    conflicts: HashSet<(ValueId, ValueId)>,
    /// Members to repaint, root first
    mis: Vec<ValueId>,
    mis_costs: Cost,
    /// Colors changed by this attempt, on top of the real coloring
    changed: HashMap<ValueId, PReg>,
    pinned_local: HashSet<ValueId>,
}

impl QNode {
    fn new(color: PReg) -> Self {
        Self {
            color,
            conflicts: HashSet::new(),
            mis: Vec::new(),
            mis_costs: 0,
            changed: HashMap::new(),
            pinned_local: HashSet::new(),
        }
    }

    fn add_conflict(&mut self, a: ValueId, b: ValueId) {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.conflicts.insert(key);
    }

    fn has_conflict(&self, a: ValueId, b: ValueId) -> bool {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.conflicts.contains(&key)
    }

    fn reset(&mut self) {
        self.changed.clear();
        self.pinned_local.clear();
    }
}

/// Read-only state an attempt works against
#[derive(Clone, Copy)]
struct Baseline<'c> {
    coloring: &'c Coloring,
    pinned: &'c PinnedSet,
}

/// What happened to one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The unit's members were repainted to `color`
    Committed { color: PReg, members: usize },
    /// Nothing applied: the best attempt only covered the root, was already
    /// realized, or would not lower the copy costs
    Trivial,
    /// No admissible color could be realized
    Unresolved,
}

/// Totals of one heuristic run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveSummary {
    pub committed: usize,
    pub trivial: usize,
    pub unresolved: usize,
    pub costs_before: Cost,
    pub costs_after: Cost,
    pub lower_bound: Cost,
    /// The run found no improvement and put the original coloring back
    pub restored: bool,
}

impl SolveSummary {
    pub fn is_optimal(&self) -> bool {
        self.costs_after == self.lower_bound
    }
}

/// Recoloring heuristic over the interference graph of one register class
pub struct CopyHeuristic<'a> {
    func: &'a Function,
    class: &'a RegClass,
    graph: &'a InterferenceGraph,
    exact_mis_limit: usize,
}

impl<'a> CopyHeuristic<'a> {
    pub fn new(func: &'a Function, graph: &'a InterferenceGraph) -> Result<Self, CoalesceError> {
        let class = func
            .class(graph.class())
            .ok_or(CoalesceError::UnknownClass(graph.class()))?;
        Ok(Self {
            func,
            class,
            graph,
            exact_mis_limit: DEFAULT_EXACT_MIS_LIMIT,
        })
    }

    pub fn with_exact_mis_limit(mut self, limit: usize) -> Self {
        self.exact_mis_limit = limit.min(MAX_EXACT_MIS_LIMIT);
        self
    }

    /// Optimize all units; true if the realized costs reach the lower bound
    pub fn solve(&self, units: &UnitSet, coloring: &mut Coloring, pinned: &mut PinnedSet) -> bool {
        self.run(units, coloring, pinned).is_optimal()
    }

    /// Optimize all units in order and report the totals
    ///
    /// An attempt is only written back when it strictly lowers the costs of
    /// the units it touches, so re-running on a solved coloring changes
    /// nothing. A run that doesn't strictly lower the realized costs leaves
    /// `coloring` exactly as it was.
    pub fn run(
        &self,
        units: &UnitSet,
        coloring: &mut Coloring,
        pinned: &mut PinnedSet,
    ) -> SolveSummary {
        let original = coloring.clone();
        // Unsaturated, so an improvement near `Cost::MAX` still counts
        let total = |colors: &Coloring| -> u64 {
            units.iter().map(|u| u.copy_costs_by(|v| colors.get(v))).sum()
        };
        let total_before = total(&*coloring);
        let mut summary = SolveSummary {
            costs_before: units.copy_costs(coloring),
            lower_bound: units.lower_bound(),
            ..SolveSummary::default()
        };

        for unit in units {
            match self.optimize_in(unit, &units.units, coloring, pinned) {
                UnitOutcome::Committed { .. } => summary.committed += 1,
                UnitOutcome::Trivial => summary.trivial += 1,
                UnitOutcome::Unresolved => summary.unresolved += 1,
            }
        }

        summary.costs_after = units.copy_costs(coloring);
        if total(&*coloring) >= total_before {
            summary.restored = *coloring != original;
            *coloring = original;
            summary.costs_after = summary.costs_before;
        }

        debug!(
            "copy heuristic: {} committed, {} trivial, {} unresolved; \
             costs {} -> {} (lower bound {})",
            summary.committed,
            summary.trivial,
            summary.unresolved,
            summary.costs_before,
            summary.costs_after,
            summary.lower_bound
        );
        summary
    }

    /// Find the best realizable color for `unit` and apply it if that lowers
    /// the unit's copy costs
    pub fn optimize_unit(
        &self,
        unit: &OptUnit,
        coloring: &mut Coloring,
        pinned: &mut PinnedSet,
    ) -> UnitOutcome {
        self.optimize_in(unit, std::slice::from_ref(unit), coloring, pinned)
    }

    /// `scope` holds the units whose costs decide whether an attempt pays off
    fn optimize_in(
        &self,
        unit: &OptUnit,
        scope: &[OptUnit],
        coloring: &mut Coloring,
        pinned: &mut PinnedSet,
    ) -> UnitOutcome {
        let root = unit.root();
        let allowed = self.func.value(root).requirement.admissible(self.class);
        let current = coloring.get(root).filter(|&c| allowed.contains(c));

        // Equal potentials pop the latest insertion first, so the root's
        // current color goes in last.
        let mut queue: Vec<QNode> = Vec::new();
        for color in allowed.iter().filter(|&c| Some(c) != current).chain(current) {
            self.insert_qnode(unit, QNode::new(color), &mut queue);
        }

        while !queue.is_empty() {
            let mut qn = queue.remove(0);
            trace!(
                "unit {}: trying {} for {} members (potential {})",
                root,
                qn.color,
                qn.mis.len(),
                qn.mis_costs
            );
            let state = Baseline {
                coloring: &*coloring,
                pinned: &*pinned,
            };
            if self.try_color(unit, &mut qn, state) {
                return self.commit(unit, &qn, scope, coloring, pinned);
            }
            qn.reset();
            self.insert_qnode(unit, qn, &mut queue);
        }

        debug!("unit {}: no realizable color", root);
        UnitOutcome::Unresolved
    }

    fn is_conflicting(&self, qn: &QNode, a: ValueId, b: ValueId) -> bool {
        qn.has_conflict(a, b) || self.graph.interferes(a, b)
    }

    /// Recompute the attempt's independent set and queue it by potential
    fn insert_qnode(&self, unit: &OptUnit, mut qn: QNode, queue: &mut Vec<QNode>) {
        let root = unit.root();
        if qn.has_conflict(root, root) {
            trace!("unit {}: dropping {}", root, qn.color);
            return;
        }

        let args: Vec<(ValueId, Cost)> = unit.args().collect();
        let set = mis::max_independent_set(
            root,
            &args,
            |a, b| self.is_conflicting(&qn, a, b),
            self.exact_mis_limit,
        );
        qn.mis = std::iter::once(root).chain(set.members).collect();
        qn.mis_costs = set.weight;

        let pos = queue
            .iter()
            .position(|other| other.mis_costs <= qn.mis_costs)
            .unwrap_or(queue.len());
        queue.insert(pos, qn);
    }

    /// Repaint every member of the attempt's independent set
    ///
    /// On failure the learned conflict is recorded so the next independent
    /// set avoids it.
    fn try_color(&self, unit: &OptUnit, qn: &mut QNode, state: Baseline<'_>) -> bool {
        let color = qn.color;
        let members = qn.mis.clone();
        for member in members {
            let mut in_progress = HashSet::new();
            match self.recolor(qn, state, member, color, member, &mut in_progress) {
                Ok(()) => {
                    qn.pinned_local.insert(member);
                }
                Err(Conflict::Impossible) | Err(Conflict::Cycle) => {
                    trace!("  {} can't take {}", member, color);
                    qn.add_conflict(member, member);
                    return false;
                }
                Err(Conflict::Pinned(culprit)) => {
                    trace!("  {} blocked by pinned {}", member, culprit);
                    if qn.pinned_local.contains(&culprit) {
                        // A conflict with the root would be root-argument
                        // interference; drop the member instead.
                        if culprit == unit.root() {
                            qn.add_conflict(member, member);
                        } else {
                            qn.add_conflict(culprit, member);
                        }
                    }
                    if state.pinned.contains(culprit) {
                        qn.add_conflict(member, member);
                    }
                    return false;
                }
            }
        }
        true
    }

    fn virtual_color(&self, qn: &QNode, coloring: &Coloring, value: ValueId) -> Option<PReg> {
        qn.changed.get(&value).copied().or_else(|| coloring.get(value))
    }

    /// Give `value` the color `color` within the attempt, moving interfering
    /// neighbors out of the way.
    fn recolor(
        &self,
        qn: &mut QNode,
        state: Baseline<'_>,
        value: ValueId,
        color: PReg,
        trigger: ValueId,
        in_progress: &mut HashSet<ValueId>,
    ) -> Result<(), Conflict> {
        if self.virtual_color(qn, state.coloring, value) == Some(color) {
            return Ok(());
        }
        if state.pinned.contains(value) || qn.pinned_local.contains(&value) {
            return Err(Conflict::Pinned(value));
        }
        if !in_progress.insert(value) {
            return Err(Conflict::Cycle);
        }

        let result = self.recolor_unpinned(qn, state, value, color, trigger, in_progress);
        in_progress.remove(&value);
        result
    }

    fn recolor_unpinned(
        &self,
        qn: &mut QNode,
        state: Baseline<'_>,
        value: ValueId,
        color: PReg,
        trigger: ValueId,
        in_progress: &mut HashSet<ValueId>,
    ) -> Result<(), Conflict> {
        let old = self.virtual_color(qn, state.coloring, value);
        let admissible = self.func.value(value).requirement.admissible(self.class);
        let neighbors: Vec<ValueId> = self.graph.neighbors(value).collect();

        // A value only moved aside may take any free color.
        if value != trigger {
            let mut free: RegSet = admissible;
            if let Some(old) = old {
                free.remove(old);
            }
            for &n in &neighbors {
                if let Some(c) = self.virtual_color(qn, state.coloring, n) {
                    free.remove(c);
                }
            }
            if let Some(free_color) = free.first() {
                trace!("  {} -> {} (free)", value, free_color);
                qn.changed.insert(value, free_color);
                return Ok(());
            }
        }

        if !admissible.contains(color) {
            return Err(Conflict::Impossible);
        }
        let Some(old) = old else {
            return Err(Conflict::Impossible);
        };

        for n in neighbors {
            if n != trigger && self.virtual_color(qn, state.coloring, n) == Some(color) {
                self.recolor(qn, state, n, old, value, in_progress)?;
            }
        }

        trace!("  {} -> {}", value, color);
        qn.changed.insert(value, color);
        Ok(())
    }

    /// Whether applying `moved` strictly lowers the costs of the units in
    /// `scope` that it touches
    fn lowers_costs(
        &self,
        moved: &BTreeMap<ValueId, PReg>,
        scope: &[OptUnit],
        coloring: &Coloring,
    ) -> bool {
        let (mut before, mut after) = (0u64, 0u64);
        for unit in scope {
            if !unit.nodes.iter().any(|n| moved.contains_key(n)) {
                continue;
            }
            before += unit.copy_costs_by(|v| coloring.get(v));
            after += unit.copy_costs_by(|v| moved.get(&v).copied().or_else(|| coloring.get(v)));
        }
        after < before
    }

    /// Pin the unit's realized members and write the attempt's colors back
    fn commit(
        &self,
        unit: &OptUnit,
        qn: &QNode,
        scope: &[OptUnit],
        coloring: &mut Coloring,
        pinned: &mut PinnedSet,
    ) -> UnitOutcome {
        if qn.mis.len() < 2 {
            return UnitOutcome::Trivial;
        }

        let root = unit.root();
        let moved: BTreeMap<ValueId, PReg> = qn
            .changed
            .iter()
            .filter(|&(&v, &c)| coloring.get(v) != Some(c))
            .map(|(&v, &c)| (v, c))
            .collect();
        if !moved.is_empty() && !self.lowers_costs(&moved, scope, coloring) {
            debug!("unit {}: {} would not lower the costs", root, qn.color);
            return UnitOutcome::Trivial;
        }

        let root_color = self.virtual_color(qn, coloring, root);
        pinned.insert(root);
        let mut members = 0;
        for (arg, _) in unit.args() {
            if root_color.is_some() && self.virtual_color(qn, coloring, arg) == root_color {
                pinned.insert(arg);
                members += 1;
            }
        }

        if moved.is_empty() {
            debug!("unit {}: {} already realized", root, qn.color);
            return UnitOutcome::Trivial;
        }
        for (value, color) in moved {
            coloring.set(value, color);
        }

        debug!(
            "unit {}: committed {} with {} of {} arguments",
            root,
            qn.color,
            members,
            unit.node_count() - 1
        );
        UnitOutcome::Committed {
            color: qn.color,
            members,
        }
    }
}
