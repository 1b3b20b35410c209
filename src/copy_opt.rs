//! Copy minimization on an existing register assignment
//!
//! After SSA-based allocation every phi argument, permutation pair and
//! two-address operand that ends up in a different register than its partner
//! costs a copy when SSA form is destroyed. This module repaints values so
//! that as many of these partners as possible share a register, without ever
//! letting two interfering values meet.
//!
//! ## Pieces
//!
//! - **Optimization units** ([`build_units`]): a root (phi, permutation
//!   projection or two-address result) plus the values it would like to share
//!   a register with, each weighted by the cost of the copy it saves.
//! - **Affinity graph** ([`AffinityGraph`]): the same wishes as symmetric,
//!   weighted edges, for diagnostics and external solvers.
//! - **Heuristic** ([`CopyHeuristic`]): for every unit, try each admissible
//!   color in order of potential savings and recolor the interference
//!   neighborhood recursively until the largest conflict-free subset of the
//!   unit shares the color. Committed values are pinned so later units can't
//!   undo earlier work.
//!
//! [`run_copy_opt`] ties these together for one register class.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, trace};

use crate::cfg::{AnalysisCfg, LoopInfo};
use crate::error::CoalesceError;
use crate::interference::{Interference, InterferenceGraph};
use crate::ir::{
    BlockId, Coloring, Function, PReg, RegClass, RegClassId, RegSet, Requirement, ValueId,
    ValueKind,
};
use crate::liveness::Liveness;

#[path = "copy_opt/cost.rs"]
mod cost;

#[path = "copy_opt/mis.rs"]
mod mis;

#[path = "copy_opt/units.rs"]
mod units;

#[path = "copy_opt/stats.rs"]
mod stats;

#[path = "copy_opt/heuristic.rs"]
mod heuristic;

#[path = "copy_opt/affinity.rs"]
mod affinity;

#[path = "copy_opt/dump.rs"]
mod dump;

pub use affinity::{AffinityEdge, AffinityGraph, AffinityStats};
pub use cost::{AllOneCost, CostOracle, ExecFreqCost, LoopDepthCost, copy_block};
pub use dump::dump_appel;
pub use heuristic::{CopyHeuristic, SolveSummary, UnitOutcome};
pub use mis::{DEFAULT_EXACT_MIS_LIMIT, MAX_EXACT_MIS_LIMIT};
pub use units::{build_units, build_units_with_limit, is_optimizable_root};

/// Copy cost; a count of copies weighted by the cost model
pub type Cost = u32;

/// A root and the values that would like to share its register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptUnit {
    /// `nodes[0]` is the root, the rest are its arguments
    pub nodes: Vec<ValueId>,
    /// Cost of a copy between the root and `nodes[i]`; `costs[0]` is 0
    pub costs: Vec<Cost>,
    /// Costs of arguments that interfere with the root and always need a copy
    pub inevitable_costs: Cost,
    /// Sum of all argument costs
    pub all_nodes_costs: Cost,
    /// Lower bound of the argument costs any coloring can reach
    pub min_nodes_costs: Cost,
    /// Processing priority: the most expensive single argument
    pub sort_key: Cost,
}

impl OptUnit {
    pub fn root(&self) -> ValueId {
        self.nodes[0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Arguments with their costs
    pub fn args(&self) -> impl Iterator<Item = (ValueId, Cost)> + '_ {
        self.nodes.iter().copied().zip(self.costs.iter().copied()).skip(1)
    }
}

/// Optimization units of one register class, highest `sort_key` first
#[derive(Debug, Clone, Default)]
pub struct UnitSet {
    class: Option<RegClassId>,
    units: Vec<OptUnit>,
}

impl UnitSet {
    pub fn class(&self) -> Option<RegClassId> {
        self.class
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OptUnit> {
        self.units.iter()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unit rooted at `root`, if any
    pub fn unit_of(&self, root: ValueId) -> Option<&OptUnit> {
        self.units.iter().find(|u| u.root() == root)
    }
}

impl<'a> IntoIterator for &'a UnitSet {
    type Item = &'a OptUnit;
    type IntoIter = std::slice::Iter<'a, OptUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Values whose register was fixed by an earlier committed unit
///
/// Starts empty for every heuristic run and only grows.
#[derive(Debug, Clone, Default)]
pub struct PinnedSet {
    values: HashSet<ValueId>,
}

impl PinnedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, value: ValueId) -> bool {
        self.values.contains(&value)
    }

    pub fn insert(&mut self, value: ValueId) -> bool {
        self.values.insert(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// How copy costs are weighted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CostModel {
    /// Every copy costs 1
    AllOne,
    /// `1 + depth²` of the loop the copy is placed in
    #[default]
    LoopDepth,
    /// Execution frequency of the block the copy is placed in, at least 1
    ExecFreq(HashMap<BlockId, Cost>),
}

/// Configuration for [`run_copy_opt`]
#[derive(Debug, Clone)]
pub struct CopyOptConfig {
    pub cost_model: CostModel,
    /// Largest number of mutually conflicting arguments solved exactly
    pub exact_mis_limit: usize,
    /// Check the coloring for interference before and after optimizing
    pub verify: bool,
}

impl Default for CopyOptConfig {
    fn default() -> Self {
        Self {
            cost_model: CostModel::default(),
            exact_mis_limit: DEFAULT_EXACT_MIS_LIMIT,
            verify: true,
        }
    }
}

impl CopyOptConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    /// Set the exact-search threshold, capped at [`MAX_EXACT_MIS_LIMIT`]
    pub fn with_exact_mis_limit(mut self, limit: usize) -> Self {
        self.exact_mis_limit = limit.min(MAX_EXACT_MIS_LIMIT);
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

/// Outcome of optimizing one register class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOptReport {
    pub class: String,
    pub units: usize,
    /// Units whose coloring was committed
    pub committed_units: usize,
    /// Units for which no color could be realized
    pub unresolved_units: usize,
    pub max_costs: Cost,
    pub inevitable_costs: Cost,
    pub costs_before: Cost,
    pub costs_after: Cost,
    pub lower_bound: Cost,
    /// The run changed nothing because it found no improvement
    pub restored: bool,
}

impl CopyOptReport {
    /// Realized costs equal the provable lower bound
    pub fn is_optimal(&self) -> bool {
        self.costs_after == self.lower_bound
    }

    pub fn saved(&self) -> Cost {
        self.costs_before.saturating_sub(self.costs_after)
    }
}

/// Minimize copies for the values of `class`, rewriting `coloring` in place
pub fn run_copy_opt(
    func: &Function,
    coloring: &mut Coloring,
    class: RegClassId,
    config: &CopyOptConfig,
) -> Result<CopyOptReport, CoalesceError> {
    func.validate()?;
    func.check_coloring(coloring, class)?;
    let class_info = func.class(class).ok_or(CoalesceError::UnknownClass(class))?;

    let mut liveness = Liveness::new();
    let info = liveness.compute(func);
    let interference = Interference::new(func, info);
    let graph = InterferenceGraph::build(func, info, class);

    if config.verify {
        verify_coloring(&graph, coloring)?;
    }

    let oracle: Box<dyn CostOracle> = match &config.cost_model {
        CostModel::AllOne => Box::new(AllOneCost),
        CostModel::LoopDepth => Box::new(LoopDepthCost::new(&info.cfg)),
        CostModel::ExecFreq(freq) => Box::new(ExecFreqCost::new(freq.clone())),
    };
    let units = build_units_with_limit(
        func,
        &interference,
        class,
        oracle.as_ref(),
        config.exact_mis_limit,
    );

    let heuristic =
        CopyHeuristic::new(func, &graph)?.with_exact_mis_limit(config.exact_mis_limit);
    let mut pinned = PinnedSet::new();
    let summary = heuristic.run(&units, coloring, &mut pinned);

    if config.verify {
        verify_coloring(&graph, coloring)?;
    }

    let report = CopyOptReport {
        class: class_info.name.clone(),
        units: units.len(),
        committed_units: summary.committed,
        unresolved_units: summary.unresolved,
        max_costs: units.max_copy_costs(),
        inevitable_costs: units.inevitable_copy_costs(),
        costs_before: summary.costs_before,
        costs_after: summary.costs_after,
        lower_bound: summary.lower_bound,
        restored: summary.restored,
    };
    debug!(
        "copy opt {}: {} units, costs {} -> {} (lower bound {}, max {})",
        report.class,
        report.units,
        report.costs_before,
        report.costs_after,
        report.lower_bound,
        report.max_costs
    );
    Ok(report)
}

/// Check that no two interfering values of the graph's class share a register
pub fn verify_coloring(
    graph: &InterferenceGraph,
    coloring: &Coloring,
) -> Result<(), CoalesceError> {
    for (a, b) in graph.edges() {
        if let (Some(ra), Some(rb)) = (coloring.get(a), coloring.get(b))
            && ra == rb
        {
            return Err(CoalesceError::InterferingColors { a, b, reg: ra });
        }
    }
    Ok(())
}
