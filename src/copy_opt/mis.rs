use super::*;

/// Conflicting argument count up to which the independent set is exact
pub const DEFAULT_EXACT_MIS_LIMIT: usize = 8;

/// Hard cap on the exact search; it enumerates `2^n` subsets
pub const MAX_EXACT_MIS_LIMIT: usize = 20;

/// A maximum-weight independent subset of a unit's arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct IndependentSet {
    /// Conflict-free arguments first, then the chosen conflicting ones
    pub members: Vec<ValueId>,
    pub weight: Cost,
}

/// Pick the heaviest subset of `args` that are pairwise conflict free and
/// don't conflict with `root`.
///
/// Arguments conflicting with no other argument are always taken. Arguments
/// conflicting with themselves (`conflicting(a, a)`) or with the root are
/// never taken. The rest are searched exhaustively when there are at most
/// `exact_limit` of them, greedily in argument order otherwise.
pub(crate) fn max_independent_set<F>(
    root: ValueId,
    args: &[(ValueId, Cost)],
    conflicting: F,
    exact_limit: usize,
) -> IndependentSet
where
    F: Fn(ValueId, ValueId) -> bool,
{
    let candidates: Vec<(ValueId, Cost)> = args
        .iter()
        .copied()
        .filter(|&(arg, _)| !conflicting(arg, arg) && !conflicting(root, arg))
        .collect();

    let mut set = IndependentSet::default();
    let mut unsafe_args = Vec::new();
    for (i, &(arg, cost)) in candidates.iter().enumerate() {
        let is_safe = candidates
            .iter()
            .enumerate()
            .all(|(j, &(other, _))| i == j || !conflicting(arg, other));
        if is_safe {
            set.members.push(arg);
            set.weight = set.weight.saturating_add(cost);
        } else {
            unsafe_args.push((arg, cost));
        }
    }

    let n = unsafe_args.len();
    let conflicts: Vec<Vec<bool>> = unsafe_args
        .iter()
        .map(|&(a, _)| unsafe_args.iter().map(|&(b, _)| conflicting(a, b)).collect())
        .collect();

    let chosen = if n > exact_limit.min(MAX_EXACT_MIS_LIMIT) {
        greedy(n, &conflicts)
    } else {
        exact(&unsafe_args, &conflicts)
    };

    for i in chosen {
        let (arg, cost) = unsafe_args[i];
        set.members.push(arg);
        set.weight = set.weight.saturating_add(cost);
    }
    set
}

/// Keep each argument that doesn't conflict with one kept before it
fn greedy(n: usize, conflicts: &[Vec<bool>]) -> Vec<usize> {
    let mut chosen: Vec<usize> = Vec::new();
    for i in 0..n {
        if !chosen.iter().any(|&j| conflicts[i][j]) {
            chosen.push(i);
        }
    }
    chosen
}

/// Enumerate all subsets from the full one downwards; the first heaviest wins
fn exact(args: &[(ValueId, Cost)], conflicts: &[Vec<bool>]) -> Vec<usize> {
    let n = args.len();
    let mut best_mask = 0u64;
    let mut best_weight: Cost = 0;

    for mask in (1..(1u64 << n)).rev() {
        let members: Vec<usize> = (0..n).filter(|&i| mask & (1u64 << i) != 0).collect();
        let stable = members
            .iter()
            .enumerate()
            .all(|(k, &i)| members[k + 1..].iter().all(|&j| !conflicts[i][j]));
        if !stable {
            continue;
        }

        let weight = members.iter().map(|&i| args[i].1).fold(0, Cost::saturating_add);
        if weight > best_weight {
            best_weight = weight;
            best_mask = mask;
        }
    }

    (0..n).filter(|&i| best_mask & (1u64 << i) != 0).collect()
}
