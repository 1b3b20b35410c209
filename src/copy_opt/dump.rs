use std::io::Write;

use super::*;

/// Write interference and affinities in Appel's coalescing-challenge format
///
/// The first line is `<nodes> <registers>`. Indices below the register count
/// stand for the allocatable registers; values follow in ascending id order.
/// Each further line is `<i> <j> <weight>`: `-1` for an interference (or a
/// register a value may not take) and the copy cost for an affinity.
pub fn dump_appel<W: Write>(
    out: &mut W,
    func: &Function,
    graph: &InterferenceGraph,
    affinity: &AffinityGraph,
) -> Result<(), CoalesceError> {
    let class = func
        .class(graph.class())
        .ok_or(CoalesceError::UnknownClass(graph.class()))?;

    let color_map: HashMap<PReg, usize> = class
        .allocatable
        .iter()
        .enumerate()
        .map(|(i, reg)| (reg, i))
        .collect();
    let n_regs = color_map.len();

    let node_map: HashMap<ValueId, usize> = graph
        .nodes()
        .enumerate()
        .map(|(i, v)| (v, n_regs + i))
        .collect();
    writeln!(out, "{} {}", n_regs + node_map.len(), n_regs)?;

    for value in graph.nodes() {
        let idx = node_map[&value];
        let requirement = func.value(value).requirement;

        if let Requirement::Limited(set) = requirement {
            for reg in class.allocatable.iter() {
                if !set.contains(reg) {
                    writeln!(out, "{} {} -1", color_map[&reg], idx)?;
                }
            }
        }

        for neighbor in graph.neighbors(value) {
            let Some(&adj) = node_map.get(&neighbor) else {
                continue;
            };
            if idx < adj && !disjoint_constraints(func, class, value, neighbor) {
                writeln!(out, "{} {} -1", idx, adj)?;
            }
        }

        for edge in affinity.neighbors(value) {
            let Some(&adj) = node_map.get(&edge.neighbor) else {
                continue;
            };
            if idx < adj {
                writeln!(out, "{} {} {}", idx, adj, edge.cost)?;
            }
        }
    }

    Ok(())
}

/// Values that can never share a register need no interference edge
fn disjoint_constraints(func: &Function, class: &RegClass, a: ValueId, b: ValueId) -> bool {
    let ra: RegSet = func.value(a).requirement.admissible(class);
    let rb: RegSet = func.value(b).requirement.admissible(class);
    ra.intersect(rb).is_empty()
}
