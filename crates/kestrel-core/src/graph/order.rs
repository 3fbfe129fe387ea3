//! Ordering and reachability over instance-to-instance edges.
//!
//! Host terminals never take part: they cannot close a cycle and impose no
//! start order.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use alloc::collections::{BTreeMap, BTreeSet};

use crate::instance::InstanceId;

fn adjacency(edges: &[(InstanceId, InstanceId)]) -> BTreeMap<InstanceId, Vec<InstanceId>> {
    let mut adj: BTreeMap<InstanceId, Vec<InstanceId>> = BTreeMap::new();
    for &(from, to) in edges {
        adj.entry(from).or_default().push(to);
    }
    adj
}

/// Whether `to` is reachable from `from` (a node reaches itself).
pub(crate) fn reaches(from: InstanceId, to: InstanceId, edges: &[(InstanceId, InstanceId)]) -> bool {
    downstream(from, edges).contains(&to)
}

/// `from` plus everything reachable from it.
pub(crate) fn downstream(
    from: InstanceId,
    edges: &[(InstanceId, InstanceId)],
) -> BTreeSet<InstanceId> {
    let adj = adjacency(edges);
    let mut seen = BTreeSet::new();
    let mut stack = Vec::new();
    seen.insert(from);
    stack.push(from);
    while let Some(node) = stack.pop() {
        for &next in adj.get(&node).into_iter().flatten() {
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }
    seen
}

/// Kahn's algorithm. Among nodes that are ready at the same time, the lowest
/// id goes first, so the order is fully deterministic.
///
/// Nodes left over because of a cycle are appended in id order.
pub(crate) fn topological_order(
    nodes: &[InstanceId],
    edges: &[(InstanceId, InstanceId)],
) -> Vec<InstanceId> {
    let adj = adjacency(edges);
    let mut in_degree: BTreeMap<InstanceId, usize> = nodes.iter().map(|&n| (n, 0)).collect();
    for &(_, to) in edges {
        if let Some(d) = in_degree.get_mut(&to) {
            *d += 1;
        }
    }

    let mut ready: BTreeSet<InstanceId> = in_degree
        .iter()
        .filter(|&(_, &d)| d == 0)
        .map(|(&n, _)| n)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &next in adj.get(&node).into_iter().flatten() {
            if let Some(d) = in_degree.get_mut(&next) {
                *d -= 1;
                if *d == 0 {
                    ready.insert(next);
                }
            }
        }
    }

    if order.len() < in_degree.len() {
        let placed: BTreeSet<InstanceId> = order.iter().copied().collect();
        order.extend(in_degree.keys().filter(|n| !placed.contains(n)));
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> InstanceId {
        InstanceId(n)
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let nodes = [id(3), id(1), id(2), id(0)];
        let edges = [(id(2), id(0))];
        assert_eq!(
            topological_order(&nodes, &edges),
            vec![id(1), id(2), id(0), id(3)]
        );
    }

    #[test]
    fn diamond() {
        let nodes = [id(0), id(1), id(2), id(3)];
        let edges = [(id(0), id(2)), (id(0), id(1)), (id(1), id(3)), (id(2), id(3))];
        assert_eq!(
            topological_order(&nodes, &edges),
            vec![id(0), id(1), id(2), id(3)]
        );
    }

    #[test]
    fn producer_before_consumer_regardless_of_ids() {
        let nodes = [id(0), id(1)];
        let edges = [(id(1), id(0))];
        assert_eq!(topological_order(&nodes, &edges), vec![id(1), id(0)]);
    }

    #[test]
    fn reachability() {
        let edges = [(id(0), id(1)), (id(1), id(2))];
        assert!(reaches(id(0), id(2), &edges));
        assert!(!reaches(id(2), id(0), &edges));
        assert!(reaches(id(1), id(1), &edges));
        assert_eq!(
            downstream(id(1), &edges).into_iter().collect::<Vec<_>>(),
            vec![id(1), id(2)]
        );
    }
}
