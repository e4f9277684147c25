use std::collections::HashSet;
use std::hash::BuildHasherDefault;

use nohash::BuildNoHashHasher;
use tskit::NodeId;
use tskit::TableCollection;

use crate::edge_buffer::EdgeBuffer;
use crate::error::IntegrityError;
use crate::error::Result;
use crate::tables::node_index;
use crate::tables::node_time;

/// The rows `[start, stop]` of the edge table
/// that already belong to `parent`.
///
/// A parent with no rows has `stop == usize::MAX` and
/// `start` is the row its edges would be inserted before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistingEdges {
    pub parent: NodeId,
    pub start: usize,
    pub stop: usize,
}

impl ExistingEdges {
    fn new(parent: NodeId, start: usize, stop: usize) -> Self {
        Self {
            parent,
            start,
            stop,
        }
    }

    fn absent(parent: NodeId, insert_before: usize) -> Self {
        Self::new(parent, insert_before, usize::MAX)
    }

    pub fn is_absent(&self) -> bool {
        self.stop == usize::MAX
    }
}

/// The first row whose (parent time, parent id) is
/// greater than (`time`, `parent`).
///
/// The edge table must be sorted by time. Within a time
/// the result always falls between two parents' blocks,
/// even if those blocks are not in id order.
fn insertion_row(
    times: &[tskit::Time],
    parents: &[NodeId],
    time: f64,
    parent: NodeId,
) -> std::result::Result<usize, IntegrityError> {
    let key = i32::from(parent);
    let (mut lo, mut hi) = (0, parents.len());
    // The row before lo is <= the key and the row at hi is greater.
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let row_time = node_time(times, parents[mid])?;
        if row_time < time || (row_time == time && i32::from(parents[mid]) <= key) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

/// Locate the existing rows of every alive parent
/// that also has buffered edges.
///
/// The returned ranges are ordered by parent time, then
/// by `start`, with an absent range before a present range
/// that starts at the same row. This is the order in which
/// the stitch visits them. If the edge table is sorted by
/// (time, parent id) this is parent id order within a time.
///
/// # Errors
///
/// * [`IntegrityError::UnknownNode`] if an edge or alive parent is not in the node table.
/// * [`IntegrityError::NonContiguousParent`] if a parent's rows are interleaved with another's.
/// * [`IntegrityError::UnsortedRanges`] or [`IntegrityError::OverlappingRanges`]
///   if the ranges disagree with the time order of the edge table.
pub fn find_pre_existing_edges(
    tables: &TableCollection,
    alive_at_last_simplification: &[NodeId],
    new_edges: &EdgeBuffer,
) -> Result<Vec<ExistingEdges>> {
    let mut seen: HashSet<i32, BuildNoHashHasher<i32>> =
        HashSet::with_hasher(BuildHasherDefault::default());
    let alive_with_new_edges = alive_at_last_simplification
        .iter()
        .cloned()
        .filter(|&a| new_edges.has_births(a) && seen.insert(i32::from(a)))
        .collect::<Vec<_>>();
    if alive_with_new_edges.is_empty() {
        return Ok(vec![]);
    }

    let times = tables.nodes().time_slice();
    let num_nodes = times.len();
    let mut starts = vec![usize::MAX; num_nodes];
    let mut stops = vec![usize::MAX; num_nodes];
    let mut counts = vec![0_usize; num_nodes];
    let parents = tables.edges().parent_slice();
    for (row, &parent) in parents.iter().enumerate() {
        let p = node_index(parent)
            .filter(|&p| p < num_nodes)
            .ok_or(IntegrityError::UnknownNode(parent))?;
        if starts[p] == usize::MAX {
            starts[p] = row;
        }
        stops[p] = row;
        counts[p] += 1;
    }

    let mut existing_edges = Vec::with_capacity(alive_with_new_edges.len());
    for a in alive_with_new_edges {
        let p = node_index(a)
            .filter(|&p| p < num_nodes)
            .ok_or(IntegrityError::UnknownNode(a))?;
        if counts[p] == 0 {
            let row = insertion_row(times, parents, node_time(times, a)?, a)?;
            existing_edges.push(ExistingEdges::absent(a, row));
        } else {
            if stops[p] - starts[p] + 1 != counts[p] {
                return Err(IntegrityError::NonContiguousParent { parent: a }.into());
            }
            existing_edges.push(ExistingEdges::new(a, starts[p], stops[p]));
        }
    }

    // Our only sort!
    // All parents were range-checked above.
    let time_of = |node: NodeId| node_time(times, node).unwrap_or(f64::NAN);
    existing_edges.sort_unstable_by(|lhs, rhs| {
        time_of(lhs.parent)
            .total_cmp(&time_of(rhs.parent))
            .then(lhs.start.cmp(&rhs.start))
            .then((!lhs.is_absent()).cmp(&!rhs.is_absent()))
            .then(i32::from(lhs.parent).cmp(&i32::from(rhs.parent)))
    });

    validate_existing_edges(&existing_edges, times)?;
    log::trace!("{} existing edge ranges to reconcile", existing_edges.len());
    Ok(existing_edges)
}

fn validate_existing_edges(
    existing_edges: &[ExistingEdges],
    times: &[tskit::Time],
) -> std::result::Result<(), IntegrityError> {
    for w in existing_edges.windows(2) {
        let previous_time = node_time(times, w[0].parent)?;
        let next_time = node_time(times, w[1].parent)?;
        if !(previous_time <= next_time) {
            return Err(IntegrityError::UnsortedRanges {
                previous: w[0].parent,
                previous_time,
                next: w[1].parent,
                next_time,
            });
        }
    }
    let mut cursor = 0_usize;
    for e in existing_edges {
        if e.start < cursor {
            return Err(IntegrityError::OverlappingRanges {
                parent: e.parent,
                start: e.start,
                cursor,
            });
        }
        cursor = if e.is_absent() { e.start } else { e.stop + 1 };
    }
    Ok(())
}

#[cfg(test)]
mod test_find_pre_existing_edges {
    use super::*;
    use crate::error::Error;
    use crate::tables::make_table_collection;
    use crate::tables::record_node;

    // Nodes 0 and 1 are parents at times 5 and 3.
    // Node 2 is a child of both at time 2.
    // Node 3 is alive at time 3 with no edges.
    fn setup() -> (TableCollection, Vec<NodeId>) {
        let mut tables = make_table_collection(1.).unwrap();
        let mut nodes = vec![];
        for time in [5., 3., 2., 3.] {
            nodes.push(record_node(time, &mut tables).unwrap());
        }
        let _ = tables.add_edge(0., 1., nodes[1], nodes[2]).unwrap();
        let _ = tables.add_edge(0., 0.5, nodes[0], nodes[2]).unwrap();
        let _ = tables.add_edge(0.5, 1., nodes[0], nodes[2]).unwrap();
        (tables, nodes)
    }

    #[test]
    fn test_no_buffered_parents() {
        let (tables, nodes) = setup();
        let buffer = EdgeBuffer::new(4);
        let rv = find_pre_existing_edges(&tables, &nodes, &buffer).unwrap();
        assert!(rv.is_empty());
    }

    #[test]
    fn test_ranges_sorted_by_time() {
        let (mut tables, nodes) = setup();
        let child = record_node(0., &mut tables).unwrap();
        let mut buffer = EdgeBuffer::new(5);
        for &p in &[nodes[0], nodes[1], nodes[3]] {
            let _ = buffer.append(p, 0., 1., child).unwrap();
        }
        // duplicate alive entries are reconciled once
        let alive = vec![nodes[0], nodes[3], nodes[1], nodes[0]];
        let rv = find_pre_existing_edges(&tables, &alive, &buffer).unwrap();
        assert_eq!(
            rv,
            vec![
                ExistingEdges::new(nodes[1], 0, 0),
                ExistingEdges::absent(nodes[3], 1),
                ExistingEdges::new(nodes[0], 1, 2),
            ]
        );
        assert!(rv[1].is_absent());
    }

    // Parents 0 and 1 share a time. Only 1 has rows,
    // so 0 must be visited first.
    #[test]
    fn test_absent_parent_before_larger_id() {
        let mut tables = make_table_collection(1.).unwrap();
        let p = record_node(5., &mut tables).unwrap();
        let q = record_node(5., &mut tables).unwrap();
        let c = record_node(3., &mut tables).unwrap();
        let n0 = record_node(1., &mut tables).unwrap();
        let n1 = record_node(1., &mut tables).unwrap();
        let _ = tables.add_edge(0., 1., q, c).unwrap();
        let mut buffer = EdgeBuffer::new(5);
        let _ = buffer.append(p, 0., 1., n0).unwrap();
        let _ = buffer.append(q, 0., 1., n1).unwrap();
        let rv = find_pre_existing_edges(&tables, &[p, q], &buffer).unwrap();
        assert_eq!(
            rv,
            vec![ExistingEdges::absent(p, 0), ExistingEdges::new(q, 0, 0)]
        );
    }

    // Within time 2, the blocks are ordered 3, 1, 4.
    #[test]
    fn test_insertion_row_is_a_block_boundary() {
        let mut tables = make_table_collection(1.).unwrap();
        let mut nodes = vec![];
        for time in [1., 2., 2., 2., 2., 0.] {
            nodes.push(record_node(time, &mut tables).unwrap());
        }
        for p in [0, 3, 3, 1, 4, 4] {
            let _ = tables.add_edge(0., 1., nodes[p], nodes[5]).unwrap();
        }
        let times = tables.nodes().time_slice();
        let parents = tables.edges().parent_slice();
        let queries = [(nodes[2], 2.), (nodes[0], 2.), (nodes[5], 2.), (nodes[5], 0.5)];
        for (parent, time) in queries {
            let row = insertion_row(times, parents, time, parent).unwrap();
            assert!([0, 1, 3, 4, 6].contains(&row), "row {row}");
        }
        assert_eq!(insertion_row(times, parents, 0.5, nodes[5]).unwrap(), 0);
        assert_eq!(insertion_row(times, parents, 3., nodes[0]).unwrap(), 6);
        assert_eq!(insertion_row(times, parents, 1., nodes[5]).unwrap(), 1);
    }

    #[test]
    fn test_non_contiguous_parent() {
        let mut tables = make_table_collection(1.).unwrap();
        let mut nodes = vec![];
        for time in [2., 2., 0., 0.] {
            nodes.push(record_node(time, &mut tables).unwrap());
        }
        let _ = tables.add_edge(0., 1., nodes[0], nodes[2]).unwrap();
        let _ = tables.add_edge(0., 1., nodes[1], nodes[2]).unwrap();
        let _ = tables.add_edge(0., 1., nodes[0], nodes[3]).unwrap();
        let mut buffer = EdgeBuffer::new(4);
        let _ = buffer.append(nodes[0], 0., 1., nodes[3]).unwrap();
        assert!(matches!(
            find_pre_existing_edges(&tables, &nodes[0..1], &buffer),
            Err(Error::Integrity(IntegrityError::NonContiguousParent { .. }))
        ));
    }

    #[test]
    fn test_edge_table_out_of_time_order() {
        // The older parent's rows come first.
        let mut tables = make_table_collection(1.).unwrap();
        let mut nodes = vec![];
        for time in [5., 3., 0.] {
            nodes.push(record_node(time, &mut tables).unwrap());
        }
        let _ = tables.add_edge(0., 1., nodes[0], nodes[2]).unwrap();
        let _ = tables.add_edge(0., 1., nodes[1], nodes[2]).unwrap();
        let mut buffer = EdgeBuffer::new(3);
        for &p in &nodes[0..2] {
            let _ = buffer.append(p, 0., 1., nodes[2]).unwrap();
        }
        assert!(matches!(
            find_pre_existing_edges(&tables, &nodes[0..2], &buffer),
            Err(Error::Integrity(IntegrityError::OverlappingRanges { .. }))
        ));
    }

    #[test]
    fn test_unknown_alive_node() {
        let (tables, _) = setup();
        let mut buffer = EdgeBuffer::new(4);
        let bad = NodeId::from(10);
        let _ = buffer.append(bad, 0., 1., NodeId::from(11)).unwrap();
        assert!(matches!(
            find_pre_existing_edges(&tables, &[bad], &buffer),
            Err(Error::Integrity(IntegrityError::UnknownNode(_)))
        ));
    }
}
