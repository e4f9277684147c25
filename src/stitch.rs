//! Merge buffered edges into an already-sorted edge table
//! without re-sorting the whole table.
//!
//! The merge has three phases:
//!
//! 1. Edges from parents born since the last flush.
//!    All such parents are younger than anything in the
//!    edge table, so their edges go first.
//! 2. Parents alive at the last flush that gained new edges.
//!    Their existing rows (if any) are spliced in, in time
//!    order, followed by their buffered edges.
//! 3. Everything left in the edge table.
//!
//! Each phase only moves forward through its input, so the
//! whole merge is linear in the number of edges.

use tskit::NodeId;
use tskit::TableCollection;

use crate::edge_buffer::EdgeBuffer;
use crate::error::IntegrityError;
use crate::error::Result;
use crate::existing_edges::find_pre_existing_edges;
use crate::existing_edges::ExistingEdges;
use crate::tables::node_time;
use crate::tables::num_nodes;
use crate::tables::replace_edge_columns;
use crate::tables::EdgeColumns;
use crate::tables::TempEdges;

/// The youngest time among `alive`.
///
/// Buffered edges from parents younger than this
/// were all recorded after the last flush.
/// Returns `f64::INFINITY` if `alive` is empty.
pub fn stitch_boundary(tables: &TableCollection, alive: &[NodeId]) -> Result<f64> {
    let times = tables.nodes().time_slice();
    let mut max_time = f64::INFINITY;
    for &a in alive {
        max_time = max_time.min(node_time(times, a)?);
    }
    Ok(max_time)
}

fn copy_births_for_parent(
    parent: NodeId,
    parent_time: f64,
    new_edges: &EdgeBuffer,
    times: &[tskit::Time],
    edge_liftover: &mut TempEdges,
) -> Result<usize> {
    let mut copied = 0;
    for birth in new_edges.births(parent) {
        let birth = birth?;
        let child_time = node_time(times, birth.child)?;
        if !(child_time < parent_time) {
            return Err(IntegrityError::ParentChildTime {
                parent,
                parent_time,
                child: birth.child,
                child_time,
            }
            .into());
        }
        edge_liftover.add_edge(birth.left, birth.right, parent, birth.child)?;
        copied += 1;
    }
    Ok(copied)
}

/// Phase 1: copy buffered edges of every parent younger
/// than `max_time` into `edge_liftover`.
///
/// The head array is walked from the largest node id down.
/// Node ids increase as time decreases, so this visits
/// parents from youngest to oldest. Parents sharing a time
/// are written in increasing id order.
///
/// Returns the number of edges copied.
fn copy_births_since_last_simplification(
    new_edges: &EdgeBuffer,
    times: &[tskit::Time],
    max_time: f64,
    edge_liftover: &mut TempEdges,
) -> Result<usize> {
    let mut parents = vec![];
    for (parent, _) in new_edges.parents_in_reverse() {
        let ptime = node_time(times, parent)?;
        if ptime < max_time {
            parents.push((parent, ptime));
        }
    }

    for w in parents.windows(2) {
        if w[1].1 < w[0].1 {
            return Err(IntegrityError::BirthsOutOfOrder {
                older: w[0].0,
                older_time: w[0].1,
                younger: w[1].0,
                younger_time: w[1].1,
            }
            .into());
        }
    }
    let mut start = 0;
    while start < parents.len() {
        let mut stop = start + 1;
        while stop < parents.len() && parents[stop].1 == parents[start].1 {
            stop += 1;
        }
        parents[start..stop].reverse();
        start = stop;
    }

    let mut copied = 0;
    for (parent, ptime) in parents {
        copied += copy_births_for_parent(parent, ptime, new_edges, times, edge_liftover)?;
    }
    Ok(copied)
}

/// Phase 2: merge the existing rows of each range in
/// `existing_edges` with that parent's buffered edges.
///
/// Rows of the edge table are consumed in order through a
/// single cursor that never moves backwards. Everything
/// between the cursor and a range's `start` is copied
/// first, then the range itself, then its buffered edges.
///
/// Returns the final cursor and the number of buffered
/// edges copied.
fn handle_pre_existing_edges(
    columns: &EdgeColumns,
    times: &[tskit::Time],
    existing_edges: &[ExistingEdges],
    new_edges: &EdgeBuffer,
    edge_liftover: &mut TempEdges,
) -> Result<(usize, usize)> {
    let mut offset = 0_usize;
    let mut copied = 0_usize;
    for ex in existing_edges {
        let ptime = node_time(times, ex.parent)?;
        if ex.start < offset {
            return Err(IntegrityError::OverlappingRanges {
                parent: ex.parent,
                start: ex.start,
                cursor: offset,
            }
            .into());
        }

        // Catch up on anything that sorts before this parent.
        for row in offset..ex.start {
            let time = node_time(times, columns.parent(row))?;
            if time > ptime {
                return Err(IntegrityError::UnsortedEdgeTable {
                    row,
                    parent: columns.parent(row),
                    time,
                    range_time: ptime,
                }
                .into());
            }
        }
        edge_liftover.copy_rows(columns, offset..ex.start);
        offset = ex.start;

        if !ex.is_absent() {
            edge_liftover.copy_rows(columns, ex.start..ex.stop + 1);
            offset = ex.stop + 1;
        }
        log::trace!(
            "parent {} at time {ptime}: cursor now at row {offset}",
            ex.parent
        );

        copied += copy_births_for_parent(ex.parent, ptime, new_edges, times, edge_liftover)?;
    }
    Ok((offset, copied))
}

/// Merge the contents of `new_edges` into the edge table
/// of `tables`.
///
/// # Parameters
///
/// * `alive_at_last_simplification`: nodes alive at the previous flush.
/// * `max_time`: the youngest time in `alive_at_last_simplification`,
///   see [`stitch_boundary`].
/// * `edge_liftover`: scratch space, reused between calls.
///
/// On success, the edge table is replaced by the merged edges,
/// `edge_liftover` is cleared and `new_edges` is reset to the
/// current number of nodes.
/// On error, neither `tables` nor `new_edges` is modified.
///
/// # Requirements
///
/// The edge table must be sorted the way `tskit` requires
/// and every buffered child must be younger than its parent.
pub fn stitch_together_edges(
    alive_at_last_simplification: &[NodeId],
    max_time: f64,
    new_edges: &mut EdgeBuffer,
    edge_liftover: &mut TempEdges,
    tables: &mut TableCollection,
) -> Result<()> {
    edge_liftover.clear();
    {
        let times = tables.nodes().time_slice();
        for &a in alive_at_last_simplification {
            let time = node_time(times, a)?;
            if time < max_time && new_edges.has_births(a) {
                return Err(IntegrityError::AliveBelowBoundary {
                    parent: a,
                    time,
                    max_time,
                }
                .into());
            }
        }
        let columns = EdgeColumns::new(tables);

        let new_births =
            copy_births_since_last_simplification(new_edges, times, max_time, edge_liftover)?;

        let existing_edges =
            find_pre_existing_edges(tables, alive_at_last_simplification, new_edges)?;
        let (offset, reconciled) = handle_pre_existing_edges(
            &columns,
            times,
            &existing_edges,
            new_edges,
            edge_liftover,
        )?;

        edge_liftover.copy_rows(&columns, offset..columns.len());

        if new_births + reconciled != new_edges.len() {
            return Err(IntegrityError::UnconsumedBirths {
                consumed: new_births + reconciled,
                buffered: new_edges.len(),
            }
            .into());
        }
        log::debug!(
            "stitched {new_births} new edges, {reconciled} edges onto {} existing parents, {} rows total",
            existing_edges.len(),
            edge_liftover.len()?
        );
    }

    replace_edge_columns(edge_liftover, tables)?;
    edge_liftover.clear();
    new_edges.reset(num_nodes(tables));
    Ok(())
}
