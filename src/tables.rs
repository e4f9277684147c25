//! Thin layer over the `tskit` table collection.
//!
//! Everything that reads edge columns or writes them back
//! in bulk goes through here.

use tskit::NodeId;
use tskit::TableCollection;

use crate::error::Error;
use crate::error::IntegrityError;
use crate::error::Result;

pub fn make_table_collection(sequence_length: f64) -> Result<TableCollection> {
    Ok(TableCollection::new(sequence_length)?)
}

pub fn record_node(time: f64, tables: &mut TableCollection) -> Result<NodeId> {
    Ok(tables.add_node(
        0_u32,
        time,
        tskit::PopulationId::NULL,
        tskit::IndividualId::NULL,
    )?)
}

/// `None` for the null id and any other negative value.
#[inline(always)]
pub(crate) fn node_index(node: NodeId) -> Option<usize> {
    usize::try_from(i32::from(node)).ok()
}

#[inline(always)]
pub(crate) fn node_time(
    times: &[tskit::Time],
    node: NodeId,
) -> std::result::Result<f64, IntegrityError> {
    node_index(node)
        .and_then(|i| times.get(i))
        .map(|&t| f64::from(t))
        .ok_or(IntegrityError::UnknownNode(node))
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Edge {
    pub left: f64,
    pub right: f64,
    pub parent: NodeId,
    pub child: NodeId,
}

/// Borrowed view of the edge columns of a table collection.
pub(crate) struct EdgeColumns<'t> {
    left: &'t [tskit::Position],
    right: &'t [tskit::Position],
    parent: &'t [NodeId],
    child: &'t [NodeId],
}

impl<'t> EdgeColumns<'t> {
    pub(crate) fn new(tables: &'t TableCollection) -> Self {
        let edges = tables.edges();
        Self {
            left: edges.left_slice(),
            right: edges.right_slice(),
            parent: edges.parent_slice(),
            child: edges.child_slice(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.parent.len()
    }

    pub(crate) fn parent(&self, row: usize) -> NodeId {
        self.parent[row]
    }

    pub(crate) fn edge(&self, row: usize) -> Edge {
        Edge {
            left: f64::from(self.left[row]),
            right: f64::from(self.right[row]),
            parent: self.parent[row],
            child: self.child[row],
        }
    }
}

/// Column-wise accumulator for a new edge table.
///
/// Reused across flushes, so [`TempEdges::clear`] keeps
/// the allocations.
#[derive(Default, Debug)]
pub struct TempEdges {
    left: Vec<f64>,
    right: Vec<f64>,
    parent: Vec<NodeId>,
    child: Vec<NodeId>,
}

impl TempEdges {
    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
        self.parent.clear();
        self.child.clear();
    }

    pub fn add_edge(&mut self, left: f64, right: f64, parent: NodeId, child: NodeId) -> Result<()> {
        if right <= left {
            return Err(Error::InvalidInterval { left, right });
        }
        self.left.push(left);
        self.right.push(right);
        self.parent.push(parent);
        self.child.push(child);
        Ok(())
    }

    pub(crate) fn copy_rows(&mut self, columns: &EdgeColumns, rows: std::ops::Range<usize>) {
        self.left.extend(columns.left[rows.clone()].iter().map(|&x| f64::from(x)));
        self.right.extend(columns.right[rows.clone()].iter().map(|&x| f64::from(x)));
        self.parent.extend_from_slice(&columns.parent[rows.clone()]);
        self.child.extend_from_slice(&columns.child[rows]);
    }

    pub fn len(&self) -> std::result::Result<usize, IntegrityError> {
        let n = self.left.len();
        if self.right.len() != n || self.parent.len() != n || self.child.len() != n {
            return Err(IntegrityError::ColumnLengthMismatch);
        }
        Ok(n)
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Edge> + '_ {
        self.left
            .iter()
            .zip(self.right.iter())
            .zip(self.parent.iter())
            .zip(self.child.iter())
            .map(|(((&left, &right), &parent), &child)| Edge {
                left,
                right,
                parent,
                child,
            })
    }
}

impl Extend<Edge> for TempEdges {
    fn extend<I: IntoIterator<Item = Edge>>(&mut self, iter: I) {
        for e in iter {
            self.left.push(e.left);
            self.right.push(e.right);
            self.parent.push(e.parent);
            self.child.push(e.child);
        }
    }
}

/// Replace the edge table of `tables` with the contents of `edges`.
pub fn replace_edge_columns(edges: &TempEdges, tables: &mut TableCollection) -> Result<()> {
    // Catches a corrupted accumulator before anything is written.
    let _ = edges.len()?;
    let mut table = tskit::EdgeTable::default();
    for e in edges.iter() {
        let _ = table.add_row(e.left, e.right, e.parent, e.child)?;
    }
    tables.set_edges(&table)?;
    Ok(())
}

pub fn edges(tables: &TableCollection) -> Vec<Edge> {
    let columns = EdgeColumns::new(tables);
    (0..columns.len()).map(|row| columns.edge(row)).collect()
}

pub fn num_nodes(tables: &TableCollection) -> usize {
    tables.nodes().num_rows().as_usize()
}
