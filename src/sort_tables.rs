use rayon::prelude::*;
use tskit::TableCollection;

use crate::error::Result;
use crate::tables::edges;
use crate::tables::node_time;
use crate::tables::replace_edge_columns;
use crate::tables::Edge;
use crate::tables::TempEdges;

/// Sort the edge table by (parent time, parent, child, left),
/// which is the order `tskit` requires for simplification.
///
/// Only the edge table is touched, so this is a drop-in
/// replacement for a full table sort when there are no
/// sites, mutations, or migrations.
///
/// If `parallel` is `true`, the sort runs on the `rayon`
/// thread pool. Both variants produce identical output.
pub fn sort_edges(tables: &mut TableCollection, parallel: bool) -> Result<()> {
    let mut keyed = {
        let times = tables.nodes().time_slice();
        let mut keyed = Vec::with_capacity(tables.edges().num_rows().as_usize());
        for e in edges(tables) {
            keyed.push((node_time(times, e.parent)?, e));
        }
        keyed
    };

    let compare = |lhs: &(f64, Edge), rhs: &(f64, Edge)| {
        lhs.0
            .total_cmp(&rhs.0)
            .then(i32::from(lhs.1.parent).cmp(&i32::from(rhs.1.parent)))
            .then(i32::from(lhs.1.child).cmp(&i32::from(rhs.1.child)))
            .then(lhs.1.left.total_cmp(&rhs.1.left))
    };
    if parallel {
        keyed.par_sort_by(compare);
    } else {
        keyed.sort_by(compare);
    }

    let mut sorted = TempEdges::default();
    sorted.extend(keyed.into_iter().map(|(_, e)| e));
    replace_edge_columns(&sorted, tables)
}

#[cfg(test)]
mod test_sort_edges {
    use super::*;
    use crate::tables::make_table_collection;
    use crate::tables::record_node;
    use proptest::prelude::*;

    fn unsorted_tables(raw: &[(usize, usize, u8)], times: &[u8]) -> TableCollection {
        let mut tables = make_table_collection(1.).unwrap();
        let nodes = times
            .iter()
            .map(|&t| record_node(f64::from(t), &mut tables).unwrap())
            .collect::<Vec<_>>();
        let mut seen = std::collections::HashSet::new();
        for &(p, c, l) in raw {
            let parent = nodes[p % nodes.len()];
            let child = nodes[c % nodes.len()];
            if times[p % nodes.len()] > times[c % nodes.len()]
                && seen.insert((p % nodes.len(), c % nodes.len(), l))
            {
                let left = f64::from(l) / 10.;
                let _ = tables.add_edge(left, left + 0.1, parent, child).unwrap();
            }
        }
        tables
    }

    #[test]
    fn test_sort_simple() {
        let mut tables = make_table_collection(1.).unwrap();
        let old = record_node(2., &mut tables).unwrap();
        let young = record_node(1., &mut tables).unwrap();
        let c0 = record_node(0., &mut tables).unwrap();
        let c1 = record_node(0., &mut tables).unwrap();
        let _ = tables.add_edge(0.5, 1., old, young).unwrap();
        let _ = tables.add_edge(0., 0.5, old, young).unwrap();
        let _ = tables.add_edge(0., 1., young, c1).unwrap();
        let _ = tables.add_edge(0., 1., young, c0).unwrap();
        sort_edges(&mut tables, false).unwrap();
        let e = edges(&tables);
        let rv = e.iter().map(|e| (e.parent, e.child, e.left)).collect::<Vec<_>>();
        assert_eq!(
            rv,
            vec![
                (young, c0, 0.),
                (young, c1, 0.),
                (old, young, 0.),
                (old, young, 0.5)
            ]
        );
    }

    proptest! {
        #[test]
        fn test_native_sort_matches_tskit(
            times in prop::collection::vec(0..5_u8, 2..15),
            raw in prop::collection::vec((0..15_usize, 0..15_usize, 0..10_u8), 0..60),
            parallel in any::<bool>(),
        ) {
            let mut tables = unsorted_tables(&raw, &times);
            let mut expected = tables.deepcopy().unwrap();
            expected.full_sort(tskit::TableSortOptions::default()).unwrap();
            sort_edges(&mut tables, parallel).unwrap();
            prop_assert_eq!(edges(&tables), edges(&expected));
        }
    }
}
