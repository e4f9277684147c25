//! Wright-Fisher simulation of diploids recording
//! a tree sequence.
//!
//! Edges are either added to the edge table as they are
//! born, then sorted and simplified every few generations,
//! or held in an [`EdgeBuffer`] and stitched into the
//! already-sorted edge table before each simplification.

use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use tskit::NodeId;
use tskit::TableCollection;

use crate::edge_buffer::BufferIndex;
use crate::edge_buffer::EdgeBuffer;
use crate::error::IntegrityError;
use crate::error::Result;
use crate::flags::SimulationFlags;
use crate::options::SimulationParameters;
use crate::sort_tables::sort_edges;
use crate::stitch::stitch_boundary;
use crate::stitch::stitch_together_edges;
use crate::tables::node_index;
use crate::tables::num_nodes;
use crate::tables::record_node;
use crate::tables::TempEdges;

#[derive(Debug, Clone, Copy)]
struct Parent {
    node0: NodeId,
    node1: NodeId,
}

#[derive(Debug, Clone, Copy)]
struct Birth {
    index: usize,
    parent0: Parent,
    parent1: Parent,
}

/// State carried between flushes when edges are buffered.
#[derive(Debug, Default)]
struct StitchState {
    alive_at_last_flush: Vec<NodeId>,
    new_edges: EdgeBuffer,
    edge_liftover: TempEdges,
}

impl StitchState {
    fn new(num_nodes: usize) -> Self {
        Self {
            new_edges: EdgeBuffer::new(num_nodes),
            ..Default::default()
        }
    }
}

fn deaths_and_parents<R: Rng>(
    rng: &mut R,
    parents: &[Parent],
    psurvival: f64,
    parent_picker: &Uniform<usize>,
    births: &mut Vec<Birth>,
) {
    births.clear();
    for index in 0..parents.len() {
        if rng.gen::<f64>() > psurvival {
            let parent0 = parents[rng.sample(parent_picker)];
            let parent1 = parents[rng.sample(parent_picker)];
            births.push(Birth {
                index,
                parent0,
                parent1,
            });
        }
    }
}

fn mendel<R: Rng>(rng: &mut R, parent: &Parent) -> NodeId {
    if rng.gen::<f64>() < 0.5 {
        parent.node1
    } else {
        parent.node0
    }
}

fn buffer_birth(
    parental_node0: NodeId,
    parental_node1: NodeId,
    new_node0: NodeId,
    new_node1: NodeId,
    sequence_length: f64,
    new_edges: &mut EdgeBuffer,
) -> Result<BufferIndex> {
    let first = new_edges.append(parental_node0, 0., sequence_length, new_node0)?;
    if parental_node1 == parental_node0 {
        // `first` is still the tail of this node's list.
        new_edges.append_at(first, 0., sequence_length, new_node1)
    } else {
        new_edges.append(parental_node1, 0., sequence_length, new_node1)
    }
}

fn generate_births<R: Rng>(
    rng: &mut R,
    births: &[Birth],
    birth_time: f64,
    mut new_edges: Option<&mut EdgeBuffer>,
    parents: &mut [Parent],
    tables: &mut TableCollection,
) -> Result<()> {
    let sequence_length = f64::from(tables.sequence_length());
    for b in births {
        let new_node0 = record_node(birth_time, tables)?;
        let new_node1 = record_node(birth_time, tables)?;
        let parental_node0 = mendel(rng, &b.parent0);
        let parental_node1 = mendel(rng, &b.parent1);
        match new_edges.as_deref_mut() {
            Some(buffer) => {
                let _ = buffer_birth(
                    parental_node0,
                    parental_node1,
                    new_node0,
                    new_node1,
                    sequence_length,
                    buffer,
                )?;
            }
            None => {
                let _ = tables.add_edge(0., sequence_length, parental_node0, new_node0)?;
                let _ = tables.add_edge(0., sequence_length, parental_node1, new_node1)?;
            }
        }
        parents[b.index] = Parent {
            node0: new_node0,
            node1: new_node1,
        };
    }
    Ok(())
}

fn remap(node_map: &[NodeId], node: NodeId) -> std::result::Result<NodeId, IntegrityError> {
    match node_index(node).and_then(|i| node_map.get(i)) {
        Some(&n) if n != NodeId::NULL => Ok(n),
        Some(_) => Err(IntegrityError::LostSample(node)),
        None => Err(IntegrityError::UnknownNode(node)),
    }
}

fn simplify_and_remap(parents: &mut [Parent], tables: &mut TableCollection) -> Result<()> {
    let samples = parents
        .iter()
        .flat_map(|p| [p.node0, p.node1])
        .collect::<Vec<_>>();
    let node_map = tables
        .simplify(&samples, tskit::SimplificationOptions::default(), true)?
        .ok_or(IntegrityError::MissingNodeMap)?;
    for p in parents.iter_mut() {
        p.node0 = remap(node_map, p.node0)?;
        p.node1 = remap(node_map, p.node1)?;
    }
    Ok(())
}

fn sort_and_simplify(
    flags: SimulationFlags,
    parents: &mut [Parent],
    tables: &mut TableCollection,
) -> Result<()> {
    if flags.native_sort() {
        sort_edges(tables, flags.parallel_sort())?;
    } else {
        let _ = tables.full_sort(tskit::TableSortOptions::default())?;
    }
    simplify_and_remap(parents, tables)
}

fn stitch_and_simplify(
    flags: SimulationFlags,
    state: &mut StitchState,
    parents: &mut [Parent],
    tables: &mut TableCollection,
) -> Result<()> {
    let max_time = stitch_boundary(tables, &state.alive_at_last_flush)?;
    stitch_together_edges(
        &state.alive_at_last_flush,
        max_time,
        &mut state.new_edges,
        &mut state.edge_liftover,
        tables,
    )?;
    if flags.validate_stitch() {
        let _ = tables.check_integrity(tskit::TableIntegrityCheckFlags::CHECK_EDGE_ORDERING)?;
    }
    simplify_and_remap(parents, tables)?;
    // The stitch sized the head array before simplification
    // removed nodes. Shrink it to the new node count.
    state.new_edges.reset(num_nodes(tables));
    state.alive_at_last_flush.clear();
    state
        .alive_at_last_flush
        .extend(parents.iter().flat_map(|p| [p.node0, p.node1]));
    Ok(())
}

fn flush(
    flags: SimulationFlags,
    state: Option<&mut StitchState>,
    parents: &mut [Parent],
    tables: &mut TableCollection,
) -> Result<()> {
    match state {
        Some(state) => stitch_and_simplify(flags, state, parents, tables),
        None => sort_and_simplify(flags, parents, tables),
    }
}

/// Evolve `parameters.popsize` diploids for `parameters.nsteps`
/// generations, recording nodes and edges in `tables`.
///
/// Founders are recorded at time `nsteps` and generation
/// `step` is born at time `nsteps - step`.
///
/// The run always ends with a simplification, so on success
/// `tables` holds only the ancestry of the final generation,
/// whose nodes are the first `2 * popsize` rows of the node
/// table.
///
/// # Errors
///
/// * [`crate::Error::InvalidParameter`] if `parameters` fail validation.
/// * [`crate::Error::Integrity`] if stitching detects corrupted state.
/// * [`crate::Error::Tables`] if `tskit` reports an error.
pub fn simulate(parameters: &SimulationParameters, tables: &mut TableCollection) -> Result<()> {
    parameters.validate()?;
    let flags = parameters.flags;
    let nsteps = parameters.nsteps;
    let interval = parameters.simplification_interval;
    let mut rng = StdRng::seed_from_u64(parameters.seed);

    let popsize = parameters.popsize as usize;
    let mut parents = Vec::with_capacity(popsize);
    for _ in 0..popsize {
        let node0 = record_node(f64::from(nsteps), tables)?;
        let node1 = record_node(f64::from(nsteps), tables)?;
        parents.push(Parent { node0, node1 });
    }

    // An empty alive set puts every buffered edge of the
    // first flush in the "new births" phase.
    let mut state = if flags.buffer_new_edges() {
        Some(StitchState::new(num_nodes(tables)))
    } else {
        None
    };

    let parent_picker = Uniform::new(0, popsize);
    let mut births = Vec::with_capacity(popsize);
    let mut simplified = false;
    for step in 1..=nsteps {
        deaths_and_parents(
            &mut rng,
            &parents,
            parameters.psurvival,
            &parent_picker,
            &mut births,
        );
        generate_births(
            &mut rng,
            &births,
            f64::from(nsteps - step),
            state.as_mut().map(|s| &mut s.new_edges),
            &mut parents,
            tables,
        )?;
        simplified = step % interval == 0;
        if simplified {
            flush(flags, state.as_mut(), &mut parents, tables)?;
            log::info!(
                "step {step}: {} nodes, {} edges after simplification",
                num_nodes(tables),
                tables.edges().num_rows()
            );
        }
    }
    if !simplified {
        flush(flags, state.as_mut(), &mut parents, tables)?;
        log::info!(
            "final flush: {} nodes, {} edges",
            num_nodes(tables),
            tables.edges().num_rows()
        );
    }
    Ok(())
}
