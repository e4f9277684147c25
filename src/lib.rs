//! Forward-time Wright-Fisher simulation recording a
//! `tskit` tree sequence, with an edge buffer that merges
//! new edges into the sorted edge table instead of
//! re-sorting it before every simplification.

mod error;
mod flags;

pub mod edge_buffer;
pub mod existing_edges;
pub mod options;
pub mod simulate;
pub mod sort_tables;
pub mod stitch;
pub mod tables;

pub use edge_buffer::BirthData;
pub use edge_buffer::BufferIndex;
pub use edge_buffer::EdgeBuffer;
pub use error::Error;
pub use error::IntegrityError;
pub use error::Result;
pub use existing_edges::find_pre_existing_edges;
pub use existing_edges::ExistingEdges;
pub use flags::SimulationFlags;
pub use options::CommandLineOptions;
pub use options::SimulationParameters;
pub use simulate::simulate;
pub use sort_tables::sort_edges;
pub use stitch::stitch_boundary;
pub use stitch::stitch_together_edges;
pub use tables::Edge;
pub use tables::TempEdges;
