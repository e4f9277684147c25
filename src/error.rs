use thiserror::Error;
use tskit::NodeId;

/// Failures that indicate the edge buffer or the
/// edge table no longer describe a valid genealogy.
///
/// None of these are recoverable: a run that hits one
/// must stop.
#[derive(Debug, Error, PartialEq)]
pub enum IntegrityError {
    #[error("existing edge ranges out of time order: parent {previous} (time {previous_time}) precedes parent {next} (time {next_time})")]
    UnsortedRanges {
        previous: NodeId,
        previous_time: f64,
        next: NodeId,
        next_time: f64,
    },
    #[error("existing edge ranges overlap: range for parent {parent} starts at row {start}, cursor is at row {cursor}")]
    OverlappingRanges {
        parent: NodeId,
        start: usize,
        cursor: usize,
    },
    #[error("edges for parent {parent} are not contiguous in the edge table")]
    NonContiguousParent { parent: NodeId },
    #[error("parent {parent} (time {parent_time}) is not older than child {child} (time {child_time})")]
    ParentChildTime {
        parent: NodeId,
        parent_time: f64,
        child: NodeId,
        child_time: f64,
    },
    #[error("row {row} with parent {parent} (time {time}) is out of order before a range at time {range_time}")]
    UnsortedEdgeTable {
        row: usize,
        parent: NodeId,
        time: f64,
        range_time: f64,
    },
    #[error("buffered parent {older} (time {older_time}) is older than parent {younger} (time {younger_time}) but has a larger id")]
    BirthsOutOfOrder {
        older: NodeId,
        older_time: f64,
        younger: NodeId,
        younger_time: f64,
    },
    #[error("alive parent {parent} (time {time}) is younger than the stitch boundary {max_time}")]
    AliveBelowBoundary {
        parent: NodeId,
        time: f64,
        max_time: f64,
    },
    #[error("edge columns have mismatched lengths")]
    ColumnLengthMismatch,
    #[error("buffered edge list for parent {parent} is broken at index {index}")]
    BrokenList { parent: NodeId, index: usize },
    #[error("{consumed} of {buffered} buffered edges were written by the stitch")]
    UnconsumedBirths { consumed: usize, buffered: usize },
    #[error("node {0} is not a row in the node table")]
    UnknownNode(NodeId),
    #[error("sample node {0} was not retained by simplification")]
    LostSample(NodeId),
    #[error("simplification did not return a node map")]
    MissingNodeMap,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("null node id passed as edge: parent {parent}, child {child}")]
    NullNode { parent: NodeId, child: NodeId },
    #[error("invalid interval: left {left}, right {right}")]
    InvalidInterval { left: f64, right: f64 },
    #[error("node {0} is out of range for the edge buffer")]
    NodeOutOfRange(NodeId),
    #[error("buffer index {0} is not the tail of a list")]
    NotATail(usize),
    #[error("{0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("tskit error: {0}")]
    Tables(#[from] tskit::TskitError),
}

pub type Result<T> = std::result::Result<T, Error>;
