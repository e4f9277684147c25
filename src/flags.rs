// The bitflags type stays private.
// Only the builder methods below are public API.

use bitflags::bitflags;

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
    struct SimulationBitFlags: u32 {
        const EMPTY = 0;
        const BUFFER_NEW_EDGES = 1 << 1;
        const NATIVE_SORT = 1 << 2;
        const PARALLEL_SORT = 1 << 3;
        const VALIDATE_STITCH = 1 << 4;
    }
}

/// How the driver records and flushes new edges.
///
/// The default records edges directly into the edge table
/// and uses `tskit`'s sort before each simplification.
#[repr(transparent)]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct SimulationFlags(SimulationBitFlags);

impl SimulationFlags {
    pub fn with_buffered_edges(self) -> Self {
        Self(self.0 | SimulationBitFlags::BUFFER_NEW_EDGES)
    }

    pub fn with_native_sort(self) -> Self {
        Self(self.0 | SimulationBitFlags::NATIVE_SORT)
    }

    /// Implies [`SimulationFlags::with_native_sort`].
    pub fn with_parallel_sort(self) -> Self {
        Self(self.0 | SimulationBitFlags::NATIVE_SORT | SimulationBitFlags::PARALLEL_SORT)
    }

    pub fn with_stitch_validation(self) -> Self {
        Self(self.0 | SimulationBitFlags::VALIDATE_STITCH)
    }

    pub fn buffer_new_edges(&self) -> bool {
        self.0.contains(SimulationBitFlags::BUFFER_NEW_EDGES)
    }

    pub fn native_sort(&self) -> bool {
        self.0.contains(SimulationBitFlags::NATIVE_SORT)
    }

    pub fn parallel_sort(&self) -> bool {
        self.0.contains(SimulationBitFlags::PARALLEL_SORT)
    }

    pub fn validate_stitch(&self) -> bool {
        self.0.contains(SimulationBitFlags::VALIDATE_STITCH)
    }
}

#[cfg(test)]
mod test_simulation_flags {
    use super::SimulationFlags;

    #[test]
    fn test_default_is_sort_and_simplify() {
        let flags = SimulationFlags::default();
        assert!(!flags.buffer_new_edges());
        assert!(!flags.native_sort());
        assert!(!flags.parallel_sort());
        assert!(!flags.validate_stitch());
    }

    #[test]
    fn test_buffered() {
        let flags = SimulationFlags::default().with_buffered_edges();
        assert!(flags.buffer_new_edges());
        assert!(!flags.native_sort());
    }

    #[test]
    fn test_parallel_implies_native() {
        let flags = SimulationFlags::default().with_parallel_sort();
        assert!(flags.native_sort());
        assert!(flags.parallel_sort())
    }
}
