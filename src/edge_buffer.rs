use tskit::NodeId;

use crate::error::Error;
use crate::error::IntegrityError;
use crate::error::Result;
use crate::tables::node_index;

/// Index of a [`BirthData`] record within an [`EdgeBuffer`].
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Hash, PartialEq, PartialOrd, Ord, Eq)]
pub struct BufferIndex(usize);

impl BufferIndex {
    #[inline(always)]
    fn sentinel() -> Self {
        Self(usize::MAX)
    }

    #[inline(always)]
    fn is_sentinel(&self) -> bool {
        self.0 == usize::MAX
    }

    #[inline(always)]
    fn into_option(self) -> Option<Self> {
        if self.is_sentinel() {
            None
        } else {
            Some(self)
        }
    }
}

/// One buffered transmission from a parent
/// to `child` over `[left, right)`.
#[derive(Debug, Clone, Copy)]
pub struct BirthData {
    pub left: f64,
    pub right: f64,
    pub child: NodeId,
    next: BufferIndex,
}

impl BirthData {
    fn new(left: f64, right: f64, child: NodeId) -> Self {
        Self {
            left,
            right,
            child,
            next: BufferIndex::sentinel(),
        }
    }
}

/// Edges recorded since the last flush, grouped by parent.
///
/// Each parent owns a forward-linked list threaded through
/// `births`. `first[parent]` is the head of that list.
#[derive(Debug, Default)]
pub struct EdgeBuffer {
    first: Vec<BufferIndex>,
    births: Vec<BirthData>,
}

fn validate_new_edge(parent: NodeId, left: f64, right: f64, child: NodeId) -> Result<usize> {
    let p = match (node_index(parent), node_index(child)) {
        (Some(p), Some(_)) => p,
        _ => return Err(Error::NullNode { parent, child }),
    };
    // Written so that NaN fails too.
    if !(right > left) {
        return Err(Error::InvalidInterval { left, right });
    }
    Ok(p)
}

impl EdgeBuffer {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            first: vec![BufferIndex::sentinel(); num_nodes],
            births: vec![],
        }
    }

    /// Number of parents the head array currently covers.
    pub fn capacity(&self) -> usize {
        self.first.len()
    }

    /// Total number of buffered edges.
    pub fn len(&self) -> usize {
        self.births.len()
    }

    pub fn is_empty(&self) -> bool {
        self.births.is_empty()
    }

    /// Head of the list for `parent`, if it has buffered edges.
    pub fn first(&self, parent: NodeId) -> Option<BufferIndex> {
        let p = node_index(parent)?;
        self.first.get(p).and_then(|f| f.into_option())
    }

    pub fn has_births(&self, parent: NodeId) -> bool {
        self.first(parent).is_some()
    }

    fn next_raw(&self, at: BufferIndex) -> BufferIndex {
        self.births[at.0].next
    }

    /// Buffer `[left, right)` from `parent` to `child`.
    ///
    /// # Complexity
    ///
    /// Linear in the number of edges already buffered for `parent`.
    /// Use [`EdgeBuffer::append_at`] when the tail is known.
    pub fn append(
        &mut self,
        parent: NodeId,
        left: f64,
        right: f64,
        child: NodeId,
    ) -> Result<BufferIndex> {
        let p = validate_new_edge(parent, left, right, child)?;
        let tail = if p < self.first.len() {
            self.tail_of(parent)?
        } else {
            self.first.resize(p + 1, BufferIndex::sentinel());
            None
        };
        match tail {
            None => {
                self.births.push(BirthData::new(left, right, child));
                let new_head = BufferIndex(self.births.len() - 1);
                self.first[p] = new_head;
                Ok(new_head)
            }
            Some(tail) => self.link_after(tail, BirthData::new(left, right, child)),
        }
    }

    /// Buffer `[left, right)` to `child` directly after `at`,
    /// which must be the tail of some parent's list.
    ///
    /// # Complexity
    ///
    /// `O(1)`
    pub fn append_at(
        &mut self,
        at: BufferIndex,
        left: f64,
        right: f64,
        child: NodeId,
    ) -> Result<BufferIndex> {
        if node_index(child).is_none() {
            return Err(Error::NullNode {
                parent: NodeId::NULL,
                child,
            });
        }
        if !(right > left) {
            return Err(Error::InvalidInterval { left, right });
        }
        match self.births.get(at.0) {
            Some(b) if b.next.is_sentinel() => (),
            _ => return Err(Error::NotATail(at.0)),
        }
        self.link_after(at, BirthData::new(left, right, child))
    }

    fn link_after(&mut self, at: BufferIndex, datum: BirthData) -> Result<BufferIndex> {
        self.births.push(datum);
        let new_tail = BufferIndex(self.births.len() - 1);
        self.births[at.0].next = new_tail;
        Ok(new_tail)
    }

    /// The last buffered record for `parent`, or `None`
    /// if there are no buffered edges for `parent`.
    ///
    /// # Errors
    ///
    /// * [`Error::NodeOutOfRange`] if `parent` is not covered by the head array.
    /// * [`Error::Integrity`] if the list does not terminate.
    pub fn tail_of(&self, parent: NodeId) -> Result<Option<BufferIndex>> {
        let p = node_index(parent)
            .filter(|&p| p < self.first.len())
            .ok_or(Error::NodeOutOfRange(parent))?;
        let mut current = self.first[p];
        if current.is_sentinel() {
            return Ok(None);
        }
        let mut steps = 0_usize;
        loop {
            if current.0 >= self.births.len() || steps > self.births.len() {
                return Err(IntegrityError::BrokenList {
                    parent,
                    index: current.0,
                }
                .into());
            }
            let next = self.next_raw(current);
            if next.is_sentinel() {
                return Ok(Some(current));
            }
            current = next;
            steps += 1;
        }
    }

    /// Iterate over the records buffered for `parent`
    /// in insertion order.
    ///
    /// The iterator yields an error, then stops, if the
    /// list contains a dangling index or a cycle.
    pub fn births(&self, parent: NodeId) -> Births<'_> {
        Births {
            buffer: self,
            parent,
            current: self.first(parent).unwrap_or(BufferIndex::sentinel()),
            steps: 0,
        }
    }

    /// Clear all lists and resize the head array to `num_nodes`.
    pub fn reset(&mut self, num_nodes: usize) {
        self.first.fill(BufferIndex::sentinel());
        self.first.resize(num_nodes, BufferIndex::sentinel());
        self.births.clear();
    }

    /// Parents with at least one buffered edge, by decreasing id.
    pub(crate) fn parents_in_reverse(&self) -> impl Iterator<Item = (NodeId, BufferIndex)> + '_ {
        self.first
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, f)| !f.is_sentinel())
            .map(|(p, &f)| (NodeId::from(p as i32), f))
    }
}

pub struct Births<'b> {
    buffer: &'b EdgeBuffer,
    parent: NodeId,
    current: BufferIndex,
    steps: usize,
}

impl<'b> Iterator for Births<'b> {
    type Item = std::result::Result<&'b BirthData, IntegrityError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_sentinel() {
            return None;
        }
        let index = self.current.0;
        match self.buffer.births.get(index) {
            Some(b) if self.steps < self.buffer.births.len() => {
                self.steps += 1;
                self.current = b.next;
                Some(Ok(b))
            }
            _ => {
                self.current = BufferIndex::sentinel();
                Some(Err(IntegrityError::BrokenList {
                    parent: self.parent,
                    index,
                }))
            }
        }
    }
}
