//! A directed graph of RTL blocks.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::{
    ir::{Address, RtlBlock},
    Error, Result,
};

/// Index of a block in a [`BlockGraph`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(usize);

impl BlockId {
    /// Creates a block id from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        BlockId(index)
    }

    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Blocks keyed by start address, with predecessor and successor lists kept in edge
/// insertion order.
///
/// The graph only stores what a CFG builder hands it; it performs no control-flow recovery
/// of its own.
///
/// # Examples
///
/// ```rust
/// use backwalk::analysis::BlockGraph;
/// use backwalk::ir::{Address, RtlBlock};
///
/// let mut graph = BlockGraph::new();
/// let a = graph.add_block(RtlBlock::new(Address::ptr32(0x100), "l00000100"));
/// let b = graph.add_block(RtlBlock::new(Address::ptr32(0x200), "l00000200"));
/// assert!(graph.add_edge(a, b)?);
/// assert!(!graph.add_edge(a, b)?);
///
/// assert_eq!(graph.predecessors(b), &[a]);
/// assert_eq!(graph.block_id(Address::ptr32(0x200)), Some(b));
/// # Ok::<(), backwalk::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct BlockGraph {
    blocks: Vec<RtlBlock>,
    predecessors: Vec<Vec<BlockId>>,
    successors: Vec<Vec<BlockId>>,
    by_address: FxHashMap<Address, BlockId>,
}

impl BlockGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `block` and returns its id.
    ///
    /// A block starting at an address already in the graph replaces the stored block and
    /// keeps its id and edges.
    pub fn add_block(&mut self, block: RtlBlock) -> BlockId {
        if let Some(&id) = self.by_address.get(&block.address()) {
            self.blocks[id.index()] = block;
            return id;
        }

        let id = BlockId::new(self.blocks.len());
        self.by_address.insert(block.address(), id);
        self.blocks.push(block);
        self.predecessors.push(Vec::new());
        self.successors.push(Vec::new());
        id
    }

    /// Adds the edge `from -> to`.
    ///
    /// Returns `false` if the edge already existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if either id is not in the graph.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) -> Result<bool> {
        for id in [from, to] {
            if id.index() >= self.blocks.len() {
                return Err(Error::InvalidArgument(format!(
                    "block {id} is not part of the graph"
                )));
            }
        }

        if self.successors[from.index()].contains(&to) {
            return Ok(false);
        }
        self.successors[from.index()].push(to);
        self.predecessors[to.index()].push(from);
        Ok(true)
    }

    /// Returns the block with id `id`.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&RtlBlock> {
        self.blocks.get(id.index())
    }

    /// Returns the id of the block starting at `address`.
    #[must_use]
    pub fn block_id(&self, address: Address) -> Option<BlockId> {
        self.by_address.get(&address).copied()
    }

    /// Returns the predecessors of `id` in edge insertion order.
    #[must_use]
    pub fn predecessors(&self, id: BlockId) -> &[BlockId] {
        self.predecessors.get(id.index()).map_or(&[], Vec::as_slice)
    }

    /// Returns the successors of `id` in edge insertion order.
    #[must_use]
    pub fn successors(&self, id: BlockId) -> &[BlockId] {
        self.successors.get(id.index()).map_or(&[], Vec::as_slice)
    }

    /// Iterates over all blocks in insertion order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &RtlBlock)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (BlockId::new(i), block))
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }

    /// Returns `true` if the graph has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
