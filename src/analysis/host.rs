//! The slicer's view of the surrounding program.
//!
//! The backward walk needs very little from the outside world: who precedes a block, and
//! whether a number is a plausible code address. [`BackwalkHost`] captures exactly that, and
//! [`RtlBackwalkHost`] implements it over a [`BlockGraph`] and a [`Program`].

use crate::{
    analysis::{BlockGraph, BlockId},
    image::{AccessMode, Program},
    ir::{Address, Constant, RtlBlock},
};

/// Control-flow and address queries answered by the environment of a backward walk.
///
/// Implementations must be deterministic and free of side effects; the slicer may ask the
/// same question several times. Blocks are borrowed from the host, which owns them for at
/// least as long as the slicer runs.
pub trait BackwalkHost {
    /// Returns the predecessors of `block`, in a stable order.
    ///
    /// An unknown block has no predecessors.
    fn predecessors<'a>(&'a self, block: &RtlBlock) -> Vec<&'a RtlBlock>;

    /// Returns the predecessor of `block` if it has exactly one.
    fn single_predecessor<'a>(&'a self, block: &RtlBlock) -> Option<&'a RtlBlock> {
        match self.predecessors(block).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Returns `true` if `address` may be the start of executable code.
    fn is_valid_address(&self, address: Address) -> bool;

    /// Converts a constant read from a jump table into a code address.
    fn make_address_from_constant(&self, constant: &Constant) -> Address;
}

/// A [`BackwalkHost`] over an in-memory [`BlockGraph`] and [`Program`].
///
/// # Examples
///
/// ```rust
/// use backwalk::analysis::{BackwalkHost, BlockGraph, RtlBackwalkHost};
/// use backwalk::image::{AccessMode, ImageSegment, MemoryArea, Program, SegmentMap, Endianness};
/// use backwalk::ir::{Address, Constant, RtlBlock};
///
/// let text = ImageSegment::new(
///     ".text",
///     MemoryArea::new(Address::ptr32(0x1000), vec![0; 0x100]),
///     AccessMode::READ_EXECUTE,
/// );
/// let program = Program::new(
///     SegmentMap::new(Address::ptr32(0x1000), vec![text]),
///     Endianness::Little,
/// );
/// let host = RtlBackwalkHost::new(BlockGraph::new(), program);
///
/// let addr = host.make_address_from_constant(&Constant::word32(0x1040));
/// assert_eq!(addr, Address::ptr32(0x1040));
/// assert!(host.is_valid_address(addr));
/// assert!(!host.is_valid_address(Address::ptr32(0x2000)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RtlBackwalkHost {
    graph: BlockGraph,
    program: Program,
}

impl RtlBackwalkHost {
    /// Creates a host over `graph` and `program`.
    #[must_use]
    pub fn new(graph: BlockGraph, program: Program) -> Self {
        RtlBackwalkHost { graph, program }
    }

    /// Returns the block graph.
    #[must_use]
    pub fn graph(&self) -> &BlockGraph {
        &self.graph
    }

    /// Returns the program image.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Returns the block with id `id`.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&RtlBlock> {
        self.graph.block(id)
    }

    /// Returns the block starting at `address`.
    #[must_use]
    pub fn block_at(&self, address: Address) -> Option<&RtlBlock> {
        self.graph
            .block_id(address)
            .and_then(|id| self.graph.block(id))
    }
}

impl BackwalkHost for RtlBackwalkHost {
    fn predecessors<'a>(&'a self, block: &RtlBlock) -> Vec<&'a RtlBlock> {
        let Some(id) = self.graph.block_id(block.address()) else {
            return Vec::new();
        };
        self.graph
            .predecessors(id)
            .iter()
            .filter_map(|&pred| self.graph.block(pred))
            .collect()
    }

    fn is_valid_address(&self, address: Address) -> bool {
        self.program
            .segment_map()
            .try_find_segment(address)
            .is_some_and(|segment| segment.access().contains(AccessMode::EXECUTE))
    }

    fn make_address_from_constant(&self, constant: &Constant) -> Address {
        self.program
            .segment_map()
            .map_linear_address(constant.to_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Endianness, ImageSegment, MemoryArea, SegmentMap};

    fn program() -> Program {
        Program::new(
            SegmentMap::new(
                Address::ptr32(0x1000),
                vec![
                    ImageSegment::new(
                        ".text",
                        MemoryArea::new(Address::ptr32(0x1000), vec![0; 0x100]),
                        AccessMode::READ_EXECUTE,
                    ),
                    ImageSegment::new(
                        ".data",
                        MemoryArea::new(Address::ptr32(0x2000), vec![0; 0x100]),
                        AccessMode::READ_WRITE,
                    ),
                ],
            ),
            Endianness::Little,
        )
    }

    #[test]
    fn test_predecessors_follow_graph() {
        let mut graph = BlockGraph::new();
        let a = graph.add_block(RtlBlock::new(Address::ptr32(0x1000), "a"));
        let b = graph.add_block(RtlBlock::new(Address::ptr32(0x1010), "b"));
        let c = graph.add_block(RtlBlock::new(Address::ptr32(0x1020), "c"));
        graph.add_edge(a, c).unwrap();
        graph.add_edge(b, c).unwrap();
        graph.add_edge(a, b).unwrap();
        let host = RtlBackwalkHost::new(graph, program());

        let block_c = host.block(c).unwrap();
        let preds: Vec<_> = host.predecessors(block_c).iter().map(|b| b.name()).collect();
        assert_eq!(preds, ["a", "b"]);
        assert!(host.single_predecessor(block_c).is_none());

        let block_b = host.block(b).unwrap();
        assert_eq!(host.single_predecessor(block_b).unwrap().name(), "a");

        let stray = RtlBlock::new(Address::ptr32(0x1030), "stray");
        assert!(host.predecessors(&stray).is_empty());
    }

    #[test]
    fn test_only_executable_addresses_are_valid() {
        let host = RtlBackwalkHost::new(BlockGraph::new(), program());
        assert!(host.is_valid_address(Address::ptr32(0x10FF)));
        assert!(!host.is_valid_address(Address::ptr32(0x2000)));
        assert!(!host.is_valid_address(Address::ptr32(0x3000)));
    }

    #[test]
    fn test_address_from_constant_uses_pointer_width() {
        let host = RtlBackwalkHost::new(BlockGraph::new(), program());
        let addr = host.make_address_from_constant(&Constant::word64(0x1_0000_1040));
        assert_eq!(addr, Address::ptr32(0x1040));
    }
}
