//! Jump-table recovery.
//!
//! [`JumpTableResolver`] ties the two halves of the analysis together. The backward slicer
//! finds the expression that computes the jump target and the range of its index; the
//! value-set evaluator then runs that expression forward over the range, reading the table
//! entries from the image.

use std::{collections::HashMap, fmt};

use log::Level;

use crate::{
    analysis::{
        BackwalkHost, BackwardSlicer, JumpTableConfig, StridedInterval, ValueSet,
        ValueSetEvaluator,
    },
    image::Program,
    ir::{Address, Expression, RtlBlock},
    Result,
};

/// A recovered jump table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTable {
    /// Expression computing the destination from the index.
    pub format: Expression,
    /// The table index.
    pub index: Expression,
    /// Values the index can take.
    pub interval: StridedInterval,
    /// Valid destinations in table order. Duplicates are kept.
    pub targets: Vec<Address>,
}

impl fmt::Display for JumpTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "jump table {} with {} in {}", self.format, self.index, self.interval)?;
        for (i, target) in self.targets.iter().enumerate() {
            writeln!(f, "  {i:4}: {target}")?;
        }
        Ok(())
    }
}

/// Resolves indirect jumps to the destinations listed in their jump tables.
///
/// # Examples
///
/// ```rust
/// use backwalk::prelude::*;
///
/// let mut bytes = vec![0u8; 0x100];
/// for (i, target) in [0x1040u32, 0x1050, 0x1060, 0x1070].iter().enumerate() {
///     bytes[0x80 + i * 4..0x84 + i * 4].copy_from_slice(&target.to_le_bytes());
/// }
/// let program = Program::new(
///     SegmentMap::new(
///         Address::ptr32(0x1000),
///         vec![ImageSegment::new(
///             ".text",
///             MemoryArea::new(Address::ptr32(0x1000), bytes),
///             AccessMode::READ_EXECUTE,
///         )],
///     ),
///     Endianness::Little,
/// );
///
/// let r1 = Identifier::register("r1", DataType::WORD32, 1);
/// let m = RtlEmitter::new();
/// let mut block = RtlBlock::new(Address::ptr32(0x1000), "l00001000");
/// block.emit(|e| e.assign(r1.clone(), m.and(r1.clone(), 3)));
/// block.emit(|e| e.goto(m.mem32(m.iadd(m.imul(r1.clone(), 4), 0x1080))));
///
/// let mut graph = BlockGraph::new();
/// let id = graph.add_block(block);
/// let host = RtlBackwalkHost::new(graph, program);
///
/// let resolver = JumpTableResolver::new(&host, host.program(), JumpTableConfig::default());
/// let table = resolver.resolve(host.block(id).unwrap())?.unwrap();
/// assert_eq!(table.targets.len(), 4);
/// assert_eq!(table.targets[3], Address::ptr32(0x1070));
/// # Ok::<(), backwalk::Error>(())
/// ```
#[derive(Debug)]
pub struct JumpTableResolver<'h, H: BackwalkHost> {
    host: &'h H,
    program: &'h Program,
    config: JumpTableConfig,
}

impl<'h, H: BackwalkHost> JumpTableResolver<'h, H> {
    /// Creates a resolver.
    ///
    /// # Arguments
    ///
    /// * `host` - Control-flow and address queries for the slicer
    /// * `program` - Image the table entries are read from
    /// * `config` - Step and entry limits
    #[must_use]
    pub fn new(host: &'h H, program: &'h Program, config: JumpTableConfig) -> Self {
        JumpTableResolver {
            host,
            program,
            config,
        }
    }

    /// Recovers the jump table of the indirect jump ending `block`.
    ///
    /// Paths are explored until one of them bounds the index. Returns `Ok(None)` when
    /// `block` does not end in a bounded table dispatch: nothing is live at the jump, no path
    /// found the index range, or the step budget ran out first.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::Error::Unsupported`] from the slicer or the evaluator so the
    /// caller can give up on this jump alone.
    pub fn resolve(&self, block: &'h RtlBlock) -> Result<Option<JumpTable>> {
        let mut slicer = BackwardSlicer::new(self.host, self.config.slicer);
        if !slicer.start(block)? {
            return Ok(None);
        }

        // Each finished path is checked for a bounded index; the walk goes on while other
        // predecessors are still queued.
        let mut steps = 0;
        let (index, format, interval) = loop {
            if steps >= self.config.max_steps {
                slice_log!(
                    self.config.slicer,
                    Level::Debug,
                    "Giving up on {} after {} steps",
                    block.address(),
                    steps
                );
                return Ok(None);
            }
            steps += 1;
            if slicer.step()? {
                continue;
            }

            let interval = slicer.jump_table_index_interval();
            if let (Some(index), Some(format)) =
                (slicer.jump_table_index(), slicer.jump_table_format())
            {
                if !interval.is_empty() {
                    break (index.clone(), format.clone(), interval);
                }
            }
            if !slicer.has_pending() {
                return Ok(None);
            }
            slice_log!(
                self.config.slicer,
                Level::Trace,
                "Path ended without a bounded index, trying the next predecessor"
            );
        };

        let mut context = HashMap::new();
        context.insert(
            index.clone(),
            ValueSet::interval(index.data_type(), interval),
        );
        let evaluator = ValueSetEvaluator::new(self.program, context)
            .with_max_reads(self.config.max_entries);
        let destinations = evaluator.evaluate(&format)?;

        let targets: Vec<Address> = destinations
            .values()
            .filter(|c| c.is_valid())
            .map(|c| self.host.make_address_from_constant(&c))
            .filter(|&addr| self.host.is_valid_address(addr))
            .take(self.config.max_entries)
            .collect();

        slice_log!(
            self.config.slicer,
            Level::Debug,
            "Jump at {} indexes {} by {} in {}: {} targets",
            block.address(),
            format,
            index,
            interval,
            targets.len()
        );

        Ok(Some(JumpTable {
            format,
            index,
            interval,
            targets,
        }))
    }
}
