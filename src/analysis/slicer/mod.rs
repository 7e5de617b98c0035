//! Backward slicing from an indirect jump.
//!
//! [`BackwardSlicer`] drives a worklist of [`SliceState`]s. The caller seeds it with the
//! block ending in the indirect transfer and then calls [`BackwardSlicer::step`] until it
//! returns `false`, bounding the number of calls as it sees fit. When the walk reaches the
//! start of a block, every not yet visited predecessor gets its own copy of the state.
//!
//! States live in an arena owned by the slicer and are referred to by index, so the
//! accessors always describe the state the last step worked on.
//!
//! # Algorithm
//!
//! The worklist is first in, first out, so the paths into a join are explored in
//! breadth-first order one instruction at a time. A block is entered at most once per walk;
//! loops and diamonds do not enqueue it again. When a state finishes its path, either bounded
//! or with nothing left live, `step` returns `false` once. If [`BackwardSlicer::has_pending`]
//! still reports queued states, calling `step` again continues with the next path, which is
//! how [`JumpTableResolver`](crate::analysis::JumpTableResolver) tries every predecessor.
//!
//! # Examples
//!
//! ```rust
//! use backwalk::prelude::*;
//!
//! let r1 = Identifier::register("r1", DataType::WORD32, 1);
//! let r2 = Identifier::register("r2", DataType::WORD32, 2);
//! let m = RtlEmitter::new();
//!
//! let mut head = RtlBlock::new(Address::ptr32(0x100), "l00000100");
//! head.emit(|e| e.assign(r1.clone(), m.shl(r2.clone(), 2)));
//! head.emit(|e| e.goto(Address::ptr32(0x200)));
//! let mut tail = RtlBlock::new(Address::ptr32(0x200), "l00000200");
//! tail.emit(|e| e.goto(m.iadd(r1.clone(), 0x0012_3400)));
//!
//! let mut graph = BlockGraph::new();
//! let head = graph.add_block(head);
//! let tail = graph.add_block(tail);
//! graph.add_edge(head, tail)?;
//! let host = RtlBackwalkHost::new(graph, Program::default());
//!
//! let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
//! assert!(slicer.start(host.block(tail).unwrap())?);
//! while slicer.step()? {
//!     if slicer.live().is_some_and(|live| live.contains_key(&r2.clone().into())) {
//!         break;
//!     }
//! }
//! assert_eq!(slicer.jump_table_format().unwrap().to_string(), "(r2 << 2) + 0x00123400");
//! # Ok::<(), backwalk::Error>(())
//! ```

mod state;

pub use state::{LiveMap, SliceState, SlicerResult};

use std::collections::VecDeque;

use log::Level;
use rustc_hash::FxHashSet;

use crate::{
    analysis::{BackwalkHost, SlicerConfig, StridedInterval},
    ir::{Address, Expression, RtlBlock},
    Result,
};

/// Index of a state in the slicer's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SliceStateId(usize);

/// Worklist driver of the backward walk.
///
/// Single threaded and caller driven: nothing happens between calls to
/// [`BackwardSlicer::step`], and abandoning the walk is simply not calling it again.
#[derive(Debug)]
pub struct BackwardSlicer<'h, H: BackwalkHost> {
    host: &'h H,
    config: SlicerConfig,
    states: Vec<SliceState<'h>>,
    worklist: VecDeque<SliceStateId>,
    /// Start addresses of blocks that already have a state.
    visited: FxHashSet<Address>,
    current: Option<SliceStateId>,
}

impl<'h, H: BackwalkHost> BackwardSlicer<'h, H> {
    /// Creates a slicer asking `host` for predecessors.
    #[must_use]
    pub fn new(host: &'h H, config: SlicerConfig) -> Self {
        BackwardSlicer {
            host,
            config,
            states: Vec::new(),
            worklist: VecDeque::new(),
            visited: FxHashSet::default(),
            current: None,
        }
    }

    /// Seeds the walk from the last instruction of `block`.
    ///
    /// Returns `false` if nothing is live at the jump, in which case `step` has nothing to
    /// do. Any previous walk is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unsupported`] if the jump's target expression is outside
    /// the modelled sublanguage.
    pub fn start(&mut self, block: &'h RtlBlock) -> Result<bool> {
        self.states.clear();
        self.worklist.clear();
        self.visited.clear();

        let mut state = SliceState::new(block, self.config);
        self.visited.insert(block.address());
        let seeded = state.start()?;

        let id = self.push_state(state);
        self.current = Some(id);
        if seeded {
            self.worklist.push_back(id);
        }
        Ok(seeded)
    }

    /// Advances the walk by one instruction.
    ///
    /// Returns `false` when the worklist is exhausted or the state stepped on finished its
    /// path. A state that reaches the start of a block without predecessors makes this
    /// return `true` once and is then dropped.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::Error::Unsupported`] and [`crate::Error::InvalidArgument`] from
    /// the transfer function. The walk is unusable afterwards.
    pub fn step(&mut self) -> Result<bool> {
        let id = loop {
            let Some(id) = self.worklist.pop_front() else {
                return Ok(false);
            };
            self.current = Some(id);

            let state = &self.states[id.0];
            if !state.is_at_beginning() {
                break id;
            }

            let block = state.block();
            slice_log!(
                self.config,
                Level::Trace,
                "Reached beginning of block {}",
                block.address()
            );
            let preds = self.host.predecessors(block);
            if preds.is_empty() {
                slice_log!(
                    self.config,
                    Level::Trace,
                    "  No predecessors found for block {}",
                    block.address()
                );
                return Ok(true);
            }

            let succ = block.address();
            for pred in preds {
                if self.visited.insert(pred.address()) {
                    let pstate = self.states[id.0].create_new(pred, succ);
                    let pid = self.push_state(pstate);
                    self.worklist.push_back(pid);
                    slice_log!(
                        self.config,
                        Level::Trace,
                        "  Added block {} to worklist",
                        pred.address()
                    );
                }
            }
        };

        if self.states[id.0].step()? {
            self.worklist.push_back(id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Returns `true` while states are queued, so a later `step` can continue the walk along
    /// another path.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.worklist.is_empty()
    }

    fn push_state(&mut self, state: SliceState<'h>) -> SliceStateId {
        let id = SliceStateId(self.states.len());
        self.states.push(state);
        id
    }

    /// The state the last call to `start` or `step` worked on.
    #[must_use]
    pub fn state(&self) -> Option<&SliceState<'h>> {
        self.current.and_then(|id| self.states.get(id.0))
    }

    /// Live expressions of the current state.
    #[must_use]
    pub fn live(&self) -> Option<&LiveMap> {
        self.state().map(SliceState::live)
    }

    /// Jump-table format of the current state.
    #[must_use]
    pub fn jump_table_format(&self) -> Option<&Expression> {
        self.state().and_then(SliceState::jump_table_format)
    }

    /// Jump-table index of the current state.
    #[must_use]
    pub fn jump_table_index(&self) -> Option<&Expression> {
        self.state().and_then(SliceState::jump_table_index)
    }

    /// Index interval of the current state, [`StridedInterval::EMPTY`] before `start`.
    #[must_use]
    pub fn jump_table_index_interval(&self) -> StridedInterval {
        self.state()
            .map_or(StridedInterval::EMPTY, SliceState::jump_table_index_interval)
    }

    /// The host the slicer queries.
    #[must_use]
    pub fn host(&self) -> &'h H {
        self.host
    }
}
