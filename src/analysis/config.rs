//! Configuration for the backward slicer and the jump-table resolver.

use log::LevelFilter;

/// Configuration for a [`BackwardSlicer`](crate::analysis::BackwardSlicer).
///
/// The slicer has no internal step limit; bounding the walk is left to the caller, see
/// [`JumpTableConfig::max_steps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlicerConfig {
    /// Most verbose level the slicer emits under the `backwalk` log target (default: `Off`).
    ///
    /// Records still pass through the globally installed logger's own filter.
    pub trace_level: LevelFilter,
}

impl SlicerConfig {
    /// Returns a configuration that traces at `trace_level`.
    #[must_use]
    pub const fn with_trace_level(trace_level: LevelFilter) -> Self {
        SlicerConfig { trace_level }
    }
}

impl Default for SlicerConfig {
    fn default() -> Self {
        SlicerConfig {
            trace_level: LevelFilter::Off,
        }
    }
}

/// Configuration for a [`JumpTableResolver`](crate::analysis::JumpTableResolver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpTableConfig {
    /// Configuration handed to the underlying slicer.
    pub slicer: SlicerConfig,

    /// Maximum number of slicer steps per indirect jump (default: 1000).
    ///
    /// Calls to [`BackwardSlicer::step`](crate::analysis::BackwardSlicer::step) allowed per
    /// jump. A walk that has not found a bounded index within them is abandoned and reported
    /// as "no table".
    pub max_steps: usize,

    /// Maximum number of table entries read and returned (default: 4096).
    pub max_entries: usize,
}

impl Default for JumpTableConfig {
    fn default() -> Self {
        JumpTableConfig {
            slicer: SlicerConfig::default(),
            max_steps: 1000,
            max_entries: 4096,
        }
    }
}
