#![allow(unused_macros)]

/// Emits a log record under the `backwalk` target when the slicer configuration allows it.
///
/// The first argument is anything with a `trace_level: log::LevelFilter` field, usually a
/// [`SlicerConfig`](crate::analysis::SlicerConfig). The record still has to pass the global
/// `log` filter, so with no logger installed this is a no-op.
///
/// ```rust, ignore
///  slice_log!(self.config, log::Level::Debug, "Reached beginning of block {}", addr);
/// ```
macro_rules! slice_log {
    ($config:expr, $level:expr, $($arg:tt)+) => {
        if $level <= $config.trace_level {
            log::log!(target: "backwalk", $level, $($arg)+);
        }
    };
}
