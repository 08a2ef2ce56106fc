//! Resource limits threaded through the core at construction time.
//!
//! Mirrors the `ResourceLimits`/`ResourceTracker` pattern of the tree-walking
//! executor this crate is descended from: a small `Copy` config struct passed
//! in explicitly rather than read from ambient global state.

/// Bounds on interpreter-core resource usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of source snapshots a `RuntimeError` accumulates while
    /// unwinding frames. The original implementation capped this via a
    /// byte-length check on the rendered snapshot string; here it is an
    /// explicit frame count.
    pub max_traceback_depth: usize,
    /// Maximum nesting depth of the block tree a single `CodeObject` may
    /// build. Guards against unbounded recursion while compiling
    /// pathologically nested source; exceeding it is a fatal compile error.
    pub max_block_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_traceback_depth: 8,
            max_block_depth: 256,
        }
    }
}
