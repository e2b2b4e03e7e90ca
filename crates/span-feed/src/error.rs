//! Error surface for the span feed.
//!
//! Every runtime variant here is a backpressure signal, not a defect:
//! callers are expected to drain, release, or apply their own flow control
//! and then retry. Nothing blocks or waits internally.

use thiserror::Error;

/// Convenience result alias for feed operations.
pub type FeedResult<T, E = FeedError> = Result<T, E>;

/// Errors surfaced by [`SpanFeed`](crate::SpanFeed) and its allocator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    /// Configuration rejected at construction time.
    #[error("invalid feed configuration: {0}")]
    InvalidConfig(&'static str),

    /// The active chunk cannot fit the reservation under the block policy.
    #[error("active chunk cannot fit {requested} bytes under the block policy")]
    WouldBlock {
        /// Bytes the reservation asked for.
        requested: usize,
    },

    /// Allocating another chunk would push resident bytes past the cap.
    #[error("allocating {requested} bytes would exceed the {max_bytes}-byte residency cap")]
    CapacityExceeded {
        /// Size of the chunk that was about to be allocated.
        requested: usize,
        /// Configured residency cap.
        max_bytes: usize,
    },

    /// The bounded commit queue is full; drain before committing again.
    #[error("commit queue at capacity ({capacity}); drain before committing more spans")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The underlying allocator could not provide a chunk region.
    #[error("failed to allocate chunk region of {size} bytes aligned to {alignment}")]
    AllocationFailed {
        /// Requested region size in bytes.
        size: usize,
        /// Requested alignment.
        alignment: usize,
    },
}
