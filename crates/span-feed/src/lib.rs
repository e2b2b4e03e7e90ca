//! Producer-side staging buffer for the rendering boundary.
//!
//! The fast text-rendering path produces variable-length byte spans faster
//! than the native side consumes them. This crate accumulates those spans in
//! fixed-capacity chunks and stages them for the batched handoff:
//!
//! * [`ChunkRegion`] – aligned, zeroed backing memory (mmap with a heap
//!   fallback).
//! * [`SpanFeed`] – reserve/commit producer API, FIFO commit queue, drain
//!   and release bookkeeping, configurable backpressure.
//! * [`FeedError`] – non-blocking backpressure signals; nothing here waits.

mod chunk;
mod error;
mod feed;
mod region;

pub use error::{FeedError, FeedResult};
pub use feed::{FeedConfig, FeedStats, GrowthPolicy, Span, SpanFeed};
pub use region::{ChunkRegion, CHUNK_ALIGNMENT};
