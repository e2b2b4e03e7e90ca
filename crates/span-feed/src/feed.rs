//! Chunked append-only span feed.
//!
//! A fast text-producing path reserves writable windows, fills them, and
//! commits the written prefix as a [`Span`]. Committed spans queue in FIFO
//! order until the consumer drains them for the batched native handoff.
//! Single producer, single consumer, one thread at a time: nothing here
//! blocks or locks, capacity exhaustion is reported through errors.

use std::collections::VecDeque;

use crate::chunk::{Chunk, ChunkState};
use crate::error::{FeedError, FeedResult};
use crate::region::ChunkRegion;

/// Rule applied when the active chunk cannot satisfy a reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrowthPolicy {
    /// Allocate a new chunk sized to fit the reservation.
    Grow,
    /// Refuse the reservation; the caller must drain and retry.
    Block,
}

/// Feed configuration. All fields have working defaults.
#[derive(Clone, Copy, Debug)]
pub struct FeedConfig {
    /// Minimum granularity of chunk allocations, in bytes.
    pub chunk_size: usize,
    /// Chunks allocated up front.
    pub initial_chunks: usize,
    /// Cap on resident bytes across unreleased chunks; 0 means unbounded.
    pub max_bytes: usize,
    /// Policy applied when the active chunk cannot fit a reservation.
    pub growth: GrowthPolicy,
    /// Seal a chunk the moment its capacity is reached.
    pub seal_on_full: bool,
    /// Commit-queue bound; 0 means unbounded.
    pub queue_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            initial_chunks: 2,
            max_bytes: 0,
            growth: GrowthPolicy::Grow,
            seal_on_full: true,
            queue_capacity: 0,
        }
    }
}

/// Immutable view of a committed byte range: chunk identity, offset, length.
///
/// Spans never own memory; validity is tied to the owning chunk, which stays
/// resident until sealed and fully released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    /// Identity of the owning chunk.
    pub chunk: u32,
    /// Byte offset within the chunk.
    pub offset: u32,
    /// Length in bytes.
    pub len: u32,
}

/// Point-in-time feed counters and gauges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Total bytes committed over the feed's lifetime.
    pub bytes_written: u64,
    /// Total spans committed over the feed's lifetime.
    pub spans_committed: u64,
    /// Chunks currently resident (not yet released).
    pub chunks: u32,
    /// Spans committed but not yet drained.
    pub pending_spans: u32,
}

#[derive(Clone, Copy, Debug)]
struct Reservation {
    chunk: usize,
    offset: usize,
    len: usize,
}

/// Chunked, growable producer buffer with a FIFO commit queue.
pub struct SpanFeed {
    config: FeedConfig,
    /// Chunk table indexed by chunk identity; released slots become `None`.
    chunks: Vec<Option<Chunk>>,
    active: Option<usize>,
    /// Pre-allocated chunks not yet activated.
    spare: Vec<usize>,
    pending: Option<Reservation>,
    queue: VecDeque<Span>,
    bytes_written: u64,
    spans_committed: u64,
}

impl SpanFeed {
    /// Builds a feed, allocating its initial chunks eagerly.
    pub fn new(config: FeedConfig) -> FeedResult<Self> {
        if config.chunk_size == 0 {
            return Err(FeedError::InvalidConfig("chunk_size must be non-zero"));
        }
        if config.initial_chunks == 0 {
            return Err(FeedError::InvalidConfig("initial_chunks must be at least 1"));
        }
        if config.max_bytes > 0
            && config.chunk_size.saturating_mul(config.initial_chunks) > config.max_bytes
        {
            return Err(FeedError::InvalidConfig(
                "initial chunks already exceed max_bytes",
            ));
        }

        let mut chunks = Vec::with_capacity(config.initial_chunks);
        for _ in 0..config.initial_chunks {
            chunks.push(Some(Chunk::new(ChunkRegion::new(config.chunk_size)?)));
        }

        Ok(Self {
            config,
            chunks,
            active: Some(0),
            spare: (1..config.initial_chunks).collect(),
            pending: None,
            queue: VecDeque::new(),
            bytes_written: 0,
            spans_committed: 0,
        })
    }

    /// Configuration the feed was built with.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Reserves a writable window of exactly `n` bytes in the active chunk.
    ///
    /// A previous reservation that was never committed is abandoned (zero
    /// bytes written). Fails with [`FeedError::WouldBlock`] under the block
    /// policy and [`FeedError::CapacityExceeded`] when growth would pass the
    /// residency cap; neither failure has side effects.
    pub fn reserve(&mut self, n: usize) -> FeedResult<&mut [u8]> {
        if self.pending.take().is_some() {
            log::trace!("previous reservation abandoned without commit");
        }

        let idx = self.ensure_active_fits(n)?;
        let offset = self.chunks[idx]
            .as_ref()
            .expect("active chunk is live")
            .cursor();
        self.pending = Some(Reservation {
            chunk: idx,
            offset,
            len: n,
        });
        let chunk = self.chunks[idx].as_mut().expect("active chunk is live");
        Ok(chunk.window_mut(offset, n))
    }

    /// Finalizes the most recent reservation as a span of `written` bytes.
    ///
    /// `written == 0` discards the reservation without producing a span.
    /// With a bounded queue at capacity this fails [`FeedError::QueueFull`]
    /// and leaves the reservation open, so the caller can drain and retry.
    ///
    /// # Panics
    ///
    /// Panics when there is no open reservation or `written` exceeds the
    /// reserved length; both are producer contract violations.
    pub fn commit(&mut self, written: usize) -> FeedResult<()> {
        let reservation = self.pending.expect("commit without a prior reserve");
        assert!(
            written <= reservation.len,
            "committed {written} bytes exceed the {} reserved",
            reservation.len
        );

        if written == 0 {
            self.pending = None;
            log::trace!("reservation discarded (zero bytes committed)");
            return Ok(());
        }
        if self.config.queue_capacity > 0 && self.queue.len() >= self.config.queue_capacity {
            return Err(FeedError::QueueFull {
                capacity: self.config.queue_capacity,
            });
        }
        self.pending = None;

        let idx = reservation.chunk;
        let full = {
            let chunk = self.chunks[idx].as_mut().expect("reserved chunk is live");
            chunk.commit(written);
            chunk.state() == ChunkState::Full
        };
        self.queue.push_back(Span {
            chunk: idx as u32,
            offset: reservation.offset as u32,
            len: written as u32,
        });
        self.bytes_written += written as u64;
        self.spans_committed += 1;

        if full && self.config.seal_on_full {
            if let Some(chunk) = self.chunks[idx].as_mut() {
                chunk.seal();
            }
            if self.active == Some(idx) {
                self.active = None;
            }
            log::debug!("chunk {idx} sealed (full)");
            self.maybe_release(idx);
        }
        Ok(())
    }

    /// Removes and returns all queued spans in commit order.
    pub fn drain(&mut self) -> Vec<Span> {
        self.queue.drain(..).collect()
    }

    /// Reads the committed bytes a span points at.
    ///
    /// # Panics
    ///
    /// Panics when the span references a released chunk or reaches outside
    /// its chunk's committed region.
    pub fn span_bytes(&self, span: Span) -> &[u8] {
        let chunk = self
            .chunks
            .get(span.chunk as usize)
            .and_then(|slot| slot.as_ref())
            .unwrap_or_else(|| panic!("span references released chunk {}", span.chunk));
        chunk.committed_slice(span.offset as usize, span.len as usize)
    }

    /// Returns a consumed span to the feed's bookkeeping.
    ///
    /// A chunk's memory goes back to the allocator once it is sealed and
    /// every span it ever contained has been released.
    pub fn release(&mut self, span: Span) {
        let idx = span.chunk as usize;
        let chunk = self
            .chunks
            .get_mut(idx)
            .and_then(|slot| slot.as_mut())
            .unwrap_or_else(|| panic!("span references released chunk {}", span.chunk));
        chunk.release_span();
        self.maybe_release(idx);
    }

    /// Seals the active chunk so no further reservations land in it.
    ///
    /// This is the explicit application action required to retire a full
    /// chunk when `seal_on_full` is disabled; any open reservation is
    /// abandoned.
    pub fn seal_active(&mut self) {
        self.pending = None;
        self.retire_active();
    }

    /// Snapshot of the feed's counters and gauges.
    pub fn stats(&self) -> FeedStats {
        FeedStats {
            bytes_written: self.bytes_written,
            spans_committed: self.spans_committed,
            chunks: self.chunks.iter().filter(|slot| slot.is_some()).count() as u32,
            pending_spans: self.queue.len() as u32,
        }
    }

    /// Bytes held across all unreleased chunks.
    pub fn resident_bytes(&self) -> usize {
        self.chunks
            .iter()
            .filter_map(|slot| slot.as_ref())
            .map(Chunk::capacity)
            .sum()
    }

    fn ensure_active_fits(&mut self, n: usize) -> FeedResult<usize> {
        if let Some(idx) = self.active {
            let (remaining, state) = {
                let chunk = self.chunks[idx].as_ref().expect("active chunk is live");
                (chunk.remaining(), chunk.state())
            };
            if state == ChunkState::Active && remaining >= n {
                return Ok(idx);
            }
            // Partially free space under the block policy: refuse rather
            // than strand the tail. A completely full chunk cannot grow in
            // place, so it forces a replacement under either policy.
            if state == ChunkState::Active
                && remaining > 0
                && self.config.growth == GrowthPolicy::Block
            {
                return Err(FeedError::WouldBlock { requested: n });
            }
        }
        self.activate_new_chunk(n)
    }

    fn activate_new_chunk(&mut self, n: usize) -> FeedResult<usize> {
        let spare_pos = self.spare.iter().position(|&idx| {
            self.chunks[idx]
                .as_ref()
                .map_or(false, |chunk| chunk.capacity() >= n)
        });
        let next = match spare_pos {
            Some(pos) => self.spare.remove(pos),
            None => {
                let size = self.config.chunk_size.max(n);
                if self.config.max_bytes > 0 && self.resident_bytes() + size > self.config.max_bytes
                {
                    return Err(FeedError::CapacityExceeded {
                        requested: size,
                        max_bytes: self.config.max_bytes,
                    });
                }
                let region = ChunkRegion::new(size)?;
                let idx = self.chunks.len();
                log::debug!("allocated chunk {idx} ({size} bytes)");
                self.chunks.push(Some(Chunk::new(region)));
                idx
            }
        };
        self.retire_active();
        self.active = Some(next);
        Ok(next)
    }

    /// Seals and possibly releases the chunk being replaced. A chunk taken
    /// out of the active slot can never accept reservations again.
    fn retire_active(&mut self) {
        if let Some(idx) = self.active.take() {
            if let Some(chunk) = self.chunks[idx].as_mut() {
                chunk.seal();
            }
            log::debug!("chunk {idx} sealed");
            self.maybe_release(idx);
        }
    }

    fn maybe_release(&mut self, idx: usize) {
        let ready = self.chunks[idx]
            .as_ref()
            .map_or(false, |chunk| {
                chunk.state() == ChunkState::Sealed && chunk.live_spans() == 0
            });
        if ready {
            self.chunks[idx] = None;
            log::debug!("chunk {idx} released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(config: FeedConfig) -> SpanFeed {
        SpanFeed::new(config).expect("create feed")
    }

    fn write_span(feed: &mut SpanFeed, payload: &[u8]) -> Span {
        let window = feed.reserve(payload.len()).expect("reserve");
        window[..payload.len()].copy_from_slice(payload);
        feed.commit(payload.len()).expect("commit");
        *feed
            .drain()
            .last()
            .expect("committed span must be queued")
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let result = SpanFeed::new(FeedConfig {
            chunk_size: 0,
            ..FeedConfig::default()
        });
        assert!(matches!(result, Err(FeedError::InvalidConfig(_))));
    }

    #[test]
    fn block_policy_refuses_partial_fit() {
        let mut feed = feed(FeedConfig {
            chunk_size: 16,
            initial_chunks: 1,
            growth: GrowthPolicy::Block,
            ..FeedConfig::default()
        });

        feed.reserve(10).expect("first reservation fits");
        feed.commit(10).expect("commit");

        // Only 6 bytes remain; no allocation happens under block.
        assert_eq!(
            feed.reserve(10).err(),
            Some(FeedError::WouldBlock { requested: 10 })
        );
        assert_eq!(feed.resident_bytes(), 16);
    }

    #[test]
    fn full_chunk_is_sealed_and_replaced_transparently() {
        let mut feed = feed(FeedConfig {
            chunk_size: 8,
            initial_chunks: 1,
            ..FeedConfig::default()
        });

        let window = feed.reserve(8).expect("reserve");
        window.copy_from_slice(b"12345678");
        feed.commit(8).expect("commit");

        // The sealed chunk stays resident (its span is live); the next
        // reservation lands in a fresh chunk.
        let window = feed.reserve(4).expect("reserve after seal");
        window.copy_from_slice(b"abcd");
        feed.commit(4).expect("commit");

        let spans = feed.drain();
        assert_eq!(spans.len(), 2);
        assert_ne!(spans[0].chunk, spans[1].chunk);
        assert_eq!(feed.span_bytes(spans[0]), b"12345678");
        assert_eq!(feed.span_bytes(spans[1]), b"abcd");
    }

    #[test]
    fn residency_cap_is_enforced_without_side_effects() {
        let mut feed = feed(FeedConfig {
            chunk_size: 8,
            initial_chunks: 1,
            max_bytes: 16,
            ..FeedConfig::default()
        });

        for _ in 0..2 {
            let window = feed.reserve(8).expect("reserve");
            window.copy_from_slice(&[0xAB; 8]);
            feed.commit(8).expect("commit");
        }
        assert_eq!(feed.resident_bytes(), 16);

        // A third chunk would make 24 resident bytes.
        assert_eq!(
            feed.reserve(1).err(),
            Some(FeedError::CapacityExceeded {
                requested: 8,
                max_bytes: 16,
            })
        );
        assert_eq!(feed.resident_bytes(), 16);

        // Releasing the first chunk's span frees room to continue.
        let spans = feed.drain();
        feed.release(spans[0]);
        assert_eq!(feed.resident_bytes(), 8);
        feed.reserve(1).expect("reserve fits after release");
    }

    #[test]
    fn drain_preserves_commit_order() {
        let mut feed = feed(FeedConfig {
            chunk_size: 32,
            initial_chunks: 1,
            ..FeedConfig::default()
        });

        for byte in 0u8..5 {
            let window = feed.reserve(3).expect("reserve");
            window.fill(byte);
            feed.commit(3).expect("commit");
        }

        let spans = feed.drain();
        assert_eq!(spans.len(), 5);
        for (i, span) in spans.iter().enumerate() {
            assert_eq!(span.offset, (i * 3) as u32);
            assert!(feed.span_bytes(*span).iter().all(|b| *b == i as u8));
        }
        assert!(feed.drain().is_empty());
    }

    #[test]
    fn bounded_queue_reports_full_and_recovers() {
        let mut feed = feed(FeedConfig {
            chunk_size: 64,
            initial_chunks: 1,
            queue_capacity: 2,
            ..FeedConfig::default()
        });

        for _ in 0..2 {
            feed.reserve(4).expect("reserve");
            feed.commit(4).expect("commit");
        }

        feed.reserve(4).expect("reserve");
        assert_eq!(
            feed.commit(4).err(),
            Some(FeedError::QueueFull { capacity: 2 })
        );

        // The reservation stayed open: drain, then the same commit lands.
        assert_eq!(feed.drain().len(), 2);
        feed.commit(4).expect("commit after drain");
        assert_eq!(feed.drain().len(), 1);
    }

    #[test]
    fn partial_commit_reuses_the_tail() {
        let mut feed = feed(FeedConfig {
            chunk_size: 16,
            initial_chunks: 1,
            ..FeedConfig::default()
        });

        let window = feed.reserve(10).expect("reserve");
        window[..4].copy_from_slice(b"text");
        feed.commit(4).expect("commit");

        // Cursor advanced by the written length only.
        let span = feed.drain()[0];
        assert_eq!((span.offset, span.len), (0, 4));

        let window = feed.reserve(12).expect("tail is reusable");
        window.fill(b'x');
        feed.commit(12).expect("commit");
        assert_eq!(feed.drain()[0].offset, 4);
    }

    #[test]
    fn zero_commit_discards_reservation() {
        let mut feed = feed(FeedConfig::default());
        feed.reserve(100).expect("reserve");
        feed.commit(0).expect("commit nothing");
        assert!(feed.drain().is_empty());
        assert_eq!(feed.stats().spans_committed, 0);
    }

    #[test]
    fn abandoned_reservation_is_overwritten() {
        let mut feed = feed(FeedConfig {
            chunk_size: 16,
            initial_chunks: 1,
            ..FeedConfig::default()
        });

        feed.reserve(8).expect("reserve");
        // Never committed; the next reserve starts at the same cursor.
        let window = feed.reserve(8).expect("reserve again");
        window.copy_from_slice(b"payload!");
        feed.commit(8).expect("commit");
        assert_eq!(feed.drain()[0].offset, 0);
    }

    #[test]
    fn chunks_release_once_sealed_and_drained() {
        let mut feed = feed(FeedConfig {
            chunk_size: 8,
            initial_chunks: 1,
            ..FeedConfig::default()
        });

        let span_a = {
            let window = feed.reserve(8).expect("reserve");
            window.copy_from_slice(b"aaaaaaaa");
            feed.commit(8).expect("commit");
            feed.drain()[0]
        };
        assert_eq!(feed.stats().chunks, 1);

        // Touch a second chunk so the feed stays usable.
        feed.reserve(2).expect("reserve");
        feed.commit(2).expect("commit");
        assert_eq!(feed.stats().chunks, 2);

        feed.release(span_a);
        assert_eq!(feed.stats().chunks, 1, "sealed and drained chunk is gone");
    }

    #[test]
    #[should_panic(expected = "released chunk")]
    fn stale_span_read_panics() {
        let mut feed = feed(FeedConfig {
            chunk_size: 8,
            initial_chunks: 1,
            ..FeedConfig::default()
        });
        let window = feed.reserve(8).expect("reserve");
        window.copy_from_slice(b"zzzzzzzz");
        feed.commit(8).expect("commit");
        let span = feed.drain()[0];
        feed.release(span);
        feed.span_bytes(span);
    }

    #[test]
    fn deferred_seal_requires_explicit_action() {
        let mut feed = feed(FeedConfig {
            chunk_size: 8,
            initial_chunks: 1,
            seal_on_full: false,
            ..FeedConfig::default()
        });

        feed.reserve(8).expect("reserve");
        feed.commit(8).expect("commit");
        let span = feed.drain()[0];

        // Chunk is full but unsealed; releasing its span does not free it.
        feed.release(span);
        assert_eq!(feed.stats().chunks, 1);

        feed.seal_active();
        assert_eq!(feed.stats().chunks, 0);
    }

    #[test]
    fn stats_snapshot_tracks_counters_and_gauges() {
        let mut feed = feed(FeedConfig {
            chunk_size: 32,
            initial_chunks: 1,
            ..FeedConfig::default()
        });

        let span = write_span(&mut feed, b"hello");
        let stats = feed.stats();
        assert_eq!(stats.bytes_written, 5);
        assert_eq!(stats.spans_committed, 1);
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.pending_spans, 0, "drained by write_span");
        assert_eq!(feed.span_bytes(span), b"hello");

        feed.reserve(3).expect("reserve");
        feed.commit(3).expect("commit");
        assert_eq!(feed.stats().pending_spans, 1);
    }

    #[test]
    fn oversized_reservation_grows_a_dedicated_chunk() {
        let mut feed = feed(FeedConfig {
            chunk_size: 16,
            initial_chunks: 1,
            ..FeedConfig::default()
        });

        let window = feed.reserve(100).expect("oversized reserve grows");
        window.fill(b'q');
        feed.commit(100).expect("commit");

        let span = feed.drain()[0];
        assert_eq!(span.len, 100);
        assert_eq!(feed.span_bytes(span).len(), 100);
    }
}
