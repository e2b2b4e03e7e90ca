//! Chunk lifecycle bookkeeping.
//!
//! A chunk moves Active → Full → Sealed and never reverses. Release is
//! represented by dropping the chunk from the feed's table once it is
//! sealed and every span it ever contained has been given back.

use crate::region::ChunkRegion;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChunkState {
    /// Accepting reservations.
    Active,
    /// Capacity reached; awaiting seal.
    Full,
    /// No further reservations; eligible for release once drained.
    Sealed,
}

pub(crate) struct Chunk {
    region: ChunkRegion,
    cursor: usize,
    state: ChunkState,
    live_spans: u32,
}

impl Chunk {
    pub(crate) fn new(region: ChunkRegion) -> Self {
        Self {
            region,
            cursor: 0,
            state: ChunkState::Active,
            live_spans: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.region.len()
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn remaining(&self) -> usize {
        self.capacity() - self.cursor
    }

    pub(crate) fn state(&self) -> ChunkState {
        self.state
    }

    pub(crate) fn live_spans(&self) -> u32 {
        self.live_spans
    }

    /// Advances the write cursor past a committed span and counts it live.
    pub(crate) fn commit(&mut self, written: usize) {
        debug_assert!(written <= self.remaining(), "commit past chunk capacity");
        self.cursor += written;
        self.live_spans += 1;
        if self.remaining() == 0 && self.state == ChunkState::Active {
            self.state = ChunkState::Full;
        }
    }

    pub(crate) fn seal(&mut self) {
        self.state = ChunkState::Sealed;
    }

    pub(crate) fn release_span(&mut self) {
        assert!(self.live_spans > 0, "span released twice");
        self.live_spans -= 1;
    }

    /// Writable window for an open reservation.
    pub(crate) fn window_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.region.as_mut_slice()[offset..offset + len]
    }

    /// Read access to a committed byte range.
    ///
    /// # Panics
    ///
    /// Panics when the range reaches past the committed region; spans never
    /// reference unwritten bytes.
    pub(crate) fn committed_slice(&self, offset: usize, len: usize) -> &[u8] {
        assert!(
            offset + len <= self.cursor,
            "span [{offset}, {}) outside committed region of {} bytes",
            offset + len,
            self.cursor
        );
        &self.region.as_slice()[offset..offset + len]
    }
}
