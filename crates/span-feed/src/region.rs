//! Aligned backing memory for chunks.
//!
//! Native targets prefer anonymous `mmap` regions (page aligned, zeroed by
//! the kernel). When the mapping is not suitably aligned, or on targets
//! without `mmap`, allocation falls back to the heap while honoring the
//! requested alignment. The unsafe surface stays inside this module.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use crate::error::{FeedError, FeedResult};

/// Alignment applied to every chunk region.
pub const CHUNK_ALIGNMENT: usize = 64;

#[derive(Debug)]
enum Backing {
    #[cfg(not(target_arch = "wasm32"))]
    Mapped(memmap2::MmapMut),
    Heap {
        ptr: NonNull<u8>,
        layout: Layout,
    },
}

/// Fixed-length aligned byte region owned by exactly one chunk.
#[derive(Debug)]
pub struct ChunkRegion {
    len: usize,
    backing: Backing,
}

impl ChunkRegion {
    /// Allocates a zeroed region of `len` bytes.
    pub fn new(len: usize) -> FeedResult<Self> {
        debug_assert!(len > 0, "chunk regions are never empty");

        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Some(backing) = Self::mmap_backed(len)? {
                return Ok(Self { len, backing });
            }
        }

        Self::heap_backed(len)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn mmap_backed(len: usize) -> FeedResult<Option<Backing>> {
        let mut map = memmap2::MmapOptions::new()
            .len(len)
            .map_anon()
            .map_err(|_| FeedError::AllocationFailed {
                size: len,
                alignment: CHUNK_ALIGNMENT,
            })?;

        if map.as_mut_ptr() as usize % CHUNK_ALIGNMENT != 0 {
            return Ok(None);
        }
        Ok(Some(Backing::Mapped(map)))
    }

    fn heap_backed(len: usize) -> FeedResult<Self> {
        let layout = Layout::from_size_align(len, CHUNK_ALIGNMENT).map_err(|_| {
            FeedError::AllocationFailed {
                size: len,
                alignment: CHUNK_ALIGNMENT,
            }
        })?;

        // SAFETY: layout has non-zero size and a valid power-of-two alignment.
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(FeedError::AllocationFailed {
            size: len,
            alignment: CHUNK_ALIGNMENT,
        })?;

        Ok(Self {
            len,
            backing: Backing::Heap { ptr, layout },
        })
    }

    /// Total number of bytes in the region.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the region holds no bytes. Never the case for live chunks.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Views the full region immutably.
    pub fn as_slice(&self) -> &[u8] {
        match &self.backing {
            #[cfg(not(target_arch = "wasm32"))]
            Backing::Mapped(map) => &map[..],
            // SAFETY: the allocation is live for `self`'s lifetime and spans
            // exactly `len` initialised (zeroed) bytes.
            Backing::Heap { ptr, .. } => unsafe {
                std::slice::from_raw_parts(ptr.as_ptr(), self.len)
            },
        }
    }

    /// Views the full region mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.backing {
            #[cfg(not(target_arch = "wasm32"))]
            Backing::Mapped(map) => &mut map[..],
            // SAFETY: `&mut self` guarantees unique access to the allocation.
            Backing::Heap { ptr, .. } => unsafe {
                std::slice::from_raw_parts_mut(ptr.as_ptr(), self.len)
            },
        }
    }
}

impl Drop for ChunkRegion {
    fn drop(&mut self) {
        if let Backing::Heap { ptr, layout } = &self.backing {
            // SAFETY: pointer and layout come from the matching alloc call.
            unsafe { dealloc(ptr.as_ptr(), *layout) };
        }
    }
}
