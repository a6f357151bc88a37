// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! The raw-memory source: `acquire_raw(size) -> address`, abstracted behind
//! a trait the way `kernel-alloc`'s `FrameAlloc`/`PhysMapper` traits
//! abstract physical frame acquisition away from the virtual memory manager
//! that consumes it. Out of scope per the specification: this module names
//! the interface and ships a couple of concrete sources, it does not pick
//! one true implementation for every embedder.

/// Size of a single OS chunk acquired per growth event.
pub const ARENA_SIZE: usize = 4096;

/// A source of fresh, zero-initialized, page-stable memory.
///
/// # Safety
/// Implementations hand out memory the allocator will treat as exclusively
/// owned for the remainder of the process; a returned region must never be
/// reused or moved. `acquire_raw` is called with the allocator's mutex held,
/// so it must not block, perform I/O, or re-enter any public allocator
/// entry point.
pub unsafe trait RawMemorySource {
    /// Acquire `size` fresh bytes, or return null on failure (out-of-memory
    /// is recoverable: callers treat a null return as a normal allocation
    /// failure, not a fatal condition).
    fn acquire_raw(&mut self, size: usize) -> *mut u8;
}

/// Default source for hosted (`std`) builds: each chunk is an independent
/// heap allocation, leaked for the process lifetime (this crate never
/// releases chunks back to the source — see §6, "no munmap/shrink path").
/// Two chunks acquired this way are essentially never byte-adjacent, which
/// exercises the non-adjacent chunk-growth path by construction.
#[cfg(any(test, feature = "std-arena"))]
pub struct HeapArenaSource;

#[cfg(any(test, feature = "std-arena"))]
unsafe impl RawMemorySource for HeapArenaSource {
    fn acquire_raw(&mut self, size: usize) -> *mut u8 {
        let layout = core::alloc::Layout::from_size_align(size, 8).expect("arena layout");
        // Safety: `size` is checked non-zero by callers (ARENA_SIZE > 0);
        // `alloc_zeroed` gives us deterministic contents for diagnostics.
        unsafe { std::alloc::alloc_zeroed(layout) }
    }
}

/// A fixed-capacity bump source carving successive chunks out of one static
/// backing buffer, the `no_std` default — the same "one big static array"
/// shape as `kernel::allocator::AlignedHeap`, except chunks are handed out
/// in strictly increasing address order, which is what a real program break
/// (`sbrk`) guarantees and what makes every growth adjacent to the last by
/// construction.
pub struct BumpArenaSource<const CAPACITY: usize> {
    backing: [u8; CAPACITY],
    cursor: usize,
}

impl<const CAPACITY: usize> BumpArenaSource<CAPACITY> {
    pub const fn new() -> Self {
        Self {
            backing: [0u8; CAPACITY],
            cursor: 0,
        }
    }
}

impl<const CAPACITY: usize> Default for BumpArenaSource<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<const CAPACITY: usize> RawMemorySource for BumpArenaSource<CAPACITY> {
    fn acquire_raw(&mut self, size: usize) -> *mut u8 {
        if self.cursor + size > CAPACITY {
            return core::ptr::null_mut();
        }
        let ptr = unsafe { self.backing.as_mut_ptr().add(self.cursor) };
        self.cursor += size;
        ptr
    }
}

/// A bump source over memory the caller owns for `'static`, given as a raw
/// pointer and length rather than an inline array field. Used for the
/// process-wide `no_std` default, where the backing storage has to live
/// directly in a `static` instead of being constructed as a (potentially
/// megabyte-sized) stack value and moved into place — the same "one big
/// static array, no runtime construction" shape as `kernel::allocator::
/// AlignedHeap`, applied to a source that doesn't own its array inline.
pub struct StaticArenaSource {
    base: *mut u8,
    capacity: usize,
    cursor: usize,
}

impl StaticArenaSource {
    /// # Safety
    /// `base` must point to `capacity` writable bytes, valid for `'static`
    /// and not aliased by any other live reference for as long as this
    /// source exists.
    pub const unsafe fn new(base: *mut u8, capacity: usize) -> Self {
        Self {
            base,
            capacity,
            cursor: 0,
        }
    }
}

// Safety: `base` points into a `'static` array this source is the sole
// accessor of for its lifetime; the pointer carries no thread-local state.
unsafe impl Send for StaticArenaSource {}

unsafe impl RawMemorySource for StaticArenaSource {
    fn acquire_raw(&mut self, size: usize) -> *mut u8 {
        if self.cursor + size > self.capacity {
            return core::ptr::null_mut();
        }
        let ptr = unsafe { self.base.add(self.cursor) };
        self.cursor += size;
        ptr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_source_hands_out_adjacent_chunks() {
        let mut src: BumpArenaSource<{ 4 * ARENA_SIZE }> = BumpArenaSource::new();
        let a = src.acquire_raw(ARENA_SIZE);
        let b = src.acquire_raw(ARENA_SIZE);
        assert!(!a.is_null() && !b.is_null());
        assert_eq!(unsafe { a.add(ARENA_SIZE) }, b);
    }

    #[test]
    fn bump_source_exhausts_to_null() {
        let mut src: BumpArenaSource<{ ARENA_SIZE }> = BumpArenaSource::new();
        assert!(!src.acquire_raw(ARENA_SIZE).is_null());
        assert!(src.acquire_raw(ARENA_SIZE).is_null());
    }

    #[test]
    #[allow(static_mut_refs)]
    fn static_source_hands_out_adjacent_chunks_from_provided_storage() {
        static mut BACKING: [u8; 2 * ARENA_SIZE] = [0u8; 2 * ARENA_SIZE];
        let mut src = unsafe { StaticArenaSource::new(BACKING.as_mut_ptr(), BACKING.len()) };
        let a = src.acquire_raw(ARENA_SIZE);
        let b = src.acquire_raw(ARENA_SIZE);
        assert!(!a.is_null() && !b.is_null());
        assert_eq!(unsafe { a.add(ARENA_SIZE) }, b);
        assert!(src.acquire_raw(1).is_null());
    }

    #[test]
    fn heap_source_chunks_are_not_reliably_adjacent() {
        let mut src = HeapArenaSource;
        let a = src.acquire_raw(ARENA_SIZE);
        let b = src.acquire_raw(ARENA_SIZE);
        assert!(!a.is_null() && !b.is_null());
        // Not asserted equal/unequal on purpose: the point of this source is
        // that adjacency is the allocator's problem to detect, not to assume.
        let _ = (a, b);
    }
}
