// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Process-wide allocator state.
//!
//! Bundles the sentinel array, the pointer to the last chunk's right
//! fencepost, the diagnostic chunk list, and the raw memory source behind
//! one struct — the Rust-idiomatic rendering of §5/§9's "global mutable
//! state... a language-idiomatic rendering may make the context explicit and
//! pass it." [`Allocator`] is that explicit context; [`crate::global`] wraps
//! one instance in the process-wide mutex the spec also allows.

use alloc::vec::Vec;

use crate::arena::RawMemorySource;
use crate::fencepost::insert_fenceposts;
use crate::freelist::FreeListIndex;
use crate::header::Header;

/// A fully self-contained allocator instance: the sentinel array, chunk
/// bookkeeping, and the raw memory source it grows from. Not `Sync` on its
/// own (raw pointers) — [`crate::global`] is what makes one instance safe to
/// share across threads, by serializing access with a single mutex.
pub struct Allocator<S: RawMemorySource> {
    pub(crate) source: S,
    pub(crate) index: FreeListIndex,
    /// Right fencepost of the most recently acquired chunk. Used to detect
    /// whether the next chunk acquired is contiguous with it.
    pub(crate) last_fencepost: *mut Header,
    /// Base (left fencepost) of every chunk acquired so far, oldest first —
    /// kept only for `verify()`'s boundary-tag walk, mirroring `myMalloc.c`'s
    /// `osChunkList`.
    pub(crate) chunks: Vec<*mut Header>,
}

// Safety: every field is either `Send` in its own right or a raw pointer
// only ever touched while the owning mutex in `crate::global` is held.
unsafe impl<S: RawMemorySource + Send> Send for Allocator<S> {}

impl<S: RawMemorySource> Allocator<S> {
    /// Acquire the first chunk from `source` and prepare the free-list index
    /// around it. Mirrors `myMalloc.c`'s `init()` constructor.
    pub fn new(mut source: S) -> Self {
        let mut index = FreeListIndex::new();

        let mem = source.acquire_raw(crate::arena::ARENA_SIZE);
        assert!(!mem.is_null(), "raw memory source exhausted on first chunk");

        let interior = unsafe { insert_fenceposts(mem, crate::arena::ARENA_SIZE) };
        unsafe { index.insert(interior) };

        let left_fencepost = mem as *mut Header;
        let last_fencepost = unsafe { crate::header::get_right_header(interior) };

        Self {
            source,
            index,
            last_fencepost,
            chunks: alloc::vec![left_fencepost],
        }
    }
}
