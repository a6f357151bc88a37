// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! A segregated-fit, boundary-tagged dynamic memory allocator.
//!
//! Blocks carry a boundary tag (`size`+`state` packed into one word, plus
//! `left_size` for O(1) backward traversal — see [`header`]). Free blocks
//! are indexed by size class in [`freelist`]; fenceposts ([`fencepost`])
//! bracket every chunk acquired from a pluggable [`arena::RawMemorySource`]
//! so coalescing never walks off the end of one chunk into another. One
//! [`context::Allocator`] instance holds all of this; [`global`] wraps a
//! single process-wide instance behind `spin::Mutex` the way the teacher
//! kernel's heap (`THE_HEAP`) is a single mutex-guarded global.
//!
//! Every public entry point is satisfied by at most two outcomes: success,
//! or `null`/no-op for the recoverable cases (`allocate(0)`, out-of-memory).
//! Double-free and structural corruption are fatal and abort the process —
//! see [`dealloc`] and [`verify`].

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod arena;
mod context;
mod fencepost;
mod freelist;
pub mod header;

mod alloc_engine;
mod dealloc;
mod verify;

pub mod global;

pub use arena::{RawMemorySource, ARENA_SIZE};
pub use context::Allocator;
pub use freelist::{class_of, LAST_CLASS_THRESHOLD, N_LISTS};
pub use header::{ALLOC_HEADER_SIZE, MIN_BLOCK};

/// Allocate `n` bytes from the process-wide allocator. Returns null for
/// `n == 0` or when the raw memory source is exhausted.
pub fn allocate(n: usize) -> *mut u8 {
    global::with(|ctx| ctx.allocate(n))
}

/// Allocate space for `count` elements of `elem_size` bytes each, zeroed.
/// Returns null on `count * elem_size` overflow, a zero-size request, or
/// out-of-memory.
pub fn zero_alloc(count: usize, elem_size: usize) -> *mut u8 {
    global::with(|ctx| ctx.zero_alloc(count, elem_size))
}

/// Resize a previous allocation, preserving `min(old, new)` payload bytes.
/// `p == null` behaves like [`allocate`]; `new_size == 0` behaves like
/// [`free`] and returns null.
pub fn reallocate(p: *mut u8, new_size: usize) -> *mut u8 {
    global::with(|ctx| ctx.reallocate(p, new_size))
}

/// Free a payload pointer previously returned by [`allocate`], [`zero_alloc`],
/// or [`reallocate`]. Null is a no-op. Freeing an already-free pointer is a
/// fatal corruption condition: this logs at `error!` and aborts the process.
pub fn free(p: *mut u8) {
    global::with(|ctx| ctx.free(p))
}

/// Run every internal consistency check (free-list cycle detection,
/// back-link agreement, boundary-tag agreement across every chunk) and
/// report whether they all passed. Unlike [`free`]'s double-free check,
/// a failure here is reported, not fatal — callers decide what to do with
/// the result.
pub fn verify() -> bool {
    global::with(|ctx| ctx.verify())
}
