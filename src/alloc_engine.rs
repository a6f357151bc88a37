// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Allocation engine.
//!
//! Computes the required block size, searches the segregated index for a
//! fit, splits when profitable, and on exhaustion grows by a fresh chunk
//! from the raw memory source — the same shape as `cmpctmalloc_alloc`'s
//! `size_to_index_allocating` → `find_nonempty_bucket` → `heap_grow` chain,
//! generalized to the boundary-tagged, fencepost-delimited layout this
//! crate uses instead of `cmpctmalloc`'s pointer-tagged one.
//!
//! This module also fixes the two allocation-path bugs the specification's
//! design notes call out in the original C source:
//! - the mixed-last-class in-place split now carves the allocated tail from
//!   the address *after* the shrunk remainder, using the post-shrink size
//!   for the tail's `left_size`;
//! - a mixed-class scan that finds no fit now falls through to chunk growth
//!   uniformly, instead of silently returning nothing.

use crate::arena::{RawMemorySource, ARENA_SIZE};
use crate::context::Allocator;
use crate::fencepost::insert_fenceposts;
use crate::header::{
    get_right_header, get_left_header, payload_of_header, Header, State, ALLOC_HEADER_SIZE,
    MIN_BLOCK,
};
use crate::freelist::{class_of, LAST_CLASS_THRESHOLD, N_LISTS};

#[inline]
fn round_up_8(n: usize) -> usize {
    (n + 7) & !7
}

/// Translate a raw user request into the block size that must be carved,
/// or `None` for the trivial zero-size request.
fn required_block_size(n: usize) -> Option<usize> {
    if n == 0 {
        return None;
    }
    let required = round_up_8(n + ALLOC_HEADER_SIZE);
    Some(required.max(MIN_BLOCK))
}

impl<S: RawMemorySource> Allocator<S> {
    /// Allocate `n` bytes, returning a payload pointer or null if `n == 0`
    /// or the raw memory source is exhausted.
    pub fn allocate(&mut self, n: usize) -> *mut u8 {
        let Some(required) = required_block_size(n) else {
            return core::ptr::null_mut();
        };

        if let Some(ptr) = self.try_pure_classes(required) {
            return ptr;
        }
        if let Some(ptr) = unsafe { self.scan_mixed_class(required) } {
            return ptr;
        }
        unsafe { self.grow_and_allocate(required) }
    }

    /// Zero-initialized allocation: `allocate` followed by a memset over
    /// exactly the requested `count * elem_size` bytes.
    pub fn zero_alloc(&mut self, count: usize, elem_size: usize) -> *mut u8 {
        let Some(n) = count.checked_mul(elem_size) else {
            return core::ptr::null_mut();
        };
        let ptr = self.allocate(n);
        if !ptr.is_null() && n > 0 {
            unsafe { core::ptr::write_bytes(ptr, 0, n) };
        }
        ptr
    }

    /// Reallocate `p` to `new_size` bytes, copying `min(old, new)` bytes of
    /// payload and freeing `p`. `p == null` behaves like `allocate(new_size)`;
    /// `new_size == 0` behaves like `free(p)` followed by returning null —
    /// both are the conventional `realloc` edge cases the spec's own
    /// taxonomy (§7) doesn't otherwise pin down.
    pub fn reallocate(&mut self, p: *mut u8, new_size: usize) -> *mut u8 {
        if p.is_null() {
            return self.allocate(new_size);
        }
        if new_size == 0 {
            self.free(p);
            return core::ptr::null_mut();
        }

        let old_header = unsafe { crate::header::header_of_payload(p) };
        let old_payload_size = unsafe { (*old_header).get_size() } - ALLOC_HEADER_SIZE;

        let new_ptr = self.allocate(new_size);
        if new_ptr.is_null() {
            // Out-of-memory: leave the original allocation untouched.
            return core::ptr::null_mut();
        }

        let copy_len = old_payload_size.min(new_size);
        unsafe { core::ptr::copy_nonoverlapping(p, new_ptr, copy_len) };
        self.free(p);
        new_ptr
    }

    /// Case 1/2: search the pure classes (every class but the last) at or
    /// above `required`'s class for an exact or oversize fit.
    fn try_pure_classes(&mut self, required: usize) -> Option<*mut u8> {
        let start = class_of(required);
        if start >= N_LISTS - 1 {
            return None;
        }
        let (class, head) = self.index.first_fit_from(start)?;
        if class >= N_LISTS - 1 {
            return None;
        }
        let head_size = unsafe { (*head).get_size() };
        Some(if head_size == required {
            unsafe {
                self.index.remove(head);
                (*head).set_state(State::Allocated);
                payload_of_header(head)
            }
        } else {
            unsafe { self.split_for_allocation(head, required, /* relink= */ true) }
        })
    }

    /// Case 3: the mixed last class gets a linear scan with the
    /// remainder-retention rule — a block whose post-split remainder would
    /// still land in the mixed class is shrunk in place instead of unlinked
    /// and relinked.
    ///
    /// # Safety
    /// Must only be called while holding the allocator context exclusively.
    unsafe fn scan_mixed_class(&mut self, required: usize) -> Option<*mut u8> {
        let class = N_LISTS - 1;
        let sentinel = self.index.sentinel(class);
        let mut cur = (*sentinel).next;
        while cur != sentinel {
            let size = (*cur).get_size();
            if size == required {
                self.index.remove(cur);
                (*cur).set_state(State::Allocated);
                return Some(payload_of_header(cur));
            } else if size > required {
                let relink = size - required < LAST_CLASS_THRESHOLD;
                return Some(self.split_for_allocation(cur, required, relink));
            }
            cur = (*cur).next;
        }
        None
    }

    /// Shared split-and-carve step for cases 2 and 3: shrink `block` by
    /// `required` bytes, optionally relinking it into its new (smaller)
    /// class, then carve the allocated tail from the address immediately
    /// after the shrunk block.
    ///
    /// # Safety
    /// `block` must be a live `Unallocated` header not already removed
    /// unless `relink` handling below expects it still linked.
    unsafe fn split_for_allocation(
        &mut self,
        block: *mut Header,
        required: usize,
        relink: bool,
    ) -> *mut u8 {
        if relink {
            self.index.remove(block);
        }
        let remainder = (*block).get_size() - required;
        (*block).set_size(remainder);
        if relink {
            self.index.insert(block);
        }

        let tail = get_right_header(block);
        (*tail).set_size(required);
        (*tail).set_state(State::Allocated);
        (*tail).left_size = remainder;
        let right_of_tail = get_right_header(tail);
        (*right_of_tail).left_size = required;
        payload_of_header(tail)
    }

    /// Growth path: acquire a fresh `ARENA_SIZE` chunk and stitch it to the
    /// previous chunk when the raw source happened to hand back adjacent
    /// memory, then satisfy `required` from the merged (or standalone)
    /// free region.
    ///
    /// # Safety
    /// Must only be called while holding the allocator context exclusively.
    unsafe fn grow_and_allocate(&mut self, required: usize) -> *mut u8 {
        let interior_capacity = ARENA_SIZE - 2 * ALLOC_HEADER_SIZE;
        if required > interior_capacity {
            // A single arena can never satisfy this request; treat like OOM.
            return core::ptr::null_mut();
        }

        let mem = self.source.acquire_raw(ARENA_SIZE);
        if mem.is_null() {
            log::warn!("raw memory source exhausted growing for a {required}-byte request");
            return core::ptr::null_mut();
        }
        log::debug!("grew heap by a new {ARENA_SIZE}-byte chunk at {mem:p}");

        let interior = insert_fenceposts(mem, ARENA_SIZE);
        let new_left_fp = mem as *mut Header;
        let c_size = interior_capacity;

        let prev_right_fp = self.last_fencepost;
        let adjacent = (prev_right_fp as *mut u8).add(ALLOC_HEADER_SIZE) == mem;

        if !adjacent {
            self.chunks.push(new_left_fp);

            let remainder = c_size - required;
            (*interior).set_size(remainder);
            self.index.insert(interior);

            let a = get_right_header(interior);
            (*a).set_size(required);
            (*a).set_state(State::Allocated);
            (*a).left_size = remainder;

            self.last_fencepost = get_right_header(a);
            (*self.last_fencepost).left_size = required;
            return payload_of_header(a);
        }

        let prev_block = get_left_header(prev_right_fp);
        if (*prev_block).get_state() == State::Allocated {
            // The old right fencepost's header cell is reused as the new
            // free block spanning both fenceposts and the fresh interior.
            let n = prev_right_fp;
            let n_size = ALLOC_HEADER_SIZE + ALLOC_HEADER_SIZE + c_size - required;
            (*n).set_size(n_size);
            (*n).set_state(State::Unallocated);
            self.index.insert(n);

            let a = get_right_header(n);
            (*a).set_size(required);
            (*a).set_state(State::Allocated);
            (*a).left_size = n_size;

            self.last_fencepost = get_right_header(a);
            (*self.last_fencepost).left_size = required;
            payload_of_header(a)
        } else {
            let p = prev_block;
            self.index.remove(p);
            let new_size = (*p).get_size() + ALLOC_HEADER_SIZE + ALLOC_HEADER_SIZE + c_size - required;
            (*p).set_size(new_size);
            self.index.insert(p);

            let a = get_right_header(p);
            (*a).set_size(required);
            (*a).set_state(State::Allocated);
            (*a).left_size = new_size;

            self.last_fencepost = get_right_header(a);
            (*self.last_fencepost).left_size = required;
            payload_of_header(a)
        }
    }
}
