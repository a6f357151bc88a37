// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Segregated free-list index.
//!
//! `N_LISTS` circular doubly-linked lists, each anchored on a sentinel
//! [`Header`] living in a fixed array — the same "sentinel array, nodes own
//! themselves" shape `cmpctmalloc` uses for its `free_lists: Mutex<Vec<*mut
//! FreeBlock>>` bucket heads, except here the sentinel is a full `Header`
//! node rather than a raw pointer, so insert/remove never have to special
//! case an empty bucket.

use crate::header::{Header, State};

/// Number of size classes. Lists `0..N_LISTS-1` are "pure" (every block in
/// them has exactly one size); the last list is a mixed class holding every
/// block at or above its threshold.
pub const N_LISTS: usize = 59;

/// `(N_LISTS + 2) * 8`: the smallest size that falls in the mixed last
/// class, and the in-place-update threshold used by the allocation and
/// deallocation engines.
pub const LAST_CLASS_THRESHOLD: usize = (N_LISTS + 2) * 8;

/// Size-class index for a block of size `s`. Classes `0..N_LISTS-1` hold
/// exactly size `(i+3)*8`; class `N_LISTS-1` is the mixed class.
#[inline]
pub fn class_of(size: usize) -> usize {
    let raw = (size / 8).wrapping_sub(3);
    raw.min(N_LISTS - 1)
}

/// `N_LISTS` sentinel nodes, one per size class. Each sentinel's `next`
/// initially points to itself: an empty circular list.
pub struct FreeListIndex {
    sentinels: [Header; N_LISTS],
}

impl FreeListIndex {
    /// Build an index of `N_LISTS` empty circular lists.
    pub fn new() -> Self {
        // Headers are POD; build one self-looped sentinel and arrange an
        // array of them, then fix up each `next`/`prev` to point at itself
        // (an array initializer can't easily self-reference its elements).
        let mut sentinels: [Header; N_LISTS] = unsafe { core::mem::zeroed() };
        for s in sentinels.iter_mut() {
            let ptr: *mut Header = s;
            s.next = ptr;
            s.prev = ptr;
        }
        Self { sentinels }
    }

    #[inline]
    pub fn sentinel(&mut self, class: usize) -> *mut Header {
        &mut self.sentinels[class]
    }

    /// Insert `block` at the head of its size class (LIFO within the
    /// class — no ordering by address or size is maintained).
    ///
    /// # Safety
    /// `block` must point to a live `Unallocated`-tagged header not
    /// currently on any list.
    pub unsafe fn insert(&mut self, block: *mut Header) {
        let class = class_of((*block).get_size());
        let sentinel = self.sentinel(class);
        let old_head = (*sentinel).next;
        (*old_head).prev = block;
        (*block).next = old_head;
        (*sentinel).next = block;
        (*block).prev = sentinel;
    }

    /// Unlink `block` from whichever list it is currently on.
    ///
    /// # Safety
    /// `block` must currently be linked into one of this index's lists.
    pub unsafe fn remove(&mut self, block: *mut Header) {
        (*(*block).prev).next = (*block).next;
        (*(*block).next).prev = (*block).prev;
        (*block).next = core::ptr::null_mut();
        (*block).prev = core::ptr::null_mut();
    }

    /// First non-empty class at or above `min_class`, and a pointer to its
    /// head block, if any.
    pub fn first_fit_from(&mut self, min_class: usize) -> Option<(usize, *mut Header)> {
        for class in min_class..N_LISTS {
            let sentinel = self.sentinel(class);
            let head = unsafe { (*sentinel).next };
            if head != sentinel {
                return Some((class, head));
            }
        }
        None
    }

    /// Whether the list at `class` is empty.
    pub fn is_empty(&mut self, class: usize) -> bool {
        let sentinel = self.sentinel(class);
        unsafe { (*sentinel).next == sentinel }
    }
}

impl Default for FreeListIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_of_pure_classes() {
        for i in 0..N_LISTS - 1 {
            let size = (i + 3) * 8;
            assert_eq!(class_of(size), i);
        }
    }

    #[test]
    fn class_of_mixed_class() {
        assert_eq!(class_of(LAST_CLASS_THRESHOLD), N_LISTS - 1);
        assert_eq!(class_of(LAST_CLASS_THRESHOLD + 800), N_LISTS - 1);
    }

    #[test]
    fn fresh_index_has_all_empty_lists() {
        let mut idx = FreeListIndex::new();
        for c in 0..N_LISTS {
            assert!(idx.is_empty(c));
        }
        assert!(idx.first_fit_from(0).is_none());
    }

    #[test]
    fn insert_then_remove_empties_class_again() {
        let mut idx = FreeListIndex::new();
        let mut block = Header_for_test(64);
        let ptr: *mut Header = &mut block;
        unsafe {
            idx.insert(ptr);
            assert!(!idx.is_empty(class_of(64)));
            let (class, head) = idx.first_fit_from(0).unwrap();
            assert_eq!(class, class_of(64));
            assert_eq!(head, ptr);
            idx.remove(ptr);
        }
        assert!(idx.is_empty(class_of(64)));
    }

    // Minimal header builder for list-mechanics tests that never touch
    // neighbour pointer arithmetic.
    #[allow(non_snake_case)]
    fn Header_for_test(size: usize) -> Header {
        let mut h: Header = unsafe { core::mem::zeroed() };
        h.set_size(size);
        h.set_state(State::Unallocated);
        h
    }
}
