// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Consistency checks: cycle detection on each free list, back-link
//! agreement, and boundary-tag agreement across every chunk. Grounded in
//! `myMalloc.c`'s `detect_cycles` (Floyd's tortoise-and-hare) and
//! `verify_pointers`/`verify_chunk`, rendered as a non-fatal `bool` report
//! rather than the process-aborting diagnostic `free` uses for double-free —
//! corruption *detected while allocating* is a bug to report, not grounds to
//! abort a caller who never touched the block in question.

use crate::arena::RawMemorySource;
use crate::context::Allocator;
use crate::freelist::N_LISTS;
use crate::header::{get_right_header, Header, State};

impl<S: RawMemorySource> Allocator<S> {
    /// Run every consistency check and report whether all of them passed.
    /// Failures are logged individually via `log::error!` before this
    /// returns `false`.
    pub fn verify(&mut self) -> bool {
        let mut ok = true;
        for class in 0..N_LISTS {
            let sentinel = self.index.sentinel(class);
            if detect_cycle(sentinel) {
                log::error!("cycle detected in free list class {class}");
                ok = false;
            }
            if !check_back_links(sentinel) {
                log::error!("back-link mismatch in free list class {class}");
                ok = false;
            }
        }
        if !self.check_chunk_tags() {
            ok = false;
        }
        ok
    }

    /// Walk every acquired chunk's interior and confirm each block's size
    /// agrees with its right neighbour's recorded `left_size`, per
    /// `myMalloc.c`'s `verify_chunk`.
    fn check_chunk_tags(&mut self) -> bool {
        let mut ok = true;
        for &left_fp in self.chunks.iter() {
            let mut cur = unsafe { get_right_header(left_fp) };
            loop {
                let size = unsafe { (*cur).get_size() };
                if unsafe { (*cur).get_state() } == State::Fencepost {
                    break;
                }
                let right = unsafe { get_right_header(cur) };
                if unsafe { (*right).left_size } != size {
                    log::error!(
                        "boundary tag mismatch: block at {:p} has size {} but its right neighbour records left_size {}",
                        cur,
                        size,
                        unsafe { (*right).left_size }
                    );
                    ok = false;
                }
                cur = right;
            }
        }
        ok
    }
}

/// Floyd's tortoise-and-hare over a circular list anchored at `sentinel`.
/// Every well-formed free list is itself a cycle back to `sentinel`, so this
/// checks for a *second*, unexpected cycle — i.e. a `next` pointer that loops
/// back to some node other than by completing the full circuit. A detected
/// short cycle fails to ever reach `sentinel` again, which is what the
/// tortoise/hare meeting (without first reaching `sentinel`) flags.
///
/// # Safety
/// `sentinel` must be a valid, currently-initialized list anchor.
fn detect_cycle(sentinel: *mut Header) -> bool {
    let mut slow = sentinel;
    let mut fast = sentinel;
    loop {
        slow = unsafe { (*slow).next };
        fast = unsafe { (*(*fast).next).next };
        if slow == sentinel || fast == sentinel {
            return false;
        }
        if slow == fast {
            return true;
        }
    }
}

/// Confirm every node's `next.prev == self` and `prev.next == self`.
///
/// # Safety
/// `sentinel` must be a valid, currently-initialized list anchor.
fn check_back_links(sentinel: *mut Header) -> bool {
    let mut cur = sentinel;
    loop {
        let next = unsafe { (*cur).next };
        if unsafe { (*next).prev } != cur {
            return false;
        }
        cur = next;
        if cur == sentinel {
            return true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{BumpArenaSource, ARENA_SIZE};

    fn fresh() -> Allocator<BumpArenaSource<{ 8 * ARENA_SIZE }>> {
        Allocator::new(BumpArenaSource::new())
    }

    #[test]
    fn fresh_allocator_verifies_clean() {
        let mut a = fresh();
        assert!(a.verify());
    }

    #[test]
    fn verify_holds_through_alloc_free_churn() {
        let mut a = fresh();
        let mut live = alloc::vec::Vec::new();
        for _ in 0..20 {
            live.push(a.allocate(40));
        }
        for (i, p) in live.into_iter().enumerate() {
            if i % 2 == 0 {
                a.free(p);
            }
        }
        assert!(a.verify());
    }

    #[test]
    fn detect_cycle_is_false_on_well_formed_empty_list() {
        let mut idx = crate::freelist::FreeListIndex::new();
        let sentinel = idx.sentinel(0);
        assert!(!detect_cycle(sentinel));
        assert!(check_back_links(sentinel));
    }
}
