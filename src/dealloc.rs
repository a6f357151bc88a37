// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Deallocation engine: double-free detection and the four-way coalescing
//! decision, grounded in `cmpctmalloc::cmpct_free`'s `is_tagged_as_free` /
//! left-right neighbour merge, adapted to boundary tags instead of pointer
//! tagging.

use crate::arena::RawMemorySource;
use crate::context::Allocator;
use crate::freelist::LAST_CLASS_THRESHOLD;
use crate::header::{get_left_header, get_right_header, header_of_payload, State};

impl<S: RawMemorySource> Allocator<S> {
    /// Free a previously allocated payload pointer. A null pointer is a
    /// no-op. Freeing an already-free (or never-allocated) block is a fatal
    /// corruption condition: it is logged and the process aborts, the same
    /// "this state should be impossible" posture `cmpctmalloc` takes on
    /// `is_tagged_as_free(header)` at the top of `cmpct_free`.
    pub fn free(&mut self, p: *mut u8) {
        if p.is_null() {
            return;
        }

        let d = unsafe { header_of_payload(p) };
        let state = unsafe { (*d).get_state() };
        if state != State::Allocated {
            log::error!("double free (or free of a non-heap pointer) at {:p}", p);
            panic!("double free detected at {:p}", p);
        }
        unsafe { (*d).set_state(State::Unallocated) };

        let l = unsafe { get_left_header(d) };
        let r = unsafe { get_right_header(d) };
        let l_free = unsafe { (*l).get_state() == State::Unallocated };
        let r_free = unsafe { (*r).get_state() == State::Unallocated };

        unsafe {
            match (l_free, r_free) {
                (false, false) => self.index.insert(d),
                (false, true) => self.coalesce_right(d, r),
                (true, false) => self.coalesce_left(l, d),
                (true, true) => self.coalesce_both(l, d, r),
            }
        }
    }

    /// Neither neighbour free: `d` alone joins the index.
    /// (Handled inline in `free` — kept as a match arm, no separate fn.)

    /// Left allocated, right free: absorb `r` into `d`.
    ///
    /// # Safety
    /// `d` is a just-freed, unlinked header; `r` is currently linked.
    unsafe fn coalesce_right(&mut self, d: *mut crate::header::Header, r: *mut crate::header::Header) {
        self.index.remove(r);
        let merged = (*d).get_size() + (*r).get_size();
        (*d).set_size(merged);
        let right_of_d = get_right_header(d);
        (*right_of_d).left_size = merged;
        self.index.insert(d);
    }

    /// Left free, right allocated: absorb `d` into `l`, honoring the
    /// mixed-class in-place-growth optimization when `l` is already large
    /// enough that it cannot leave the last class by growing.
    ///
    /// # Safety
    /// `l` is a linked free header immediately left of `d`; `d` is a
    /// just-freed, unlinked header.
    unsafe fn coalesce_left(&mut self, l: *mut crate::header::Header, d: *mut crate::header::Header) {
        let d_size = (*d).get_size();
        let stays_in_place = (*l).get_size() >= LAST_CLASS_THRESHOLD;
        if !stays_in_place {
            self.index.remove(l);
        }
        (*l).set_size((*l).get_size() + d_size);
        let right_of_l = get_right_header(l);
        (*right_of_l).left_size = (*l).get_size();
        if !stays_in_place {
            self.index.insert(l);
        }
    }

    /// Both neighbours free: absorb `d` and `r` into `l` in one merge.
    ///
    /// # Safety
    /// `l` and `r` are both currently linked free headers; `d` sits between
    /// them and was just freed and unlinked.
    unsafe fn coalesce_both(
        &mut self,
        l: *mut crate::header::Header,
        d: *mut crate::header::Header,
        r: *mut crate::header::Header,
    ) {
        self.index.remove(r);
        let total = (*l).get_size() + (*d).get_size() + (*r).get_size();
        let stays_in_place = (*l).get_size() >= LAST_CLASS_THRESHOLD;
        if !stays_in_place {
            self.index.remove(l);
        }
        (*l).set_size(total);
        let right_of_l = get_right_header(l);
        (*right_of_l).left_size = total;
        if !stays_in_place {
            self.index.insert(l);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{BumpArenaSource, ARENA_SIZE};
    use crate::freelist::{class_of, N_LISTS};
    use crate::header::ALLOC_HEADER_SIZE;

    fn fresh() -> Allocator<BumpArenaSource<{ 8 * ARENA_SIZE }>> {
        Allocator::new(BumpArenaSource::new())
    }

    #[test]
    fn free_of_null_is_a_no_op() {
        let mut a = fresh();
        a.free(core::ptr::null_mut());
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn freeing_twice_aborts() {
        let mut a = fresh();
        let p = a.allocate(16);
        a.free(p);
        a.free(p);
    }

    #[test]
    fn adjacent_frees_coalesce_back_to_one_block() {
        let mut a = fresh();
        let x = a.allocate(24);
        let y = a.allocate(24);
        let z = a.allocate(24);
        a.free(y);
        a.free(x);
        a.free(z);

        let (class, head) = a.index.first_fit_from(0).expect("fully coalesced chunk");
        assert_eq!(class, N_LISTS - 1);
        unsafe {
            assert_eq!((*head).get_size(), ARENA_SIZE - 2 * ALLOC_HEADER_SIZE);
        }
    }

    #[test]
    fn free_order_independence_still_fully_coalesces() {
        let mut a = fresh();
        let x = a.allocate(24);
        let y = a.allocate(24);
        let z = a.allocate(24);
        // Different release order than the test above: right-to-left.
        a.free(z);
        a.free(y);
        a.free(x);

        let (class, head) = a.index.first_fit_from(0).expect("fully coalesced chunk");
        assert_eq!(class, N_LISTS - 1);
        unsafe {
            assert_eq!((*head).get_size(), ARENA_SIZE - 2 * ALLOC_HEADER_SIZE);
        }
    }

    #[test]
    fn freeing_a_block_flanked_by_two_allocated_neighbours_stays_standalone() {
        let mut a = fresh();
        let x = a.allocate(24);
        let y = a.allocate(24);
        let _z = a.allocate(24);
        a.free(y);

        // Both of y's neighbours (x, z) are still allocated, so y's freed
        // block must land alone in its own pure class, unmerged.
        // round_up_8(24 + ALLOC_HEADER_SIZE) = 40.
        let required = 40;
        let class = class_of(required);
        let (found_class, head) = a.index.first_fit_from(0).expect("y's block must be indexed");
        assert_eq!(found_class, class);
        unsafe {
            assert_eq!((*head).get_size(), required);
        }

        a.free(x);
    }
}
