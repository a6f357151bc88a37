// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! End-to-end allocator scenarios, exercised through the public crate API
//! against the process-wide global instance — the same "call the public
//! entry points and check the end state" shape as a library's top-level
//! `tests/` directory elsewhere in the example pack (e.g. a crate's
//! `tests/freelist_tests.rs`), as opposed to the in-module unit tests that
//! poke at `Allocator` internals directly.

use rustux_alloc::{allocate, free, reallocate, verify, zero_alloc};

#[test]
fn single_small_allocation_then_free_round_trips_cleanly() {
    let p = allocate(16);
    assert!(!p.is_null());
    unsafe {
        core::ptr::write_bytes(p, 0xAB, 16);
    }
    assert!(verify());
    free(p);
    assert!(verify());
}

#[test]
fn many_small_allocations_interleaved_with_frees_stay_consistent() {
    let mut live = Vec::new();
    for i in 0..64 {
        let p = allocate(8 + (i % 5) * 8);
        assert!(!p.is_null());
        live.push(p);
    }
    assert!(verify());
    for (i, p) in live.into_iter().enumerate() {
        if i % 3 != 0 {
            free(p);
        }
    }
    assert!(verify());
}

#[test]
fn zero_size_allocation_is_null_and_leaves_heap_consistent() {
    assert!(allocate(0).is_null());
    assert!(verify());
}

#[test]
fn zero_alloc_zero_initializes_requested_region() {
    let p = zero_alloc(16, 4) as *mut u8;
    assert!(!p.is_null());
    let bytes = unsafe { core::slice::from_raw_parts(p, 64) };
    assert!(bytes.iter().all(|&b| b == 0));
    free(p);
}

#[test]
fn zero_alloc_overflowing_count_times_elem_size_is_null() {
    assert!(zero_alloc(usize::MAX, 2).is_null());
}

#[test]
fn reallocate_grows_and_preserves_prefix_bytes() {
    let p = allocate(32) as *mut u8;
    unsafe {
        for i in 0..32u8 {
            *p.add(i as usize) = i;
        }
    }
    let grown = reallocate(p, 256);
    assert!(!grown.is_null());
    unsafe {
        for i in 0..32u8 {
            assert_eq!(*grown.add(i as usize), i);
        }
    }
    free(grown);
}

#[test]
fn reallocate_shrinking_preserves_the_retained_prefix() {
    let p = allocate(256) as *mut u8;
    unsafe {
        for i in 0..256u8 {
            *p.add(i as usize) = i.wrapping_mul(3);
        }
    }
    let shrunk = reallocate(p, 16);
    assert!(!shrunk.is_null());
    unsafe {
        for i in 0..16u8 {
            assert_eq!(*shrunk.add(i as usize), i.wrapping_mul(3));
        }
    }
    free(shrunk);
}

#[test]
fn reallocate_null_pointer_behaves_like_allocate() {
    let p = reallocate(core::ptr::null_mut(), 40);
    assert!(!p.is_null());
    free(p);
}

#[test]
fn reallocate_to_zero_frees_and_returns_null() {
    let p = allocate(40);
    let r = reallocate(p, 0);
    assert!(r.is_null());
    assert!(verify());
}

#[test]
#[should_panic(expected = "double free")]
fn double_free_aborts_the_process() {
    let p = allocate(24);
    free(p);
    free(p);
}

#[test]
fn several_mid_size_allocations_force_chunk_growth_and_stay_consistent() {
    // Each request comfortably fits in one arena on its own, but enough of
    // them in a row exceed one arena's interior capacity, forcing at least
    // one growth event.
    let mut live = Vec::new();
    for _ in 0..8 {
        let p = allocate(rustux_alloc::ARENA_SIZE / 2);
        assert!(!p.is_null());
        live.push(p);
    }
    assert!(verify());
    for p in live {
        free(p);
    }
    assert!(verify());
}

#[test]
fn a_request_larger_than_one_arena_is_treated_as_out_of_memory() {
    let p = allocate(rustux_alloc::ARENA_SIZE * 2);
    assert!(p.is_null());
    assert!(verify());
}
