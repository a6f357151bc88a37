// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Fencepost discipline.
//!
//! Two sentinel headers bracket every chunk acquired from the raw memory
//! source. They are always tagged `Fencepost`, are never linked into a free
//! list, and are the fixed points ordinary coalescing stops at — mirroring
//! the always-allocated left/right sentinels `cmpctmalloc`'s module doc
//! describes for each OS allocation (`size = sizeof(header_t)` / `size = 0`),
//! except here both fenceposts carry the same `ALLOC_HEADER_SIZE` footprint
//! and the right one's `left_size` records the interior block's size.

use crate::header::{get_right_header, Header, State, ALLOC_HEADER_SIZE};

/// Stamp `fp` as a fencepost whose `left_size` is `left_size`.
///
/// # Safety
/// `fp` must point to at least `ALLOC_HEADER_SIZE` writable bytes.
pub unsafe fn initialize_fencepost(fp: *mut Header, left_size: usize) {
    (*fp).set_state(State::Fencepost);
    (*fp).set_size(ALLOC_HEADER_SIZE);
    (*fp).left_size = left_size;
}

/// Install fenceposts at the left and right edges of a raw chunk of `size`
/// bytes, returning the interior block's header, already stamped
/// `Unallocated` and sized to span the gap between the two fenceposts
/// (`size - 2 * ALLOC_HEADER_SIZE`) — callers need not (and must not)
/// initialize it again.
///
/// # Safety
/// `raw_mem` must point to `size` writable, otherwise-unused bytes, and
/// `size >= 2 * ALLOC_HEADER_SIZE + MIN_BLOCK`.
pub unsafe fn insert_fenceposts(raw_mem: *mut u8, size: usize) -> *mut Header {
    let left_fp = raw_mem as *mut Header;
    initialize_fencepost(left_fp, ALLOC_HEADER_SIZE);

    let interior_size = size - 2 * ALLOC_HEADER_SIZE;
    let right_fp = (raw_mem.add(size - ALLOC_HEADER_SIZE)) as *mut Header;
    initialize_fencepost(right_fp, interior_size);

    let interior = (raw_mem.add(ALLOC_HEADER_SIZE)) as *mut Header;
    (*interior).set_state(State::Unallocated);
    (*interior).set_size(interior_size);
    (*interior).left_size = ALLOC_HEADER_SIZE;
    debug_assert_eq!(get_right_header(interior), right_fp);
    interior
}
