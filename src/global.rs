// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! The process-wide allocator instance.
//!
//! One [`Allocator`] behind one `spin::Mutex`, lazily built on first use via
//! `spin::Once` — the same "single mutex-guarded global heap" shape as the
//! teacher's `THE_HEAP: Mutex<CmpctHeap>`, except here the instance is built
//! lazily instead of requiring an explicit `cmpct_init()` call, since this
//! crate has no kernel entry point to call one from.
//!
//! The default raw memory source differs by build posture (see
//! [`crate::arena`]): `std`/test builds grow independent heap-backed chunks;
//! `no_std` builds carve chunks out of one fixed static array sized by
//! [`NO_STD_ARENA_CAPACITY`], declared right here as a `static mut` rather
//! than constructed at runtime, the same "big array lives directly in a
//! `static`" shape as the teacher's `static mut HEAP: AlignedHeap`
//! (`kernel::allocator`) — a megabyte-sized array built as an ordinary
//! stack value and moved into place has no guaranteed move elision in Rust,
//! which this sidesteps entirely.

use spin::{Mutex, Once};

use crate::context::Allocator;

#[cfg(any(test, feature = "std-arena"))]
type DefaultSource = crate::arena::HeapArenaSource;

#[cfg(not(any(test, feature = "std-arena")))]
type DefaultSource = crate::arena::StaticArenaSource;

/// Total backing storage for the `no_std` default source: 1 MiB, chosen as
/// a reasonable embedded default and overridable by embedders who supply
/// their own [`crate::arena::RawMemorySource`] and call
/// `Allocator::new` directly instead of going through this global.
#[cfg(not(any(test, feature = "std-arena")))]
pub const NO_STD_ARENA_CAPACITY: usize = 1 << 20;

/// Backing storage for the `no_std` default source. Const-initialized in
/// place, never constructed on the stack.
#[cfg(not(any(test, feature = "std-arena")))]
static mut NO_STD_ARENA: [u8; NO_STD_ARENA_CAPACITY] = [0u8; NO_STD_ARENA_CAPACITY];

static GLOBAL: Once<Mutex<Allocator<DefaultSource>>> = Once::new();

#[cfg_attr(not(any(test, feature = "std-arena")), allow(static_mut_refs))]
fn build() -> Mutex<Allocator<DefaultSource>> {
    #[cfg(any(test, feature = "std-arena"))]
    let source = crate::arena::HeapArenaSource;
    // Safety: `GLOBAL` is a `Once`, so `build` runs at most once for the
    // life of the process — `NO_STD_ARENA` is never aliased.
    #[cfg(not(any(test, feature = "std-arena")))]
    let source = unsafe {
        crate::arena::StaticArenaSource::new(NO_STD_ARENA.as_mut_ptr(), NO_STD_ARENA.len())
    };
    Mutex::new(Allocator::new(source))
}

/// Run `f` against the process-wide allocator, serialized behind the global
/// mutex. This is the one place contention on the single heap-wide lock
/// named in the concurrency model is actually taken.
pub fn with<R>(f: impl FnOnce(&mut Allocator<DefaultSource>) -> R) -> R {
    let mutex = GLOBAL.call_once(build);
    let mut guard = mutex.lock();
    f(&mut guard)
}
