//! Allocator injection.
//!
//! Code under test takes a `&dyn TestAllocator` (or a generic parameter)
//! instead of calling the system allocator directly. Production wires in
//! [`SystemHeap`]; tests wire in [`ThreadHeap`], which routes every call to
//! this thread's [`GuardedHeap`] and turns heap errors into test failures.
//! The `test_*` functions are the same operations as free functions.

#![allow(unsafe_code)]

use std::cell::RefCell;

use frankenmock_core::SourceLocation;

use crate::context::fail_with;
use crate::heap::{Checkpoint, GuardedHeap, HeapError};

pub trait TestAllocator {
    fn allocate(&self, size: usize) -> *mut u8;
    fn allocate_zeroed(&self, count: usize, size: usize) -> *mut u8;
    fn reallocate(&self, ptr: *mut u8, size: usize) -> *mut u8;
    fn deallocate(&self, ptr: *mut u8);
}

thread_local! {
    static HEAP: RefCell<GuardedHeap> = RefCell::new(GuardedHeap::new());
}

/// Run `f` against this thread's guarded heap.
pub fn with_heap<R>(f: impl FnOnce(&mut GuardedHeap) -> R) -> R {
    HEAP.with(|h| f(&mut h.borrow_mut()))
}

fn or_fail<T>(result: Result<T, HeapError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => fail_with(err.to_string()),
    }
}

#[track_caller]
pub fn test_malloc(size: usize) -> *mut u8 {
    let at = SourceLocation::caller();
    or_fail(with_heap(|h| h.allocate(size, at))).as_ptr()
}

#[track_caller]
pub fn test_calloc(count: usize, size: usize) -> *mut u8 {
    let at = SourceLocation::caller();
    or_fail(with_heap(|h| h.allocate_zeroed(count, size, at))).as_ptr()
}

#[track_caller]
pub fn test_realloc(ptr: *mut u8, size: usize) -> *mut u8 {
    let at = SourceLocation::caller();
    or_fail(with_heap(|h| h.reallocate(ptr, size, at)))
}

#[track_caller]
pub fn test_free(ptr: *mut u8) {
    let at = SourceLocation::caller();
    or_fail(with_heap(|h| h.deallocate(ptr, at)));
}

/// Leak-scope marker on this thread's heap.
#[must_use]
pub fn checkpoint() -> Checkpoint {
    with_heap(|h| h.checkpoint())
}

/// Report and release everything leaked since `checkpoint`.
pub fn release_leaks(checkpoint: Checkpoint, site: SourceLocation) -> Vec<HeapError> {
    with_heap(|h| h.release_leaks(checkpoint, site))
}

/// Routes to this thread's guarded heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadHeap;

impl TestAllocator for ThreadHeap {
    #[track_caller]
    fn allocate(&self, size: usize) -> *mut u8 {
        test_malloc(size)
    }

    #[track_caller]
    fn allocate_zeroed(&self, count: usize, size: usize) -> *mut u8 {
        test_calloc(count, size)
    }

    #[track_caller]
    fn reallocate(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        test_realloc(ptr, size)
    }

    #[track_caller]
    fn deallocate(&self, ptr: *mut u8) {
        test_free(ptr);
    }
}

/// Passthrough to the C allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHeap;

impl TestAllocator for SystemHeap {
    fn allocate(&self, size: usize) -> *mut u8 {
        // SAFETY: plain libc allocation; null signals failure.
        unsafe { libc::malloc(size).cast() }
    }

    fn allocate_zeroed(&self, count: usize, size: usize) -> *mut u8 {
        // SAFETY: calloc checks `count * size` for overflow.
        unsafe { libc::calloc(count, size).cast() }
    }

    fn reallocate(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        // SAFETY: `ptr` is null or came from this allocator.
        unsafe { libc::realloc(ptr.cast(), size).cast() }
    }

    fn deallocate(&self, ptr: *mut u8) {
        // SAFETY: `ptr` is null or came from this allocator.
        unsafe { libc::free(ptr.cast()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{Completion, Interrupt, RecoveryBoundary};
    use crate::context::{begin_test, end_test};

    fn duplicate(alloc: &dyn TestAllocator, text: &[u8]) -> *mut u8 {
        let p = alloc.allocate(text.len());
        if !p.is_null() {
            // SAFETY: `p` holds `text.len()` bytes.
            unsafe { std::ptr::copy_nonoverlapping(text.as_ptr(), p, text.len()) };
        }
        p
    }

    #[test]
    fn injected_heaps_are_interchangeable() {
        for alloc in [&ThreadHeap as &dyn TestAllocator, &SystemHeap] {
            let p = duplicate(alloc, b"abc");
            // SAFETY: three bytes were copied in.
            assert_eq!(unsafe { std::slice::from_raw_parts(p, 3) }, b"abc");
            alloc.deallocate(p);
        }
    }

    #[test]
    fn overflow_through_thread_heap_fails_the_test() {
        let previous = begin_test();
        let done = RecoveryBoundary::new().run(|| {
            let p = test_malloc(4);
            // SAFETY: deliberately writes past the end into the guard.
            unsafe { p.add(4).write(0) };
            test_free(p);
        });
        assert!(matches!(done, Completion::Interrupted(Interrupt::Failed)));
        let text = end_test(previous).error_text();
        assert!(text.contains("corrupted at offset 4 (overflow)"), "{text}");
    }

    #[test]
    fn checkpoint_scopes_thread_leaks() {
        let cp = checkpoint();
        let p = test_calloc(2, 8);
        let leaks = release_leaks(cp, SourceLocation::unknown());
        assert_eq!(leaks.len(), 1);
        assert!(!with_heap(|h| h.is_live(p)));
    }
}
