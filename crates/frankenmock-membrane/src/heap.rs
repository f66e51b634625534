//! Guarded heap for corruption and leak detection.
//!
//! Every block has this layout, with the user pointer 16-byte aligned:
//!
//! ```text
//! raw_base                                user_base
//! | header (16) | leading guard (16) | payload (size) | trailing guard (16) |
//! ```
//!
//! The header holds a magic word and the payload size. Guards are filled with
//! [`GUARD_PATTERN`], fresh payloads with [`ALLOCATED_PATTERN`], and a block is
//! overwritten with [`FREED_PATTERN`] before it goes back to the system.
//!
//! Pointers are looked up in the live table before anything is read through
//! them, so freeing a foreign pointer or freeing twice is reported instead of
//! dereferencing garbage. Leak detection is scoped by [`Checkpoint`]s, which
//! are allocation sequence numbers: everything allocated at or after a
//! checkpoint and still live belongs to the scope that took it.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ptr::{self, NonNull};

use frankenmock_core::SourceLocation;
use serde::Serialize;
use thiserror::Error;

/// Bytes of guard on each side of the payload.
pub const GUARD_SIZE: usize = 16;
/// Signature written into both guard regions.
pub const GUARD_PATTERN: u8 = 0xEF;
/// Signature written into a fresh (non-zeroed) payload.
pub const ALLOCATED_PATTERN: u8 = 0xBA;
/// Signature written over a block before it is released.
pub const FREED_PATTERN: u8 = 0xCD;
/// Alignment of every user pointer.
pub const ALIGNMENT: usize = 16;

const HEADER_SIZE: usize = 16;
const HEADER_MAGIC: u64 = 0xF4A5_6E0C_6B1D_0C4B;
const PAYLOAD_OFFSET: usize = HEADER_SIZE + GUARD_SIZE;

/// Which guard region was overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardRegion {
    Leading,
    Trailing,
}

impl fmt::Display for GuardRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Leading => "underflow",
            Self::Trailing => "overflow",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("{location}: failed to allocate {size} bytes")]
    AllocationFailed { size: usize, location: SourceLocation },

    #[error("{site}: {address:#x} was not allocated by the guarded heap")]
    ForeignPointer { address: usize, site: SourceLocation },

    #[error("{site}: {address:#x} was already freed")]
    DoubleFree { address: usize, site: SourceLocation },

    #[error(
        "{site}: guard block of {address:#x} ({size} bytes) corrupted at offset {offset} ({region})\n{location}: note: block allocated here"
    )]
    GuardCorrupted {
        address: usize,
        size: usize,
        region: GuardRegion,
        offset: isize,
        site: SourceLocation,
        location: SourceLocation,
    },

    #[error("{site}: header of {address:#x} is corrupted\n{location}: note: block allocated here")]
    HeaderCorrupted {
        address: usize,
        site: SourceLocation,
        location: SourceLocation,
    },

    #[error("{location}: block {address:#x} ({size} bytes) was leaked")]
    Leak {
        address: usize,
        size: usize,
        location: SourceLocation,
    },
}

/// Live allocation bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    /// User-visible address.
    pub address: usize,
    /// Requested size.
    pub size: usize,
    /// Size of the whole block including header and guards.
    pub allocated_size: usize,
    pub location: SourceLocation,
    pub sequence: u64,
}

impl AllocationRecord {
    fn raw_base(&self) -> usize {
        self.address - PAYLOAD_OFFSET
    }

    fn layout(&self) -> Option<Layout> {
        Layout::from_size_align(self.allocated_size, ALIGNMENT).ok()
    }
}

/// Position in the allocation sequence marking the start of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checkpoint(u64);

/// Single-threaded guarded allocator.
#[derive(Debug, Default)]
pub struct GuardedHeap {
    /// Live records in allocation order.
    live: BTreeMap<u64, AllocationRecord>,
    /// Map from user address to sequence number.
    addr_to_seq: HashMap<usize, u64>,
    /// Addresses freed and not yet handed out again, keyed to the sequence
    /// number of the block they belonged to. Forgotten when that block's
    /// scope is swept.
    freed: HashMap<usize, u64>,
    next_sequence: u64,
}

fn block_size(size: usize) -> Option<usize> {
    size.checked_add(PAYLOAD_OFFSET)?.checked_add(GUARD_SIZE)
}

/// First byte in `bytes` that differs from the guard signature.
fn first_bad_guard_byte(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|b| *b != GUARD_PATTERN)
}

impl GuardedHeap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `size` bytes filled with [`ALLOCATED_PATTERN`].
    pub fn allocate(&mut self, size: usize, location: SourceLocation) -> Result<NonNull<u8>, HeapError> {
        self.allocate_filled(size, ALLOCATED_PATTERN, location)
    }

    /// Allocate `count * size` zeroed bytes.
    pub fn allocate_zeroed(
        &mut self,
        count: usize,
        size: usize,
        location: SourceLocation,
    ) -> Result<NonNull<u8>, HeapError> {
        let total = count.checked_mul(size).ok_or(HeapError::AllocationFailed {
            size: usize::MAX,
            location,
        })?;
        self.allocate_filled(total, 0, location)
    }

    fn allocate_filled(
        &mut self,
        size: usize,
        fill: u8,
        location: SourceLocation,
    ) -> Result<NonNull<u8>, HeapError> {
        let failed = HeapError::AllocationFailed { size, location };
        let total = block_size(size).ok_or_else(|| failed.clone())?;
        let layout = Layout::from_size_align(total, ALIGNMENT).map_err(|_| failed.clone())?;
        // SAFETY: layout has non-zero size (header and guards are always present).
        let raw = unsafe { std::alloc::alloc(layout) };
        if raw.is_null() {
            return Err(failed);
        }

        // SAFETY: `raw` is valid for `total` bytes; every write below stays inside.
        let user = unsafe {
            let header = raw.cast::<u64>();
            header.write(HEADER_MAGIC);
            header.add(1).write(size as u64);
            ptr::write_bytes(raw.add(HEADER_SIZE), GUARD_PATTERN, GUARD_SIZE);
            let user = raw.add(PAYLOAD_OFFSET);
            ptr::write_bytes(user, fill, size);
            ptr::write_bytes(user.add(size), GUARD_PATTERN, GUARD_SIZE);
            user
        };

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let address = user as usize;
        self.freed.remove(&address);
        self.addr_to_seq.insert(address, sequence);
        self.live.insert(
            sequence,
            AllocationRecord {
                address,
                size,
                allocated_size: total,
                location,
                sequence,
            },
        );
        NonNull::new(user).ok_or(failed)
    }

    /// Record for a live user pointer.
    #[must_use]
    pub fn record(&self, ptr: *const u8) -> Option<&AllocationRecord> {
        let seq = self.addr_to_seq.get(&(ptr as usize))?;
        self.live.get(seq)
    }

    #[must_use]
    pub fn is_live(&self, ptr: *const u8) -> bool {
        self.record(ptr).is_some()
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.live.values().map(|r| r.size).sum()
    }

    fn lookup(&self, address: usize, site: SourceLocation) -> Result<AllocationRecord, HeapError> {
        match self.addr_to_seq.get(&address).and_then(|s| self.live.get(s)) {
            Some(record) => Ok(*record),
            None if self.freed.contains_key(&address) => Err(HeapError::DoubleFree { address, site }),
            None => Err(HeapError::ForeignPointer { address, site }),
        }
    }

    /// Check the header and both guards of a live block.
    fn verify(record: &AllocationRecord, site: SourceLocation) -> Result<(), HeapError> {
        let raw = record.raw_base() as *const u8;
        // SAFETY: the record is live, so the block spans `allocated_size`
        // bytes starting at `raw`.
        let (magic, size, leading, trailing) = unsafe {
            let header = raw.cast::<u64>();
            (
                header.read(),
                header.add(1).read(),
                std::slice::from_raw_parts(raw.add(HEADER_SIZE), GUARD_SIZE),
                std::slice::from_raw_parts(raw.add(PAYLOAD_OFFSET + record.size), GUARD_SIZE),
            )
        };

        if let Some(i) = first_bad_guard_byte(leading) {
            return Err(HeapError::GuardCorrupted {
                address: record.address,
                size: record.size,
                region: GuardRegion::Leading,
                offset: i as isize - GUARD_SIZE as isize,
                site,
                location: record.location,
            });
        }
        if let Some(i) = first_bad_guard_byte(trailing) {
            return Err(HeapError::GuardCorrupted {
                address: record.address,
                size: record.size,
                region: GuardRegion::Trailing,
                offset: (record.size + i) as isize,
                site,
                location: record.location,
            });
        }
        if magic != HEADER_MAGIC || size != record.size as u64 {
            return Err(HeapError::HeaderCorrupted {
                address: record.address,
                site,
                location: record.location,
            });
        }
        Ok(())
    }

    /// Poison and return a block to the system, dropping its record.
    fn release(&mut self, record: &AllocationRecord) {
        self.live.remove(&record.sequence);
        self.addr_to_seq.remove(&record.address);
        self.freed.insert(record.address, record.sequence);
        let raw = record.raw_base() as *mut u8;
        // SAFETY: the block was allocated with exactly this layout and is no
        // longer reachable through the live table.
        unsafe {
            ptr::write_bytes(raw, FREED_PATTERN, record.allocated_size);
            if let Some(layout) = record.layout() {
                std::alloc::dealloc(raw, layout);
            }
        }
    }

    /// Free a block. Null is a no-op. A block with corrupted guards is still
    /// released before the corruption is reported.
    pub fn deallocate(&mut self, ptr: *mut u8, site: SourceLocation) -> Result<(), HeapError> {
        if ptr.is_null() {
            return Ok(());
        }
        let record = self.lookup(ptr as usize, site)?;
        let verdict = Self::verify(&record, site);
        self.release(&record);
        verdict
    }

    /// Resize a block, preserving `min(old, new)` bytes.
    ///
    /// Null `ptr` allocates; a zero `size` frees and returns null.
    pub fn reallocate(
        &mut self,
        ptr: *mut u8,
        size: usize,
        site: SourceLocation,
    ) -> Result<*mut u8, HeapError> {
        if ptr.is_null() {
            return self.allocate(size, site).map(NonNull::as_ptr);
        }
        if size == 0 {
            self.deallocate(ptr, site)?;
            return Ok(ptr::null_mut());
        }

        let old = self.lookup(ptr as usize, site)?;
        if let Err(err) = Self::verify(&old, site) {
            self.release(&old);
            return Err(err);
        }
        let fresh = self.allocate(size, site)?;
        // SAFETY: both blocks are live and at least `min(old, new)` bytes long.
        unsafe {
            ptr::copy_nonoverlapping(ptr.cast_const(), fresh.as_ptr(), old.size.min(size));
        }
        self.release(&old);
        Ok(fresh.as_ptr())
    }

    /// Mark the start of a leak-detection scope.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.next_sequence)
    }

    /// Blocks allocated since `checkpoint` that are still live.
    #[must_use]
    pub fn leaks_since(&self, checkpoint: Checkpoint) -> Vec<AllocationRecord> {
        self.live.range(checkpoint.0..).map(|(_, r)| *r).collect()
    }

    /// Report every block leaked since `checkpoint` and release it. Guard
    /// corruption found on the way out is reported too.
    pub fn release_leaks(&mut self, checkpoint: Checkpoint, site: SourceLocation) -> Vec<HeapError> {
        let mut errors = Vec::new();
        for record in self.leaks_since(checkpoint) {
            errors.push(HeapError::Leak {
                address: record.address,
                size: record.size,
                location: record.location,
            });
            if let Err(err) = Self::verify(&record, site) {
                errors.push(err);
            }
            self.release(&record);
        }
        self.freed.retain(|_, sequence| *sequence < checkpoint.0);
        errors
    }

    /// Freed addresses still remembered for double-free detection.
    #[must_use]
    pub fn freed_count(&self) -> usize {
        self.freed.len()
    }
}

impl Drop for GuardedHeap {
    fn drop(&mut self) {
        let remaining: Vec<AllocationRecord> = self.live.values().copied().collect();
        for record in &remaining {
            self.release(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AT: SourceLocation = SourceLocation::new("heap_test.rs", 10);
    const FREE_AT: SourceLocation = SourceLocation::new("heap_test.rs", 20);

    #[test]
    fn allocation_is_aligned_and_pattern_filled() {
        let mut heap = GuardedHeap::new();
        let p = heap.allocate(24, AT).unwrap();
        assert_eq!(p.as_ptr() as usize % ALIGNMENT, 0);
        // SAFETY: 24 bytes were just allocated.
        let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), 24) };
        assert!(bytes.iter().all(|b| *b == ALLOCATED_PATTERN));
        assert_eq!(heap.record(p.as_ptr()).unwrap().size, 24);
        heap.deallocate(p.as_ptr(), FREE_AT).unwrap();
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn sweep_forgets_frees_from_its_scope() {
        let mut heap = GuardedHeap::new();
        let outer = heap.allocate(8, AT).unwrap();
        let scope = heap.checkpoint();
        for _ in 0..64 {
            let p = heap.allocate(16, AT).unwrap();
            heap.deallocate(p.as_ptr(), FREE_AT).unwrap();
        }
        assert!(heap.freed_count() > 0);
        assert!(heap.release_leaks(scope, FREE_AT).is_empty());
        assert_eq!(heap.freed_count(), 0);

        let inner = heap.allocate(4, AT).unwrap();
        heap.deallocate(inner.as_ptr(), FREE_AT).unwrap();
        assert!(matches!(
            heap.deallocate(inner.as_ptr(), FREE_AT),
            Err(HeapError::DoubleFree { .. })
        ));
        heap.deallocate(outer.as_ptr(), FREE_AT).unwrap();
    }

    #[test]
    fn zeroed_allocation_and_overflowing_count() {
        let mut heap = GuardedHeap::new();
        let p = heap.allocate_zeroed(4, 8, AT).unwrap();
        // SAFETY: 32 bytes were just allocated.
        let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), 32) };
        assert!(bytes.iter().all(|b| *b == 0));
        assert!(matches!(
            heap.allocate_zeroed(usize::MAX, 2, AT),
            Err(HeapError::AllocationFailed { .. })
        ));
        heap.deallocate(p.as_ptr(), FREE_AT).unwrap();
    }

    #[test]
    fn trailing_overflow_reports_offset_and_site() {
        let mut heap = GuardedHeap::new();
        let p = heap.allocate(8, AT).unwrap();
        // SAFETY: deliberately writes one byte into the trailing guard.
        unsafe { p.as_ptr().add(9).write(0) };
        let err = heap.deallocate(p.as_ptr(), FREE_AT).unwrap_err();
        assert_eq!(
            err,
            HeapError::GuardCorrupted {
                address: p.as_ptr() as usize,
                size: 8,
                region: GuardRegion::Trailing,
                offset: 9,
                site: FREE_AT,
                location: AT,
            }
        );
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn leading_underflow_is_detected() {
        let mut heap = GuardedHeap::new();
        let p = heap.allocate(8, AT).unwrap();
        // SAFETY: deliberately writes one byte into the leading guard.
        unsafe { p.as_ptr().sub(1).write(0) };
        match heap.deallocate(p.as_ptr(), FREE_AT) {
            Err(HeapError::GuardCorrupted { region, offset, location, .. }) => {
                assert_eq!(region, GuardRegion::Leading);
                assert_eq!(offset, -1);
                assert_eq!(location, AT);
            }
            other => panic!("expected guard corruption, got {other:?}"),
        }
    }

    #[test]
    fn foreign_and_double_free_are_rejected() {
        let mut heap = GuardedHeap::new();
        let mut local = [0_u8; 4];
        assert!(matches!(
            heap.deallocate(local.as_mut_ptr(), FREE_AT),
            Err(HeapError::ForeignPointer { .. })
        ));
        let p = heap.allocate(4, AT).unwrap();
        heap.deallocate(p.as_ptr(), FREE_AT).unwrap();
        assert!(matches!(
            heap.deallocate(p.as_ptr(), FREE_AT),
            Err(HeapError::DoubleFree { .. })
        ));
        assert!(heap.deallocate(ptr::null_mut(), FREE_AT).is_ok());
    }

    #[test]
    fn leaks_are_scoped_to_checkpoint_and_reported_once() {
        let mut heap = GuardedHeap::new();
        let before = heap.allocate(4, AT).unwrap();
        let cp = heap.checkpoint();
        let leak_site = SourceLocation::new("leaky.rs", 3);
        let _leaked = heap.allocate(100, leak_site).unwrap();

        let errors = heap.release_leaks(cp, FREE_AT);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            HeapError::Leak { size: 100, location, .. } if location == leak_site
        ));
        assert!(heap.release_leaks(cp, FREE_AT).is_empty());
        assert!(heap.is_live(before.as_ptr()));
        heap.deallocate(before.as_ptr(), FREE_AT).unwrap();
    }

    #[test]
    fn freeing_the_first_block_in_scope_keeps_checkpoint_valid() {
        let mut heap = GuardedHeap::new();
        let cp = heap.checkpoint();
        let first = heap.allocate(1, AT).unwrap();
        let second = heap.allocate(2, AT).unwrap();
        heap.deallocate(first.as_ptr(), FREE_AT).unwrap();
        let leaks = heap.leaks_since(cp);
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].address, second.as_ptr() as usize);
        heap.deallocate(second.as_ptr(), FREE_AT).unwrap();
    }

    #[test]
    fn reallocate_preserves_prefix() {
        let mut heap = GuardedHeap::new();
        let p = heap.allocate(4, AT).unwrap().as_ptr();
        // SAFETY: 4 bytes are live.
        unsafe { ptr::copy_nonoverlapping([1_u8, 2, 3, 4].as_ptr(), p, 4) };
        let q = heap.reallocate(p, 64, AT).unwrap();
        // SAFETY: q is live for 64 bytes.
        let prefix = unsafe { std::slice::from_raw_parts(q, 4) };
        assert_eq!(prefix, &[1_u8, 2, 3, 4][..]);
        assert!(!heap.is_live(p));
        assert!(heap.reallocate(q, 0, AT).unwrap().is_null());
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn messages_cite_both_sites() {
        let err = HeapError::GuardCorrupted {
            address: 0x1000,
            size: 8,
            region: GuardRegion::Trailing,
            offset: 8,
            site: FREE_AT,
            location: AT,
        };
        let text = err.to_string();
        assert!(text.starts_with("heap_test.rs:20: guard block of 0x1000"));
        assert!(text.contains("(overflow)"));
        assert!(text.contains("heap_test.rs:10: note: block allocated here"));
    }
}
