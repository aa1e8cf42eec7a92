//! Opt-in allocator interface
//!
//! Applications route their dynamic allocations through a
//! [`ManagedAllocator`] explicitly; there is no global redirection. Blocks are
//! never freed by the caller, only by collection cycles and teardown.

use std::alloc::GlobalAlloc;
use std::ptr::NonNull;

use crate::block::BLOCK_ALIGN;
use crate::collector::Collector;
use crate::error::{GcError, GcResult};
use crate::stats::CycleStats;

/// Allocation entry points of a conservative collector
pub trait ManagedAllocator {
    /// Allocate `size` uninitialized bytes
    fn allocate(&mut self, size: usize) -> GcResult<NonNull<u8>>;

    /// Allocate `count * size` zeroed bytes
    fn zero_allocate(&mut self, count: usize, size: usize) -> GcResult<NonNull<u8>>;

    /// Copy `ptr`'s contents into a fresh block of `size` bytes
    fn reallocate(&mut self, ptr: *mut u8, size: usize) -> GcResult<NonNull<u8>>;

    /// Run one stack-rooted collection cycle
    fn collect(&mut self) -> CycleStats;

    /// Allocate a block holding `value`.
    ///
    /// `T` must be `Copy`: the collector never runs destructors. Types aligned
    /// beyond the block alignment, and zero-sized types, are rejected.
    fn allocate_value<T: Copy>(&mut self, value: T) -> GcResult<NonNull<T>> {
        let size = std::mem::size_of::<T>();
        if std::mem::align_of::<T>() > BLOCK_ALIGN {
            return Err(GcError::InvalidSize { size });
        }
        let ptr = self.allocate(size)?.cast::<T>();
        // SAFETY: block is at least size_of::<T>() bytes and BLOCK_ALIGN aligned
        unsafe { ptr.as_ptr().write(value) };
        Ok(ptr)
    }
}

impl<A: GlobalAlloc> ManagedAllocator for Collector<A> {
    fn allocate(&mut self, size: usize) -> GcResult<NonNull<u8>> {
        Collector::allocate(self, size)
    }

    fn zero_allocate(&mut self, count: usize, size: usize) -> GcResult<NonNull<u8>> {
        Collector::zero_allocate(self, count, size)
    }

    fn reallocate(&mut self, ptr: *mut u8, size: usize) -> GcResult<NonNull<u8>> {
        Collector::reallocate(self, ptr, size)
    }

    #[inline(never)]
    fn collect(&mut self) -> CycleStats {
        self.run_collection_cycle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy)]
    #[repr(C)]
    struct Pair {
        left: u64,
        right: u32,
    }

    #[repr(align(64))]
    #[derive(Clone, Copy)]
    struct Overaligned(u8);

    fn fill<M: ManagedAllocator>(alloc: &mut M) -> NonNull<Pair> {
        alloc.allocate_value(Pair { left: 7, right: 9 }).unwrap()
    }

    #[test]
    fn test_allocate_value() {
        let mut gc = Collector::new();
        let pair = fill(&mut gc);
        unsafe {
            assert_eq!(pair.as_ref().left, 7);
            assert_eq!(pair.as_ref().right, 9);
        }
        assert_eq!(gc.size_of(pair.as_ptr().cast::<u8>()), Some(std::mem::size_of::<Pair>()));
    }

    #[test]
    fn test_allocate_value_rejects_unsupported_types() {
        let mut gc = Collector::new();
        assert_eq!(
            gc.allocate_value(()).map(|_| ()),
            Err(GcError::InvalidSize { size: 0 })
        );
        assert_eq!(
            gc.allocate_value(Overaligned(1)).map(|_| ()),
            Err(GcError::InvalidSize { size: 64 })
        );
        assert_eq!(gc.live_blocks(), 0);
    }

    #[test]
    fn test_trait_reallocate_preserves_value() {
        let mut gc = Collector::new();
        let pair = fill(&mut gc);

        let moved = ManagedAllocator::reallocate(&mut gc, pair.as_ptr().cast::<u8>(), 64).unwrap();
        let moved = moved.cast::<Pair>();
        unsafe {
            assert_eq!(moved.as_ref().left, 7);
            assert_eq!(moved.as_ref().right, 9);
        }
        assert_eq!(gc.live_blocks(), 2);
    }
}
