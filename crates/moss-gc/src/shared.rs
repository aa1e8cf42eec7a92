//! Collector shared between threads
//!
//! The collector itself assumes exclusive access. A multi-threaded host
//! serializes every allocation and cycle through one [`SharedCollector`].
//! Only the stack of the thread that called `init` is scanned; cycles started
//! on any other thread are skipped, and blocks whose only references live on
//! other threads' stacks are not protected.

use std::alloc::{GlobalAlloc, System};
use std::ptr::NonNull;

use parking_lot::{Mutex, MutexGuard};

use crate::allocator::ManagedAllocator;
use crate::collector::Collector;
use crate::config::GcConfig;
use crate::error::GcResult;
use crate::stats::{CollectorStats, CycleStats};

/// A [`Collector`] behind a mutex
pub struct SharedCollector<A: GlobalAlloc = System> {
    inner: Mutex<Collector<A>>,
}

impl SharedCollector<System> {
    /// Create a shared collector over the system allocator
    pub fn new(config: GcConfig) -> Self {
        Self::from_collector(Collector::with_config(config))
    }
}

impl<A: GlobalAlloc> SharedCollector<A> {
    /// Wrap an existing collector
    pub fn from_collector(collector: Collector<A>) -> Self {
        Self {
            inner: Mutex::new(collector),
        }
    }

    /// Lock the collector for a sequence of operations
    pub fn lock(&self) -> MutexGuard<'_, Collector<A>> {
        self.inner.lock()
    }

    /// Record the stack anchor of the calling thread
    pub fn init<T>(&self, anchor: *const T) {
        self.inner.lock().init(anchor);
    }

    /// Allocate `size` uninitialized bytes
    pub fn allocate(&self, size: usize) -> GcResult<NonNull<u8>> {
        self.inner.lock().allocate(size)
    }

    /// Allocate `count * size` zeroed bytes
    pub fn zero_allocate(&self, count: usize, size: usize) -> GcResult<NonNull<u8>> {
        self.inner.lock().zero_allocate(count, size)
    }

    /// Copy `ptr`'s contents into a fresh block of `size` bytes
    pub fn reallocate(&self, ptr: *mut u8, size: usize) -> GcResult<NonNull<u8>> {
        self.inner.lock().reallocate(ptr, size)
    }

    /// Run a stack-rooted cycle on the calling thread
    #[inline(never)]
    pub fn run_collection_cycle(&self) -> CycleStats {
        self.inner.lock().run_collection_cycle()
    }

    /// Release every block and clear the anchor
    pub fn teardown(&self) -> usize {
        self.inner.lock().teardown()
    }

    /// Get collection statistics
    pub fn stats(&self) -> CollectorStats {
        self.inner.lock().stats()
    }

    /// Unwrap the collector
    pub fn into_inner(self) -> Collector<A> {
        self.inner.into_inner()
    }
}

impl<A: GlobalAlloc> ManagedAllocator for SharedCollector<A> {
    fn allocate(&mut self, size: usize) -> GcResult<NonNull<u8>> {
        self.inner.get_mut().allocate(size)
    }

    fn zero_allocate(&mut self, count: usize, size: usize) -> GcResult<NonNull<u8>> {
        self.inner.get_mut().zero_allocate(count, size)
    }

    fn reallocate(&mut self, ptr: *mut u8, size: usize) -> GcResult<NonNull<u8>> {
        self.inner.get_mut().reallocate(ptr, size)
    }

    #[inline(never)]
    fn collect(&mut self) -> CycleStats {
        self.inner.get_mut().run_collection_cycle()
    }
}
