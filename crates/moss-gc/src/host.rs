//! malloc-style facade for an interception layer
//!
//! A [`GcHost`] is what a call-redirection shim forwards `malloc`, `calloc`,
//! `realloc` and `free` to. Every failure comes back as a null pointer, `free`
//! does nothing, and the collector initializes itself on the first routed call
//! if the application never called [`GcHost::init_manual`].

use std::alloc::{GlobalAlloc, System};
use std::ptr::{self, NonNull};

use crate::collector::Collector;
use crate::config::GcConfig;
use crate::error::GcResult;
use crate::stats::CycleStats;

/// Pointer-returning front end of a [`Collector`]
pub struct GcHost<A: GlobalAlloc = System> {
    collector: Collector<A>,
    initialized: bool,
}

impl GcHost<System> {
    /// Create a host over the system allocator
    pub fn new() -> Self {
        Self::with_collector(Collector::with_config(GcConfig::default()))
    }
}

impl Default for GcHost<System> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: GlobalAlloc> GcHost<A> {
    /// Front an existing collector
    pub fn with_collector(collector: Collector<A>) -> Self {
        Self {
            collector,
            initialized: false,
        }
    }

    /// True once an anchor is recorded by a routed call or `init_manual`
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Underlying collector
    pub fn collector(&self) -> &Collector<A> {
        &self.collector
    }

    /// Underlying collector, mutably
    pub fn collector_mut(&mut self) -> &mut Collector<A> {
        &mut self.collector
    }

    /// Anchor the collector at `stack_start`. No effect once initialized.
    pub fn init_manual<T>(&mut self, stack_start: *const T) {
        if !self.initialized {
            self.collector.init(stack_start);
            self.initialized = true;
        }
    }

    /// Run a cycle if initialized.
    #[inline(never)]
    pub fn collect_manual(&mut self) -> Option<CycleStats> {
        if self.initialized {
            Some(self.collector.run_collection_cycle())
        } else {
            None
        }
    }

    /// Release everything and return to the uninitialized state.
    pub fn cleanup_manual(&mut self) {
        if self.initialized {
            self.collector.teardown();
            self.initialized = false;
        }
    }

    /// `malloc`: null on failure
    pub fn malloc(&mut self, size: usize) -> *mut u8 {
        self.auto_init();
        into_raw(self.collector.allocate(size))
    }

    /// `calloc`: null on failure
    pub fn calloc(&mut self, count: usize, size: usize) -> *mut u8 {
        self.auto_init();
        into_raw(self.collector.zero_allocate(count, size))
    }

    /// `realloc`: null on failure, `ptr` is never released here
    pub fn realloc(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
        self.auto_init();
        into_raw(self.collector.reallocate(ptr, size))
    }

    /// `free`: blocks are only reclaimed by collection cycles
    pub fn free(&mut self, _ptr: *mut u8) {}

    fn auto_init(&mut self) {
        if self.initialized {
            return;
        }
        if self.collector.stack_anchor().is_none() {
            self.collector.init_thread_stack();
        }
        // Stays uninitialized without stack bounds so `init_manual` still applies
        self.initialized = self.collector.stack_anchor().is_some();
    }
}

fn into_raw(result: GcResult<NonNull<u8>>) -> *mut u8 {
    result.map_or(ptr::null_mut(), NonNull::as_ptr)
}
