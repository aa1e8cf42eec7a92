//! Collector context
//!
//! A [`Collector`] owns one registry and one stack anchor. It is the value an
//! embedding application creates and passes around instead of process-wide
//! state; independent collectors never see each other's blocks.

use std::alloc::{GlobalAlloc, System};
use std::ptr::NonNull;
use std::time::{Duration, Instant};

use crate::block::{data_ptr, resolve};
use crate::config::GcConfig;
use crate::error::{GcError, GcResult};
use crate::mark::Marker;
use crate::registry::BlockRegistry;
use crate::scan::{ScanRange, StackAnchor};
use crate::stats::{CollectorStats, CycleStats};
use crate::sweep::sweep;

/// Conservative mark/sweep collector over the raw allocator `A`
pub struct Collector<A: GlobalAlloc = System> {
    registry: BlockRegistry<A>,
    anchor: Option<StackAnchor>,
    config: GcConfig,
    collection_count: usize,
    skipped_count: usize,
    last_cycle: Option<CycleStats>,
    total_pause: Duration,
}

// SAFETY: the registry owns its blocks exclusively (see BlockRegistry). The
// anchor is only dereferenced as a scan bound on the thread that recorded it.
unsafe impl<A: GlobalAlloc + Send> Send for Collector<A> {}

impl Collector<System> {
    /// Create a collector over the system allocator with default config
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    /// Create a collector over the system allocator
    pub fn with_config(config: GcConfig) -> Self {
        Self::with_allocator(System, config)
    }
}

impl Default for Collector<System> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: GlobalAlloc> Collector<A> {
    /// Create a collector drawing block memory from `raw`
    pub fn with_allocator(raw: A, config: GcConfig) -> Self {
        Self {
            registry: BlockRegistry::new(raw),
            anchor: None,
            config,
            collection_count: 0,
            skipped_count: 0,
            last_cycle: None,
            total_pause: Duration::ZERO,
        }
    }

    /// Get config
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Registry of live blocks
    pub fn registry(&self) -> &BlockRegistry<A> {
        &self.registry
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Record the stack anchor for subsequent cycles.
    ///
    /// `anchor` should be the address of a local that outlives every frame
    /// holding block addresses, usually one in `main` or at the top of a
    /// thread. A second call replaces the previous anchor.
    pub fn init<T>(&mut self, anchor: *const T) {
        self.anchor = Some(StackAnchor::here(anchor.cast::<u8>()));
    }

    /// Anchor at the base of the calling thread's stack.
    ///
    /// Every frame of the thread lies below the base, so blocks held in any
    /// caller's locals are scanned. Returns false, leaving the anchor
    /// unchanged, where the platform does not report stack bounds.
    pub fn init_thread_stack(&mut self) -> bool {
        match StackAnchor::thread_base() {
            Some(anchor) => {
                self.anchor = Some(anchor);
                true
            }
            None => false,
        }
    }

    /// Current stack anchor address, if any
    pub fn stack_anchor(&self) -> Option<*const u8> {
        self.anchor.map(|a| a.addr())
    }

    /// Release every tracked block regardless of reachability and clear the
    /// anchor.
    ///
    /// Returns the payload bytes released. Safe to call repeatedly.
    pub fn teardown(&mut self) -> usize {
        let (_blocks, bytes) = self.registry.release_all();
        self.anchor = None;

        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            target: "moss::gc",
            released_blocks = _blocks,
            released_bytes = bytes,
            "Collector teardown"
        );

        bytes
    }

    // ---------------------------------------------------------------
    // Allocation API
    // ---------------------------------------------------------------

    /// Allocate `size` uninitialized bytes.
    pub fn allocate(&mut self, size: usize) -> GcResult<NonNull<u8>> {
        if self.anchor.is_none() && self.config.lazy_anchor {
            self.init_thread_stack();
        }

        match self.registry.insert(size) {
            Ok(header) => Ok(data_ptr(header)),
            Err(err) => {
                #[cfg(feature = "gc_logging")]
                tracing::trace!(target: "moss::gc", size, error = %err, "Allocation rejected");
                Err(err)
            }
        }
    }

    /// Allocate `count * size` zeroed bytes.
    pub fn zero_allocate(&mut self, count: usize, size: usize) -> GcResult<NonNull<u8>> {
        let total = match count.checked_mul(size) {
            Some(total) if count != 0 && size != 0 => total,
            _ => return Err(GcError::SizeOverflow { count, size }),
        };
        let ptr = self.allocate(total)?;
        // SAFETY: the block was just reserved with `total` payload bytes
        unsafe { ptr.as_ptr().write_bytes(0, total) };
        Ok(ptr)
    }

    /// Move the contents of `ptr` into a fresh block of `new_size` bytes.
    ///
    /// - null `ptr` behaves like [`allocate`](Self::allocate).
    /// - `new_size == 0` fails and leaves `ptr` registered; a later cycle
    ///   reclaims it once nothing refers to it.
    /// - otherwise the first `min(old, new_size)` bytes are copied and the old
    ///   block is left for the next cycle.
    ///
    /// `ptr` must be a data address issued by this collector; anything else
    /// yields [`GcError::UnknownPointer`].
    pub fn reallocate(&mut self, ptr: *mut u8, new_size: usize) -> GcResult<NonNull<u8>> {
        let Some(old) = NonNull::new(ptr) else {
            return self.allocate(new_size);
        };
        if new_size == 0 {
            return Err(GcError::InvalidSize { size: 0 });
        }
        if !self.registry.contains(old.as_ptr() as usize) {
            return Err(GcError::UnknownPointer {
                addr: old.as_ptr() as usize,
            });
        }

        // SAFETY: old is the data address of a live block of this registry
        let old_size = unsafe { resolve(old).as_ref().size() };
        let new = self.allocate(new_size)?;
        // SAFETY: both blocks are live and distinct
        unsafe {
            std::ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), old_size.min(new_size));
        }
        Ok(new)
    }

    /// True if `ptr` is the data address of a live block
    pub fn is_tracked(&self, ptr: *const u8) -> bool {
        self.registry.contains(ptr as usize)
    }

    /// Payload size of a live block
    pub fn size_of(&self, ptr: *const u8) -> Option<usize> {
        self.registry
            .lookup(ptr as usize)
            // SAFETY: lookup only yields live records
            .map(|header| unsafe { header.as_ref().size() })
    }

    // ---------------------------------------------------------------
    // Collection
    // ---------------------------------------------------------------

    /// Run one collection cycle rooted in the calling thread's stack.
    ///
    /// Scans from the recorded anchor to this frame. Without an anchor set on
    /// the calling thread the cycle is skipped and nothing is reclaimed.
    #[inline(never)]
    pub fn run_collection_cycle(&mut self) -> CycleStats {
        let bound = 0usize;
        let here = std::hint::black_box(&bound as *const usize).cast::<u8>();

        let anchor = match self.anchor {
            Some(anchor) if anchor.is_current_thread() => anchor,
            _ => {
                #[cfg(feature = "gc_logging")]
                tracing::warn!(
                    target: "moss::gc",
                    anchored = self.anchor.is_some(),
                    "No stack anchor for this thread, skipping collection"
                );
                self.skipped_count += 1;
                return CycleStats::skipped();
            }
        };

        // SAFETY: both bounds lie on the calling thread's stack; every byte
        // between them belongs to frames at or below the anchor's frame.
        let stack = unsafe { ScanRange::between(anchor.addr(), here) };
        let stats = self.collect_from(&[stack]);
        std::hint::black_box(&bound);
        stats
    }

    /// Run one collection cycle rooted in caller-supplied regions instead of
    /// the stack.
    pub fn collect_from(&mut self, roots: &[ScanRange<'_>]) -> CycleStats {
        let start = Instant::now();

        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            target: "moss::gc",
            root_ranges = roots.len(),
            root_bytes = roots.iter().map(|r| r.len()).sum::<usize>(),
            live_blocks = self.registry.len(),
            live_bytes = self.registry.live_bytes(),
            "GC cycle starting"
        );

        // Phase 1: Mark from roots
        let mut marker = Marker::new(&self.registry, &self.config);
        for &range in roots {
            marker.mark_roots(range);
        }
        marker.drain();
        let (roots_found, marked) = marker.finish();

        // Phase 2: Sweep unmarked blocks, clear survivors
        let swept = sweep(&mut self.registry);

        let stats = CycleStats {
            roots: roots_found,
            marked,
            reclaimed_blocks: swept.reclaimed_blocks,
            reclaimed_bytes: swept.reclaimed_bytes,
            surviving_blocks: swept.surviving_blocks,
            pause: start.elapsed(),
            skipped: false,
        };

        self.collection_count += 1;
        self.total_pause += stats.pause;
        self.last_cycle = Some(stats);

        #[cfg(feature = "gc_logging")]
        tracing::info!(
            target: "moss::gc",
            collection = self.collection_count,
            roots = stats.roots,
            reclaimed_blocks = stats.reclaimed_blocks,
            reclaimed_bytes = stats.reclaimed_bytes,
            live_blocks = stats.surviving_blocks,
            pause_us = stats.pause.as_micros() as u64,
            "GC cycle complete"
        );

        stats
    }

    // ---------------------------------------------------------------
    // Statistics
    // ---------------------------------------------------------------

    /// Number of live blocks
    pub fn live_blocks(&self) -> usize {
        self.registry.len()
    }

    /// Payload bytes of all live blocks
    pub fn live_bytes(&self) -> usize {
        self.registry.live_bytes()
    }

    /// True once live bytes reach the configured threshold
    pub fn should_collect(&self) -> bool {
        self.live_bytes() >= self.config.collect_threshold
    }

    /// Get collection statistics
    pub fn stats(&self) -> CollectorStats {
        CollectorStats {
            live_blocks: self.live_blocks(),
            live_bytes: self.live_bytes(),
            collection_count: self.collection_count,
            skipped_count: self.skipped_count,
            last_cycle: self.last_cycle,
            total_pause: self.total_pause,
        }
    }
}

impl<A: GlobalAlloc> Drop for Collector<A> {
    fn drop(&mut self) {
        self.teardown();
    }
}
