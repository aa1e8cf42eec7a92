//! Mark phase
//!
//! Candidates from root ranges that name a tracked block get their record
//! marked and the block's data region queued for scanning. Regions are drained
//! from a worklist rather than by recursion, so long chains of blocks cannot
//! exhaust the native stack. A record is queued only on its false -> true mark
//! transition; each block is therefore scanned at most once per cycle.

use std::alloc::GlobalAlloc;
use std::ptr::NonNull;

use crate::block::BlockHeader;
use crate::config::{GcConfig, PointerValidity, ScanGranularity};
use crate::registry::BlockRegistry;
use crate::scan::{ScanRange, scan};

/// Resolves candidate values to records
enum Lookup {
    /// Exact data-address match through the registry index
    Exact,
    /// Sorted `(start, end, header)` data regions, built once per cycle
    Interior(Vec<(usize, usize, NonNull<BlockHeader>)>),
}

/// State of one mark phase
pub(crate) struct Marker<'r, A: GlobalAlloc> {
    registry: &'r BlockRegistry<A>,
    granularity: ScanGranularity,
    lookup: Lookup,
    worklist: Vec<NonNull<BlockHeader>>,
    roots: usize,
    marked: usize,
}

impl<'r, A: GlobalAlloc> Marker<'r, A> {
    pub(crate) fn new(registry: &'r BlockRegistry<A>, config: &GcConfig) -> Self {
        let lookup = match config.pointer_validity {
            PointerValidity::Exact => Lookup::Exact,
            PointerValidity::Interior => Lookup::Interior(build_regions(registry)),
        };
        Self {
            registry,
            granularity: config.scan_granularity,
            lookup,
            worklist: Vec::new(),
            roots: 0,
            marked: 0,
        }
    }

    /// Treat every candidate in `range` as a potential root.
    pub(crate) fn mark_roots(&mut self, range: ScanRange<'_>) {
        for candidate in scan(range, self.granularity) {
            if let Some(header) = self.resolve(candidate) {
                self.roots += 1;
                self.shade(header);
            }
        }
    }

    /// Scan queued blocks until no unmarked block is reachable.
    pub(crate) fn drain(&mut self) {
        while let Some(header) = self.worklist.pop() {
            // SAFETY: queued records are live and nothing is released while marking
            let region = unsafe { ScanRange::of_block(header.as_ptr()) };
            for candidate in scan(region, self.granularity) {
                if let Some(child) = self.resolve(candidate) {
                    self.shade(child);
                }
            }
        }
    }

    /// `(roots, marked)` counters
    pub(crate) fn finish(self) -> (usize, usize) {
        (self.roots, self.marked)
    }

    #[inline]
    fn resolve(&self, candidate: usize) -> Option<NonNull<BlockHeader>> {
        match &self.lookup {
            Lookup::Exact => self.registry.lookup(candidate),
            Lookup::Interior(regions) => {
                let idx = regions.partition_point(|&(start, _, _)| start <= candidate);
                let &(_, end, header) = regions.get(idx.checked_sub(1)?)?;
                (candidate < end).then_some(header)
            }
        }
    }

    #[inline]
    fn shade(&mut self, header: NonNull<BlockHeader>) {
        // SAFETY: header came from the registry and is live
        let record = unsafe { &mut *header.as_ptr() };
        if !record.is_marked() {
            record.set_mark(true);
            self.marked += 1;
            self.worklist.push(header);
        }
    }
}

fn build_regions<A: GlobalAlloc>(
    registry: &BlockRegistry<A>,
) -> Vec<(usize, usize, NonNull<BlockHeader>)> {
    let mut regions: Vec<_> = registry
        .iter()
        .map(|header| {
            // SAFETY: iterated records are live
            let region = unsafe { ScanRange::of_block(header.as_ptr()) };
            (region.start(), region.end(), header)
        })
        .collect();
    regions.sort_unstable_by_key(|&(start, _, _)| start);
    regions
}
