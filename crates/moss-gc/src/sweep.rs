//! Sweep phase

use std::alloc::GlobalAlloc;

use crate::registry::BlockRegistry;

/// Result of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SweepStats {
    pub(crate) reclaimed_blocks: usize,
    pub(crate) reclaimed_bytes: usize,
    pub(crate) surviving_blocks: usize,
}

/// Release every unmarked record and clear the marks of the rest.
///
/// After this returns every record in the registry is unmarked.
pub(crate) fn sweep<A: GlobalAlloc>(registry: &mut BlockRegistry<A>) -> SweepStats {
    let mut stats = SweepStats::default();
    let mut prev = None;
    let mut cursor = registry.head();

    while let Some(header) = cursor {
        // SAFETY: cursor walks live records of this registry; the successor is
        // read before the current record can be released
        unsafe {
            let record = &mut *header.as_ptr();
            cursor = record.next();

            if record.is_marked() {
                record.set_mark(false);
                prev = Some(header);
                stats.surviving_blocks += 1;
            } else {
                stats.reclaimed_bytes += registry.unlink(prev, header);
                stats.reclaimed_blocks += 1;
            }
        }
    }

    stats
}
