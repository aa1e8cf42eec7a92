//! Conservative memory scanning
//!
//! This is the only module that interprets raw memory as possible addresses.
//! Everything else sees a [`ScanRange`] going in and plain `usize` candidates
//! coming out of [`scan`]; whether a candidate names a block is decided by the
//! mark engine.
//!
//! Scanning has no type information: every address-sized window in a range is
//! read, including stale slots and non-pointer data that happens to look like
//! an address. Such false positives only retain extra blocks.

use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use crate::block::{BlockHeader, HEADER_SIZE};
use crate::config::ScanGranularity;

const WORD: usize = std::mem::size_of::<usize>();

/// A readable memory region to be scanned for candidate addresses.
#[derive(Clone, Copy)]
pub struct ScanRange<'a> {
    start: *const u8,
    len: usize,
    _memory: PhantomData<&'a [u8]>,
}

impl<'a> ScanRange<'a> {
    /// Range between two bounds, in either order.
    ///
    /// The lower bound is inclusive and the higher one exclusive.
    ///
    /// # Safety
    /// Every byte between the bounds must be readable for `'a`, and both
    /// bounds must lie in the same mapped region (one thread's stack, for
    /// instance).
    pub unsafe fn between(a: *const u8, b: *const u8) -> Self {
        let (low, high) = if (a as usize) <= (b as usize) {
            (a, b)
        } else {
            (b, a)
        };
        Self {
            start: low,
            len: high as usize - low as usize,
            _memory: PhantomData,
        }
    }

    /// Scan the bytes of a slice.
    pub fn of_bytes(bytes: &'a [u8]) -> Self {
        Self {
            start: bytes.as_ptr(),
            len: bytes.len(),
            _memory: PhantomData,
        }
    }

    /// Scan a slice of words (a simulated stack frame or root table).
    pub fn of_words(words: &'a [usize]) -> Self {
        Self {
            start: words.as_ptr().cast::<u8>(),
            len: std::mem::size_of_val(words),
            _memory: PhantomData,
        }
    }

    /// Data region of a tracked block.
    ///
    /// # Safety
    /// `header` must be a live record whose block stays allocated for `'a`.
    pub(crate) unsafe fn of_block(header: *const BlockHeader) -> Self {
        // SAFETY: caller guarantees header is live; the payload follows it
        unsafe {
            Self {
                start: header.cast::<u8>().add(HEADER_SIZE),
                len: (*header).size(),
                _memory: PhantomData,
            }
        }
    }

    /// Lowest address in the range
    pub fn start(&self) -> usize {
        self.start as usize
    }

    /// One past the highest address in the range
    pub fn end(&self) -> usize {
        self.start as usize + self.len
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the range has no bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if at least one address-sized window fits in the range
    pub fn holds_word(&self) -> bool {
        self.len >= WORD
    }
}

impl std::fmt::Debug for ScanRange<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScanRange({:#x}..{:#x})", self.start(), self.end())
    }
}

/// Every address-sized value in `range`, at the offsets `granularity` selects.
pub fn scan<'a>(range: ScanRange<'a>, granularity: ScanGranularity) -> Candidates<'a> {
    let offset = match granularity {
        ScanGranularity::Byte => 0,
        // First word-aligned slot at or after start
        ScanGranularity::Word => range.start.align_offset(WORD).min(range.len),
    };
    Candidates {
        range,
        offset,
        step: granularity.step(),
    }
}

/// Iterator returned by [`scan`]
pub struct Candidates<'a> {
    range: ScanRange<'a>,
    offset: usize,
    step: usize,
}

impl Iterator for Candidates<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.offset + WORD > self.range.len {
            return None;
        }
        // SAFETY: offset + WORD <= len, and ScanRange guarantees the whole
        // region is readable. Slots may be unaligned.
        let value = unsafe {
            self.range
                .start
                .add(self.offset)
                .cast::<usize>()
                .read_unaligned()
        };
        self.offset += self.step;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.offset + WORD > self.range.len {
            0
        } else {
            (self.range.len - WORD - self.offset) / self.step + 1
        };
        (remaining, Some(remaining))
    }
}

/// Highest address of the calling thread's stack, if the platform reports it.
///
/// Stacks grow down from this address on every supported target, so the range
/// from here to any live frame of the thread covers all of its callers.
pub fn thread_stack_base() -> Option<*const u8> {
    platform::stack_base()
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod platform {
    pub(super) fn stack_base() -> Option<*const u8> {
        // SAFETY: attr is filled by pthread_getattr_np before it is read and
        // destroyed exactly once
        unsafe {
            let mut attr: libc::pthread_attr_t = std::mem::zeroed();
            if libc::pthread_getattr_np(libc::pthread_self(), &mut attr) != 0 {
                return None;
            }
            let mut low: *mut libc::c_void = std::ptr::null_mut();
            let mut size: libc::size_t = 0;
            let rc = libc::pthread_attr_getstack(&attr, &mut low, &mut size);
            libc::pthread_attr_destroy(&mut attr);

            if rc != 0 || low.is_null() {
                return None;
            }
            Some(low.cast::<u8>().wrapping_add(size).cast_const())
        }
    }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod platform {
    pub(super) fn stack_base() -> Option<*const u8> {
        // SAFETY: only queries the calling thread
        let high = unsafe { libc::pthread_get_stackaddr_np(libc::pthread_self()) };
        (!high.is_null()).then(|| high.cast::<u8>().cast_const())
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios"
)))]
mod platform {
    pub(super) fn stack_base() -> Option<*const u8> {
        None
    }
}

/// A recorded end of the stack scan range, tied to the thread that set it.
#[derive(Debug, Clone, Copy)]
pub struct StackAnchor {
    addr: *const u8,
    thread: ThreadId,
}

impl StackAnchor {
    /// Anchor at `addr` on the calling thread's stack
    pub fn here(addr: *const u8) -> Self {
        Self {
            addr,
            thread: thread::current().id(),
        }
    }

    /// Anchor at the base of the calling thread's stack
    pub fn thread_base() -> Option<Self> {
        thread_stack_base().map(Self::here)
    }

    /// Anchor address
    pub fn addr(&self) -> *const u8 {
        self.addr
    }

    /// True if the calling thread set this anchor
    pub fn is_current_thread(&self) -> bool {
        self.thread == thread::current().id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between_orders_bounds() {
        let words = [0usize; 4];
        let low = words.as_ptr().cast::<u8>();
        let high = unsafe { low.add(std::mem::size_of_val(&words)) };

        let forward = unsafe { ScanRange::between(low, high) };
        let backward = unsafe { ScanRange::between(high, low) };
        assert_eq!(forward.start(), backward.start());
        assert_eq!(forward.len(), 4 * WORD);
        assert_eq!(backward.end(), high as usize);
    }

    #[test]
    fn test_word_scan_reads_each_slot() {
        let words = [1usize, 2, 3];
        let values: Vec<usize> =
            scan(ScanRange::of_words(&words), ScanGranularity::Word).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_byte_scan_visits_every_offset() {
        let words = [0usize; 3];
        let range = ScanRange::of_words(&words);
        let candidates = scan(range, ScanGranularity::Byte);
        // 3 words => 2 * WORD + 1 windows
        assert_eq!(candidates.size_hint(), (2 * WORD + 1, Some(2 * WORD + 1)));
        assert_eq!(candidates.count(), 2 * WORD + 1);
    }

    #[test]
    fn test_byte_scan_finds_unaligned_value() {
        let mut bytes = [0u8; 3 * WORD];
        let needle = 0x1234_5678usize;
        bytes[3..3 + WORD].copy_from_slice(&needle.to_ne_bytes());

        let byte_hits = scan(ScanRange::of_bytes(&bytes), ScanGranularity::Byte)
            .filter(|&v| v == needle)
            .count();
        assert_eq!(byte_hits, 1);
    }

    #[test]
    fn test_short_range_holds_no_word() {
        let bytes = [0xffu8; WORD - 1];
        let range = ScanRange::of_bytes(&bytes);
        assert!(!range.is_empty());
        assert!(!range.holds_word());
        assert_eq!(scan(range, ScanGranularity::Byte).count(), 0);
        assert_eq!(scan(range, ScanGranularity::Word).count(), 0);

        let none = ScanRange::of_bytes(&[]);
        assert!(none.is_empty());
        assert_eq!(none.len(), 0);

        let words = [0usize; 1];
        assert!(ScanRange::of_words(&words).holds_word());
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn test_thread_stack_base_is_above_locals() {
        let local = 0usize;
        let here = std::hint::black_box(&local) as *const usize as usize;
        let base = thread_stack_base().unwrap() as usize;
        assert!(base > here);
        assert!(base - here < 1 << 30);

        let spawned = std::thread::spawn(|| {
            let local = 0usize;
            let here = std::hint::black_box(&local) as *const usize as usize;
            (here, thread_stack_base().unwrap() as usize)
        })
        .join()
        .unwrap();
        assert!(spawned.1 > spawned.0);
        assert_ne!(spawned.1, base);
    }

    #[test]
    fn test_anchor_thread_affinity() {
        let local = 0u8;
        let anchor = StackAnchor::here(&local);
        assert!(anchor.is_current_thread());

        let foreign = std::thread::spawn(|| {
            let local = 0u8;
            StackAnchor::here(&local).thread
        })
        .join()
        .unwrap();
        assert_ne!(foreign, anchor.thread);
    }
}
