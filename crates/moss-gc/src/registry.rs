//! Allocation registry
//!
//! Owns every tracked block. Records form one intrusive singly linked list
//! reachable from `head`; new records are linked at the head. A side index
//! keyed by data address answers "is this value a tracked block?" in O(1)
//! during marking.

use std::alloc::{GlobalAlloc, Layout};
use std::marker::PhantomData;
use std::ptr::NonNull;

use rustc_hash::FxHashMap;

use crate::block::{BLOCK_ALIGN, BlockHeader, HEADER_SIZE, block_layout, data_ptr};
use crate::error::{GcError, GcResult};

/// Registry of live blocks, backed by the raw allocator `A`.
pub struct BlockRegistry<A: GlobalAlloc> {
    /// Raw allocator that provides and releases block memory
    raw: A,
    /// First record of the list
    head: Option<NonNull<BlockHeader>>,
    /// Data address -> record
    index: FxHashMap<usize, NonNull<BlockHeader>>,
    /// Sum of payload sizes of all records
    live_bytes: usize,
}

// SAFETY: the registry exclusively owns every block it links; no other handle
// to a record exists, so moving the registry to another thread moves the
// blocks with it (like a Box).
unsafe impl<A: GlobalAlloc + Send> Send for BlockRegistry<A> {}

impl<A: GlobalAlloc> BlockRegistry<A> {
    /// Create an empty registry over a raw allocator
    pub fn new(raw: A) -> Self {
        Self {
            raw,
            head: None,
            index: FxHashMap::default(),
            live_bytes: 0,
        }
    }

    /// Raw allocator backing this registry
    pub fn raw(&self) -> &A {
        &self.raw
    }

    /// Reserve a block with `size` payload bytes and link it at the head.
    ///
    /// The new record is unmarked. Fails without touching the list when the
    /// size is invalid or the raw allocator returns null.
    pub fn insert(&mut self, size: usize) -> GcResult<NonNull<BlockHeader>> {
        let layout = block_layout(size)?;

        // SAFETY: layout has non-zero size
        let raw = unsafe { self.raw.alloc(layout) };
        let header = NonNull::new(raw.cast::<BlockHeader>()).ok_or(
            GcError::AllocationExhausted {
                size: layout.size(),
            },
        )?;

        // SAFETY: header points to fresh memory sized and aligned for a block
        unsafe {
            header.as_ptr().write(BlockHeader::new(size));
            (*header.as_ptr()).set_next(self.head);
        }

        self.head = Some(header);
        self.index.insert(data_ptr(header).as_ptr() as usize, header);
        self.live_bytes += size;
        Ok(header)
    }

    /// Record whose data region starts exactly at `addr`
    #[inline]
    pub fn lookup(&self, addr: usize) -> Option<NonNull<BlockHeader>> {
        self.index.get(&addr).copied()
    }

    /// True if `addr` is the data address of a live block
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        self.index.contains_key(&addr)
    }

    /// Number of live blocks
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if no block is registered
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Sum of payload bytes over all live blocks
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    pub(crate) fn head(&self) -> Option<NonNull<BlockHeader>> {
        self.head
    }

    /// Iterate over records from the head
    pub fn iter(&self) -> Blocks<'_> {
        Blocks {
            cursor: self.head,
            _registry: PhantomData,
        }
    }

    /// Unlink `header` from the list and release its memory.
    ///
    /// Returns the payload size of the released block.
    ///
    /// # Safety
    /// `header` must be a record of this registry and `prev` must be its
    /// predecessor in the list (`None` if `header` is the head).
    pub(crate) unsafe fn unlink(
        &mut self,
        prev: Option<NonNull<BlockHeader>>,
        header: NonNull<BlockHeader>,
    ) -> usize {
        // SAFETY: caller guarantees both records belong to this list
        let (size, next) = unsafe {
            let h = header.as_ref();
            (h.size(), h.next())
        };

        match prev {
            // SAFETY: prev is a live record of this list
            Some(prev) => unsafe { (*prev.as_ptr()).set_next(next) },
            None => self.head = next,
        }

        self.index.remove(&(data_ptr(header).as_ptr() as usize));
        self.live_bytes -= size;

        // SAFETY: the record is no longer reachable from the list or index
        unsafe { self.release(header, size) };
        size
    }

    /// Release every record regardless of mark state and empty the list.
    ///
    /// Returns `(blocks, bytes)` released.
    pub fn release_all(&mut self) -> (usize, usize) {
        let mut blocks = 0;
        let mut bytes = 0;
        let mut cursor = self.head.take();

        while let Some(header) = cursor {
            // SAFETY: each record is visited once and released after its
            // successor has been read
            unsafe {
                let size = header.as_ref().size();
                cursor = header.as_ref().next();
                self.release(header, size);
                bytes += size;
            }
            blocks += 1;
        }

        self.index.clear();
        self.live_bytes = 0;
        (blocks, bytes)
    }

    /// # Safety
    /// `header` must be an unlinked record of this registry of payload `size`.
    unsafe fn release(&self, header: NonNull<BlockHeader>, size: usize) {
        // SAFETY: the same layout was accepted by block_layout at insert time
        unsafe {
            let layout = Layout::from_size_align_unchecked(HEADER_SIZE + size, BLOCK_ALIGN);
            self.raw.dealloc(header.as_ptr().cast::<u8>(), layout);
        }
    }
}

impl<A: GlobalAlloc> Drop for BlockRegistry<A> {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Iterator over the records of a registry
pub struct Blocks<'a> {
    cursor: Option<NonNull<BlockHeader>>,
    _registry: PhantomData<&'a BlockHeader>,
}

impl Iterator for Blocks<'_> {
    type Item = NonNull<BlockHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = self.cursor?;
        // SAFETY: the registry is borrowed for 'a, so no record is released
        self.cursor = unsafe { header.as_ref().next() };
        Some(header)
    }
}
