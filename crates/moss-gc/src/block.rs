//! Block record layout
//!
//! Every tracked allocation is one raw allocation of `HEADER_SIZE + size`
//! bytes: a [`BlockHeader`] followed by the caller's data. The data address
//! handed out is always `header + HEADER_SIZE`, so the header can be recovered
//! from it by fixed-offset arithmetic.

use std::alloc::Layout;
use std::ptr::NonNull;

use crate::error::{GcError, GcResult};

/// Alignment of every block (and therefore of every returned data pointer)
pub const BLOCK_ALIGN: usize = 16;

/// Bytes between the start of a block and its data region
pub const HEADER_SIZE: usize =
    (std::mem::size_of::<BlockHeader>() + BLOCK_ALIGN - 1) & !(BLOCK_ALIGN - 1);

/// Metadata preceding each tracked allocation
#[repr(C)]
pub struct BlockHeader {
    /// Set during marking, cleared by sweep
    mark: bool,
    /// Payload size in bytes (excluding the header)
    size: usize,
    /// Next record in the registry list
    next: Option<NonNull<BlockHeader>>,
}

impl BlockHeader {
    /// Create an unmarked, unlinked header
    pub const fn new(size: usize) -> Self {
        Self {
            mark: false,
            size,
            next: None,
        }
    }

    /// Get mark bit
    pub fn is_marked(&self) -> bool {
        self.mark
    }

    /// Set mark bit
    pub fn set_mark(&mut self, mark: bool) {
        self.mark = mark;
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn next(&self) -> Option<NonNull<BlockHeader>> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: Option<NonNull<BlockHeader>>) {
        self.next = next;
    }
}

/// Raw layout of a block holding `size` payload bytes.
pub fn block_layout(size: usize) -> GcResult<Layout> {
    if size == 0 {
        return Err(GcError::InvalidSize { size });
    }
    let total = HEADER_SIZE
        .checked_add(size)
        .ok_or(GcError::InvalidSize { size })?;
    Layout::from_size_align(total, BLOCK_ALIGN).map_err(|_| GcError::InvalidSize { size })
}

/// Data address of a block.
pub fn data_ptr(header: NonNull<BlockHeader>) -> NonNull<u8> {
    // SAFETY: a header address is never within HEADER_SIZE of the top of the
    // address space, so the offset cannot wrap to null.
    unsafe { NonNull::new_unchecked(header.as_ptr().cast::<u8>().wrapping_add(HEADER_SIZE)) }
}

/// Recover the header of a block from its data address.
///
/// # Safety
/// `ptr` must be a data address previously returned by this crate whose block
/// has not been released. Provenance is not checked.
pub unsafe fn resolve(ptr: NonNull<u8>) -> NonNull<BlockHeader> {
    // SAFETY: caller guarantees ptr = header + HEADER_SIZE, so the result is
    // the (non-null) header address.
    unsafe { NonNull::new_unchecked(ptr.as_ptr().wrapping_sub(HEADER_SIZE).cast::<BlockHeader>()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size_is_aligned() {
        assert_eq!(HEADER_SIZE % BLOCK_ALIGN, 0);
        assert!(HEADER_SIZE >= std::mem::size_of::<BlockHeader>());
    }

    #[test]
    fn test_layout_rejects_bad_sizes() {
        assert_eq!(block_layout(0), Err(GcError::InvalidSize { size: 0 }));
        assert_eq!(
            block_layout(usize::MAX),
            Err(GcError::InvalidSize { size: usize::MAX })
        );
        assert_eq!(
            block_layout(isize::MAX as usize),
            Err(GcError::InvalidSize {
                size: isize::MAX as usize
            })
        );
    }

    #[test]
    fn test_layout_includes_header() {
        let layout = block_layout(16).unwrap();
        assert_eq!(layout.size(), HEADER_SIZE + 16);
        assert_eq!(layout.align(), BLOCK_ALIGN);
    }

    #[test]
    fn test_resolve_inverts_data_ptr() {
        let mut header = BlockHeader::new(8);
        header.set_mark(true);
        assert!(header.is_marked());

        let ptr = NonNull::from(&mut header);
        let data = data_ptr(ptr);
        assert_eq!(data.as_ptr() as usize - ptr.as_ptr() as usize, HEADER_SIZE);
        // Arithmetic only; the data address is never dereferenced here.
        assert_eq!(unsafe { resolve(data) }, ptr);
    }
}
