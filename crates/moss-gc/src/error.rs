//! Collector error types

use thiserror::Error;

/// Reasons an allocation request produced no allocation.
///
/// Every variant is the "no allocation" signal: the caller gets no block and
/// no registry entry is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GcError {
    /// Zero-sized request, or a size too large to describe with a block header
    #[error("invalid allocation size: {size}")]
    InvalidSize {
        /// Requested size in bytes
        size: usize,
    },

    /// Element count or element size is zero, or their product overflows
    #[error("invalid element request: {count} x {size}")]
    SizeOverflow {
        /// Number of elements
        count: usize,
        /// Size of one element
        size: usize,
    },

    /// The raw allocator returned null
    #[error("raw allocator exhausted while reserving {size} bytes")]
    AllocationExhausted {
        /// Total bytes requested from the raw allocator (payload + header)
        size: usize,
    },

    /// Pointer was not issued by this collector, or its block is gone
    #[error("pointer {addr:#x} is not a tracked block")]
    UnknownPointer {
        /// Address passed by the caller
        addr: usize,
    },
}

impl GcError {
    /// True for contract violations by the caller rather than size/resource failures.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, GcError::UnknownPointer { .. })
    }
}

/// Result alias for collector operations
pub type GcResult<T> = Result<T, GcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error_classification() {
        assert!(GcError::UnknownPointer { addr: 0x10 }.is_usage_error());
        assert!(!GcError::InvalidSize { size: 0 }.is_usage_error());
        assert!(!GcError::AllocationExhausted { size: 64 }.is_usage_error());
    }

    #[test]
    fn test_error_messages() {
        let err = GcError::UnknownPointer { addr: 0xdead };
        assert_eq!(err.to_string(), "pointer 0xdead is not a tracked block");

        let err = GcError::SizeOverflow { count: 3, size: 0 };
        assert_eq!(err.to_string(), "invalid element request: 3 x 0");
    }
}
