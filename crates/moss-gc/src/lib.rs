//! # Moss Garbage Collector
//!
//! Conservative, stop-the-world mark/sweep collector for raw byte allocations.
//!
//! ## Design
//!
//! - **Registry**: every block carries a header (mark bit, size, next link);
//!   all headers form one singly linked list owned by a [`Collector`]
//! - **Roots**: the calling thread's stack between a recorded anchor and the
//!   current frame, read as address-sized values at every byte offset
//! - **Mark**: a value counts as a reference only if it equals the data
//!   address of a tracked block (optionally, any address inside one)
//! - **Sweep**: unmarked blocks are released; survivors are unmarked again
//! - **No globals**: each [`Collector`] is an independent context object

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod allocator;
pub mod block;
pub mod collector;
pub mod config;
pub mod error;
pub mod host;
mod mark;
pub mod registry;
pub mod scan;
pub mod shared;
pub mod stats;
mod sweep;

pub use allocator::ManagedAllocator;
pub use block::{BLOCK_ALIGN, BlockHeader, HEADER_SIZE};
pub use collector::Collector;
pub use config::{GcConfig, PointerValidity, ScanGranularity};
pub use error::{GcError, GcResult};
pub use host::GcHost;
pub use registry::BlockRegistry;
pub use scan::ScanRange;
pub use shared::SharedCollector;
pub use stats::{CollectorStats, CycleStats};
