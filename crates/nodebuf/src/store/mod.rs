//! Documents that own their memory and grow on demand.
//!
//! A store keeps its document in an allocated region and reruns any
//! mutation that fails with [`crate::Error::NoBufferSpace`] after growing the
//! region by [`crate::GROWTH_FACTOR`]. A store therefore only reports
//! `NoBufferSpace` from a write once it has reached its ceiling
//! ([`crate::StoreOptions::max_capacity`]), and reports
//! [`crate::Error::OutOfMemory`] if the allocator gives up first.
//!
//! Two flavors share the same growth code:
//!
//! - [`Store`] owns its allocator and frees its region on drop.
//! - [`UnmanagedStore`] is handed an allocator on every call that may
//!   allocate; mutations go through [`UnmanagedStore::with_allocator`].

mod alloc;
mod managed;
mod region;
mod unmanaged;

pub use alloc::{AllocError, HeapAllocator, RegionAllocator};
pub use managed::Store;
pub use unmanaged::{StoreHandle, UnmanagedStore};
