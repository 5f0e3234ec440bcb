use super::{alloc::RegionAllocator, region::Region};
use crate::{
    document::{DocRead, DocWrite},
    engine::Ret,
    error::Result,
    options::StoreOptions,
};

/// A growable document whose allocator is supplied per call.
///
/// Reads work on the store directly. Writes go through a [`StoreHandle`]
/// that pairs the store with an allocator for as long as it is held:
///
/// ```rust
/// use nodebuf::{DocRead, DocWrite, HeapAllocator, Offset, UnmanagedStore};
///
/// let mut heap = HeapAllocator;
/// let mut store = UnmanagedStore::new(&mut heap)?;
/// store.with_allocator(&mut heap).set_i64(Offset::ROOT, "n", 7)?;
/// assert_eq!(store.get_i64(Offset::ROOT, "n")?, 7);
/// store.release(&mut heap);
/// # Ok::<(), nodebuf::Error>(())
/// ```
///
/// Always pass the same allocator, and release the store with it; dropping
/// an unreleased store hands the region back to the global heap.
///
/// # Panics
///
/// Every document operation panics once the store has been released.
#[derive(Debug)]
pub struct UnmanagedStore {
    region: Region,
}

impl UnmanagedStore {
    /// An empty object with default options.
    pub fn new<A: RegionAllocator>(alloc: &mut A) -> Result<Self> {
        Self::with_options(StoreOptions::default(), alloc)
    }

    /// An empty object in a region of `options.initial_capacity` bytes.
    pub fn with_options<A: RegionAllocator>(options: StoreOptions, alloc: &mut A) -> Result<Self> {
        Ok(Self {
            region: Region::allocate(alloc, options)?,
        })
    }

    /// Pairs the store with `alloc` for mutation.
    pub fn with_allocator<'s, A: RegionAllocator>(&'s mut self, alloc: &'s mut A) -> StoreHandle<'s, A> {
        StoreHandle {
            region: &mut self.region,
            alloc,
        }
    }

    /// Replaces the document with a copy of `bytes`, growing first if
    /// needed.
    pub fn import<A: RegionAllocator>(&mut self, alloc: &mut A, bytes: &[u8]) -> Result<()> {
        self.region.import(alloc, bytes)
    }

    /// Bytes currently allocated; 0 after release.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// The growth ceiling.
    #[must_use]
    pub fn max_capacity(&self) -> usize {
        self.region.max_capacity()
    }

    /// Frees the region through `alloc`. Calling it again does nothing.
    pub fn release<A: RegionAllocator>(&mut self, alloc: &mut A) {
        self.region.release(alloc);
    }

    /// Whether [`UnmanagedStore::release`] has run.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.region.is_released()
    }
}

impl DocRead for UnmanagedStore {
    fn as_bytes(&self) -> &[u8] {
        self.region.as_bytes()
    }
}

/// An [`UnmanagedStore`] borrowed together with the allocator its writes
/// may grow through.
#[derive(Debug)]
pub struct StoreHandle<'s, A: RegionAllocator> {
    region: &'s mut Region,
    alloc: &'s mut A,
}

impl<A: RegionAllocator> StoreHandle<'_, A> {
    /// Bytes currently allocated.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }
}

impl<A: RegionAllocator> DocRead for StoreHandle<'_, A> {
    fn as_bytes(&self) -> &[u8] {
        self.region.as_bytes()
    }
}

impl<A: RegionAllocator> DocWrite for StoreHandle<'_, A> {
    fn apply<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnMut(&mut [u8], &mut usize) -> Ret<T>,
    {
        self.region.apply(&mut *self.alloc, op)
    }

    /// Stages through the paired allocator, under the store's ceiling.
    fn replace_with<F>(&mut self, build: F) -> Result<()>
    where
        F: FnMut(&mut [u8], &mut usize) -> Ret<()>,
    {
        self.region.replace_with(&mut *self.alloc, build)
    }
}
