use super::{
    alloc::{HeapAllocator, RegionAllocator},
    region::Region,
};
use crate::{
    document::{DocRead, DocWrite},
    engine::Ret,
    error::Result,
    options::StoreOptions,
};

/// A growable document that owns both its region and its allocator.
///
/// # Panics
///
/// Every document operation panics once [`Store::release`] has been
/// called.
///
/// # Examples
///
/// ```rust
/// use nodebuf::{DocRead, DocWrite, Offset, Store};
///
/// let mut store = Store::new_array()?;
/// for i in 0..1000 {
///     store.append_i64(Offset::ROOT, i)?;
/// }
/// assert_eq!(store.count(Offset::ROOT)?, 1000);
/// assert_eq!(store.arr_get_i64(Offset::ROOT, 999)?, 999);
/// # Ok::<(), nodebuf::Error>(())
/// ```
#[derive(Debug)]
pub struct Store<A: RegionAllocator = HeapAllocator> {
    region: Region,
    alloc: A,
}

impl Store {
    /// An empty object on the heap with default options.
    pub fn new() -> Result<Self> {
        Self::with_options(StoreOptions::default(), HeapAllocator)
    }

    /// An empty array on the heap with default options.
    pub fn new_array() -> Result<Self> {
        let mut store = Self::new()?;
        store.init_array()?;
        Ok(store)
    }

    /// A heap store holding a copy of an already encoded document.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let mut store = Self::new()?;
        store.import(bytes)?;
        Ok(store)
    }
}

impl<A: RegionAllocator> Store<A> {
    /// An empty object in a region obtained from `alloc`.
    pub fn with_options(options: StoreOptions, mut alloc: A) -> Result<Self> {
        let region = Region::allocate(&mut alloc, options)?;
        Ok(Self { region, alloc })
    }

    /// Replaces the document with a copy of `bytes`, growing the region
    /// first if it is too small.
    ///
    /// Fails with [`crate::Error::InvalidArgument`] if `bytes` is empty.
    pub fn import(&mut self, bytes: &[u8]) -> Result<()> {
        self.region.import(&mut self.alloc, bytes)
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

    /// The allocator the region lives in.
    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Frees the region now instead of on drop. Calling it again does
    /// nothing.
    pub fn release(&mut self) {
        self.region.release(&mut self.alloc);
    }

    /// Whether [`Store::release`] has run.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.region.is_released()
    }
}

impl<A: RegionAllocator> DocRead for Store<A> {
    fn as_bytes(&self) -> &[u8] {
        self.region.as_bytes()
    }
}

impl<A: RegionAllocator> DocWrite for Store<A> {
    fn apply<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnMut(&mut [u8], &mut usize) -> Ret<T>,
    {
        self.region.apply(&mut self.alloc, op)
    }

    /// Stages through this store's allocator, under its ceiling.
    fn replace_with<F>(&mut self, build: F) -> Result<()>
    where
        F: FnMut(&mut [u8], &mut usize) -> Ret<()>,
    {
        self.region.replace_with(&mut self.alloc, build)
    }
}

impl<A: RegionAllocator> Drop for Store<A> {
    fn drop(&mut self) {
        self.region.release(&mut self.alloc);
    }
}
