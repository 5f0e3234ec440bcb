use core::fmt;

use tracing::{debug, trace};

use super::alloc::RegionAllocator;
use crate::{
    document::DocWrite,
    engine::{self, Ret},
    error::{Error, Result},
    options::{DEFAULT_CAPACITY, GROWTH_FACTOR, StoreOptions},
    view::DocView,
};

const RELEASED: &str = "document store used after release";

/// Capacity to grow to from `cap`, or `None` once `max` is reached.
pub(crate) fn next_capacity(cap: usize, max: usize) -> Option<usize> {
    if cap >= max {
        return None;
    }
    let next = cap.checked_mul(GROWTH_FACTOR).map_or(max, |n| n.min(max));
    (next > cap).then_some(next)
}

/// An owned region plus the logical length of the document inside it.
///
/// Both store flavors keep one of these and differ only in where the
/// allocator comes from. Every mutation runs through a transient
/// [`DocView`] over the region, so the snapshot/restore discipline is the
/// view's; this type only adds growth.
pub(crate) struct Region {
    bytes: Option<Vec<u8>>,
    len: usize,
    max_capacity: usize,
}

impl Region {
    /// Allocates `options.initial_capacity` bytes holding an empty object.
    pub(crate) fn allocate<A: RegionAllocator>(alloc: &mut A, options: StoreOptions) -> Result<Self> {
        let options = options.normalized();
        let mut bytes = alloc.allocate(options.initial_capacity)?;
        let len = engine::init_obj(&mut bytes)?;
        trace!(capacity = bytes.len(), "allocated document region");
        Ok(Self {
            bytes: Some(bytes),
            len,
            max_capacity: options.max_capacity,
        })
    }

    fn bytes_mut(&mut self) -> &mut Vec<u8> {
        self.bytes.as_mut().expect(RELEASED)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes.as_ref().expect(RELEASED)[..self.len]
    }

    pub(crate) fn capacity(&self) -> usize {
        self.bytes.as_ref().map_or(0, Vec::len)
    }

    pub(crate) fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub(crate) fn is_released(&self) -> bool {
        self.bytes.is_none()
    }

    fn apply_once<T, F>(&mut self, op: &mut F) -> Result<T>
    where
        F: FnMut(&mut [u8], &mut usize) -> Ret<T>,
    {
        let bytes = self.bytes.as_mut().expect(RELEASED);
        let mut view = DocView::rebind(bytes, self.len);
        let out = view.apply(&mut *op);
        self.len = view.into_inner().1;
        out
    }

    /// Multiplies the capacity by [`GROWTH_FACTOR`], clamped to the ceiling.
    ///
    /// Node addressing is positional, so the bytes are carried over as they
    /// are and every offset handed out so far stays valid.
    pub(crate) fn grow<A: RegionAllocator>(&mut self, alloc: &mut A) -> Result<()> {
        let cap = self.capacity();
        let Some(next) = next_capacity(cap, self.max_capacity) else {
            debug!(capacity = cap, max = self.max_capacity, "document region cannot grow further");
            return Err(Error::NoBufferSpace);
        };
        let bytes = self.bytes_mut();
        alloc.reallocate(bytes, next)?;
        debug_assert_eq!(bytes.len(), next, "allocator returned a short region");
        debug!(from = cap, to = next, "grew document region");
        Ok(())
    }

    /// Runs `op`, growing and retrying for as long as it reports
    /// [`Error::NoBufferSpace`] and the region can still grow. Any other
    /// outcome is returned as is.
    pub(crate) fn apply<A, T, F>(&mut self, alloc: &mut A, mut op: F) -> Result<T>
    where
        A: RegionAllocator,
        F: FnMut(&mut [u8], &mut usize) -> Ret<T>,
    {
        loop {
            match self.apply_once(&mut op) {
                Err(Error::NoBufferSpace) => self.grow(alloc)?,
                out => return out,
            }
        }
    }

    /// Builds a replacement document in a scratch region from the same
    /// allocator, under the same ceiling, and copies it in once `build`
    /// succeeds. The scratch region is freed on every path.
    pub(crate) fn replace_with<A, F>(&mut self, alloc: &mut A, build: F) -> Result<()>
    where
        A: RegionAllocator,
        F: FnMut(&mut [u8], &mut usize) -> Ret<()>,
    {
        assert!(!self.is_released(), "{RELEASED}");
        let options = StoreOptions {
            initial_capacity: DEFAULT_CAPACITY,
            max_capacity: self.max_capacity,
        };
        let mut scratch = Region::allocate(alloc, options)?;
        let out = match scratch.apply(alloc, build) {
            Ok(()) => {
                let encoded = scratch.as_bytes();
                trace!(len = encoded.len(), "staged replacement document");
                self.apply(alloc, |buf, len| engine::install(buf, len, encoded))
            }
            Err(err) => Err(err),
        };
        scratch.release(alloc);
        out
    }

    /// Replaces the document with a copy of `src`, growing first if needed.
    pub(crate) fn import<A: RegionAllocator>(&mut self, alloc: &mut A, src: &[u8]) -> Result<()> {
        assert!(!self.is_released(), "{RELEASED}");
        if src.is_empty() {
            return Err(Error::InvalidArgument);
        }
        while self.capacity() < src.len() {
            self.grow(alloc)?;
        }
        let bytes = self.bytes_mut();
        bytes[..src.len()].copy_from_slice(src);
        self.len = src.len();
        trace!(len = src.len(), capacity = self.capacity(), "imported encoded document");
        Ok(())
    }

    /// Frees the region. Further releases do nothing.
    pub(crate) fn release<A: RegionAllocator>(&mut self, alloc: &mut A) {
        if let Some(bytes) = self.bytes.take() {
            trace!(capacity = bytes.len(), "released document region");
            alloc.free(bytes);
        }
        self.len = 0;
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("max_capacity", &self.max_capacity)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::MAX_CAPACITY, options::DEFAULT_CAPACITY};

    #[test]
    fn growth_multiplies_until_the_ceiling() {
        assert_eq!(next_capacity(1024, MAX_CAPACITY), Some(4096));
        assert_eq!(next_capacity(1024, 3000), Some(3000));
        assert_eq!(next_capacity(3000, 3000), None);
        assert_eq!(next_capacity(0, 3000), None);
        assert_eq!(next_capacity(MAX_CAPACITY / 2, MAX_CAPACITY), Some(MAX_CAPACITY));
    }

    #[test]
    fn release_is_idempotent() {
        let mut heap = super::super::HeapAllocator;
        let mut region = Region::allocate(&mut heap, StoreOptions::default()).unwrap();
        assert_eq!(region.capacity(), DEFAULT_CAPACITY);
        region.release(&mut heap);
        region.release(&mut heap);
        assert!(region.is_released());
        assert_eq!(region.capacity(), 0);
    }

    #[test]
    #[should_panic(expected = "used after release")]
    fn released_region_fails_loudly() {
        let mut heap = super::super::HeapAllocator;
        let mut region = Region::allocate(&mut heap, StoreOptions::default()).unwrap();
        region.release(&mut heap);
        let _ = region.as_bytes();
    }
}
