use thiserror::Error;

/// The host refused an allocation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("region allocation failed")]
pub struct AllocError;

impl From<AllocError> for crate::Error {
    fn from(_: AllocError) -> Self {
        crate::Error::OutOfMemory
    }
}

/// Host allocation service for growable stores.
///
/// Regions are plain byte vectors whose length is the capacity.
/// Implementations must hand out zero-filled regions of exactly the requested
/// size, and `reallocate` must preserve the existing prefix.
pub trait RegionAllocator {
    /// Allocates a zero-filled region of `size` bytes.
    fn allocate(&mut self, size: usize) -> Result<Vec<u8>, AllocError>;

    /// Resizes `region` to `new_size` bytes in place of the old one.
    ///
    /// On failure `region` must be left as it was.
    fn reallocate(&mut self, region: &mut Vec<u8>, new_size: usize) -> Result<(), AllocError>;

    /// Returns a region to the allocator.
    fn free(&mut self, region: Vec<u8>) {
        drop(region);
    }
}

impl<A: RegionAllocator + ?Sized> RegionAllocator for &mut A {
    fn allocate(&mut self, size: usize) -> Result<Vec<u8>, AllocError> {
        (**self).allocate(size)
    }

    fn reallocate(&mut self, region: &mut Vec<u8>, new_size: usize) -> Result<(), AllocError> {
        (**self).reallocate(region, new_size)
    }

    fn free(&mut self, region: Vec<u8>) {
        (**self).free(region);
    }
}

/// The global heap, with allocation failure reported instead of aborting.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl RegionAllocator for HeapAllocator {
    fn allocate(&mut self, size: usize) -> Result<Vec<u8>, AllocError> {
        let mut region = Vec::new();
        region.try_reserve_exact(size).map_err(|_| AllocError)?;
        region.resize(size, 0);
        Ok(region)
    }

    fn reallocate(&mut self, region: &mut Vec<u8>, new_size: usize) -> Result<(), AllocError> {
        let additional = new_size.saturating_sub(region.len());
        region.try_reserve_exact(additional).map_err(|_| AllocError)?;
        region.resize(new_size, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_regions_are_zeroed_and_preserved() {
        let mut heap = HeapAllocator;
        let mut region = heap.allocate(8).unwrap();
        assert_eq!(region, [0; 8]);
        region[..3].copy_from_slice(b"abc");
        heap.reallocate(&mut region, 32).unwrap();
        assert_eq!(region.len(), 32);
        assert_eq!(&region[..3], b"abc");
        assert!(region[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn impossible_requests_fail() {
        assert_eq!(HeapAllocator.allocate(usize::MAX), Err(AllocError));
    }
}
