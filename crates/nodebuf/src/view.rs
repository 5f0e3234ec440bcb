use crate::{
    document::{DocRead, DocWrite},
    engine::{self, Ret},
    error::{Error, Result},
    options::StoreOptions,
    store::{HeapAllocator, Store},
};

/// A document over caller-owned memory that never grows.
///
/// The view borrows the region for its whole lifetime; capacity is the
/// length of the slice. Writes that do not fit fail with
/// [`Error::NoBufferSpace`] and leave the document untouched.
///
/// # Examples
///
/// ```rust
/// use nodebuf::{DocRead, DocView, DocWrite, Offset};
///
/// let mut region = [0u8; 256];
/// let mut doc = DocView::new(&mut region);
/// doc.init_object()?;
/// doc.set_str(Offset::ROOT, "name", "Alice")?;
/// doc.set_i64(Offset::ROOT, "age", 30)?;
/// assert_eq!(doc.count(Offset::ROOT)?, 2);
/// assert_eq!(doc.get_str(Offset::ROOT, "name")?, "Alice");
/// # Ok::<(), nodebuf::Error>(())
/// ```
#[derive(Debug)]
pub struct DocView<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> DocView<'a> {
    /// Wraps an uninitialized region. Call [`DocWrite::init_object`],
    /// [`DocWrite::init_array`] or [`DocWrite::decode_json`] before reading.
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    /// Wraps a region whose first `len` bytes already hold an encoded
    /// document.
    ///
    /// The bytes are not validated; reads of a malformed document fail with
    /// [`Error::CorruptData`] rather than panicking.
    pub fn from_encoded(buf: &'a mut [u8], len: usize) -> Result<Self> {
        if len < engine::EMPTY_DOC_LEN || len > buf.len() {
            return Err(Error::InvalidArgument);
        }
        Ok(Self { buf, len })
    }

    /// Total bytes available.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Releases the region, returning it together with the logical length.
    #[must_use]
    pub fn into_inner(self) -> (&'a mut [u8], usize) {
        (self.buf, self.len)
    }

    /// Points the view at a new region after its owner moved or resized it.
    ///
    /// The first `len` bytes must still hold the same document.
    pub(crate) fn rebind(buf: &'a mut [u8], len: usize) -> Self {
        debug_assert!(len <= buf.len());
        Self { buf, len }
    }
}

impl DocRead for DocView<'_> {
    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl DocWrite for DocView<'_> {
    /// Runs `op` once. The engine may advance the logical length before it
    /// fails, so the length is snapshotted and put back on any error.
    ///
    /// A successful `op` must leave a length that covers at least a header
    /// and stays inside the region; anything else is undone and reported as
    /// [`Error::Unexpected`].
    fn apply<T, F>(&mut self, mut op: F) -> Result<T>
    where
        F: FnMut(&mut [u8], &mut usize) -> Ret<T>,
    {
        let snapshot = self.len;
        match op(&mut *self.buf, &mut self.len) {
            Ok(out) if (engine::EMPTY_DOC_LEN..=self.buf.len()).contains(&self.len) => Ok(out),
            Ok(_) => {
                self.len = snapshot;
                Err(Error::Unexpected)
            }
            Err(fault) => {
                self.len = snapshot;
                Err(fault.into())
            }
        }
    }

    /// Stages on the heap, never past the size of this view's region.
    fn replace_with<F>(&mut self, build: F) -> Result<()>
    where
        F: FnMut(&mut [u8], &mut usize) -> Ret<()>,
    {
        let options = StoreOptions {
            max_capacity: self.buf.len(),
            ..StoreOptions::default()
        };
        let mut scratch = Store::with_options(options, HeapAllocator)?;
        scratch.apply(build)?;
        let encoded = scratch.as_bytes();
        self.apply(|buf, len| engine::install(buf, len, encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EMPTY_DOC_LEN, Offset};

    #[test]
    fn uninitialized_view_has_no_root() {
        let mut region = [0u8; 64];
        let doc = DocView::new(&mut region);
        assert!(doc.is_empty());
        assert_eq!(doc.count(Offset::ROOT), Err(Error::InvalidArgument));
    }

    #[test]
    fn from_encoded_checks_length() {
        let mut region = [0u8; 64];
        assert_eq!(
            DocView::from_encoded(&mut region, 0).err(),
            Some(Error::InvalidArgument)
        );
        assert_eq!(
            DocView::from_encoded(&mut region, 65).err(),
            Some(Error::InvalidArgument)
        );
    }

    #[test]
    fn out_of_range_length_is_undone() {
        let mut region = [0u8; 64];
        let mut doc = DocView::new(&mut region);
        doc.init_object().unwrap();
        doc.set_i64(Offset::ROOT, "n", 1).unwrap();
        let before = doc.len();

        for bad in [1000, 65, EMPTY_DOC_LEN - 1, 0] {
            let out = doc.apply(|_, len| {
                *len = bad;
                Ok(())
            });
            assert_eq!(out, Err(Error::Unexpected), "{bad}");
            assert_eq!(doc.len(), before);
        }
        assert_eq!(doc.get_i64(Offset::ROOT, "n"), Ok(1));
        assert_eq!(doc.count(Offset::ROOT), Ok(1));

        doc.apply(|_, len| {
            *len = 64;
            Ok(())
        })
        .unwrap();
        assert_eq!(doc.len(), 64);
    }

    #[test]
    fn reopened_region_keeps_its_values() {
        let mut region = [0u8; 128];
        let mut doc = DocView::new(&mut region);
        doc.init_object().unwrap();
        doc.set_bool(Offset::ROOT, "ok", true).unwrap();
        let (region, len) = doc.into_inner();

        let doc = DocView::from_encoded(region, len).unwrap();
        assert_eq!(doc.get_bool(Offset::ROOT, "ok"), Ok(true));
        assert_eq!(doc.capacity(), 128);
    }
}
