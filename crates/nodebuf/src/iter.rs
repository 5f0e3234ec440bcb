use bstr::BStr;

use crate::{
    engine::{self, Cursor},
    error::{Error, Result},
    value::Offset,
};

/// One child of an object or array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    /// The member name, for object children.
    pub key: Option<&'a BStr>,
    /// Position among the container's children.
    pub index: u32,
    /// Offset of the child node; pass it to [`crate::DocRead::value_at`], or
    /// use it directly as a container offset for nested objects and arrays.
    pub offset: Offset,
}

/// Cursor over the children of one object or array.
///
/// The cursor captures the document region when it is created and never
/// looks at the document again; it borrows the document, so the document
/// cannot be mutated until the cursor is dropped. Children come out in
/// insertion order. After the last child, or after the first error, the
/// cursor only yields `None`; iterate again with a fresh
/// [`crate::DocRead::iter`] call.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    bytes: &'a [u8],
    cursor: Cursor,
    done: bool,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(bytes: &'a [u8], ofs: Offset) -> Result<Self> {
        Ok(Self {
            bytes,
            cursor: engine::iter_create(bytes, ofs.get())?,
            done: false,
        })
    }

    fn step(&mut self) -> Result<Option<Entry<'a>>> {
        let Some(step) = engine::iter_next(self.bytes, &mut self.cursor)? else {
            return Ok(None);
        };
        let key = match step.key {
            Some(span) => Some(BStr::new(span.resolve(self.bytes).ok_or(Error::StaleReference)?)),
            None => None,
        };
        Ok(Some(Entry {
            key,
            index: step.index,
            offset: Offset::new(step.child),
        }))
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<Entry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl core::iter::FusedIterator for Iter<'_> {}
