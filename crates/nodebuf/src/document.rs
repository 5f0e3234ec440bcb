//! The node-operation surface shared by every document flavor.
//!
//! [`DocRead`] and [`DocWrite`] carry the whole set of node operations as
//! provided methods. An implementor supplies only the backing region
//! ([`DocRead::as_bytes`]) and a way to run one engine mutation against it
//! ([`DocWrite::apply`]). [`crate::DocView`] runs mutations directly against
//! caller memory; the growable stores wrap the same call in their
//! grow-and-retry loop.
//!
//! # Borrowed data
//!
//! `get_str`, `get_bytes`, [`Value`] and [`crate::Iter`] alias the document
//! region and borrow the document for as long as they live. Every mutation
//! needs `&mut self`, so the borrow checker rejects a write (and therefore any
//! reallocation) while such a view is still in use. The `get_string`,
//! `get_byte_vec` and `*_into` variants copy the data out instead.

use crate::{
    engine::{self, Locator, Payload, Ret, Span},
    error::{Error, Result},
    iter::Iter,
    json,
    store::Store,
    value::{Offset, Value, ValueType},
};

/// Validates a key before any engine call sees it.
fn checked_key(key: &[u8]) -> Result<&[u8]> {
    if key.len() > engine::MAX_KEY_LEN || key.contains(&0) {
        return Err(Error::InvalidArgument);
    }
    Ok(key)
}

fn resolve(bytes: &[u8], span: Span) -> Result<&[u8]> {
    span.resolve(bytes).ok_or(Error::StaleReference)
}

fn resolve_str(bytes: &[u8], span: Span) -> Result<&str> {
    core::str::from_utf8(resolve(bytes, span)?).map_err(|_| Error::CorruptData)
}

fn copy_into<'d>(src: &[u8], dst: &'d mut [u8]) -> Result<&'d mut [u8]> {
    let dst = dst.get_mut(..src.len()).ok_or(Error::NoBufferSpace)?;
    dst.copy_from_slice(src);
    Ok(dst)
}

fn str_into<'d>(src: &str, dst: &'d mut [u8]) -> Result<&'d str> {
    let copied = copy_into(src.as_bytes(), dst)?;
    core::str::from_utf8(copied).map_err(|_| Error::CorruptData)
}

fn value_of<'a>(doc: &'a (impl DocRead + ?Sized), ofs: Offset, loc: Locator<'_>) -> Result<Value<'a>> {
    let bytes = doc.as_bytes();
    let raw = engine::get_type(bytes, ofs.get(), loc)?;
    Ok(match ValueType::try_from(raw)? {
        ValueType::Null => {
            engine::get_null(bytes, ofs.get(), loc)?;
            Value::Null
        }
        ValueType::Bool => Value::Bool(engine::get_bool(bytes, ofs.get(), loc)?),
        ValueType::Int => Value::Int(engine::get_i64(bytes, ofs.get(), loc)?),
        ValueType::Float => Value::Float(engine::get_f64(bytes, ofs.get(), loc)?),
        ValueType::Bytes => Value::Bytes(resolve(bytes, engine::get_bytes(bytes, ofs.get(), loc)?)?),
        ValueType::String => Value::String(resolve_str(bytes, engine::get_str(bytes, ofs.get(), loc)?)?),
        ValueType::Object => Value::Object(Offset::new(engine::get_obj(bytes, ofs.get(), loc)?)),
        ValueType::Array => Value::Array(Offset::new(engine::get_arr(bytes, ofs.get(), loc)?)),
    })
}

/// Read access to an encoded document.
///
/// All methods take the offset of an object (`get_*`, `exists`) or array
/// (`arr_get_*`) node; [`Offset::ROOT`] addresses the root. Looking up a
/// missing key or an index at or past the element count fails with
/// [`Error::NotFound`], and a present child of another type fails with
/// [`Error::InvalidArgument`].
pub trait DocRead {
    /// The logical region: every byte currently occupied by encoded nodes.
    fn as_bytes(&self) -> &[u8];

    /// Logical length in bytes.
    fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns `true` if no document has been written yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Type of the child `key` of the object at `ofs`.
    fn type_of(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<ValueType> {
        let key = checked_key(key.as_ref())?;
        ValueType::try_from(engine::get_type(self.as_bytes(), ofs.get(), Locator::Key(key))?)
    }

    /// Type of element `index` of the array at `ofs`.
    fn arr_type_of(&self, ofs: Offset, index: u32) -> Result<ValueType> {
        ValueType::try_from(engine::get_type(self.as_bytes(), ofs.get(), Locator::Index(index))?)
    }

    /// Whether the object at `ofs` has a child named `key`.
    fn exists(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<bool> {
        let key = checked_key(key.as_ref())?;
        Ok(engine::exists(self.as_bytes(), ofs.get(), key)?)
    }

    /// Number of direct children of the object or array at `ofs`.
    fn count(&self, ofs: Offset) -> Result<u32> {
        Ok(engine::count(self.as_bytes(), ofs.get())?)
    }

    /// Succeeds if `key` holds null.
    fn get_null(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<()> {
        let key = checked_key(key.as_ref())?;
        Ok(engine::get_null(self.as_bytes(), ofs.get(), Locator::Key(key))?)
    }

    /// Reads a bool child.
    fn get_bool(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<bool> {
        let key = checked_key(key.as_ref())?;
        Ok(engine::get_bool(self.as_bytes(), ofs.get(), Locator::Key(key))?)
    }

    /// Reads an integer child.
    fn get_i64(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<i64> {
        let key = checked_key(key.as_ref())?;
        Ok(engine::get_i64(self.as_bytes(), ofs.get(), Locator::Key(key))?)
    }

    /// Reads a float child.
    fn get_f64(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<f64> {
        let key = checked_key(key.as_ref())?;
        Ok(engine::get_f64(self.as_bytes(), ofs.get(), Locator::Key(key))?)
    }

    /// Borrows a string child straight out of the region.
    fn get_str(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<&str> {
        let key = checked_key(key.as_ref())?;
        let bytes = self.as_bytes();
        resolve_str(bytes, engine::get_str(bytes, ofs.get(), Locator::Key(key))?)
    }

    /// Borrows a byte child straight out of the region.
    fn get_bytes(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<&[u8]> {
        let key = checked_key(key.as_ref())?;
        let bytes = self.as_bytes();
        resolve(bytes, engine::get_bytes(bytes, ofs.get(), Locator::Key(key))?)
    }

    /// Offset of a nested object.
    fn get_obj(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<Offset> {
        let key = checked_key(key.as_ref())?;
        Ok(Offset::new(engine::get_obj(self.as_bytes(), ofs.get(), Locator::Key(key))?))
    }

    /// Offset of a nested array.
    fn get_arr(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<Offset> {
        let key = checked_key(key.as_ref())?;
        Ok(Offset::new(engine::get_arr(self.as_bytes(), ofs.get(), Locator::Key(key))?))
    }

    /// Copies a string child into a new `String`.
    fn get_string(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<String> {
        self.get_str(ofs, key).map(str::to_owned)
    }

    /// Copies a byte child into a new `Vec`.
    fn get_byte_vec(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        self.get_bytes(ofs, key).map(<[u8]>::to_vec)
    }

    /// Copies a string child into `dst` and returns the copied prefix.
    ///
    /// Fails with [`Error::NoBufferSpace`] if `dst` is too short.
    fn get_str_into<'d>(&self, ofs: Offset, key: impl AsRef<[u8]>, dst: &'d mut [u8]) -> Result<&'d str> {
        str_into(self.get_str(ofs, key)?, dst)
    }

    /// Copies a byte child into `dst` and returns the copied prefix.
    ///
    /// Fails with [`Error::NoBufferSpace`] if `dst` is too short.
    fn get_bytes_into<'d>(
        &self,
        ofs: Offset,
        key: impl AsRef<[u8]>,
        dst: &'d mut [u8],
    ) -> Result<&'d [u8]> {
        copy_into(self.get_bytes(ofs, key)?, dst).map(|copied| &*copied)
    }

    /// Decodes whatever child `key` holds.
    fn get_value(&self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<Value<'_>> {
        let key = checked_key(key.as_ref())?;
        value_of(self, ofs, Locator::Key(key))
    }

    /// Succeeds if element `index` holds null.
    fn arr_get_null(&self, ofs: Offset, index: u32) -> Result<()> {
        Ok(engine::get_null(self.as_bytes(), ofs.get(), Locator::Index(index))?)
    }

    /// Reads a bool element.
    fn arr_get_bool(&self, ofs: Offset, index: u32) -> Result<bool> {
        Ok(engine::get_bool(self.as_bytes(), ofs.get(), Locator::Index(index))?)
    }

    /// Reads an integer element.
    fn arr_get_i64(&self, ofs: Offset, index: u32) -> Result<i64> {
        Ok(engine::get_i64(self.as_bytes(), ofs.get(), Locator::Index(index))?)
    }

    /// Reads a float element.
    fn arr_get_f64(&self, ofs: Offset, index: u32) -> Result<f64> {
        Ok(engine::get_f64(self.as_bytes(), ofs.get(), Locator::Index(index))?)
    }

    /// Borrows a string element straight out of the region.
    fn arr_get_str(&self, ofs: Offset, index: u32) -> Result<&str> {
        let bytes = self.as_bytes();
        resolve_str(bytes, engine::get_str(bytes, ofs.get(), Locator::Index(index))?)
    }

    /// Borrows a byte element straight out of the region.
    fn arr_get_bytes(&self, ofs: Offset, index: u32) -> Result<&[u8]> {
        let bytes = self.as_bytes();
        resolve(bytes, engine::get_bytes(bytes, ofs.get(), Locator::Index(index))?)
    }

    /// Offset of a nested object element.
    fn arr_get_obj(&self, ofs: Offset, index: u32) -> Result<Offset> {
        Ok(Offset::new(engine::get_obj(self.as_bytes(), ofs.get(), Locator::Index(index))?))
    }

    /// Offset of a nested array element.
    fn arr_get_arr(&self, ofs: Offset, index: u32) -> Result<Offset> {
        Ok(Offset::new(engine::get_arr(self.as_bytes(), ofs.get(), Locator::Index(index))?))
    }

    /// Copies a string element into a new `String`.
    fn arr_get_string(&self, ofs: Offset, index: u32) -> Result<String> {
        self.arr_get_str(ofs, index).map(str::to_owned)
    }

    /// Copies a byte element into a new `Vec`.
    fn arr_get_byte_vec(&self, ofs: Offset, index: u32) -> Result<Vec<u8>> {
        self.arr_get_bytes(ofs, index).map(<[u8]>::to_vec)
    }

    /// Copies a string element into `dst`; see [`DocRead::get_str_into`].
    fn arr_get_str_into<'d>(&self, ofs: Offset, index: u32, dst: &'d mut [u8]) -> Result<&'d str> {
        str_into(self.arr_get_str(ofs, index)?, dst)
    }

    /// Copies a byte element into `dst`; see [`DocRead::get_bytes_into`].
    fn arr_get_bytes_into<'d>(&self, ofs: Offset, index: u32, dst: &'d mut [u8]) -> Result<&'d [u8]> {
        copy_into(self.arr_get_bytes(ofs, index)?, dst).map(|copied| &*copied)
    }

    /// Decodes whatever element `index` holds.
    fn arr_get_value(&self, ofs: Offset, index: u32) -> Result<Value<'_>> {
        value_of(self, ofs, Locator::Index(index))
    }

    /// Decodes the node at `ofs` itself, e.g. an offset yielded by
    /// [`DocRead::iter`].
    fn value_at(&self, ofs: Offset) -> Result<Value<'_>> {
        let bytes = self.as_bytes();
        Value::from_node(bytes, engine::node_at(bytes, ofs.get())?)
    }

    /// Iterates the children of the object or array at `ofs`.
    fn iter(&self, ofs: Offset) -> Result<Iter<'_>> {
        Iter::new(self.as_bytes(), ofs)
    }

    /// Encodes the subtree at `ofs` as compact JSON text.
    fn to_json(&self, ofs: Offset) -> Result<String> {
        json::encode(self.as_bytes(), ofs, false)
    }

    /// Encodes the subtree at `ofs` as indented JSON text.
    fn to_json_pretty(&self, ofs: Offset) -> Result<String> {
        json::encode(self.as_bytes(), ofs, true)
    }

    /// Encodes the subtree at `ofs` as compact JSON into `dst` and returns
    /// the number of bytes written.
    ///
    /// Fails with [`Error::NoBufferSpace`] instead of allocating when `dst`
    /// is too short.
    fn encode_json_into(&self, ofs: Offset, dst: &mut [u8]) -> Result<usize> {
        json::encode_into(self.as_bytes(), ofs, dst)
    }
}

fn put<D: DocWrite + ?Sized>(doc: &mut D, ofs: Offset, key: &[u8], value: Payload<'_>) -> Result<Offset> {
    let key = checked_key(key)?;
    doc.apply(|buf, len| engine::set(buf, len, ofs.get(), key, value))
        .map(Offset::new)
}

fn push<D: DocWrite + ?Sized>(doc: &mut D, ofs: Offset, value: Payload<'_>) -> Result<Offset> {
    doc.apply(|buf, len| engine::append(buf, len, ofs.get(), value))
        .map(Offset::new)
}

/// Write access to a document.
///
/// A failed mutation leaves the document exactly as it was, logical length
/// included.
pub trait DocWrite: DocRead {
    /// Runs one engine mutation against the backing region.
    ///
    /// `op` receives the whole region (its length is the capacity) and the
    /// in/out logical length. Implementations decide what happens on
    /// failure: a fixed view restores the length, a growable store also grows
    /// and calls `op` again on [`Error::NoBufferSpace`]. `op` must therefore
    /// be safe to repeat.
    fn apply<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnMut(&mut [u8], &mut usize) -> Ret<T>;

    /// Builds a whole replacement document with `build` in scratch space and
    /// copies it in as one mutation once it is complete.
    ///
    /// `build` gets an empty region and must leave a complete document in
    /// it. If it fails, or the result does not fit, the document keeps its
    /// previous content. The default stages on the heap; the growable stores
    /// stage through their own allocator and ceiling.
    fn replace_with<F>(&mut self, build: F) -> Result<()>
    where
        F: FnMut(&mut [u8], &mut usize) -> Ret<()>,
    {
        let mut scratch = Store::new()?;
        scratch.apply(build)?;
        let encoded = scratch.as_bytes();
        self.apply(|buf, len| engine::install(buf, len, encoded))
    }

    /// Replaces the document with an empty object.
    fn init_object(&mut self) -> Result<()> {
        self.apply(|buf, len| {
            *len = engine::init_obj(buf)?;
            Ok(())
        })
    }

    /// Replaces the document with an empty array.
    fn init_array(&mut self) -> Result<()> {
        self.apply(|buf, len| {
            *len = engine::init_arr(buf)?;
            Ok(())
        })
    }

    /// Sets `key` of the object at `ofs` to null, inserting or overwriting.
    fn set_null(&mut self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<()> {
        put(self, ofs, key.as_ref(), Payload::Null).map(drop)
    }

    /// Sets `key` to a bool.
    fn set_bool(&mut self, ofs: Offset, key: impl AsRef<[u8]>, value: bool) -> Result<()> {
        put(self, ofs, key.as_ref(), Payload::Bool(value)).map(drop)
    }

    /// Sets `key` to an integer.
    fn set_i64(&mut self, ofs: Offset, key: impl AsRef<[u8]>, value: i64) -> Result<()> {
        put(self, ofs, key.as_ref(), Payload::I64(value)).map(drop)
    }

    /// Sets `key` to a float.
    fn set_f64(&mut self, ofs: Offset, key: impl AsRef<[u8]>, value: f64) -> Result<()> {
        put(self, ofs, key.as_ref(), Payload::F64(value)).map(drop)
    }

    /// Sets `key` to a copy of `value`.
    fn set_str(&mut self, ofs: Offset, key: impl AsRef<[u8]>, value: &str) -> Result<()> {
        put(self, ofs, key.as_ref(), Payload::Str(value.as_bytes())).map(drop)
    }

    /// Sets `key` to a copy of `value` as a byte node.
    fn set_bytes(&mut self, ofs: Offset, key: impl AsRef<[u8]>, value: &[u8]) -> Result<()> {
        put(self, ofs, key.as_ref(), Payload::Bytes(value)).map(drop)
    }

    /// Sets `key` to a new empty object and returns its offset.
    fn set_obj(&mut self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<Offset> {
        put(self, ofs, key.as_ref(), Payload::Obj)
    }

    /// Sets `key` to a new empty array and returns its offset.
    fn set_arr(&mut self, ofs: Offset, key: impl AsRef<[u8]>) -> Result<Offset> {
        put(self, ofs, key.as_ref(), Payload::Arr)
    }

    /// Appends null to the array at `ofs`.
    fn append_null(&mut self, ofs: Offset) -> Result<()> {
        push(self, ofs, Payload::Null).map(drop)
    }

    /// Appends a bool.
    fn append_bool(&mut self, ofs: Offset, value: bool) -> Result<()> {
        push(self, ofs, Payload::Bool(value)).map(drop)
    }

    /// Appends an integer.
    fn append_i64(&mut self, ofs: Offset, value: i64) -> Result<()> {
        push(self, ofs, Payload::I64(value)).map(drop)
    }

    /// Appends a float.
    fn append_f64(&mut self, ofs: Offset, value: f64) -> Result<()> {
        push(self, ofs, Payload::F64(value)).map(drop)
    }

    /// Appends a copy of `value`.
    fn append_str(&mut self, ofs: Offset, value: &str) -> Result<()> {
        push(self, ofs, Payload::Str(value.as_bytes())).map(drop)
    }

    /// Appends a copy of `value` as a byte node.
    fn append_bytes(&mut self, ofs: Offset, value: &[u8]) -> Result<()> {
        push(self, ofs, Payload::Bytes(value)).map(drop)
    }

    /// Appends a new empty object and returns its offset.
    fn append_obj(&mut self, ofs: Offset) -> Result<Offset> {
        push(self, ofs, Payload::Obj)
    }

    /// Appends a new empty array and returns its offset.
    fn append_arr(&mut self, ofs: Offset) -> Result<Offset> {
        push(self, ofs, Payload::Arr)
    }

    /// Replaces the document with the tree parsed from JSON `text`, exactly
    /// as if it had been freshly initialized.
    ///
    /// The root of `text` must be an object or an array. Malformed or empty
    /// text fails with [`Error::InvalidArgument`] before the document is
    /// touched. The tree is built with [`DocWrite::replace_with`], so a
    /// destination that is too small keeps its previous content.
    fn decode_json(&mut self, text: impl AsRef<[u8]>) -> Result<()> {
        let tree = json::parse(text.as_ref())?;
        self.replace_with(|buf, len| json::write_tree(buf, len, &tree))
    }

    /// Like [`DocWrite::decode_json`], reading the text from `reader`.
    fn decode_json_reader<R: std::io::Read>(&mut self, reader: R) -> Result<()> {
        let tree = json::parse_reader(reader)?;
        self.replace_with(|buf, len| json::write_tree(buf, len, &tree))
    }
}
