//! The node engine.
//!
//! This is the low-level layer that encodes a document as a tree of
//! offset-linked records inside one contiguous byte region. It knows nothing
//! about capacity management: every write is told the full region (whose
//! length is the capacity) and an in/out logical length, and it either fits or
//! reports [`Errno::NoBufs`].
//!
//! Failures are reported the narrow way: a [`Fault`] carrying a negative
//! status and an out-of-band [`Errno`]. The checked wrappers in this crate
//! translate that into [`crate::Error`]; most callers never need this module.
//!
//! # Layout
//!
//! All integers are little-endian and every record starts on a 4-byte
//! boundary relative to the start of the region.
//!
//! ```text
//! container: tag u8 | pad[3] | count u32 | head u32 | tail u32
//! entry:     next u32 | key_len u32 | tag u8 | pad[3] | payload u64 | key bytes
//! ```
//!
//! The root container lives at offset 0. A string or byte payload packs the
//! offset of its data span in the low half and its length in the high half; a
//! container payload holds the offset of the child container header.
//!
//! Records are only ever appended, so every link (container to first entry,
//! entry to next entry, parent to child container) points forward. Readers
//! reject any link that does not, which bounds every walk by the region size
//! even when the bytes are hostile.
//!
//! A write may advance the logical length and still fail: alignment padding
//! and out-of-line data are committed before the entry record is reserved.
//! Callers that need failed writes to be invisible must restore the length
//! themselves.

#![allow(clippy::cast_possible_truncation, missing_docs)]

/// Longest accepted key, in bytes.
pub const MAX_KEY_LEN: usize = 255;

/// Largest region the 32-bit offset and length fields can address.
pub const MAX_CAPACITY: usize = u32::MAX as usize;

/// Length of an empty object or array document.
pub const EMPTY_DOC_LEN: usize = HEADER_LEN;

const ALIGN: usize = 4;
const HEADER_LEN: usize = 16;
const ENTRY_LEN: usize = 20;
const SLOT: usize = 8;

/// Raw node tags as stored in the region.
pub mod tag {
    /// `null`.
    pub const NULL: u8 = 0;
    /// `true` or `false`; the payload is 0 or 1.
    pub const BOOL: u8 = 1;
    /// Signed 64-bit integer.
    pub const INT: u8 = 2;
    /// IEEE 754 double, stored as its bit pattern.
    pub const FLOAT: u8 = 3;
    /// Out-of-line byte string.
    pub const BYTES: u8 = 4;
    /// Out-of-line UTF-8 string.
    pub const STRING: u8 = 5;
    /// Keyed container.
    pub const OBJECT: u8 = 6;
    /// Indexed container.
    pub const ARRAY: u8 = 7;
}

/// Upper bound on the number of nodes, root included, that a region of
/// `len` bytes can hold.
#[must_use]
pub const fn node_limit(len: usize) -> usize {
    1 + len.saturating_sub(HEADER_LEN) / ENTRY_LEN
}

/// Out-of-band failure code set alongside a negative status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    /// The key or index does not exist.
    NoEntry,
    /// Bad key, bad offset, or a node of the wrong type.
    Invalid,
    /// The region is too small for the write.
    NoBufs,
    /// The encoded bytes are inconsistent.
    BadMessage,
    /// Host allocation failed.
    NoMem,
    /// A count or length does not fit its 32-bit field.
    Overflow,
}

/// The engine's failure signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// Always negative.
    pub status: i32,
    /// `None` only if the engine broke its own protocol.
    pub errno: Option<Errno>,
}

impl Fault {
    /// A failure with the usual `-1` status.
    #[must_use]
    pub const fn new(errno: Errno) -> Self {
        Self {
            status: -1,
            errno: Some(errno),
        }
    }
}

/// Result of an engine call.
pub type Ret<T> = Result<T, Fault>;

#[inline]
fn fail<T>(errno: Errno) -> Ret<T> {
    Err(Fault::new(errno))
}

/// Location of a string or byte payload inside the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start of the data, relative to the region.
    pub ofs: usize,
    /// Length of the data in bytes.
    pub len: usize,
}

impl Span {
    /// Resolves the span against `buf`, or `None` if it points outside it.
    #[must_use]
    pub fn resolve(self, buf: &[u8]) -> Option<&[u8]> {
        buf.get(self.ofs..self.ofs.checked_add(self.len)?)
    }

    fn pack(self) -> u64 {
        ((self.len as u64) << 32) | self.ofs as u64
    }

    fn unpack(raw: u64) -> Self {
        Self {
            ofs: (raw & 0xFFFF_FFFF) as usize,
            len: (raw >> 32) as usize,
        }
    }
}

/// Addresses a child of a container.
#[derive(Debug, Clone, Copy)]
pub enum Locator<'k> {
    /// Member of an object.
    Key(&'k [u8]),
    /// Element of an array.
    Index(u32),
}

/// A decoded node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    /// Unresolved span of the data.
    Bytes(Span),
    /// Unresolved span of the data; not yet checked for UTF-8.
    Str(Span),
    /// Offset of the container header.
    Obj(usize),
    /// Offset of the container header.
    Arr(usize),
}

/// A value to be written.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'v> {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Bytes(&'v [u8]),
    Str(&'v [u8]),
    /// A new, empty object.
    Obj,
    /// A new, empty array.
    Arr,
}

#[derive(Debug, Clone, Copy)]
struct Container {
    ofs: usize,
    keyed: bool,
    count: u32,
    head: usize,
    tail: usize,
}

fn read_u32(buf: &[u8], at: usize) -> Ret<u32> {
    match at.checked_add(4).and_then(|end| buf.get(at..end)) {
        Some(&[a, b, c, d]) => Ok(u32::from_le_bytes([a, b, c, d])),
        _ => fail(Errno::BadMessage),
    }
}

fn read_u64(buf: &[u8], at: usize) -> Ret<u64> {
    let Some(src) = at.checked_add(8).and_then(|end| buf.get(at..end)) else {
        return fail(Errno::BadMessage);
    };
    let mut raw = [0u8; 8];
    raw.copy_from_slice(src);
    Ok(u64::from_le_bytes(raw))
}

fn write_bytes(buf: &mut [u8], at: usize, src: &[u8]) -> Ret<()> {
    match at.checked_add(src.len()).and_then(|end| buf.get_mut(at..end)) {
        Some(dst) => {
            dst.copy_from_slice(src);
            Ok(())
        }
        None => fail(Errno::BadMessage),
    }
}

fn write_u32(buf: &mut [u8], at: usize, value: u32) -> Ret<()> {
    write_bytes(buf, at, &value.to_le_bytes())
}

fn align_up(n: usize) -> usize {
    (n + ALIGN - 1) & !(ALIGN - 1)
}

fn to_u32(n: usize) -> Ret<u32> {
    u32::try_from(n).or(fail(Errno::Overflow))
}

fn logical<'b>(buf: &'b [u8], len: usize) -> Ret<&'b [u8]> {
    if len < EMPTY_DOC_LEN {
        return fail(Errno::Invalid);
    }
    buf.get(..len).map_or(fail(Errno::Invalid), Ok)
}

fn check_key(key: &[u8]) -> Ret<()> {
    if key.len() > MAX_KEY_LEN || key.contains(&0) {
        return fail(Errno::Invalid);
    }
    Ok(())
}

fn container(buf: &[u8], ofs: usize) -> Ret<Container> {
    let Some(&raw) = buf.get(ofs) else {
        return fail(Errno::Invalid);
    };
    if ofs % ALIGN != 0 {
        return fail(Errno::Invalid);
    }
    let keyed = match raw {
        tag::OBJECT => true,
        tag::ARRAY => false,
        t if t > tag::ARRAY => return fail(Errno::BadMessage),
        _ => return fail(Errno::Invalid),
    };
    let count = read_u32(buf, ofs + 4)?;
    // Each child needs an entry record of its own.
    if count as usize >= node_limit(buf.len()) {
        return fail(Errno::BadMessage);
    }
    Ok(Container {
        ofs,
        keyed,
        count,
        head: read_u32(buf, ofs + 8)? as usize,
        tail: read_u32(buf, ofs + 12)? as usize,
    })
}

fn entry_key(buf: &[u8], entry: usize) -> Ret<Span> {
    let span = Span {
        ofs: entry + ENTRY_LEN,
        len: read_u32(buf, entry + 4)? as usize,
    };
    match span.resolve(buf) {
        Some(_) => Ok(span),
        None => fail(Errno::BadMessage),
    }
}

/// Checks that a link stored at `from` points past it. An unset link (0)
/// fails the same way.
fn forward(from: usize, to: usize) -> Ret<usize> {
    if to <= from {
        return fail(Errno::BadMessage);
    }
    Ok(to)
}

fn next_entry(buf: &[u8], entry: usize) -> Ret<usize> {
    Ok(read_u32(buf, entry)? as usize)
}

fn find_key(buf: &[u8], c: &Container, key: &[u8]) -> Ret<Option<usize>> {
    let mut from = c.ofs;
    let mut at = c.head;
    for _ in 0..c.count {
        from = forward(from, at)?;
        if entry_key(buf, at)?.resolve(buf) == Some(key) {
            return Ok(Some(at));
        }
        at = next_entry(buf, at)?;
    }
    Ok(None)
}

fn find_index(buf: &[u8], c: &Container, index: u32) -> Ret<usize> {
    if index >= c.count {
        return fail(Errno::NoEntry);
    }
    let mut from = forward(c.ofs, c.head)?;
    for _ in 0..index {
        from = forward(from, next_entry(buf, from)?)?;
    }
    Ok(from)
}

fn locate(buf: &[u8], ofs: usize, loc: Locator<'_>) -> Ret<usize> {
    let c = container(buf, ofs)?;
    match loc {
        Locator::Key(key) => {
            check_key(key)?;
            if !c.keyed {
                return fail(Errno::Invalid);
            }
            find_key(buf, &c, key)?.map_or(fail(Errno::NoEntry), Ok)
        }
        Locator::Index(index) => {
            if c.keyed {
                return fail(Errno::Invalid);
            }
            find_index(buf, &c, index)
        }
    }
}

/// Decodes the value slot at `slot` (an entry's tag and payload).
fn read_slot(buf: &[u8], slot: usize) -> Ret<Node> {
    let Some(&raw) = buf.get(slot) else {
        return fail(Errno::BadMessage);
    };
    let payload = read_u64(buf, slot + 4)?;
    Ok(match raw {
        tag::NULL => Node::Null,
        tag::BOOL => Node::Bool(payload != 0),
        tag::INT => Node::I64(payload as i64),
        tag::FLOAT => Node::F64(f64::from_bits(payload)),
        tag::BYTES => Node::Bytes(Span::unpack(payload)),
        tag::STRING => Node::Str(Span::unpack(payload)),
        tag::OBJECT => Node::Obj(payload as usize),
        tag::ARRAY => Node::Arr(payload as usize),
        _ => return fail(Errno::BadMessage),
    })
}

/// Offset handed out for an entry's value: the child container for nested
/// nodes, the value slot itself for scalars.
fn child_offset(buf: &[u8], entry: usize) -> Ret<usize> {
    Ok(match read_slot(buf, entry + SLOT)? {
        Node::Obj(ofs) | Node::Arr(ofs) => ofs,
        _ => entry + SLOT,
    })
}

/// Writes an empty object at offset 0 and returns the new logical length.
pub fn init_obj(buf: &mut [u8]) -> Ret<usize> {
    init(buf, tag::OBJECT)
}

/// Writes an empty array at offset 0 and returns the new logical length.
pub fn init_arr(buf: &mut [u8]) -> Ret<usize> {
    init(buf, tag::ARRAY)
}

fn init(buf: &mut [u8], raw: u8) -> Ret<usize> {
    let Some(header) = buf.get_mut(..HEADER_LEN) else {
        return fail(Errno::NoBufs);
    };
    header.fill(0);
    header[0] = raw;
    Ok(HEADER_LEN)
}

/// Raw tag of the child at `loc`. The tag is not validated.
pub fn get_type(buf: &[u8], ofs: usize, loc: Locator<'_>) -> Ret<u8> {
    let entry = locate(buf, ofs, loc)?;
    buf.get(entry + SLOT).copied().map_or(fail(Errno::BadMessage), Ok)
}

/// Whether `key` names a child of the object at `ofs`.
pub fn exists(buf: &[u8], ofs: usize, key: &[u8]) -> Ret<bool> {
    check_key(key)?;
    let c = container(buf, ofs)?;
    if !c.keyed {
        return fail(Errno::Invalid);
    }
    Ok(find_key(buf, &c, key)?.is_some())
}

/// Number of direct children of the container at `ofs`.
pub fn count(buf: &[u8], ofs: usize) -> Ret<u32> {
    Ok(container(buf, ofs)?.count)
}

/// Decodes the child at `loc`.
pub fn get(buf: &[u8], ofs: usize, loc: Locator<'_>) -> Ret<Node> {
    read_slot(buf, locate(buf, ofs, loc)? + SLOT)
}

/// Decodes the node at `ofs`, which is either a container or a scalar slot
/// previously handed out by iteration.
pub fn node_at(buf: &[u8], ofs: usize) -> Ret<Node> {
    match buf.get(ofs) {
        Some(&tag::OBJECT) => container(buf, ofs).map(|c| Node::Obj(c.ofs)),
        Some(&tag::ARRAY) => container(buf, ofs).map(|c| Node::Arr(c.ofs)),
        Some(_) => read_slot(buf, ofs),
        None => fail(Errno::Invalid),
    }
}

macro_rules! typed_get {
    ($(#[$doc:meta])* $name:ident -> $ty:ty, $pat:pat => $out:expr) => {
        $(#[$doc])*
        pub fn $name(buf: &[u8], ofs: usize, loc: Locator<'_>) -> Ret<$ty> {
            match get(buf, ofs, loc)? {
                $pat => Ok($out),
                _ => fail(Errno::Invalid),
            }
        }
    };
}

typed_get!(get_null -> (), Node::Null => ());
typed_get!(get_bool -> bool, Node::Bool(v) => v);
typed_get!(get_i64 -> i64, Node::I64(v) => v);
typed_get!(get_f64 -> f64, Node::F64(v) => v);
typed_get!(
    /// Span of a string child. The span is not checked against the region.
    get_str -> Span, Node::Str(s) => s
);
typed_get!(
    /// Span of a byte child. The span is not checked against the region.
    get_bytes -> Span, Node::Bytes(s) => s
);
typed_get!(get_obj -> usize, Node::Obj(o) => o);
typed_get!(get_arr -> usize, Node::Arr(o) => o);

/// Replaces the document with a copy of `encoded`, which must already be a
/// complete document. Nothing is written unless it fits.
pub fn install(buf: &mut [u8], len: &mut usize, encoded: &[u8]) -> Ret<()> {
    let Some(dst) = buf.get_mut(..encoded.len()) else {
        return fail(Errno::NoBufs);
    };
    dst.copy_from_slice(encoded);
    *len = encoded.len();
    Ok(())
}

/// Advances `len` to the next aligned position and reserves `size` bytes
/// there. The padding stays committed even when the reservation fails.
fn reserve(cap: usize, len: &mut usize, size: usize) -> Ret<usize> {
    *len = align_up(*len);
    let Some(end) = len.checked_add(size) else {
        return fail(Errno::NoBufs);
    };
    if end > cap || end > MAX_CAPACITY {
        return fail(Errno::NoBufs);
    }
    let at = *len;
    *len = end;
    Ok(at)
}

/// Commits any out-of-line part of `value` and returns the slot contents
/// `(tag, payload, child container offset)`.
fn store_payload(buf: &mut [u8], len: &mut usize, value: Payload<'_>) -> Ret<(u8, u64, usize)> {
    Ok(match value {
        Payload::Null => (tag::NULL, 0, 0),
        Payload::Bool(b) => (tag::BOOL, u64::from(b), 0),
        Payload::I64(v) => (tag::INT, v as u64, 0),
        Payload::F64(v) => (tag::FLOAT, v.to_bits(), 0),
        Payload::Bytes(data) | Payload::Str(data) => {
            to_u32(data.len())?;
            let at = reserve(buf.len(), len, data.len())?;
            write_bytes(buf, at, data)?;
            let raw = if matches!(value, Payload::Str(_)) {
                tag::STRING
            } else {
                tag::BYTES
            };
            let span = Span {
                ofs: at,
                len: data.len(),
            };
            (raw, span.pack(), 0)
        }
        Payload::Obj | Payload::Arr => {
            let at = reserve(buf.len(), len, HEADER_LEN)?;
            let raw = if matches!(value, Payload::Obj) {
                tag::OBJECT
            } else {
                tag::ARRAY
            };
            let mut header = [0u8; HEADER_LEN];
            header[0] = raw;
            write_bytes(buf, at, &header)?;
            (raw, at as u64, at)
        }
    })
}

fn write_slot(buf: &mut [u8], entry: usize, raw: u8, payload: u64) -> Ret<()> {
    write_bytes(buf, entry + SLOT, &[raw, 0, 0, 0])?;
    write_bytes(buf, entry + SLOT + 4, &payload.to_le_bytes())
}

/// Reserves a fresh entry for `key` and links it at the tail of `c`.
fn push_entry(buf: &mut [u8], len: &mut usize, c: &Container, key: &[u8]) -> Ret<usize> {
    let count = c.count.checked_add(1).map_or(fail(Errno::Overflow), Ok)?;
    let entry = reserve(buf.len(), len, ENTRY_LEN + key.len())?;
    write_u32(buf, entry, 0)?;
    write_u32(buf, entry + 4, to_u32(key.len())?)?;
    write_bytes(buf, entry + ENTRY_LEN, key)?;
    let raw = to_u32(entry)?;
    if c.head == 0 {
        write_u32(buf, c.ofs + 8, raw)?;
    } else {
        write_u32(buf, c.tail, raw)?;
    }
    write_u32(buf, c.ofs + 12, raw)?;
    write_u32(buf, c.ofs + 4, count)?;
    Ok(entry)
}

/// Inserts or overwrites `key` in the object at `ofs`. Returns the new child
/// container offset for nested values and 0 otherwise.
pub fn set(buf: &mut [u8], len: &mut usize, ofs: usize, key: &[u8], value: Payload<'_>) -> Ret<usize> {
    check_key(key)?;
    let region = logical(buf, *len)?;
    let c = container(region, ofs)?;
    if !c.keyed {
        return fail(Errno::Invalid);
    }
    let existing = find_key(region, &c, key)?;
    let (raw, payload, child) = store_payload(buf, len, value)?;
    let entry = match existing {
        Some(entry) => entry,
        None => push_entry(buf, len, &c, key)?,
    };
    write_slot(buf, entry, raw, payload)?;
    Ok(child)
}

/// Appends to the array at `ofs`. Returns the new child container offset for
/// nested values and 0 otherwise.
pub fn append(buf: &mut [u8], len: &mut usize, ofs: usize, value: Payload<'_>) -> Ret<usize> {
    let c = container(logical(buf, *len)?, ofs)?;
    if c.keyed {
        return fail(Errno::Invalid);
    }
    let (raw, payload, child) = store_payload(buf, len, value)?;
    let entry = push_entry(buf, len, &c, &[])?;
    write_slot(buf, entry, raw, payload)?;
    Ok(child)
}

/// Iteration state over one container.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    prev: usize,
    next: usize,
    remaining: u32,
    index: u32,
    keyed: bool,
}

/// One child produced by [`iter_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Set for object children.
    pub key: Option<Span>,
    /// Position among the container's children.
    pub index: u32,
    /// Child container offset for nested nodes, value slot otherwise.
    pub child: usize,
}

/// Starts iterating the children of the container at `ofs`.
pub fn iter_create(buf: &[u8], ofs: usize) -> Ret<Cursor> {
    let c = container(buf, ofs)?;
    Ok(Cursor {
        prev: c.ofs,
        next: c.head,
        remaining: c.count,
        index: 0,
        keyed: c.keyed,
    })
}

/// Yields the next child, or `None` once the container is exhausted.
pub fn iter_next(buf: &[u8], cursor: &mut Cursor) -> Ret<Option<Step>> {
    if cursor.remaining == 0 {
        return Ok(None);
    }
    let entry = forward(cursor.prev, cursor.next)?;
    let step = Step {
        key: if cursor.keyed {
            Some(entry_key(buf, entry)?)
        } else {
            None
        },
        index: cursor.index,
        child: child_offset(buf, entry)?,
    };
    cursor.prev = entry;
    cursor.next = next_entry(buf, entry)?;
    cursor.remaining -= 1;
    cursor.index += 1;
    Ok(Some(step))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(cap: usize) -> (Vec<u8>, usize) {
        let mut buf = vec![0u8; cap];
        let len = init_obj(&mut buf).unwrap();
        (buf, len)
    }

    #[test]
    fn empty_object_is_one_header() {
        let (buf, len) = object(64);
        assert_eq!(len, EMPTY_DOC_LEN);
        assert_eq!(buf[0], tag::OBJECT);
        assert_eq!(count(&buf[..len], 0), Ok(0));
    }

    #[test]
    fn init_needs_a_header() {
        let mut buf = [0u8; EMPTY_DOC_LEN - 1];
        assert_eq!(init_arr(&mut buf), fail(Errno::NoBufs));
    }

    #[test]
    fn set_then_get_scalar() {
        let (mut buf, mut len) = object(128);
        set(&mut buf, &mut len, 0, b"n", Payload::I64(-7)).unwrap();
        assert_eq!(get_i64(&buf[..len], 0, Locator::Key(b"n")), Ok(-7));
        assert_eq!(
            get_bool(&buf[..len], 0, Locator::Key(b"n")),
            fail(Errno::Invalid)
        );
        assert_eq!(
            get_i64(&buf[..len], 0, Locator::Key(b"m")),
            fail(Errno::NoEntry)
        );
    }

    #[test]
    fn overwrite_reuses_the_entry() {
        let (mut buf, mut len) = object(256);
        set(&mut buf, &mut len, 0, b"k", Payload::Bool(true)).unwrap();
        set(&mut buf, &mut len, 0, b"k", Payload::Str(b"text")).unwrap();
        assert_eq!(count(&buf[..len], 0), Ok(1));
        assert_eq!(get_type(&buf[..len], 0, Locator::Key(b"k")), Ok(tag::STRING));
    }

    #[test]
    fn failed_write_can_advance_length() {
        // Room for the string data but not for the entry that follows it.
        let cap = EMPTY_DOC_LEN + 8 + ENTRY_LEN - 1;
        let (mut buf, mut len) = object(cap);
        let before = len;
        let err = set(&mut buf, &mut len, 0, b"", Payload::Str(b"abcdefgh"));
        assert_eq!(err, fail(Errno::NoBufs));
        assert_eq!(len, before + 8);
    }

    #[test]
    fn append_only_targets_arrays() {
        let (mut buf, mut len) = object(128);
        assert_eq!(
            append(&mut buf, &mut len, 0, Payload::Null),
            fail(Errno::Invalid)
        );
    }

    #[test]
    fn index_past_count_is_missing() {
        let mut buf = vec![0u8; 256];
        let mut len = init_arr(&mut buf).unwrap();
        append(&mut buf, &mut len, 0, Payload::F64(1.5)).unwrap();
        assert_eq!(get_f64(&buf[..len], 0, Locator::Index(0)), Ok(1.5));
        assert_eq!(
            get_f64(&buf[..len], 0, Locator::Index(1)),
            fail(Errno::NoEntry)
        );
    }

    #[test]
    fn bad_keys_are_rejected() {
        let (mut buf, mut len) = object(1024);
        let long = [b'k'; MAX_KEY_LEN + 1];
        assert_eq!(
            set(&mut buf, &mut len, 0, &long, Payload::Null),
            fail(Errno::Invalid)
        );
        assert_eq!(
            set(&mut buf, &mut len, 0, b"a\0b", Payload::Null),
            fail(Errno::Invalid)
        );
        assert!(set(&mut buf, &mut len, 0, &long[..MAX_KEY_LEN], Payload::Null).is_ok());
    }

    #[test]
    fn nested_child_is_addressable() {
        let (mut buf, mut len) = object(256);
        let child = set(&mut buf, &mut len, 0, b"inner", Payload::Arr).unwrap();
        append(&mut buf, &mut len, child, Payload::Bool(false)).unwrap();
        assert_eq!(get_arr(&buf[..len], 0, Locator::Key(b"inner")), Ok(child));
        assert_eq!(count(&buf[..len], child), Ok(1));
        assert_eq!(node_at(&buf[..len], child), Ok(Node::Arr(child)));
    }

    #[test]
    fn iteration_walks_insertion_order() {
        let (mut buf, mut len) = object(256);
        set(&mut buf, &mut len, 0, b"x", Payload::I64(1)).unwrap();
        set(&mut buf, &mut len, 0, b"y", Payload::I64(2)).unwrap();
        let region = &buf[..len];
        let mut cursor = iter_create(region, 0).unwrap();
        let first = iter_next(region, &mut cursor).unwrap().unwrap();
        assert_eq!(first.key.and_then(|k| k.resolve(region)), Some(&b"x"[..]));
        assert_eq!(node_at(region, first.child), Ok(Node::I64(1)));
        assert!(iter_next(region, &mut cursor).unwrap().is_some());
        assert_eq!(iter_next(region, &mut cursor), Ok(None));
    }

    #[test]
    fn corrupt_tag_is_reported() {
        let (mut buf, mut len) = object(128);
        set(&mut buf, &mut len, 0, b"k", Payload::Null).unwrap();
        let entry = read_u32(&buf, 8).unwrap() as usize;
        buf[entry + SLOT] = 42;
        assert_eq!(get_type(&buf[..len], 0, Locator::Key(b"k")), Ok(42));
        assert_eq!(get(&buf[..len], 0, Locator::Key(b"k")), fail(Errno::BadMessage));
    }

    #[test]
    fn child_count_is_bounded_by_the_region() {
        let (mut buf, mut len) = object(64);
        set(&mut buf, &mut len, 0, b"a", Payload::Null).unwrap();
        buf[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        let region = &buf[..len];
        assert_eq!(count(region, 0), fail(Errno::BadMessage));
        assert_eq!(exists(region, 0, b"zz"), fail(Errno::BadMessage));
        assert_eq!(iter_create(region, 0).map(|_| ()), fail(Errno::BadMessage));
    }

    #[test]
    fn links_must_point_forward() {
        let (mut buf, mut len) = object(128);
        set(&mut buf, &mut len, 0, b"a", Payload::I64(1)).unwrap();
        set(&mut buf, &mut len, 0, b"b", Payload::I64(2)).unwrap();
        let first = read_u32(&buf, 8).unwrap() as usize;
        // The first entry now links to itself.
        write_u32(&mut buf, first, first as u32).unwrap();
        let region = &buf[..len];

        assert_eq!(exists(region, 0, b"a"), Ok(true));
        assert_eq!(exists(region, 0, b"zz"), fail(Errno::BadMessage));
        let mut cursor = iter_create(region, 0).unwrap();
        assert!(iter_next(region, &mut cursor).unwrap().is_some());
        assert_eq!(iter_next(region, &mut cursor), fail(Errno::BadMessage));

        let mut buf = vec![0u8; 128];
        let mut len = init_arr(&mut buf).unwrap();
        append(&mut buf, &mut len, 0, Payload::Null).unwrap();
        append(&mut buf, &mut len, 0, Payload::Null).unwrap();
        // Head pointing back at the header.
        write_u32(&mut buf, 8, 0).unwrap();
        assert_eq!(get_null(&buf[..len], 0, Locator::Index(1)), fail(Errno::BadMessage));
    }

    #[test]
    fn install_all_or_nothing() {
        let (src, src_len) = object(64);
        let mut buf = [7u8; 8];
        let mut len = 3;
        assert_eq!(install(&mut buf, &mut len, &src[..src_len]), fail(Errno::NoBufs));
        assert_eq!((buf, len), ([7u8; 8], 3));

        let mut buf = [7u8; 32];
        install(&mut buf, &mut len, &src[..src_len]).unwrap();
        assert_eq!(len, EMPTY_DOC_LEN);
        assert_eq!(count(&buf[..len], 0), Ok(0));
    }

    #[test]
    fn truncated_region_never_panics() {
        let (mut buf, mut len) = object(256);
        set(&mut buf, &mut len, 0, b"s", Payload::Str(b"hello")).unwrap();
        for cut in 0..len {
            let _ = get_str(&buf[..cut], 0, Locator::Key(b"s"));
            let _ = iter_create(&buf[..cut], 0).and_then(|mut c| iter_next(&buf[..cut], &mut c));
        }
    }
}
