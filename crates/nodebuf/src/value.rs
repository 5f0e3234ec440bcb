//! Node offsets and decoded values.

use core::fmt;

use crate::{
    engine::{Node, tag},
    error::{Error, Result},
};

/// Position of a node inside one document region.
///
/// Offsets are relative to the start of the region, not memory addresses, so
/// an offset taken before the region is reallocated still names the same node
/// afterwards. Using an offset against a different document is a caller error
/// the engine cannot detect.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset(usize);

impl Offset {
    /// The root node.
    pub const ROOT: Offset = Offset(0);

    /// Wraps a raw offset, e.g. one read back from storage.
    #[must_use]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw byte position.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Returns `true` for [`Offset::ROOT`].
    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl Default for Offset {
    fn default() -> Self {
        Self::ROOT
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{:#x}", self.0)
    }
}

/// The type of a node.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// `null`.
    Null,
    /// `true` or `false`.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// Byte string.
    Bytes,
    /// UTF-8 string.
    String,
    /// Keyed container.
    Object,
    /// Indexed container.
    Array,
}

impl TryFrom<u8> for ValueType {
    type Error = Error;

    /// Maps a raw engine tag; anything outside the known range means the
    /// buffer is corrupt.
    fn try_from(raw: u8) -> Result<Self> {
        Ok(match raw {
            tag::NULL => Self::Null,
            tag::BOOL => Self::Bool,
            tag::INT => Self::Int,
            tag::FLOAT => Self::Float,
            tag::BYTES => Self::Bytes,
            tag::STRING => Self::String,
            tag::OBJECT => Self::Object,
            tag::ARRAY => Self::Array,
            _ => return Err(Error::CorruptData),
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bytes => "bytes",
            Self::String => "string",
            Self::Object => "object",
            Self::Array => "array",
        })
    }
}

/// A decoded node.
///
/// The `String` and `Bytes` variants borrow the document region directly.
/// They live only as long as the shared borrow of the document they came
/// from, so the next mutation (or growth of a store) cannot happen while one
/// is held. Use [`Value::into_owned`] to keep the data past that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// `null`.
    Null,
    /// `true` or `false`.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Byte string, borrowed from the region.
    Bytes(&'a [u8]),
    /// UTF-8 string, borrowed from the region.
    String(&'a str),
    /// Offset of a nested object; read it with the keyed accessors.
    Object(Offset),
    /// Offset of a nested array; read it with the indexed accessors.
    Array(Offset),
}

impl Value<'_> {
    /// The type of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Bytes(_) => ValueType::Bytes,
            Value::String(_) => ValueType::String,
            Value::Object(_) => ValueType::Object,
            Value::Array(_) => ValueType::Array,
        }
    }

    /// Copies any borrowed data out of the document.
    #[must_use]
    pub fn into_owned(self) -> OwnedValue {
        match self {
            Value::Null => OwnedValue::Null,
            Value::Bool(v) => OwnedValue::Bool(v),
            Value::Int(v) => OwnedValue::Int(v),
            Value::Float(v) => OwnedValue::Float(v),
            Value::Bytes(v) => OwnedValue::Bytes(v.to_vec()),
            Value::String(v) => OwnedValue::String(v.into()),
            Value::Object(o) => OwnedValue::Object(o),
            Value::Array(o) => OwnedValue::Array(o),
        }
    }
}

impl<'a> Value<'a> {
    /// Builds a value from an engine node, resolving borrowed spans against
    /// the logical region `bytes`.
    pub(crate) fn from_node(bytes: &'a [u8], node: Node) -> Result<Self> {
        Ok(match node {
            Node::Null => Value::Null,
            Node::Bool(v) => Value::Bool(v),
            Node::I64(v) => Value::Int(v),
            Node::F64(v) => Value::Float(v),
            Node::Bytes(span) => Value::Bytes(span.resolve(bytes).ok_or(Error::StaleReference)?),
            Node::Str(span) => Value::String(
                core::str::from_utf8(span.resolve(bytes).ok_or(Error::StaleReference)?)
                    .map_err(|_| Error::CorruptData)?,
            ),
            Node::Obj(o) => Value::Object(Offset(o)),
            Node::Arr(o) => Value::Array(Offset(o)),
        })
    }
}

/// A value that owns its data and is unaffected by later document
/// mutation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum OwnedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    /// Offsets are positions, not data, so they stay as they are.
    Object(Offset),
    Array(Offset),
}

impl OwnedValue {
    /// Borrows this value back as a [`Value`].
    #[must_use]
    pub fn as_value(&self) -> Value<'_> {
        match self {
            OwnedValue::Null => Value::Null,
            OwnedValue::Bool(v) => Value::Bool(*v),
            OwnedValue::Int(v) => Value::Int(*v),
            OwnedValue::Float(v) => Value::Float(*v),
            OwnedValue::Bytes(v) => Value::Bytes(v),
            OwnedValue::String(v) => Value::String(v),
            OwnedValue::Object(o) => Value::Object(*o),
            OwnedValue::Array(o) => Value::Array(*o),
        }
    }
}

impl From<Value<'_>> for OwnedValue {
    fn from(value: Value<'_>) -> Self {
        value.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tags_are_corrupt() {
        for raw in 0..=tag::ARRAY {
            assert!(ValueType::try_from(raw).is_ok());
        }
        assert_eq!(ValueType::try_from(8), Err(Error::CorruptData));
        assert_eq!(ValueType::try_from(u8::MAX), Err(Error::CorruptData));
    }

    #[test]
    fn owned_copy_round_trips() {
        let text = String::from("Alice");
        let owned = Value::String(&text).into_owned();
        drop(text);
        assert_eq!(owned.as_value(), Value::String("Alice"));
        assert_eq!(owned.as_value().value_type(), ValueType::String);
    }

    #[test]
    fn root_offset() {
        assert!(Offset::ROOT.is_root());
        assert_eq!(Offset::default(), Offset::ROOT);
        assert_eq!(Offset::new(32).to_string(), "@0x20");
    }
}
