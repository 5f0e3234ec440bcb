//! Text bridge between documents and JSON.
//!
//! Decoding parses the text with `serde_json` and writes the node tree
//! through [`crate::DocWrite::replace_with`], which builds it in scratch
//! space before copying it in. A destination that is too small is therefore
//! left exactly as it was. Encoding serializes straight out of the region
//! without mutating it.
//!
//! | node     | JSON                         |
//! |----------|------------------------------|
//! | `null`   | null                         |
//! | `bool`   | true/false                   |
//! | `int`    | integer                      |
//! | `float`  | number (non-finite: null)    |
//! | `bytes`  | string, standard base64      |
//! | `string` | string                       |
//! | `array`  | array                        |
//! | `object` | object, in insertion order   |
//!
//! Decoding is one-way for bytes: base64 text comes back as a string node.
//! Without the `json` feature every entry point fails with
//! [`Error::InvalidArgument`].

use crate::{
    engine::Ret,
    error::{Error, Result},
};

#[cfg(feature = "json")]
pub(crate) use enabled::*;

#[cfg(not(feature = "json"))]
pub(crate) use disabled::*;

#[cfg(feature = "json")]
mod enabled {
    use std::{cell::Cell, io};

    use base64::Engine as _;
    use bstr::ByteSlice;
    use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};
    use serde_json::Value as JsonValue;

    use super::*;
    use crate::{
        engine::{self, Errno, Fault, Node, Payload},
        iter::Iter,
        value::{Offset, Value},
    };

    /// Deepest nesting the encoder follows.
    const MAX_DEPTH: usize = 128;

    pub(crate) type Tree = JsonValue;

    fn rooted(tree: JsonValue) -> Result<Tree> {
        if tree.is_object() || tree.is_array() {
            Ok(tree)
        } else {
            Err(Error::InvalidArgument)
        }
    }

    pub(crate) fn parse(text: &[u8]) -> Result<Tree> {
        rooted(serde_json::from_slice(text).map_err(|_| Error::InvalidArgument)?)
    }

    pub(crate) fn parse_reader<R: io::Read>(reader: R) -> Result<Tree> {
        rooted(serde_json::from_reader(reader).map_err(|_| Error::InvalidArgument)?)
    }

    /// Encodes `tree` as a whole document at the start of `buf`.
    pub(crate) fn write_tree(buf: &mut [u8], len: &mut usize, tree: &Tree) -> Ret<()> {
        *len = match tree {
            JsonValue::Object(_) => engine::init_obj(buf)?,
            JsonValue::Array(_) => engine::init_arr(buf)?,
            _ => return Err(Fault::new(Errno::Invalid)),
        };
        write_children(buf, len, 0, tree)
    }

    fn write_children(buf: &mut [u8], len: &mut usize, ofs: usize, tree: &Tree) -> Ret<()> {
        match tree {
            JsonValue::Object(members) => {
                for (key, value) in members {
                    let child = engine::set(buf, len, ofs, key.as_bytes(), payload(value))?;
                    write_children(buf, len, child, value)?;
                }
            }
            JsonValue::Array(items) => {
                for item in items {
                    let child = engine::append(buf, len, ofs, payload(item))?;
                    write_children(buf, len, child, item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn payload(value: &JsonValue) -> Payload<'_> {
        match value {
            JsonValue::Null => Payload::Null,
            JsonValue::Bool(b) => Payload::Bool(*b),
            JsonValue::Number(n) => n
                .as_i64()
                .map(Payload::I64)
                .or_else(|| n.as_f64().map(Payload::F64))
                .unwrap_or(Payload::Null),
            JsonValue::String(s) => Payload::Str(s.as_bytes()),
            JsonValue::Array(_) => Payload::Arr,
            JsonValue::Object(_) => Payload::Obj,
        }
    }

    /// Shared state of one encode call. Serde errors are strings, so the
    /// typed cause is parked here.
    ///
    /// A well-formed region holds at most [`engine::node_limit`] nodes, so
    /// visiting more than that means some child is reachable twice.
    struct Encoder<'a> {
        bytes: &'a [u8],
        fault: Cell<Option<Error>>,
        visits: Cell<usize>,
    }

    impl<'a> Encoder<'a> {
        fn new(bytes: &'a [u8]) -> Self {
            Self {
                bytes,
                fault: Cell::new(None),
                visits: Cell::new(0),
            }
        }

        fn visit(&self) -> Result<()> {
            let visits = self.visits.get() + 1;
            if visits > engine::node_limit(self.bytes.len()) {
                return Err(Error::CorruptData);
            }
            self.visits.set(visits);
            Ok(())
        }

        fn fail<E: ser::Error>(&self, err: Error) -> E {
            self.fault.set(Some(err));
            E::custom(err)
        }

        fn root(&self, ofs: Offset) -> Result<NodeRef<'_, 'a>> {
            self.visit()?;
            Ok(NodeRef {
                enc: self,
                node: engine::node_at(self.bytes, ofs.get())?,
                depth: 0,
            })
        }

        fn finish(&self, err: &serde_json::Error) -> Error {
            self.fault.take().unwrap_or(if err.is_io() {
                Error::NoBufferSpace
            } else {
                Error::Unexpected
            })
        }
    }

    struct NodeRef<'e, 'a> {
        enc: &'e Encoder<'a>,
        node: Node,
        depth: usize,
    }

    impl NodeRef<'_, '_> {
        /// Steps into a child of the container at `parent`. Children are
        /// always written after their parent, so a child at or before it is
        /// a loop.
        fn child(&self, parent: Offset, ofs: Offset) -> Result<Self> {
            if ofs <= parent {
                return Err(Error::CorruptData);
            }
            self.enc.visit()?;
            Ok(NodeRef {
                enc: self.enc,
                node: engine::node_at(self.enc.bytes, ofs.get())?,
                depth: self.depth + 1,
            })
        }
    }

    impl Serialize for NodeRef<'_, '_> {
        fn serialize<S: Serializer>(&self, s: S) -> core::result::Result<S::Ok, S::Error> {
            let enc = self.enc;
            if self.depth > MAX_DEPTH {
                return Err(enc.fail(Error::InvalidArgument));
            }
            match Value::from_node(enc.bytes, self.node).map_err(|e| enc.fail(e))? {
                Value::Null => s.serialize_unit(),
                Value::Bool(v) => s.serialize_bool(v),
                Value::Int(v) => s.serialize_i64(v),
                Value::Float(v) => s.serialize_f64(v),
                Value::Bytes(v) => s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(v)),
                Value::String(v) => s.serialize_str(v),
                Value::Object(ofs) => {
                    let count = engine::count(enc.bytes, ofs.get()).map_err(|f| enc.fail(f.into()))?;
                    let mut map = s.serialize_map(Some(count as usize))?;
                    for entry in Iter::new(enc.bytes, ofs).map_err(|e| enc.fail(e))? {
                        let entry = entry.map_err(|e| enc.fail(e))?;
                        let key = entry.key.map(|k| k.to_str_lossy()).unwrap_or_default();
                        let child = self.child(ofs, entry.offset).map_err(|e| enc.fail(e))?;
                        map.serialize_entry(&key, &child)?;
                    }
                    map.end()
                }
                Value::Array(ofs) => {
                    let count = engine::count(enc.bytes, ofs.get()).map_err(|f| enc.fail(f.into()))?;
                    let mut seq = s.serialize_seq(Some(count as usize))?;
                    for entry in Iter::new(enc.bytes, ofs).map_err(|e| enc.fail(e))? {
                        let entry = entry.map_err(|e| enc.fail(e))?;
                        let child = self.child(ofs, entry.offset).map_err(|e| enc.fail(e))?;
                        seq.serialize_element(&child)?;
                    }
                    seq.end()
                }
            }
        }
    }

    pub(crate) fn encode(bytes: &[u8], ofs: Offset, pretty: bool) -> Result<String> {
        let enc = Encoder::new(bytes);
        let root = enc.root(ofs)?;
        let out = if pretty {
            serde_json::to_string_pretty(&root)
        } else {
            serde_json::to_string(&root)
        };
        out.map_err(|err| enc.finish(&err))
    }

    pub(crate) fn encode_into(bytes: &[u8], ofs: Offset, dst: &mut [u8]) -> Result<usize> {
        let enc = Encoder::new(bytes);
        let root = enc.root(ofs)?;
        let total = dst.len();
        let mut rest = dst;
        serde_json::to_writer(&mut rest, &root).map_err(|err| enc.finish(&err))?;
        Ok(total - rest.len())
    }
}

#[cfg(not(feature = "json"))]
mod disabled {
    use std::io;

    use super::*;
    use crate::value::Offset;

    pub(crate) enum Tree {}

    pub(crate) fn parse(_: &[u8]) -> Result<Tree> {
        Err(Error::InvalidArgument)
    }

    pub(crate) fn parse_reader<R: io::Read>(_: R) -> Result<Tree> {
        Err(Error::InvalidArgument)
    }

    pub(crate) fn write_tree(_: &mut [u8], _: &mut usize, tree: &Tree) -> Ret<()> {
        match *tree {}
    }

    pub(crate) fn encode(_: &[u8], _: Offset, _: bool) -> Result<String> {
        Err(Error::InvalidArgument)
    }

    pub(crate) fn encode_into(_: &[u8], _: Offset, _: &mut [u8]) -> Result<usize> {
        Err(Error::InvalidArgument)
    }
}
