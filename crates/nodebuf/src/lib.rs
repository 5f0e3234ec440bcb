//! Checked and auto-growing views over a compact binary JSON document.
//!
//! A document is a tree of nodes (null, bool, int, float, bytes, string,
//! object, array) encoded into one contiguous byte region. Nodes are
//! addressed by [`Offset`]s relative to the start of the region, so a region
//! can be copied, moved or reallocated without invalidating them.
//!
//! Two flavors share the [`DocRead`]/[`DocWrite`] operations:
//!
//! - [`DocView`] works inside caller-owned memory and never grows; a write
//!   that does not fit fails with [`Error::NoBufferSpace`].
//! - [`Store`] and [`UnmanagedStore`] own a region obtained from a
//!   [`RegionAllocator`] and grow it transparently, up to a configurable
//!   ceiling.
//!
//! Every operation reports failure through [`Error`]; a failed write leaves
//! the document as it was.
//!
//! ```rust
//! use nodebuf::{DocRead, DocWrite, Offset, Store};
//!
//! let mut store = Store::new()?;
//! store.set_str(Offset::ROOT, "event", "http_request")?;
//! let headers = store.set_obj(Offset::ROOT, "headers")?;
//! store.set_str(headers, "user-agent", "curl/8.1.2")?;
//! assert_eq!(store.get_str(headers, "user-agent")?, "curl/8.1.2");
//! # #[cfg(feature = "json")]
//! assert_eq!(
//!     store.to_json(Offset::ROOT)?,
//!     r#"{"event":"http_request","headers":{"user-agent":"curl/8.1.2"}}"#
//! );
//! # Ok::<(), nodebuf::Error>(())
//! ```

pub mod engine;

mod document;
mod error;
mod iter;
mod json;
mod options;
mod store;
mod value;
mod view;

#[cfg(test)]
mod tests;

pub use document::{DocRead, DocWrite};
pub use engine::{EMPTY_DOC_LEN, MAX_CAPACITY, MAX_KEY_LEN};
pub use error::{Error, Result};
pub use iter::{Entry, Iter};
pub use options::{DEFAULT_CAPACITY, GROWTH_FACTOR, StoreOptions};
pub use store::{AllocError, HeapAllocator, RegionAllocator, Store, StoreHandle, UnmanagedStore};
pub use value::{Offset, OwnedValue, Value, ValueType};
pub use view::DocView;
