use thiserror::Error;

use crate::engine::{Errno, Fault};

/// Every way a document operation can fail.
///
/// The set is closed: engine failures, allocation failures and borrowed-view
/// resolution failures all land on one of these variants.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The key or index does not exist.
    #[error("key or index not found")]
    NotFound,
    /// Malformed or over-long key, embedded NUL, wrong node type, or bad
    /// offset.
    #[error("invalid argument")]
    InvalidArgument,
    /// The region cannot hold the write.
    #[error("no buffer space")]
    NoBufferSpace,
    /// The encoded bytes are inconsistent, e.g. an unknown type tag.
    #[error("corrupt document data")]
    CorruptData,
    /// The host allocator refused to allocate or grow a region.
    #[error("out of memory")]
    OutOfMemory,
    /// A borrowed view resolved to nothing inside the current region.
    #[error("stale reference into document buffer")]
    StaleReference,
    /// Anything else the engine reported.
    #[error("unexpected engine failure")]
    Unexpected,
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        debug_assert!(
            fault.errno.is_some(),
            "engine returned status {} without an error code",
            fault.status
        );
        match fault.errno {
            Some(Errno::NoEntry) => Error::NotFound,
            Some(Errno::Invalid) => Error::InvalidArgument,
            Some(Errno::NoBufs) => Error::NoBufferSpace,
            Some(Errno::BadMessage) => Error::CorruptData,
            Some(Errno::NoMem) => Error::OutOfMemory,
            Some(Errno::Overflow) | None => Error::Unexpected,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Errno::NoEntry, Error::NotFound)]
    #[case(Errno::Invalid, Error::InvalidArgument)]
    #[case(Errno::NoBufs, Error::NoBufferSpace)]
    #[case(Errno::BadMessage, Error::CorruptData)]
    #[case(Errno::NoMem, Error::OutOfMemory)]
    #[case(Errno::Overflow, Error::Unexpected)]
    fn translates_engine_codes(#[case] errno: Errno, #[case] expected: Error) {
        assert_eq!(Error::from(Fault::new(errno)), expected);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "without an error code")]
    fn fault_without_errno_trips_debug_assert() {
        let _ = Error::from(Fault {
            status: -1,
            errno: None,
        });
    }

    #[test]
    fn messages_are_lowercase() {
        assert_eq!(Error::NoBufferSpace.to_string(), "no buffer space");
        assert_eq!(
            Error::StaleReference.to_string(),
            "stale reference into document buffer"
        );
    }
}
