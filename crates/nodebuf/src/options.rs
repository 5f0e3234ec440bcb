use crate::engine::MAX_CAPACITY;

/// Capacity a store starts with, and the smallest it will accept.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Factor by which a store multiplies its capacity when a write does not fit.
pub const GROWTH_FACTOR: usize = 4;

/// Configuration for the growable stores.
///
/// # Examples
///
/// ```rust
/// use nodebuf::{Store, StoreOptions, HeapAllocator};
///
/// let options = StoreOptions {
///     initial_capacity: 64 * 1024,
///     ..Default::default()
/// };
/// let store = Store::with_options(options, HeapAllocator)?;
/// assert_eq!(store.capacity(), 64 * 1024);
/// # Ok::<(), nodebuf::Error>(())
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Size of the first allocation.
    ///
    /// Values below [`DEFAULT_CAPACITY`] are raised to it.
    ///
    /// # Default
    ///
    /// [`DEFAULT_CAPACITY`]
    pub initial_capacity: usize,

    /// Ceiling for growth. Once the region has this capacity, a write that
    /// still does not fit fails with [`crate::Error::NoBufferSpace`].
    ///
    /// Clamped into `initial_capacity..=MAX_CAPACITY`.
    ///
    /// # Default
    ///
    /// [`MAX_CAPACITY`], the largest region the engine's 32-bit fields can
    /// address.
    pub max_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            max_capacity: MAX_CAPACITY,
        }
    }
}

impl StoreOptions {
    pub(crate) fn normalized(self) -> Self {
        let initial_capacity = self.initial_capacity.clamp(DEFAULT_CAPACITY, MAX_CAPACITY);
        Self {
            initial_capacity,
            max_capacity: self.max_capacity.clamp(initial_capacity, MAX_CAPACITY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_are_raised() {
        let options = StoreOptions {
            initial_capacity: 16,
            max_capacity: 0,
        }
        .normalized();
        assert_eq!(options.initial_capacity, DEFAULT_CAPACITY);
        assert_eq!(options.max_capacity, DEFAULT_CAPACITY);
    }

    #[quickcheck_macros::quickcheck]
    fn normalized_bounds_hold(initial_capacity: usize, max_capacity: usize) -> bool {
        let options = StoreOptions {
            initial_capacity,
            max_capacity,
        }
        .normalized();
        DEFAULT_CAPACITY <= options.initial_capacity
            && options.initial_capacity <= options.max_capacity
            && options.max_capacity <= MAX_CAPACITY
    }

    #[test]
    fn defaults_are_already_normal() {
        assert_eq!(StoreOptions::default().normalized(), StoreOptions::default());
    }
}
