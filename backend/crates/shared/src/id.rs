//! Common ID Types
//!
//! Type-safe ID wrappers for domain entities.
//!
//! Entity ids in this system are assigned by the database (`BIGSERIAL`), so
//! unlike a random-UUID scheme there is no constructor that invents an id on
//! the application side. Domain crates declare their own marker types:
//!
//! ```
//! use kernel::id::Id;
//!
//! struct UserMarker;
//! type UserId = Id<UserMarker>;
//!
//! let id = UserId::from_i64(42);
//! assert_eq!(id.value(), 42);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Generic typed ID wrapper over a store-assigned numeric id
pub struct Id<T> {
    value: i64,
    _marker: PhantomData<T>,
}

// Manual impls over the i64: derives would demand the same traits of
// `T`, but markers are bare unit structs that carry no data.
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Id<T> {
    /// Create from a raw database value
    pub fn from_i64(value: i64) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    /// Get the underlying numeric value
    pub fn value(&self) -> i64 {
        self.value
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> From<i64> for Id<T> {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl<T> From<Id<T>> for i64 {
    fn from(id: Id<T>) -> Self {
        id.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    #[test]
    fn test_id_type_safety() {
        let a: Id<Alpha> = Id::from_i64(1);
        let b: Id<Beta> = Id::from_i64(1);

        // These are different types, cannot be mixed
        let _a: i64 = a.into();
        let _b: i64 = b.into();
    }

    #[test]
    fn test_id_roundtrip() {
        let id: Id<Alpha> = Id::from_i64(97);
        assert_eq!(id.value(), 97);
        assert_eq!(i64::from(id), 97);
        assert_eq!(Id::<Alpha>::from(97), id);
    }

    #[test]
    fn test_id_semantics_need_nothing_from_marker() {
        // Alpha implements no traits at all; ids must still copy,
        // compare, order and hash on their numeric value alone
        let id: Id<Alpha> = Id::from_i64(7);
        let copy = id;
        assert_eq!(id, copy);
        assert!(id < Id::from_i64(8));

        let mut set = std::collections::HashSet::new();
        set.insert(id);
        assert!(set.contains(&copy));
    }

    #[test]
    fn test_id_display() {
        let id: Id<Alpha> = Id::from_i64(5);
        assert_eq!(format!("{}", id), "5");
        assert_eq!(format!("{:?}", id), "Id(5)");
    }
}
