use thiserror::Error;

/// Returned by strict lookups when the requested key is not in the collection.
///
/// The regular `insert` and `remove` operations never fail; only lookups that promise a value
/// (such as [`AvlMap::try_get`](crate::AvlMap::try_get)) report a missing key with this error.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("key not found")]
pub struct KeyError;
