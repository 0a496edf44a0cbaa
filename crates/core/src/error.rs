//! Error types shared across the rivet reactive collection engine.

use crate::key::Key;
use std::fmt;

/// Result type alias for rivet operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by collections, transactions and the query layer.
///
/// `PushDownUnsupported` and `DisabledQuery` from the error-kind table are
/// deliberately not variants here: the former is an internal compiler
/// signal that triggers a silent post-filter fallback rather than
/// surfacing to a caller, and the latter isn't an error at all — it's a
/// normal `disabled` status on a live query whose binding function
/// returned nothing.
#[derive(Debug)]
pub enum Error {
    /// A mutation was attempted outside of an active transaction.
    NoActiveTransaction,
    /// Update or delete targeted a key absent from the synced+optimistic view.
    KeyNotFound { collection: String, key: Key },
    /// Insert targeted a key already present in the synced+optimistic view.
    DuplicateKey { collection: String, key: Key },
    /// Query IR failed validation (dangling reference, unknown operator, ...).
    InvalidQuery { message: String },
    /// A sync source reported a failure; the collection moves to `error`.
    SyncFailure { collection: String, message: String },
    /// A transaction's `mutationFn`-equivalent rejected; optimistic ops roll back.
    PersistFailure { message: String },
    /// Operation attempted against a collection that has already torn down.
    CleanedUp { collection: String },
}

impl Error {
    pub fn key_not_found(collection: impl Into<String>, key: Key) -> Error {
        Error::KeyNotFound { collection: collection.into(), key }
    }

    pub fn duplicate_key(collection: impl Into<String>, key: Key) -> Error {
        Error::DuplicateKey { collection: collection.into(), key }
    }

    pub fn invalid_query(message: impl Into<String>) -> Error {
        Error::InvalidQuery { message: message.into() }
    }

    pub fn sync_failure(collection: impl Into<String>, message: impl Into<String>) -> Error {
        Error::SyncFailure { collection: collection.into(), message: message.into() }
    }

    pub fn persist_failure(message: impl Into<String>) -> Error {
        Error::PersistFailure { message: message.into() }
    }

    pub fn cleaned_up(collection: impl Into<String>) -> Error {
        Error::CleanedUp { collection: collection.into() }
    }

    /// The tag name from spec.md's error-kind table, for callers that want
    /// to branch on kind without matching the full enum.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NoActiveTransaction => "NoActiveTransaction",
            Error::KeyNotFound { .. } => "KeyNotFound",
            Error::DuplicateKey { .. } => "DuplicateKey",
            Error::InvalidQuery { .. } => "InvalidQuery",
            Error::SyncFailure { .. } => "SyncFailure",
            Error::PersistFailure { .. } => "PersistFailure",
            Error::CleanedUp { .. } => "CleanedUp",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoActiveTransaction => {
                write!(f, "mutation attempted outside an active transaction")
            }
            Error::KeyNotFound { collection, key } => {
                write!(f, "key {key} not found in collection {collection}")
            }
            Error::DuplicateKey { collection, key } => {
                write!(f, "key {key} already exists in collection {collection}")
            }
            Error::InvalidQuery { message } => write!(f, "invalid query: {message}"),
            Error::SyncFailure { collection, message } => {
                write!(f, "sync source for collection {collection} failed: {message}")
            }
            Error::PersistFailure { message } => write!(f, "persist failed: {message}"),
            Error::CleanedUp { collection } => {
                write!(f, "collection {collection} has been cleaned up")
            }
        }
    }
}

impl std::error::Error for Error {}
