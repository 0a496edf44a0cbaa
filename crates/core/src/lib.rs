//! rivet-core - Value, Row and Key model shared across the rivet reactive
//! collection engine.
//!
//! This crate provides the foundational, schemaless data types collections
//! and queries are built on:
//!
//! - `Value`: a JSON-shaped runtime value (null/bool/int/float/string/array/object)
//! - `Row`: an insertion-ordered mapping of field name to `Value`
//! - `Key`: a row's identity within a collection (int or string, possibly composite)
//! - `Change`: the single-row change unit emitted in collection change batches
//! - `Error`: the error-kind table shared by collections, transactions and queries
//!
//! # Example
//!
//! ```rust
//! use rivet_core::{Row, Value};
//!
//! let row = Row::from_pairs(vec![
//!     ("id", Value::Int(1)),
//!     ("name", Value::String("Alice".into())),
//! ]);
//!
//! assert_eq!(row.get("name"), Some(&Value::String("Alice".into())));
//! ```

mod change;
mod error;
mod key;
mod row;
mod value;

pub use change::{Change, ChangeBatch, ChangeKind};
pub use error::{Error, Result};
pub use key::Key;
pub use row::Row;
pub use value::{Value, DEFAULT_FLOAT_TOLERANCE};
