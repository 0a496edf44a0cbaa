//! Transaction manager (spec.md §4.2, C4) and serialized-mutation
//! controller (spec.md §4.6, C9) for rivet.
//!
//! # Example
//!
//! ```rust
//! use rivet_collection::{Collection, CollectionConfig};
//! use rivet_core::{Row, Value};
//! use rivet_txn::Transaction;
//!
//! let mut users = Collection::new("users", CollectionConfig::with_id_key());
//! let mut txn: Transaction = Transaction::begin(());
//! txn.insert(&mut users, Row::from_pairs(vec![("id", Value::Int(1))])).unwrap();
//! txn.commit(|_mutations| Ok(())).unwrap();
//! ```

mod mutation;
mod strategy;
mod transaction;

pub use mutation::{Mutation, MutationKind, MutationLog};
pub use strategy::{CallOutcome, Clock, FakeClock, SerializedMutationController, Strategy, SystemClock};
pub use transaction::{create_optimistic_action, Transaction, TransactionState};
