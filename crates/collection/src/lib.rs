//! Keyed row collections with a sync lifecycle, an optimistic overlay,
//! change fan-out and eager per-field indexing (spec.md §3 `Collection`,
//! §4.1 component C3).
//!
//! # Example
//!
//! ```rust
//! use rivet_collection::{Collection, CollectionConfig};
//! use rivet_core::{Key, Row, Value};
//!
//! let mut users = Collection::new("users", CollectionConfig::with_id_key());
//! let key = users.apply_insert(1, Row::from_pairs(vec![("id", Value::Int(1)), ("name", Value::String("alice".into()))])).unwrap();
//! assert_eq!(users.get(&key).unwrap().get("name"), Some(&Value::String("alice".into())));
//! ```

mod collection;
mod index_maintenance;
mod optimistic;
mod ready;
mod status;
mod subscription;
mod sync_source;

pub use collection::{AutoIndexPolicy, Collection, CollectionConfig};
pub use index_maintenance::IndexKind;
pub use optimistic::{OptimisticOp, OptimisticOpKind};
pub use ready::{FirstReadyCallbacks, Preload, ReadySignal};
pub use status::Status;
pub use subscription::{ChangeCallback, SharedSubscribers, Subscribers, Subscription};
pub use sync_source::{SyncSink, SyncSource, SyncWrite};
