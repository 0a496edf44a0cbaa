//! Top-level embeddable reactive collection engine (spec.md §1, §9 "Global
//! state").
//!
//! This crate is the composition root: it owns no storage or query logic
//! of its own (that's `rivet-collection`/`rivet-query`/`rivet-incremental`/
//! `rivet-reactive`/`rivet-txn`), it just threads an explicit [`Registry`]
//! through construction so a host application — not this crate, and not
//! any ambient/thread-local state — owns the lifetime of every collection
//! and live query it creates (spec.md §9's redesign note, expanded in
//! SPEC_FULL.md §5). It also defines the plain-data shapes
//! ([`binding::LiveQueryView`], [`binding::PrefetchEntry`],
//! [`binding::DehydratedState`]) a framework-binding crate would consume,
//! without depending on any actual framework.

pub mod binding;
pub mod query_once;
pub mod registry;

pub use binding::{DehydratedState, LiveQueryView, PrefetchEntry};
pub use registry::Registry;
