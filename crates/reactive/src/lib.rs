//! Wires compiled queries to live operator pipelines over collections
//! (spec.md components C7 "Incremental executor" and C8 "Live-query
//! collections").
//!
//! `rivet-query` only ever reasons about a `QueryIr` in the abstract;
//! `rivet-incremental` only ever runs one operator in isolation. This crate
//! is where the two meet a running [`CollectionLike`] source: it resolves
//! alias-prefixed references against per-source and join-merged rows,
//! assembles the right operator chain for a query's shape, and maintains
//! the result as a [`LiveQueryCollection`] that is itself subscribable —
//! so a query result can feed another query the same way a base collection
//! does.

pub mod collection_like;
pub mod live_query;
pub mod pipeline;

pub use collection_like::CollectionLike;
pub use live_query::LiveQueryCollection;
pub use pipeline::QueryPipeline;
