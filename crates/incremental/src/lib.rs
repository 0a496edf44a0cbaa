//! Incremental View Maintenance (IVM) for live queries.
//!
//! This crate maintains compiled query results incrementally: as change
//! batches arrive from a source collection, each operator in a query's
//! compiled plan re-derives its own output changes rather than
//! recomputing the query from scratch, so a live query's downstream
//! subscribers only ever see the rows that actually entered, left, or
//! changed value.
//!
//! # Core Concepts
//!
//! - [`delta::Delta`]: a signed occurrence of a value (+1 insert, -1
//!   delete), the unit differential dataflow reasons about internally
//! - [`collection::DiffCollection`] / [`collection::ConsolidatedCollection`]:
//!   collection-level bookkeeping built on top of deltas
//! - [`operators`]: the operator set a compiled query plan is built from —
//!   scan, filter, project, join, group-by/aggregate, order/limit,
//!   distinct, and find-one

pub mod collection;
pub mod delta;
pub mod operators;

pub use collection::{ConsolidatedCollection, DiffCollection};
pub use delta::{Delta, DeltaBatch, DeltaBatchExt};
pub use operators::{
    default_combine, AggSpec, DistinctOperator, FilterOperator, FindOneOperator, GroupByAggregateOperator,
    IncrementalAvg, IncrementalCount, IncrementalMax, IncrementalMin, IncrementalSum, JoinCombineFn, JoinKeyFn,
    JoinOperator, JoinType, OrderLimitOperator, ProjectOperator, RowComparator, RowPredicate, RowSelect,
    ScanOperator,
};
