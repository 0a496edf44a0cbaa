//! Incremental operators for live query maintenance.
//!
//! Each operator consumes a batch of [`rivet_core::Change`]s from upstream
//! and produces the batch its own downstream should see, re-deriving
//! enter/leave/update semantics rather than forwarding raw changes —
//! keeping the "re-emit only what actually changed" invariant at every
//! stage of the plan, not just at the sink.
//!
//! - [`scan`]: the plan's entry point, applying any pushed-down predicate
//!   and window
//! - [`filter`]: `Filter(pred)`
//! - [`project`]: `Project(selectExprs)`
//! - [`join`]: `Join(left, right, on)`
//! - [`group_by`]: `GroupBy(keyExprs) + Aggregate(aggs)`
//! - [`order_limit`]: `OrderLimit(orderBy, limit?, offset?)`
//! - [`distinct`]: `Distinct`
//! - [`find_one`]: a `singleResult` query's sink

pub mod aggregate;
pub mod distinct;
pub mod filter;
pub mod find_one;
pub mod group_by;
pub mod join;
pub mod order_limit;
pub mod project;
pub mod scan;

pub use aggregate::{IncrementalAvg, IncrementalCount, IncrementalMax, IncrementalMin, IncrementalSum};
pub use distinct::DistinctOperator;
pub use filter::{FilterOperator, RowPredicate};
pub use find_one::FindOneOperator;
pub use group_by::{AggSpec, GroupByAggregateOperator};
pub use join::{default_combine, JoinCombineFn, JoinKeyFn, JoinOperator, JoinType};
pub use order_limit::{OrderLimitOperator, RowComparator};
pub use project::{ProjectOperator, RowSelect};
pub use scan::ScanOperator;
