//! Binding-layer contract types (spec.md §6 "External interfaces").
//!
//! These are the shapes a framework-binding crate (React/Svelte/whatever —
//! explicitly out of scope here, per spec.md §1) would consume to render a
//! live query and to hydrate/rehydrate one across a server/client boundary.
//! Plain data only: no subscription wiring, no framework trait impls.

use rivet_collection::Status;
use rivet_core::{Key, Row};

/// A snapshot of a live query's current rows plus loading/error state, the
/// shape a binding layer's `useLiveQuery`-equivalent would hand back to a
/// component on every re-render.
///
/// Deliberately untyped at this crate's boundary (`T = Row`) unless a
/// caller wants to map rows into its own domain type — `map` does that
/// conversion without this crate needing to know the target type.
#[derive(Clone, Debug)]
pub struct LiveQueryView<T = Row> {
    pub data: Vec<T>,
    pub is_loading: bool,
    pub is_ready: bool,
    pub error: Option<String>,
}

impl LiveQueryView<Row> {
    /// Builds a view from a collection's current status and rows. `status`
    /// drives `is_loading`/`is_ready`/`error` per spec.md §9's resolution
    /// that `initialCommit` still counts as loading.
    pub fn snapshot(status: &Status, rows: Vec<Row>) -> LiveQueryView<Row> {
        LiveQueryView { data: rows, is_loading: status.is_loading(), is_ready: status.is_ready(), error: status_error(status) }
    }
}

impl<T> LiveQueryView<T> {
    /// Maps each row into a caller-chosen type, preserving loading/error
    /// state — how a binding layer turns `Row`s into its own typed models
    /// without this crate depending on that type.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> LiveQueryView<U> {
        LiveQueryView {
            data: self.data.into_iter().map(f).collect(),
            is_loading: self.is_loading,
            is_ready: self.is_ready,
            error: self.error,
        }
    }
}

fn status_error(status: &Status) -> Option<String> {
    match status {
        Status::Error { message } => Some(message.clone()),
        _ => None,
    }
}

/// One row a binding layer's server-side prefetch step resolved ahead of
/// first paint, keyed the same way the client-side collection will key it
/// (spec.md §6 "Prefetching / SSR").
#[derive(Clone, Debug)]
pub struct PrefetchEntry {
    pub collection_id: String,
    pub key: Key,
    pub row: Row,
}

/// The serializable payload a server-rendered page embeds so the client can
/// seed its collections before subscribing to anything live (spec.md §6
/// "Dehydration/hydration").
#[derive(Clone, Debug, Default)]
pub struct DehydratedState {
    pub entries: Vec<PrefetchEntry>,
}

impl DehydratedState {
    pub fn new() -> DehydratedState {
        DehydratedState { entries: Vec::new() }
    }

    pub fn push(&mut self, collection_id: impl Into<String>, key: Key, row: Row) {
        self.entries.push(PrefetchEntry { collection_id: collection_id.into(), key, row });
    }

    /// Entries belonging to one collection, in the order they were pushed —
    /// what a collection's `hydrate`/`HydrateConfig` one-shot seed consumes.
    pub fn entries_for<'a>(&'a self, collection_id: &'a str) -> impl Iterator<Item = (&'a Key, &'a Row)> + 'a {
        self.entries.iter().filter(move |e| e.collection_id == collection_id).map(|e| (&e.key, &e.row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_core::Value;

    fn row(n: i64) -> Row {
        Row::from_pairs(vec![("n", Value::Int(n))])
    }

    #[test]
    fn snapshot_reports_loading_during_initial_commit() {
        let view = LiveQueryView::snapshot(&Status::InitialCommit, vec![row(1)]);
        assert!(view.is_loading);
        assert!(!view.is_ready);
        assert!(view.error.is_none());
    }

    #[test]
    fn snapshot_surfaces_the_error_message() {
        let view = LiveQueryView::snapshot(&Status::Error { message: "boom".into() }, Vec::new());
        assert_eq!(view.error.as_deref(), Some("boom"));
    }

    #[test]
    fn map_preserves_loading_state_while_transforming_rows() {
        let view = LiveQueryView::snapshot(&Status::Ready, vec![row(1), row(2)]);
        let mapped = view.map(|r| r.get("n").and_then(Value::as_int).unwrap_or(0));
        assert!(mapped.is_ready);
        assert_eq!(mapped.data, vec![1, 2]);
    }

    #[test]
    fn dehydrated_state_filters_entries_by_collection() {
        let mut state = DehydratedState::new();
        state.push("orders", Key::Int(1), row(1));
        state.push("users", Key::Int(2), row(2));

        let orders: Vec<_> = state.entries_for("orders").collect();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].0, &Key::Int(1));
    }
}
