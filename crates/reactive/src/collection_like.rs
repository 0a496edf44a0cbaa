//! The interface a query source must satisfy, whether it's a base
//! collection synced from the outside world or another live query (spec.md
//! §4.5 "Query composition / subqueries").
//!
//! Unifying the two behind one trait is what lets `rivet::Registry` treat
//! `SELECT * FROM base_collection` and `SELECT * FROM some_live_query` the
//! same way when compiling a new query's source list.

use rivet_collection::{ChangeCallback, Collection, Preload, Status, Subscription};
use rivet_core::{Key, Row};

/// A readable, subscribable row source a query can run against.
pub trait CollectionLike {
    fn id(&self) -> &str;
    /// Owned rather than `&Status`: a live query keeps its status behind a
    /// `RefCell` (transitions happen from within an `&self` subscription
    /// callback), so there is no `&Status` a trait object could hand out
    /// without leaking a `Ref` guard across the trait boundary.
    fn status(&self) -> Status;
    fn get(&self, key: &Key) -> Option<Row>;
    fn entries(&self) -> Vec<(Key, Row)>;
    fn values(&self) -> Vec<Row>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
    fn subscribe_changes(&mut self, callback: ChangeCallback<Row>) -> Subscription;
    fn unsubscribe(&mut self, subscription: &Subscription);
    fn preload(&self) -> Preload;
    fn on_first_ready(&mut self, callback: Box<dyn FnOnce()>);
}

impl<U> CollectionLike for Collection<U> {
    fn id(&self) -> &str {
        Collection::id(self)
    }

    fn status(&self) -> Status {
        Collection::status(self).clone()
    }

    fn get(&self, key: &Key) -> Option<Row> {
        Collection::get(self, key)
    }

    fn entries(&self) -> Vec<(Key, Row)> {
        Collection::entries(self)
    }

    fn values(&self) -> Vec<Row> {
        Collection::values(self)
    }

    fn len(&self) -> usize {
        Collection::len(self)
    }

    fn is_empty(&self) -> bool {
        Collection::is_empty(self)
    }

    fn subscribe_changes(&mut self, callback: ChangeCallback<Row>) -> Subscription {
        Collection::subscribe_changes(self, callback)
    }

    fn unsubscribe(&mut self, subscription: &Subscription) {
        Collection::unsubscribe(self, subscription)
    }

    fn preload(&self) -> Preload {
        Collection::preload(self)
    }

    fn on_first_ready(&mut self, callback: Box<dyn FnOnce()>) {
        Collection::on_first_ready(self, callback)
    }
}
