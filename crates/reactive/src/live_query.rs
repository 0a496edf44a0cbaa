//! A collection whose rows are the live, incrementally maintained result of
//! a compiled query rather than an externally synced baseline (spec.md §4.5
//! C8 "Live-query collections").
//!
//! Grounded in the observable-query pattern: wrap a maintained view,
//! subscribe to every upstream source once, and fan out only the rows that
//! actually entered, left, or changed value — the difference here is that
//! "upstream" is any [`CollectionLike`] (a base collection or, recursively,
//! another live query), so query composition falls out of the same trait
//! rather than needing a separate subquery code path.

use crate::collection_like::CollectionLike;
use crate::pipeline::QueryPipeline;
use rivet_collection::{ChangeCallback, FirstReadyCallbacks, Preload, ReadySignal, Status, Subscribers, Subscription};
use rivet_core::{Change, ChangeKind, Key, Row};
use rivet_query::{OperatorRegistry, QueryIr};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// A live-query collection. Construct with [`LiveQueryCollection::new_shared`]
/// — it needs to hand a weak self-reference to the closures it registers on
/// its sources, so it can only ever exist behind an `Rc<RefCell<_>>`.
pub struct LiveQueryCollection {
    id: String,
    pipeline: QueryPipeline,
    sources: Vec<Rc<RefCell<dyn CollectionLike>>>,
    source_subscriptions: Vec<Subscription>,
    rows: HashMap<Key, Row>,
    order: Vec<Key>,
    subscribers: Subscribers<Row>,
    status: Status,
    ready_signal: ReadySignal,
    first_ready: FirstReadyCallbacks,
    pending_ready: usize,
}

impl LiveQueryCollection {
    /// Builds the live query and wires subscriptions to every source.
    /// `sources` must be given in the same order as `ir.aliases()` (the
    /// query's `from` relation, then each `join` in order) — the pipeline's
    /// scan/join stages are indexed positionally against this list.
    pub fn new_shared(
        id: impl Into<String>,
        ir: &QueryIr,
        registry: &OperatorRegistry,
        sources: Vec<Rc<RefCell<dyn CollectionLike>>>,
    ) -> Rc<RefCell<LiveQueryCollection>> {
        let id = id.into();
        let pipeline = QueryPipeline::build(ir, registry);
        assert_eq!(pipeline.source_count(), sources.len(), "live query {id}: source count must match query aliases");
        let source_count = sources.len();

        let this = Rc::new(RefCell::new(LiveQueryCollection {
            id,
            pipeline,
            sources,
            source_subscriptions: Vec::new(),
            rows: HashMap::new(),
            order: Vec::new(),
            subscribers: Subscribers::new(),
            status: Status::Loading,
            ready_signal: ReadySignal::new(),
            first_ready: FirstReadyCallbacks::new(),
            pending_ready: source_count,
        }));

        for index in 0..source_count {
            let weak_self: Weak<RefCell<LiveQueryCollection>> = Rc::downgrade(&this);
            let weak_for_ready = weak_self.clone();

            let source = this.borrow().sources[index].clone();
            let subscription = source.borrow_mut().subscribe_changes(Box::new(move |batch| {
                if let Some(strong) = weak_self.upgrade() {
                    strong.borrow_mut().ingest(index, batch.clone());
                }
            }));
            this.borrow_mut().source_subscriptions.push(subscription);

            let seed: Vec<Change<Row>> = source.borrow().entries().into_iter().map(|(k, v)| Change::insert(k, v)).collect();
            if !seed.is_empty() {
                this.borrow_mut().ingest(index, seed);
            }

            source.borrow_mut().on_first_ready(Box::new(move || {
                if let Some(strong) = weak_for_ready.upgrade() {
                    strong.borrow_mut().source_became_ready();
                }
            }));
        }

        this.borrow_mut().transition(Status::InitialCommit);
        this
    }

    fn source_became_ready(&mut self) {
        if self.pending_ready == 0 {
            return;
        }
        self.pending_ready -= 1;
        if self.pending_ready == 0 {
            self.transition(Status::Ready);
        }
    }

    fn transition(&mut self, new_status: Status) {
        if !self.status.can_transition_to(&new_status) {
            return;
        }
        let now_initial = new_status.at_least_initial_commit();
        self.status = new_status;
        if now_initial {
            self.ready_signal.fire();
        }
        if self.status.is_ready() {
            self.first_ready.fire();
        }
    }

    fn ingest(&mut self, source_index: usize, batch: Vec<Change<Row>>) {
        let out = self.pipeline.process(source_index, &batch);
        if out.is_empty() {
            return;
        }
        for change in &out {
            match change.kind {
                ChangeKind::Insert | ChangeKind::Update => {
                    if !self.rows.contains_key(&change.key) {
                        self.order.push(change.key.clone());
                    }
                    self.rows.insert(change.key.clone(), change.value.clone());
                }
                ChangeKind::Delete => {
                    self.rows.remove(&change.key);
                    self.order.retain(|k| k != &change.key);
                }
            }
        }
        self.subscribers.notify(&out);
    }

    /// Tears this live query down: detaches from every source and clears
    /// its own subscriber list. Idempotent.
    pub fn cleanup(&mut self) {
        if self.status.is_cleaned_up() {
            return;
        }
        for (source, subscription) in self.sources.iter().zip(self.source_subscriptions.drain(..)) {
            source.borrow_mut().unsubscribe(&subscription);
        }
        self.subscribers.clear();
        self.rows.clear();
        self.order.clear();
        self.status = Status::CleanedUp;
    }
}

impl CollectionLike for LiveQueryCollection {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> Status {
        self.status.clone()
    }

    fn get(&self, key: &Key) -> Option<Row> {
        self.rows.get(key).cloned()
    }

    fn entries(&self) -> Vec<(Key, Row)> {
        self.order.iter().filter_map(|k| self.rows.get(k).map(|v| (k.clone(), v.clone()))).collect()
    }

    fn values(&self) -> Vec<Row> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn subscribe_changes(&mut self, callback: ChangeCallback<Row>) -> Subscription {
        self.subscribers.subscribe(callback)
    }

    fn unsubscribe(&mut self, subscription: &Subscription) {
        self.subscribers.unsubscribe(subscription);
    }

    fn preload(&self) -> Preload {
        self.ready_signal.future()
    }

    fn on_first_ready(&mut self, callback: Box<dyn FnOnce()>) {
        self.first_ready.on_first_ready(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_collection::{Collection, CollectionConfig, SyncSink, SyncWrite};
    use rivet_core::Value;
    use rivet_query::{Ir, QueryIr};
    use std::cell::RefCell;

    fn order_row(id: i64, dept: &str, amount: i64) -> Row {
        Row::from_pairs(vec![("id", Value::Int(id)), ("dept", Value::String(dept.to_string())), ("amount", Value::Int(amount))])
    }

    #[test]
    fn filtered_live_query_tracks_inserts_made_after_construction() {
        let orders: Rc<RefCell<Collection>> = Rc::new(RefCell::new(Collection::new("orders", CollectionConfig::with_id_key())));
        {
            let mut o = orders.borrow_mut();
            o.begin();
            o.commit();
            o.mark_ready();
        }
        let source: Rc<RefCell<dyn CollectionLike>> = orders.clone();

        let ir = QueryIr::collection("orders", "orders").filter(Ir::func("gt", vec![Ir::field("amount"), Ir::val(15i64)]));
        let registry = OperatorRegistry::new();
        let live = LiveQueryCollection::new_shared("big_orders", &ir, &registry, vec![source]);
        assert!(live.borrow().values().is_empty());

        orders.borrow_mut().apply_insert(1, order_row(1, "eng", 10)).unwrap();
        assert!(live.borrow().values().is_empty(), "below the filter threshold, must not appear");

        orders.borrow_mut().apply_insert(1, order_row(2, "eng", 30)).unwrap();
        let rows = live.borrow().values();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("amount"), Some(&Value::Int(30)));
    }

    #[test]
    fn group_by_pipeline_shapes_into_distinct_output_fields() {
        let mut raw = Collection::<()>::new("orders", CollectionConfig::with_id_key());
        raw.begin();
        raw.write(SyncWrite::Insert(order_row(1, "eng", 10)));
        raw.write(SyncWrite::Insert(order_row(2, "eng", 20)));
        raw.commit();
        raw.mark_ready();
        let source: Rc<RefCell<dyn CollectionLike>> = Rc::new(RefCell::new(raw));

        let ir = QueryIr::collection("orders", "o")
            .group_by(Ir::field("dept"))
            .select(Ir::object(vec![("dept", Ir::field("dept")), ("total", Ir::agg("sum", vec![Ir::field("amount")]))]));

        let registry = OperatorRegistry::new();
        let live = LiveQueryCollection::new_shared("totals_by_dept", &ir, &registry, vec![source]);

        let rows = live.borrow().values();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("total"), Some(&Value::Float(30.0)));
        assert_eq!(live.borrow().status(), Status::Ready);
    }

    #[test]
    fn cleanup_detaches_from_sources() {
        let mut raw = Collection::<()>::new("orders", CollectionConfig::with_id_key());
        raw.begin();
        raw.write(SyncWrite::Insert(order_row(1, "eng", 10)));
        raw.commit();
        raw.mark_ready();
        let source: Rc<RefCell<dyn CollectionLike>> = Rc::new(RefCell::new(raw));

        let ir = QueryIr::collection("orders", "o");
        let registry = OperatorRegistry::new();
        let live = LiveQueryCollection::new_shared("all_orders", &ir, &registry, vec![source.clone()]);
        assert_eq!(live.borrow().len(), 1);

        live.borrow_mut().cleanup();
        assert!(live.borrow().is_empty());
        assert_eq!(live.borrow().status(), Status::CleanedUp);
    }
}
