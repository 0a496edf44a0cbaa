//! The collection itself (spec.md §4.1, component C3): a keyed row store
//! with a sync lifecycle, an optimistic overlay, change fan-out and
//! eager per-field indexing.

use crate::index_maintenance::{IndexKind, IndexSet};
use crate::optimistic::{self, OptimisticOp};
use crate::ready::{FirstReadyCallbacks, Preload, ReadySignal};
use crate::status::Status;
use crate::subscription::{ChangeCallback, Subscribers, Subscription};
use crate::sync_source::{SyncSink, SyncSource, SyncWrite};
use rivet_core::{Change, ChangeBatch, Error, Key, Result, Row};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// How eagerly a collection builds secondary indexes for fields referenced
/// by equality predicates (spec.md §4.1 "autoIndex").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoIndexPolicy {
    /// Build an index the first time a field is referenced by an equality
    /// (or, for `Ordered`, a range) predicate. The default.
    Eager,
    /// Never build indexes automatically; callers manage them via
    /// `ensure_index`.
    Off,
}

/// Construction-time configuration for a [`Collection`].
///
/// `U` is an opaque utility payload a host application can stash on the
/// collection (mirrors spec.md §4.1's `utils` passthrough) — defaults to
/// `()` for collections that don't need one.
pub struct CollectionConfig<U = ()> {
    pub get_key: Rc<dyn Fn(&Row) -> Key>,
    pub single_result: bool,
    pub auto_index: AutoIndexPolicy,
    pub gc_time: Option<Duration>,
    pub utils: U,
}

impl CollectionConfig<()> {
    /// A config using `id` as the row key, eager auto-indexing, no GC and
    /// no utility payload — the common case for a hand-authored collection.
    pub fn with_id_key() -> Self {
        CollectionConfig {
            get_key: Rc::new(|row: &Row| match row.get("id").and_then(Key::from_value) {
                Some(key) => key,
                None => Key::String(String::new()),
            }),
            single_result: false,
            auto_index: AutoIndexPolicy::Eager,
            gc_time: None,
            utils: (),
        }
    }
}

impl<U> CollectionConfig<U> {
    pub fn new(get_key: Rc<dyn Fn(&Row) -> Key>, utils: U) -> Self {
        CollectionConfig { get_key, single_result: false, auto_index: AutoIndexPolicy::Eager, gc_time: None, utils }
    }

    pub fn single_result(mut self, value: bool) -> Self {
        self.single_result = value;
        self
    }

    pub fn auto_index(mut self, policy: AutoIndexPolicy) -> Self {
        self.auto_index = policy;
        self
    }

    pub fn gc_time(mut self, duration: Duration) -> Self {
        self.gc_time = Some(duration);
        self
    }
}

/// A single reactive, keyed row collection (spec.md §3 `Collection`).
pub struct Collection<U = ()> {
    id: String,
    config: CollectionConfig<U>,
    status: Status,
    synced: HashMap<Key, Row>,
    order: Vec<Key>,
    optimistic: Vec<OptimisticOp>,
    indexes: IndexSet,
    subscribers: Subscribers<Row>,
    sync_source: Option<Box<dyn SyncSource>>,
    frame: Option<Vec<SyncWrite>>,
    ready_signal: ReadySignal,
    first_ready: FirstReadyCallbacks,
    empty_since: Option<Instant>,
}

impl<U> Collection<U> {
    pub fn new(id: impl Into<String>, config: CollectionConfig<U>) -> Self {
        Collection {
            id: id.into(),
            config,
            status: Status::Idle,
            synced: HashMap::new(),
            order: Vec::new(),
            optimistic: Vec::new(),
            indexes: IndexSet::new(),
            subscribers: Subscribers::new(),
            sync_source: None,
            frame: None,
            ready_signal: ReadySignal::new(),
            first_ready: FirstReadyCallbacks::new(),
            empty_since: None,
        }
    }

    /// Attaches the sync source this collection will drive via
    /// `start_sync_immediate`. Replaces any previously attached source.
    pub fn with_sync_source(mut self, source: Box<dyn SyncSource>) -> Self {
        self.sync_source = Some(source);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn utils(&self) -> &U {
        &self.config.utils
    }

    pub fn single_result(&self) -> bool {
        self.config.single_result
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- reads --------------------------------------------------------

    fn visible(&self, key: &Key) -> Option<Row> {
        optimistic::materialize_key(self.synced.get(key), &self.optimistic, key)
    }

    pub fn get(&self, key: &Key) -> Option<Row> {
        self.visible(key)
    }

    pub fn has(&self, key: &Key) -> bool {
        self.visible(key).is_some()
    }

    /// Keys introduced purely by optimistic inserts (absent from `synced`),
    /// in the order those inserts first occurred.
    fn optimistic_only_keys_in_order(&self) -> Vec<Key> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for op in &self.optimistic {
            if !self.synced.contains_key(&op.key) && seen.insert(op.key.clone()) {
                result.push(op.key.clone());
            }
        }
        result
    }

    /// The materialized view: synced rows in insertion order, followed by
    /// keys introduced only by an optimistic insert, in the order those
    /// inserts occurred (spec.md §3's ordering note on `entries()`).
    pub fn entries(&self) -> Vec<(Key, Row)> {
        let mut out = Vec::with_capacity(self.order.len());
        for key in &self.order {
            if let Some(row) = self.visible(key) {
                out.push((key.clone(), row));
            }
        }
        for key in self.optimistic_only_keys_in_order() {
            if let Some(row) = self.visible(&key) {
                out.push((key.clone(), row));
            }
        }
        out
    }

    pub fn keys(&self) -> Vec<Key> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    pub fn values(&self) -> Vec<Row> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    // -- indexing -------------------------------------------------------

    /// Builds an index over `field` if one doesn't already exist, backfilled
    /// from the current synced baseline. Called automatically by a query
    /// compiler under `AutoIndexPolicy::Eager`; callers may also call it
    /// directly under `AutoIndexPolicy::Off`.
    pub fn ensure_index(&mut self, field: &str, kind: IndexKind) {
        self.indexes.ensure(field, kind, self.synced.iter());
    }

    pub fn auto_index_policy(&self) -> AutoIndexPolicy {
        self.config.auto_index
    }

    pub(crate) fn indexes(&self) -> &IndexSet {
        &self.indexes
    }

    // -- mutation primitives (called by a transaction's merge step) -----

    fn ensure_not_cleaned_up(&self) -> Result<()> {
        if self.status.is_cleaned_up() {
            return Err(Error::cleaned_up(self.id.clone()));
        }
        Ok(())
    }

    /// Records an optimistic insert for `row`, keyed by the configured
    /// `get_key`. Fails with `DuplicateKey` if the key is already visible.
    pub fn apply_insert(&mut self, txn_id: u64, row: Row) -> Result<Key> {
        self.ensure_not_cleaned_up()?;
        let key = (self.config.get_key)(&row);
        if self.visible(&key).is_some() {
            return Err(Error::duplicate_key(self.id.clone(), key));
        }
        self.optimistic.push(OptimisticOp::insert(key.clone(), row.clone(), txn_id));
        self.emit(vec![Change::insert(key.clone(), row)]);
        Ok(key)
    }

    /// Records an optimistic update by applying `mutator` to the currently
    /// visible row. A no-op mutation (new value equals old) is suppressed:
    /// nothing is appended to the overlay and no change batch is emitted
    /// (spec.md §4.1 "Change-batch emission policy").
    pub fn apply_update(&mut self, txn_id: u64, key: &Key, mutator: impl FnOnce(&Row) -> Row) -> Result<()> {
        self.ensure_not_cleaned_up()?;
        let current = self.visible(key).ok_or_else(|| Error::key_not_found(self.id.clone(), key.clone()))?;
        let draft = mutator(&current);
        if draft == current {
            return Ok(());
        }
        self.optimistic.push(OptimisticOp::update(key.clone(), draft.clone(), txn_id));
        self.emit(vec![Change::update(key.clone(), draft, current)]);
        Ok(())
    }

    /// Records an optimistic delete. Fails with `KeyNotFound` if the key
    /// isn't currently visible.
    pub fn apply_delete(&mut self, txn_id: u64, key: &Key) -> Result<()> {
        self.ensure_not_cleaned_up()?;
        let current = self.visible(key).ok_or_else(|| Error::key_not_found(self.id.clone(), key.clone()))?;
        self.optimistic.push(OptimisticOp::delete(key.clone(), txn_id));
        self.emit(vec![Change::delete(key.clone(), current)]);
        Ok(())
    }

    /// Drops every optimistic op belonging to `txn_id` and emits the diff
    /// between each affected key's visible value before and after the drop.
    ///
    /// When the sync source already reflects the same effect (a completed
    /// transaction), before and after agree and nothing is emitted — the
    /// "optimistic vanishes after commit" invariant (spec.md §4.1). When the
    /// transaction instead failed or was rolled back, before/after disagree
    /// and this emits the insert/update/delete that makes the rollback
    /// visible to subscribers, per spec.md §8 property 3 ("on failed, they
    /// observe values as if the transaction never existed").
    pub fn retract_txn(&mut self, txn_id: u64) {
        let mut affected = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for op in self.optimistic.iter().filter(|op| op.txn_id == txn_id) {
            if seen.insert(op.key.clone()) {
                affected.push(op.key.clone());
            }
        }
        let before: Vec<Option<Row>> = affected.iter().map(|key| self.visible(key)).collect();

        optimistic::retract_txn(&mut self.optimistic, txn_id);

        let mut batch = Vec::new();
        for (key, old) in affected.into_iter().zip(before) {
            let new = self.visible(&key);
            match (old, new) {
                (None, Some(new)) => batch.push(Change::insert(key, new)),
                (Some(old), Some(new)) if old != new => batch.push(Change::update(key, new, old)),
                (Some(old), None) => batch.push(Change::delete(key, old)),
                _ => {}
            }
        }
        self.emit(batch);
    }

    pub fn has_pending_op(&self, key: &Key) -> bool {
        optimistic::has_pending_op(&self.optimistic, key)
    }

    // -- subscriptions ----------------------------------------------------

    pub fn subscribe_changes(&mut self, callback: ChangeCallback<Row>) -> Subscription {
        let sub = self.subscribers.subscribe(callback);
        self.empty_since = None;
        sub
    }

    pub fn unsubscribe(&mut self, subscription: &Subscription) {
        self.subscribers.unsubscribe(subscription);
        if self.subscribers.is_empty() {
            self.empty_since = Some(Instant::now());
        }
    }

    fn emit(&mut self, batch: ChangeBatch<Row>) {
        self.subscribers.notify(&batch);
    }

    // -- readiness --------------------------------------------------------

    pub fn preload(&self) -> Preload {
        self.ready_signal.future()
    }

    pub fn on_first_ready(&mut self, callback: Box<dyn FnOnce()>) {
        self.first_ready.on_first_ready(callback);
    }

    fn transition(&mut self, new_status: Status) {
        if !self.status.can_transition_to(&new_status) {
            log::warn!("collection {}: illegal status transition {} -> {}", self.id, self.status, new_status);
            return;
        }
        log::debug!("collection {}: {} -> {}", self.id, self.status, new_status);
        let now_initial = new_status.at_least_initial_commit();
        self.status = new_status;
        if now_initial {
            self.ready_signal.fire();
        }
        if self.status.is_ready() {
            self.first_ready.fire();
        }
    }

    /// Kicks off the attached sync source, moving `Idle -> Loading`.
    /// A no-op if the collection isn't idle or has no sync source attached.
    pub fn start_sync_immediate(&mut self) {
        if !self.status.is_idle() {
            return;
        }
        self.transition(Status::Loading);
        if let Some(mut source) = self.sync_source.take() {
            source.start(self);
            self.sync_source = Some(source);
        }
    }

    /// Resets the collection back to `Idle` from `Error`, so a host can
    /// retry a failed sync from scratch.
    pub fn reset(&mut self) {
        if self.status.is_error() {
            self.transition(Status::Idle);
        }
    }

    // -- garbage collection -------------------------------------------------

    /// Tears the collection down if it has had zero subscribers for at
    /// least `gc_time` (spec.md §4.1 "gcTime"). Called periodically by a
    /// host's event loop; a no-op if no `gc_time` was configured, if the
    /// collection already has subscribers, or if it's already cleaned up.
    pub fn maybe_gc(&mut self) {
        if self.status.is_cleaned_up() || !self.subscribers.is_empty() {
            return;
        }
        let Some(gc_time) = self.config.gc_time else { return };
        let Some(since) = self.empty_since else { return };
        if since.elapsed() >= gc_time {
            self.cleanup();
        }
    }

    /// Tears the collection down immediately and idempotently: detaches all
    /// subscribers, drops the sync source, clears indexes, and moves status
    /// to `CleanedUp`.
    pub fn cleanup(&mut self) {
        if self.status.is_cleaned_up() {
            return;
        }
        log::debug!("collection {}: cleaned up", self.id);
        self.status = Status::CleanedUp;
        self.subscribers.clear();
        self.sync_source = None;
        self.indexes.clear_all();
        self.synced.clear();
        self.order.clear();
        self.optimistic.clear();
    }
}

impl<U> SyncSink for Collection<U> {
    fn begin(&mut self) {
        self.frame = Some(Vec::new());
    }

    fn write(&mut self, op: SyncWrite) {
        match self.frame.as_mut() {
            Some(buf) => buf.push(op),
            None => self.frame = Some(vec![op]),
        }
    }

    fn commit(&mut self) {
        let ops = self.frame.take().unwrap_or_default();
        let mut batch = Vec::new();
        for op in ops {
            match op {
                SyncWrite::Insert(row) | SyncWrite::Update(row) => {
                    let key = (self.config.get_key)(&row);
                    let old_visible = self.visible(&key);
                    let old_synced = self.synced.get(&key).cloned();
                    if !self.synced.contains_key(&key) {
                        self.order.push(key.clone());
                    }
                    self.synced.insert(key.clone(), row.clone());
                    match &old_synced {
                        Some(old_row) => self.indexes.on_row_updated(&key, old_row, &row),
                        None => self.indexes.on_row_inserted(&key, &row),
                    }
                    let new_visible = self.visible(&key);
                    match (old_visible, new_visible) {
                        (None, Some(new)) => batch.push(Change::insert(key, new)),
                        (Some(old), Some(new)) if old != new => batch.push(Change::update(key, new, old)),
                        (Some(old), None) => batch.push(Change::delete(key, old)),
                        _ => {}
                    }
                }
                SyncWrite::Delete(key) => {
                    let old_visible = self.visible(&key);
                    if let Some(old_row) = self.synced.remove(&key) {
                        self.indexes.on_row_removed(&key, &old_row);
                    }
                    self.order.retain(|k| k != &key);
                    let new_visible = self.visible(&key);
                    match (old_visible, new_visible) {
                        (Some(old), None) => batch.push(Change::delete(key, old)),
                        (Some(old), Some(new)) if old != new => batch.push(Change::update(key, new, old)),
                        _ => {}
                    }
                }
            }
        }
        if matches!(self.status, Status::Idle | Status::Loading) {
            self.transition(Status::InitialCommit);
        }
        self.emit(batch);
    }

    fn mark_ready(&mut self) {
        if self.status.is_ready() {
            return;
        }
        self.transition(Status::Ready);
    }

    /// Resets `synced` to empty, emitting deletes for every row that was
    /// visible and isn't kept alive by the optimistic overlay.
    ///
    /// Simplification: applied and emitted immediately rather than buffered
    /// inside the current frame, since a sync source that calls `truncate`
    /// mid-frame is expected to follow it with inserts in the same frame
    /// before the next `commit`.
    fn truncate(&mut self) {
        let keys = self.order.clone();
        let mut batch = Vec::new();
        for key in keys {
            let old_visible = self.visible(&key);
            if let Some(old_row) = self.synced.remove(&key) {
                self.indexes.on_row_removed(&key, &old_row);
            }
            if let Some(old) = old_visible {
                if self.visible(&key).is_none() {
                    batch.push(Change::delete(key, old));
                }
            }
        }
        self.order.clear();
        self.emit(batch);
    }

    fn fail(&mut self, message: String) {
        log::error!("collection {}: sync source failed: {message}", self.id);
        self.transition(Status::Error { message });
    }
}
