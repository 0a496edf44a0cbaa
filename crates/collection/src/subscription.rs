//! Change-subscriber fan-out (spec.md §3 "subscribers", §4.1
//! "subscribeChanges").

use rivet_core::ChangeBatch;
use std::rc::Rc;

/// A registered change callback. Boxed `FnMut` rather than `Fn` since
/// subscribers (e.g. a live-query operator) routinely carry mutable state.
pub type ChangeCallback<T> = Box<dyn FnMut(&ChangeBatch<T>)>;

struct Subscriber<T> {
    id: u64,
    callback: ChangeCallback<T>,
}

/// Fan-out registry for a single collection's change stream.
///
/// Subscribers observe change batches in the exact order the collection
/// emitted them (spec.md §5 "Ordering guarantees"); this type enforces
/// that by dispatching to every subscriber, in registration order, inline
/// on `notify`.
pub struct Subscribers<T> {
    next_id: u64,
    subscribers: Vec<Subscriber<T>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Subscribers { next_id: 0, subscribers: Vec::new() }
    }
}

/// A handle returned by `subscribe`; dropping it does not unsubscribe —
/// callers must call `unsubscribe()` explicitly, matching the teacher's
/// explicit-handle style over an RAII guard (an RAII guard would silently
/// detach subscribers when a caller forgets a `let _guard = ...` binding).
pub struct Subscription {
    id: u64,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: ChangeCallback<T>) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push(Subscriber { id, callback });
        Subscription { id }
    }

    pub fn unsubscribe(&mut self, subscription: &Subscription) {
        self.subscribers.retain(|s| s.id != subscription.id);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Dispatches `batch` to every subscriber. No-op if `batch` is empty —
    /// callers are expected to have already suppressed no-op batches
    /// (spec.md §4.1 "Change-batch emission policy"), but an empty batch
    /// is harmless to skip defensively.
    pub fn notify(&mut self, batch: &ChangeBatch<T>) {
        if batch.is_empty() {
            return;
        }
        for subscriber in &mut self.subscribers {
            (subscriber.callback)(batch);
        }
    }

    /// Detaches every subscriber, e.g. on `cleanup()`.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}

/// Shared ownership wrapper used by collections that need to hand out
/// their subscriber count to a GC clock without borrowing the whole
/// collection.
pub type SharedSubscribers<T> = Rc<std::cell::RefCell<Subscribers<T>>>;

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_core::{Change, Key, Value};

    fn batch(n: i64) -> ChangeBatch<Value> {
        vec![Change::insert(Key::Int(n), Value::Int(n))]
    }

    #[test]
    fn subscribers_receive_in_registration_order() {
        let mut subs: Subscribers<Value> = Subscribers::new();
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        subs.subscribe(Box::new(move |_| o1.borrow_mut().push(1)));
        subs.subscribe(Box::new(move |_| o2.borrow_mut().push(2)));
        subs.notify(&batch(1));
        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn unsubscribe_detaches_only_that_subscription() {
        let mut subs: Subscribers<Value> = Subscribers::new();
        let calls = Rc::new(std::cell::RefCell::new(0));
        let c = calls.clone();
        let sub = subs.subscribe(Box::new(move |_| *c.borrow_mut() += 1));
        subs.unsubscribe(&sub);
        subs.notify(&batch(1));
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn empty_batch_is_not_dispatched() {
        let mut subs: Subscribers<Value> = Subscribers::new();
        let calls = Rc::new(std::cell::RefCell::new(0));
        let c = calls.clone();
        subs.subscribe(Box::new(move |_| *c.borrow_mut() += 1));
        subs.notify(&Vec::new());
        assert_eq!(*calls.borrow(), 0);
    }
}
