//! `preload()`/`onFirstReady()` support (spec.md §4.1).
//!
//! The core's only asynchrony is sync-source futures (spec.md §5), so
//! `preload()` is a small hand-rolled `Future` rather than anything
//! executor-specific: a collection holds a list of wakers to notify the
//! moment its status crosses the `initialCommit` threshold.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

#[derive(Default)]
struct ReadyState {
    satisfied: bool,
    waker: Option<Waker>,
}

/// Shared handle a `Collection` notifies when its readiness threshold is
/// crossed, and that `Preload` polls against.
#[derive(Clone, Default)]
pub struct ReadySignal {
    state: Rc<RefCell<ReadyState>>,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the signal satisfied and wakes any parked future.
    pub fn fire(&self) {
        let mut state = self.state.borrow_mut();
        if state.satisfied {
            return;
        }
        state.satisfied = true;
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.state.borrow().satisfied
    }

    pub fn future(&self) -> Preload {
        Preload { state: self.state.clone() }
    }
}

/// A future resolving once the collection it was created from reaches
/// `status >= initialCommit` (or fires immediately if it already has).
pub struct Preload {
    state: Rc<RefCell<ReadyState>>,
}

impl Future for Preload {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self.state.borrow_mut();
        if state.satisfied {
            Poll::Ready(())
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

/// A one-shot registry of `onFirstReady` callbacks, fired exactly once at
/// the first `Ready` transition and then cleared.
#[derive(Default)]
pub struct FirstReadyCallbacks {
    fired: bool,
    callbacks: Vec<Box<dyn FnOnce()>>,
}

impl FirstReadyCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`. If the first `ready` transition has already
    /// happened, it runs immediately instead of being queued.
    pub fn on_first_ready(&mut self, callback: Box<dyn FnOnce()>) {
        if self.fired {
            callback();
        } else {
            self.callbacks.push(callback);
        }
    }

    /// Fires every queued callback exactly once; a second call is a no-op.
    pub fn fire(&mut self) {
        if self.fired {
            return;
        }
        self.fired = true;
        for cb in self.callbacks.drain(..) {
            cb();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::task::{RawWaker, RawWakerVTable};

    fn noop_waker() -> Waker {
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        fn noop(_: *const ()) {}
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
    }

    #[test]
    fn preload_resolves_after_fire() {
        let signal = ReadySignal::new();
        let mut fut = signal.future();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert_eq!(Pin::new(&mut fut).poll(&mut cx), Poll::Pending);
        signal.fire();
        assert_eq!(Pin::new(&mut fut).poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn preload_resolves_immediately_if_already_fired() {
        let signal = ReadySignal::new();
        signal.fire();
        let mut fut = signal.future();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert_eq!(Pin::new(&mut fut).poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn on_first_ready_fires_once() {
        let mut callbacks = FirstReadyCallbacks::new();
        let count = Rc::new(RefCell::new(0));
        let c1 = count.clone();
        callbacks.on_first_ready(Box::new(move || *c1.borrow_mut() += 1));
        callbacks.fire();
        callbacks.fire();
        assert_eq!(*count.borrow(), 1);

        let c2 = count.clone();
        callbacks.on_first_ready(Box::new(move || *c2.borrow_mut() += 1));
        assert_eq!(*count.borrow(), 2, "registering after the first fire runs immediately");
    }
}
