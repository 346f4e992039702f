//! Explicit change notification.
//!
//! Head state is single-threaded: a [`Notifier`] fans events out to
//! subscribers synchronously, and a [`Signal`] is an observable value cell
//! built on it. Subscribers are snapshotted before dispatch, so a callback
//! may read the source, subscribe, or unsubscribe without re-borrowing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Listener<E> = Rc<dyn Fn(&E)>;

struct NotifierInner<E> {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(u64, Listener<E>)>>,
}

/// Synchronous fan-out of events to subscribers, in subscription order.
pub struct Notifier<E> {
    inner: Rc<NotifierInner<E>>,
}

impl<E> Clone for Notifier<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self {
            inner: Rc::new(NotifierInner {
                next_id: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }
}

impl<E> fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<E: 'static> Notifier<E> {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. The returned guard unsubscribes when dropped.
    pub fn subscribe(&self, listener: impl Fn(&E) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));

        let weak: Weak<NotifierInner<E>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }

    /// Deliver an event to every current subscriber.
    pub fn notify(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl<E> Notifier<E> {
    /// Number of live subscribers.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

/// Guard for a live subscription; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unsubscribe now.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Observable value cell used as a reactive head source.
///
/// Every `set`/`update` notifies subscribers, even when the value is equal;
/// the store filters out no-op re-evaluations.
pub struct Signal<T> {
    value: Rc<RefCell<T>>,
    changed: Notifier<()>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
            changed: self.changed.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &*self.value.borrow())
            .finish()
    }
}

impl<T: 'static> Signal<T> {
    /// Create a signal holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
            changed: Notifier::new(),
        }
    }

    /// Read the value through a closure.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.value.borrow())
    }

    /// Replace the value and notify.
    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
        self.changed.notify(&());
    }

    /// Mutate the value in place and notify.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut *self.value.borrow_mut());
        self.changed.notify(&());
    }

    /// Run `f` after every change.
    pub fn subscribe(&self, f: impl Fn() + 'static) -> Subscription {
        self.changed.subscribe(move |_| f())
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.changed.listener_count()
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Clone the current value.
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }
}
