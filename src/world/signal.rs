//! Observer signals for domain notifications
//!
//! Collaborators expose their change notifications as [`Signal`]s. Connecting
//! a handler hands back a [`Subscription`]; dropping the subscription removes
//! the handler, so whoever owns the subscription owns the unsubscription.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Handler<T> = Rc<dyn Fn(&T)>;

struct SignalInner<T> {
    next_id: u64,
    handlers: Vec<(u64, Handler<T>)>,
}

/// Ordered list of handlers notified on every `emit`
pub struct Signal<T> {
    inner: Rc<RefCell<SignalInner<T>>>,
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    /// Connect a handler; it stays connected for as long as the returned
    /// subscription lives
    pub fn connect<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.handlers.push((id, Rc::new(handler)));
            id
        };

        let weak: Weak<RefCell<SignalInner<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            disconnect: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().handlers.retain(|(handler_id, _)| *handler_id != id);
                }
            })),
        }
    }

    /// Notify every connected handler in connection order
    pub fn emit(&self, value: &T) {
        // Snapshot so handlers may connect/disconnect while being notified
        let handlers: Vec<Handler<T>> = self
            .inner
            .borrow()
            .handlers
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in handlers {
            handler(value);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.inner.borrow().handlers.len()
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("handlers", &self.inner.borrow().handlers.len())
            .finish()
    }
}

/// Handle to a connected handler
#[must_use = "dropping a Subscription disconnects its handler"]
pub struct Subscription {
    disconnect: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Disconnect explicitly (same as dropping)
    pub fn disconnect(mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("connected", &self.disconnect.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_emit_in_connection_order() {
        let signal = Signal::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = seen.clone();
        let _a = signal.connect(move |v| first.borrow_mut().push(("a", *v)));
        let second = seen.clone();
        let _b = signal.connect(move |v| second.borrow_mut().push(("b", *v)));

        signal.emit(&7);

        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_drop_disconnects() {
        let signal = Signal::<()>::new();
        let hits = Rc::new(Cell::new(0));

        let counter = hits.clone();
        let subscription = signal.connect(move |_| counter.set(counter.get() + 1));
        signal.emit(&());
        assert_eq!(signal.handler_count(), 1);

        drop(subscription);
        signal.emit(&());

        assert_eq!(hits.get(), 1);
        assert_eq!(signal.handler_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_signal() {
        let signal = Signal::<()>::new();
        let subscription = signal.connect(|_| {});
        drop(signal);
        subscription.disconnect();
    }

    #[test]
    fn test_handler_connected_during_emit_is_not_called() {
        let signal = Rc::new(Signal::<()>::new());
        let late_hits = Rc::new(Cell::new(0));
        let held = Rc::new(RefCell::new(Vec::new()));

        let inner_signal = signal.clone();
        let inner_hits = late_hits.clone();
        let inner_held = held.clone();
        let _outer = signal.connect(move |_| {
            let hits = inner_hits.clone();
            let sub = inner_signal.connect(move |_| hits.set(hits.get() + 1));
            inner_held.borrow_mut().push(sub);
        });

        signal.emit(&());
        assert_eq!(late_hits.get(), 0);

        signal.emit(&());
        assert_eq!(late_hits.get(), 1);
    }
}
