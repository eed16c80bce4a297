//! Synchronous observer lists for session lifecycle notifications.
//!
//! An [`Event`] keeps its handlers in registration order and invokes them in
//! that order. Every registration hands back an [`EventHandler`] guard; the
//! handler stays subscribed exactly as long as the guard is alive.
//!
//! Dispatch works on a snapshot of the handler list, so a handler may drop its
//! own guard (or another one) while the event is being raised. A handler that
//! was removed mid-dispatch is skipped for the rest of that dispatch.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::logging::LOG_MULTIPLAYER;

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Slot<T: ?Sized> {
    id: u64,
    callback: Callback<T>,
}

struct HandlerList<T: ?Sized> {
    next_id: u64,
    slots: Vec<Slot<T>>,
}

impl<T: ?Sized> HandlerList<T> {
    fn contains(&self, id: u64) -> bool {
        self.slots.iter().any(|slot| slot.id == id)
    }

    fn remove(&mut self, id: u64) {
        self.slots.retain(|slot| slot.id != id);
    }
}

/// Ordered list of callbacks raised synchronously with a payload of type `T`.
pub struct Event<T: ?Sized + 'static> {
    handlers: Rc<RefCell<HandlerList<T>>>,
}

impl<T: ?Sized + 'static> Event<T> {
    pub fn new() -> Self {
        Self {
            handlers: Rc::new(RefCell::new(HandlerList {
                next_id: 0,
                slots: Vec::new(),
            })),
        }
    }

    /// Subscribes `handler`. It is invoked after every handler registered before it.
    pub fn add_handler<F>(&self, handler: F) -> EventHandler
    where
        F: FnMut(&T) + 'static,
    {
        let id = {
            let mut list = self.handlers.borrow_mut();
            let id = list.next_id;
            list.next_id += 1;
            let callback: Callback<T> = Rc::new(RefCell::new(handler));
            list.slots.push(Slot { id, callback });
            id
        };

        let list: Weak<RefCell<HandlerList<T>>> = Rc::downgrade(&self.handlers);
        EventHandler {
            unregister: Some(Box::new(move || {
                if let Some(list) = list.upgrade() {
                    list.borrow_mut().remove(id);
                }
            })),
        }
    }

    /// Invokes every subscribed handler with `value`, in registration order.
    pub fn signal(&self, value: &T) {
        let snapshot: Vec<(u64, Callback<T>)> = self
            .handlers
            .borrow()
            .slots
            .iter()
            .map(|slot| (slot.id, Rc::clone(&slot.callback)))
            .collect();

        for (id, callback) in snapshot {
            if !self.handlers.borrow().contains(id) {
                continue;
            }
            match callback.try_borrow_mut() {
                Ok(mut handler) => (&mut *handler)(value),
                Err(_) => warn!(
                    target: LOG_MULTIPLAYER,
                    "Skipping re-entrant invocation of event handler {}", id
                ),
            }
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().slots.len()
    }

    pub fn has_handlers(&self) -> bool {
        self.handler_count() > 0
    }
}

impl<T: ?Sized + 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + 'static> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// Subscription guard returned by [`Event::add_handler`].
///
/// Dropping the guard unregisters the handler. Outliving the event is fine.
#[must_use = "dropping the handler unregisters it immediately"]
pub struct EventHandler {
    unregister: Option<Box<dyn FnOnce()>>,
}

impl EventHandler {
    /// Unregisters the handler now.
    pub fn disconnect(mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("connected", &self.unregister.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn handlers_run_in_registration_order() {
        let event = Event::<u32>::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let first = {
            let order = Rc::clone(&order);
            event.add_handler(move |v| order.borrow_mut().push(("first", *v)))
        };
        let second = {
            let order = Rc::clone(&order);
            event.add_handler(move |v| order.borrow_mut().push(("second", *v)))
        };

        event.signal(&3);
        assert_eq!(*order.borrow(), vec![("first", 3), ("second", 3)]);
        drop((first, second));
    }

    #[test]
    fn dropping_guard_unregisters() {
        let event = Event::<u32>::new();
        let hits = Rc::new(Cell::new(0));

        let guard = {
            let hits = Rc::clone(&hits);
            event.add_handler(move |_| hits.set(hits.get() + 1))
        };
        event.signal(&0);
        drop(guard);
        event.signal(&0);

        assert_eq!(hits.get(), 1);
        assert!(!event.has_handlers());
    }

    #[test]
    fn handler_removed_mid_dispatch_is_skipped() {
        let event = Event::<u32>::new();
        let victim: Rc<RefCell<Option<EventHandler>>> = Rc::new(RefCell::new(None));
        let victim_hits = Rc::new(Cell::new(0));

        let _killer = {
            let victim = Rc::clone(&victim);
            event.add_handler(move |_| {
                victim.borrow_mut().take();
            })
        };
        let guard = {
            let hits = Rc::clone(&victim_hits);
            event.add_handler(move |_| hits.set(hits.get() + 1))
        };
        *victim.borrow_mut() = Some(guard);

        event.signal(&1);
        assert_eq!(victim_hits.get(), 0);
        assert_eq!(event.handler_count(), 1);
    }

    #[test]
    fn guard_may_outlive_event() {
        let event = Event::<str>::new();
        let guard = event.add_handler(|_| {});
        drop(event);
        guard.disconnect();
    }
}
