use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

struct Listener<T> {
    id: u64,
    live: Cell<bool>,
    f: Box<dyn Fn(&T)>,
}

struct Inner<T> {
    value: T,
    next_id: u64,
    listeners: Vec<Rc<Listener<T>>>,
}

/// A single-threaded value cell with replay-last subscriptions.
///
/// `get` always returns the latest value. `subscribe` calls the listener with
/// the current value before returning, then on every notification. The cell
/// holds no borrow while listeners run, so a listener may read it, set it,
/// or subscribe and unsubscribe freely.
pub struct Broadcast<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Broadcast<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                value,
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Stores `value` and notifies every listener.
    pub fn set(&self, value: T) {
        self.inner.borrow_mut().value = value;
        self.notify();
    }

    /// Mutates the value in place; listeners are notified only when `f`
    /// returns `true`.
    pub fn update(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        let changed = f(&mut self.inner.borrow_mut().value);
        if changed {
            self.notify();
        }
        changed
    }

    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Subscription {
        let listener = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            let listener = Rc::new(Listener {
                id,
                live: Cell::new(true),
                f: Box::new(f),
            });
            inner.listeners.push(listener.clone());
            listener
        };

        let current = self.get();
        (listener.f)(&current);

        let weak: Weak<RefCell<Inner<T>>> = Rc::downgrade(&self.inner);
        let id = listener.id;
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.borrow_mut();
                if let Some(pos) = inner.listeners.iter().position(|l| l.id == id) {
                    inner.listeners.remove(pos).live.set(false);
                }
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    fn notify(&self) {
        let (value, listeners) = {
            let inner = self.inner.borrow();
            (inner.value.clone(), inner.listeners.clone())
        };
        for l in listeners {
            if l.live.get() {
                (l.f)(&value);
            }
        }
    }
}

/// Unsubscribes when cancelled or dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Combines several subscriptions into one guard.
    pub fn all(subs: Vec<Subscription>) -> Self {
        Self::new(move || drop(subs))
    }

    pub fn cancel(mut self) {
        self.run();
    }

    /// Keeps the listener registered for the lifetime of the cell.
    pub fn forget(mut self) {
        self.cancel = None;
    }

    fn run(&mut self) {
        if let Some(f) = self.cancel.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}
