//! A minimal observable cell.
//!
//! [`Reactive`] holds a value and synchronously notifies subscribers when it changes. It is
//! single-threaded by design (the engine runs on one logical thread), so handles are cheap
//! `Rc` clones that share one cell.
//!
//! Subscribers may call [`Reactive::set`] from inside their own notification. When that
//! happens, the emission that is still in flight stops: later subscribers never observe the
//! superseded value, they only see the newer one (delivered by the nested emission).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&T)>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReactiveOptions {
    /// Call a new subscriber with the current value right away.
    pub emit_on_subscribe: bool,
    /// Notify subscribers even when `set` receives a value equal to the current one.
    pub emit_equal: bool,
}

struct Subscriber<T> {
    id: u64,
    once: bool,
    callback: Callback<T>,
}

struct Shared<T> {
    value: RefCell<T>,
    subscribers: RefCell<Vec<Subscriber<T>>>,
    next_id: Cell<u64>,
    options: ReactiveOptions,
}

impl<T> Shared<T> {
    fn remove(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    fn contains(&self, id: u64) -> bool {
        self.subscribers.borrow().iter().any(|s| s.id == id)
    }
}

/// An observable value shared between the engine and its observers.
pub struct Reactive<T> {
    shared: Rc<Shared<T>>,
}

impl<T> Clone for Reactive<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Reactive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("value", &*self.shared.value.borrow())
            .field("subscribers", &self.shared.subscribers.borrow().len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Reactive<T> {
    pub fn new(value: T) -> Self {
        Self::with_options(value, ReactiveOptions::default())
    }

    pub fn with_options(value: T, options: ReactiveOptions) -> Self {
        Self {
            shared: Rc::new(Shared {
                value: RefCell::new(value),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                options,
            }),
        }
    }

    pub fn get(&self) -> T {
        self.shared.value.borrow().clone()
    }

    /// Stores `value` and notifies subscribers in subscription order.
    ///
    /// Unless `emit_equal` is set, storing a value equal to the current one is a no-op.
    pub fn set(&self, value: T) {
        {
            let mut current = self.shared.value.borrow_mut();
            if !self.shared.options.emit_equal && *current == value {
                return;
            }
            *current = value.clone();
        }
        self.emit(&value);
    }

    fn emit(&self, value: &T) {
        let snapshot: Vec<(u64, bool, Callback<T>)> = self
            .shared
            .subscribers
            .borrow()
            .iter()
            .map(|s| (s.id, s.once, Rc::clone(&s.callback)))
            .collect();

        for (id, once, callback) in snapshot {
            if *self.shared.value.borrow() != *value {
                // A subscriber stored a newer value; this emission is stale.
                break;
            }
            if once {
                if !self.shared.remove(id) {
                    continue;
                }
            } else if !self.shared.contains(id) {
                continue;
            }
            callback(value);
        }
    }

    fn subscribe(&self, callback: Callback<T>, once: bool) -> Subscription {
        let id = self.shared.next_id.get();
        self.shared.next_id.set(id.wrapping_add(1));
        self.shared.subscribers.borrow_mut().push(Subscriber {
            id,
            once,
            callback: Rc::clone(&callback),
        });

        if self.shared.options.emit_on_subscribe {
            let value = self.get();
            if !once || self.shared.remove(id) {
                callback(&value);
            }
        }

        let weak: Weak<Shared<T>> = Rc::downgrade(&self.shared);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.remove(id);
                }
            })),
        }
    }

    /// Subscribes to changes. The returned handle unsubscribes explicitly; dropping it does not.
    pub fn on(&self, f: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe(Rc::new(f), false)
    }

    /// Subscribes for a single emission.
    pub fn once(&self, f: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe(Rc::new(f), true)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.borrow().len()
    }

    /// Removes every subscriber without emitting.
    pub fn dispose(&self) {
        self.shared.subscribers.borrow_mut().clear();
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for Reactive<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Handle returned by [`Reactive::on`] / [`Reactive::once`].
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
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
