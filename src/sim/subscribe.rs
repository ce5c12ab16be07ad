//! Channel-routed delivery of freshly spawned instances
//!
//! An allocator produces a unit, then announces it on the channel carried by
//! the spawn request's tag. Subscribers are held weakly: dropping the last
//! strong reference detaches a subscriber without any explicit call.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Receives items published on a channel it subscribed to.
pub trait Subscriber<T> {
    fn receive(&mut self, channel: u64, item: &T);
}

/// Registry of non-owning subscriber references keyed by channel.
pub struct Subscribable<T> {
    subscribers: Vec<(u64, Weak<RefCell<dyn Subscriber<T>>>)>,
}

impl<T> Default for Subscribable<T> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<T> Subscribable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` on `channel`. The registry keeps only a weak reference.
    pub fn subscribe<S>(&mut self, channel: u64, subscriber: &Rc<RefCell<S>>)
    where
        S: Subscriber<T> + 'static,
    {
        let strong: Rc<RefCell<dyn Subscriber<T>>> = subscriber.clone();
        self.subscribers.push((channel, Rc::downgrade(&strong)));
    }

    /// Detach `subscriber` from every channel.
    pub fn unsubscribe<S>(&mut self, subscriber: &Rc<RefCell<S>>)
    where
        S: Subscriber<T> + 'static,
    {
        let target = Rc::as_ptr(subscriber) as *const ();
        self.subscribers
            .retain(|(_, weak)| weak.as_ptr() as *const () != target);
    }

    /// Deliver `item` to every live subscriber on `channel`, in subscription order.
    ///
    /// Returns how many subscribers received it. Dead entries are pruned.
    pub fn publish(&mut self, channel: u64, item: &T) -> usize {
        self.subscribers.retain(|(_, weak)| weak.strong_count() > 0);

        let mut delivered = 0;
        for (ch, weak) in &self.subscribers {
            if *ch != channel {
                continue;
            }
            if let Some(subscriber) = weak.upgrade() {
                subscriber.borrow_mut().receive(channel, item);
                delivered += 1;
            }
        }
        delivered
    }

    /// Live subscribers across all channels
    pub fn len(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
