//! Typed "of interest" topics shared between panels.
//!
//! Each topic is a latest-value channel: publishers overwrite, subscribers
//! see only the newest value since they last looked.

use tokio::sync::watch;
use tracing::debug;
use wrangler_core::ObjectId;

pub struct Topic<T> {
    name: &'static str,
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone + std::fmt::Debug> Topic<T> {
    pub fn new(name: &'static str) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { name, tx }
    }

    pub fn name(&self) -> &'static str { self.name }

    pub fn publish(&self, value: T) {
        debug!(topic = self.name, value = ?value, "publish");
        self.tx.send_replace(Some(value));
    }

    pub fn latest(&self) -> Option<T> { self.tx.borrow().clone() }

    /// Subscribers start caught up: values published before subscribing are not replayed.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription { rx: self.tx.subscribe() }
    }
}

pub struct Subscription<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Subscription<T> {
    /// The newest value if one was published since the last call.
    pub fn take_changed(&mut self) -> Option<T> {
        match self.rx.has_changed() {
            Ok(true) => self.rx.borrow_and_update().clone(),
            _ => None,
        }
    }
}

/// The console's topics. Panels get it by reference at construction.
pub struct EventBus {
    pub job_of_interest: Topic<ObjectId>,
    pub layer_of_interest: Topic<ObjectId>,
    pub cluster_of_interest: Topic<ObjectId>,
}

impl Default for EventBus {
    fn default() -> Self { Self::new() }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            job_of_interest: Topic::new("job_of_interest"),
            layer_of_interest: Topic::new("layer_of_interest"),
            cluster_of_interest: Topic::new("cluster_of_interest"),
        }
    }
}
