//! Observe - Set membership with change notification
//!
//! Views keep small selections (expanded steps, highlighted invocations)
//! that other parts of the view react to. `ObservableSet` publishes every
//! membership change on a broadcast channel.

use std::collections::BTreeSet;

use serde::Serialize;
use tokio::sync::broadcast;

/// A membership change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", content = "value", rename_all = "snake_case")]
pub enum SetChange<T> {
    /// Value added
    Inserted(T),
    /// Value removed
    Removed(T),
    /// Every value removed
    Cleared,
}

/// Ordered set that notifies subscribers when its membership changes
#[derive(Debug)]
pub struct ObservableSet<T> {
    values: BTreeSet<T>,
    sender: broadcast::Sender<SetChange<T>>,
}

impl<T: Ord + Clone> ObservableSet<T> {
    /// Create an empty set. `capacity` bounds how many changes a slow
    /// subscriber can fall behind before it lags; zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            values: BTreeSet::new(),
            sender,
        }
    }

    /// Receive all future changes
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SetChange<T>> {
        self.sender.subscribe()
    }

    /// Add a value. Returns whether it was newly added.
    pub fn insert(&mut self, value: T) -> bool {
        let added = self.values.insert(value.clone());
        if added {
            self.publish(SetChange::Inserted(value));
        }
        added
    }

    /// Remove a value. Returns whether it was present.
    pub fn remove(&mut self, value: &T) -> bool {
        let removed = self.values.remove(value);
        if removed {
            self.publish(SetChange::Removed(value.clone()));
        }
        removed
    }

    /// Flip membership. Returns whether the value is now present.
    pub fn toggle(&mut self, value: T) -> bool {
        if self.values.contains(&value) {
            self.remove(&value);
            false
        } else {
            self.insert(value);
            true
        }
    }

    /// Remove every value
    pub fn clear(&mut self) {
        if !self.values.is_empty() {
            self.values.clear();
            self.publish(SetChange::Cleared);
        }
    }

    /// Check membership
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.values.contains(value)
    }

    /// Number of values
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate in order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    fn publish(&self, change: SetChange<T>) {
        // send() returns Err if there are no receivers, which is fine
        let _ = self.sender.send(change);
    }
}

impl<T: Ord + Clone> Default for ObservableSet<T> {
    fn default() -> Self {
        Self::new(64)
    }
}
