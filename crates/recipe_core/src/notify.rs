//! Change notification registry.
//!
//! # Responsibility
//! - Let presentation code register interest in a locator.
//! - Fan out payload-free invalidation signals after writes.
//!
//! # Invariants
//! - Callbacks run after the registry lock is released, so a callback may
//!   re-query the provider or (un)subscribe without deadlocking.
//! - A change on `L` reaches observers of `L`, observers of descendants of
//!   `L`, observers of the direct parent of `L`, and observers of any
//!   ancestor of `L` registered with [`ObserverScope::Descendants`].

use crate::locator::Locator;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Handle returned by [`ChangeNotifier::subscribe`].
pub type SubscriptionId = Uuid;

/// Invalidation callback. Receives the locator the change was announced on.
pub type ChangeCallback = Arc<dyn Fn(&Locator) + Send + Sync>;

/// How far below its locator an observer wants to hear about changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverScope {
    /// Changes announced on the locator itself, its ancestors or its
    /// direct children.
    Exact,
    /// Also changes announced on any locator below it.
    Descendants,
}

struct Observer {
    locator: Locator,
    scope: ObserverScope,
    callback: ChangeCallback,
}

impl Observer {
    fn wants(&self, changed: &Locator) -> bool {
        if self.locator.same_as(changed)
            || changed.is_ancestor_of(&self.locator)
            || self.locator.is_parent_of(changed)
        {
            return true;
        }
        self.scope == ObserverScope::Descendants && self.locator.is_ancestor_of(changed)
    }
}

/// Observer registry owned by the core and shared with presentation code.
#[derive(Default)]
pub struct ChangeNotifier {
    observers: RwLock<HashMap<SubscriptionId, Observer>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for changes reachable from `locator`.
    pub fn subscribe(
        &self,
        locator: Locator,
        scope: ObserverScope,
        callback: impl Fn(&Locator) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = Uuid::new_v4();
        let observer = Observer {
            locator,
            scope,
            callback: Arc::new(callback),
        };
        match self.observers.write() {
            Ok(mut observers) => {
                observers.insert(id, observer);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(id, observer);
            }
        }
        debug!("event=observer_subscribe module=notify status=ok subscription={id}");
        id
    }

    /// Removes a registration. Returns `false` when `id` was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = match self.observers.write() {
            Ok(mut observers) => observers.remove(&id),
            Err(poisoned) => poisoned.into_inner().remove(&id),
        };
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        match self.observers.read() {
            Ok(observers) => observers.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Announces that data reachable from `changed` may be stale.
    ///
    /// Returns the number of callbacks invoked.
    pub fn notify_change(&self, changed: &Locator) -> usize {
        let callbacks: Vec<ChangeCallback> = {
            let observers = match self.observers.read() {
                Ok(observers) => observers,
                Err(poisoned) => {
                    warn!("event=notify_change module=notify status=recovered reason=lock_poisoned");
                    poisoned.into_inner()
                }
            };
            observers
                .values()
                .filter(|observer| observer.wants(changed))
                .map(|observer| Arc::clone(&observer.callback))
                .collect()
        };

        for callback in &callbacks {
            callback(changed);
        }

        debug!(
            "event=notify_change module=notify status=ok locator={changed} delivered={}",
            callbacks.len()
        );
        callbacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeNotifier, ObserverScope};
    use crate::locator::Locator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter(
        notifier: &ChangeNotifier,
        locator: &str,
        scope: ObserverScope,
    ) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&hits);
        notifier.subscribe(Locator::new(locator), scope, move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        hits
    }

    #[test]
    fn item_change_reaches_item_and_collection_observers() {
        let notifier = ChangeNotifier::new();
        let item = counter(&notifier, "content://a/recipes/1", ObserverScope::Exact);
        let other_item = counter(&notifier, "content://a/recipes/2", ObserverScope::Exact);
        let list_exact = counter(&notifier, "content://a/recipes", ObserverScope::Exact);
        let list_tree = counter(&notifier, "content://a/recipes", ObserverScope::Descendants);

        notifier.notify_change(&Locator::new("content://a/recipes/1"));

        assert_eq!(item.load(Ordering::SeqCst), 1);
        assert_eq!(other_item.load(Ordering::SeqCst), 0);
        assert_eq!(list_exact.load(Ordering::SeqCst), 1);
        assert_eq!(list_tree.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exact_scope_stops_below_direct_children() {
        let notifier = ChangeNotifier::new();
        let root_exact = counter(&notifier, "content://a", ObserverScope::Exact);
        let root_tree = counter(&notifier, "content://a", ObserverScope::Descendants);

        notifier.notify_change(&Locator::new("content://a/recipes/1"));

        assert_eq!(root_exact.load(Ordering::SeqCst), 0);
        assert_eq!(root_tree.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn collection_change_reaches_item_observers() {
        let notifier = ChangeNotifier::new();
        let item = counter(&notifier, "content://a/recipes/9", ObserverScope::Exact);
        let list = counter(&notifier, "content://a/recipes", ObserverScope::Exact);
        let foreign = counter(&notifier, "content://b/recipes", ObserverScope::Descendants);

        let delivered = notifier.notify_change(&Locator::new("content://a/recipes"));

        assert_eq!(delivered, 2);
        assert_eq!(item.load(Ordering::SeqCst), 1);
        assert_eq!(list.load(Ordering::SeqCst), 1);
        assert_eq!(foreign.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let notifier = ChangeNotifier::new();
        let id = notifier.subscribe(
            Locator::new("content://a/recipes"),
            ObserverScope::Exact,
            |_| panic!("callback must not run after unsubscribe"),
        );

        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        assert!(notifier.is_empty());
        assert_eq!(notifier.notify_change(&Locator::new("content://a/recipes")), 0);
    }

    #[test]
    fn callback_may_subscribe_during_delivery() {
        let notifier = Arc::new(ChangeNotifier::new());
        let inner = Arc::clone(&notifier);
        notifier.subscribe(
            Locator::new("content://a/recipes"),
            ObserverScope::Exact,
            move |changed| {
                inner.subscribe(changed.clone(), ObserverScope::Exact, |_| {});
            },
        );

        notifier.notify_change(&Locator::new("content://a/recipes"));
        assert_eq!(notifier.len(), 2);
    }
}
