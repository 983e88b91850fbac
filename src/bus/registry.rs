//! # Copy-on-write topic registry.
//!
//! The topic → handle map is immutable once published: readers load the
//! current snapshot lock-free, and inserting a topic clones the map, adds
//! the entry, and compare-and-swaps the snapshot pointer, retrying on
//! contention. Exactly one handle per topic name ever wins the swap, which
//! lets the bus spawn the worker task only for the winner.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::bus::worker::TopicHandle;

type Snapshot<T> = HashMap<String, TopicHandle<T>>;

pub(crate) struct TopicRegistry<T> {
    snapshot: ArcSwap<Snapshot<T>>,
    /// Count of insert wins. A win is the only path that spawns a worker,
    /// so this doubles as the worker-start counter.
    wins: AtomicUsize,
}

impl<T> TopicRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            wins: AtomicUsize::new(0),
        }
    }

    /// Lock-free lookup of a topic's handle.
    pub(crate) fn get(&self, topic: &str) -> Option<TopicHandle<T>> {
        self.snapshot.load().get(topic).cloned()
    }

    /// Inserts `handle` under `topic` unless the topic is already present.
    ///
    /// Returns the handle that ended up registered and whether this call won
    /// the slot. The caller spawns the worker only on a win; a lost race
    /// discards its prepared worker before it ever ran.
    pub(crate) fn insert(&self, topic: &str, handle: TopicHandle<T>) -> (TopicHandle<T>, bool) {
        loop {
            let current = self.snapshot.load_full();
            if let Some(existing) = current.get(topic) {
                return (existing.clone(), false);
            }
            let mut next = (*current).clone();
            next.insert(topic.to_owned(), handle.clone());
            let previous = self.snapshot.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&previous, &current) {
                self.wins.fetch_add(1, Ordering::Relaxed);
                return (handle, true);
            }
        }
    }

    /// Publishes an empty snapshot. Handles in the old snapshot die with it
    /// once the last outside clone is gone.
    pub(crate) fn clear(&self) {
        self.snapshot.store(Arc::new(HashMap::new()));
    }

    /// Sorted names of all currently known topics.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot.load().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Total insert wins, i.e. workers ever started.
    pub(crate) fn wins(&self) -> usize {
        self.wins.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::bus::worker::TopicWorker;
    use crate::config::BusConfig;

    fn prepared_handle() -> TopicHandle<u8> {
        let (handle, _worker) = TopicWorker::<u8>::channel(
            Arc::from("t"),
            &BusConfig::default(),
            CancellationToken::new(),
        );
        handle
    }

    #[test]
    fn first_insert_wins_and_second_returns_existing() {
        let registry = TopicRegistry::<u8>::new();

        let first = prepared_handle();
        let (registered, won) = registry.insert("t", first.clone());
        assert!(won);
        assert!(registered.publish.same_channel(&first.publish));

        let second = prepared_handle();
        let (registered, won) = registry.insert("t", second);
        assert!(!won);
        assert!(registered.publish.same_channel(&first.publish));

        assert_eq!(registry.wins(), 1);
    }

    #[test]
    fn names_are_sorted() {
        let registry = TopicRegistry::<u8>::new();
        registry.insert("zeta", prepared_handle());
        registry.insert("alpha", prepared_handle());
        registry.insert("mid", prepared_handle());
        assert_eq!(registry.names(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn clear_publishes_an_empty_snapshot() {
        let registry = TopicRegistry::<u8>::new();
        registry.insert("t", prepared_handle());
        registry.clear();
        assert!(registry.names().is_empty());
        assert!(registry.get("t").is_none());
        // Wins record history, not current contents.
        assert_eq!(registry.wins(), 1);
    }
}
