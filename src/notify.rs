//! Process-wide "questions changed" signal
//!
//! Listeners receive no payload and are expected to re-query the store.

use log::{debug, warn};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_key: AtomicU64,
    listeners: Mutex<BTreeMap<u64, Listener>>,
}

/// Observer registry. Clones share the same set of listeners.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<Registry>,
}

/// Handle returned by [`ChangeNotifier::subscribe`]; dropping it unsubscribes.
pub struct Subscription {
    key: u64,
    registry: Arc<Registry>,
}

impl Subscription {
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(mut listeners) = self.registry.listeners.lock() {
            listeners.remove(&self.key);
        }
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// The notifier shared by every store opened without an explicit one.
    pub fn global() -> ChangeNotifier {
        static GLOBAL: OnceLock<ChangeNotifier> = OnceLock::new();
        GLOBAL.get_or_init(ChangeNotifier::new).clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.insert(key, Arc::new(listener));
        }
        Subscription {
            key,
            registry: Arc::clone(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Invoke every current listener once.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners still run.
    pub fn notify(&self) {
        // Snapshot so listeners may subscribe/unsubscribe while being called.
        let snapshot: Vec<Listener> = match self.inner.listeners.lock() {
            Ok(listeners) => listeners.values().cloned().collect(),
            Err(_) => return,
        };
        debug!("questions-updated -> {} listener(s)", snapshot.len());
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
                warn!("questions-updated listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_notify_reaches_all_listeners() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h1 = Arc::clone(&hits);
        let _a = notifier.subscribe(move || {
            h1.fetch_add(1, Ordering::SeqCst);
        });
        let h2 = Arc::clone(&hits);
        let _b = notifier.subscribe(move || {
            h2.fetch_add(10, Ordering::SeqCst);
        });

        notifier.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_unsubscribe_on_drop() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let sub = notifier.subscribe(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(notifier.listener_count(), 1);

        sub.unsubscribe();
        assert_eq!(notifier.listener_count(), 0);
        notifier.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _bad = notifier.subscribe(|| panic!("listener failure"));
        let h = Arc::clone(&hits);
        let _good = notifier.subscribe(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify();
        notifier.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(notifier.listener_count(), 2);
    }

    #[test]
    fn test_clones_share_listeners() {
        let notifier = ChangeNotifier::new();
        let other = notifier.clone();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = notifier.subscribe(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        other.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
