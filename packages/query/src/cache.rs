use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::QueryError;
use crate::key::QueryKey;

pub(crate) type SharedFetch = Shared<BoxFuture<'static, Result<Value, QueryError>>>;

pub(crate) struct Entry {
    pub value: Option<Value>,
    /// None when never fetched or invalidated.
    pub updated_at: Option<Instant>,
    pub stale_time: Duration,
    pub gc_time: Duration,
    pub last_used: Instant,
    pub in_flight: Option<(u64, SharedFetch)>,
}

impl Entry {
    fn new(now: Instant, stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            value: None,
            updated_at: None,
            stale_time,
            gc_time,
            last_used: now,
            in_flight: None,
        }
    }

    pub fn fresh_value(&self, now: Instant) -> Option<&Value> {
        let updated_at = self.updated_at?;
        if now.duration_since(updated_at) < self.stale_time {
            self.value.as_ref()
        } else {
            None
        }
    }

    /// Whether the in-flight fetch has no waiter left besides this entry.
    fn is_abandoned(&self) -> bool {
        matches!(&self.in_flight, Some((_, pending)) if pending.strong_count() == Some(1))
    }

    fn is_collectable(&self, now: Instant) -> bool {
        (self.in_flight.is_none() || self.is_abandoned())
            && now.duration_since(self.last_used) >= self.gc_time
    }
}

/// Keyed results plus the request currently filling each key.
#[derive(Default)]
pub(crate) struct QueryCache {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    next_fetch: AtomicU64,
}

pub(crate) enum Lookup {
    Fresh(Value),
    Pending(SharedFetch),
    /// Nothing usable; the caller must start fetch `id`.
    Miss(u64),
}

impl QueryCache {
    /// Find a fresh value or an in-flight fetch for `key`, touching the entry.
    pub fn lookup(&self, key: &QueryKey, stale_time: Duration, gc_time: Duration) -> Lookup {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        sweep(&mut entries, now);

        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(now, stale_time, gc_time));
        entry.last_used = now;
        entry.stale_time = stale_time;
        entry.gc_time = gc_time;

        if let Some(value) = entry.fresh_value(now) {
            return Lookup::Fresh(value.clone());
        }
        if let Some((_, pending)) = &entry.in_flight {
            return Lookup::Pending(pending.clone());
        }
        Lookup::Miss(self.next_fetch.fetch_add(1, Ordering::Relaxed))
    }

    /// Register `fetch` as the in-flight request for `key`.
    ///
    /// Returns the request to await, which is an earlier one if another
    /// caller registered first.
    pub fn begin(
        &self,
        key: &QueryKey,
        id: u64,
        fetch: SharedFetch,
        stale_time: Duration,
        gc_time: Duration,
    ) -> SharedFetch {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(now, stale_time, gc_time));
        match &entry.in_flight {
            Some((_, existing)) => existing.clone(),
            None => {
                entry.in_flight = Some((id, fetch.clone()));
                fetch
            }
        }
    }

    /// Record the outcome of fetch `id`. Ignored if the entry was cleared or
    /// replaced meanwhile.
    pub fn complete(&self, key: &QueryKey, id: u64, result: &Result<Value, QueryError>) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if !matches!(&entry.in_flight, Some((current, _)) if *current == id) {
            return;
        }
        entry.in_flight = None;
        if let Ok(value) = result {
            let now = Instant::now();
            entry.value = Some(value.clone());
            entry.updated_at = Some(now);
            entry.last_used = now;
        }
    }

    pub fn set(&self, key: &QueryKey, value: Value, stale_time: Duration, gc_time: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(now, stale_time, gc_time));
        entry.value = Some(value);
        entry.updated_at = Some(now);
        entry.last_used = now;
    }

    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        self.entries.lock().get(key).and_then(|e| e.value.clone())
    }

    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .is_some_and(|e| e.fresh_value(now).is_some())
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.entries
            .lock()
            .get(key)
            .is_some_and(|e| e.in_flight.is_some())
    }

    /// Mark every entry under `prefix` stale. Cached values stay readable.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries.lock();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.updated_at = None;
                count += 1;
            }
        }
        count
    }

    pub fn collect_garbage(&self) -> usize {
        let mut entries = self.entries.lock();
        sweep(&mut entries, Instant::now())
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

fn sweep(entries: &mut HashMap<QueryKey, Entry>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|key, entry| {
        let keep = !entry.is_collectable(now);
        if !keep {
            tracing::debug!(%key, "Evicting unused query");
        }
        keep
    });
    before - entries.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn pending_fetch() -> SharedFetch {
        futures::future::pending::<Result<Value, QueryError>>()
            .boxed()
            .shared()
    }

    #[test]
    fn fetch_with_no_waiters_is_collected() {
        let cache = QueryCache::default();
        let key = QueryKey::new(vec!["devices".into()]);

        let Lookup::Miss(id) = cache.lookup(&key, Duration::ZERO, Duration::ZERO) else {
            panic!("expected a miss");
        };
        let waiter = cache.begin(&key, id, pending_fetch(), Duration::ZERO, Duration::ZERO);
        assert_eq!(cache.collect_garbage(), 0);
        assert!(cache.is_fetching(&key));

        drop(waiter);
        assert_eq!(cache.collect_garbage(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn fetch_with_a_waiter_is_kept() {
        let cache = QueryCache::default();
        let key = QueryKey::new(vec!["apps".into()]);

        let Lookup::Miss(id) = cache.lookup(&key, Duration::ZERO, Duration::ZERO) else {
            panic!("expected a miss");
        };
        let _waiter = cache.begin(&key, id, pending_fetch(), Duration::ZERO, Duration::ZERO);

        assert_eq!(cache.collect_garbage(), 0);
        assert_eq!(cache.len(), 1);
    }
}
