//! Polling change detector.
//!
//! A [`ChangeDetector`] owns the [`SyncCache`] of one value kind. The first
//! load fetches everything; every later load asks only for keys changed
//! since the previous successful load and merges them in. Failed loads are
//! logged and leave the cache untouched, so readers keep serving the last
//! known values.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use confstore_core::{Clock, Timestamp, ValueKind};

use crate::cache::SyncCache;
use crate::error::Result;
use crate::source::ValueSource;

struct Shared {
    kind: ValueKind,
    source: Arc<dyn ValueSource>,
    clock: Arc<dyn Clock>,
    cache: RwLock<SyncCache>,
    /// Serializes loads so two never interleave their merges.
    load_lock: Mutex<()>,
    changes: watch::Sender<u64>,
}

/// Keeps the local cache of one value kind in step with a [`ValueSource`].
#[derive(Clone)]
pub struct ChangeDetector {
    shared: Arc<Shared>,
}

impl ChangeDetector {
    /// Create a detector with an empty cache without loading anything.
    pub fn new(kind: ValueKind, source: Arc<dyn ValueSource>, clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                kind,
                source,
                clock,
                cache: RwLock::new(SyncCache::new()),
                load_lock: Mutex::new(()),
                changes,
            }),
        }
    }

    /// Create a detector and perform the initial full load.
    ///
    /// A failed initial load leaves the cache empty; the next reload
    /// retries the full load.
    pub async fn start(
        kind: ValueKind,
        source: Arc<dyn ValueSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let detector = Self::new(kind, source, clock);
        detector.reload().await;
        detector
    }

    pub fn kind(&self) -> ValueKind {
        self.shared.kind
    }

    /// Cached value of `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.cache().get(key).map(str::to_string)
    }

    /// Copy of every cached value.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.cache().values()
    }

    /// Start time of the last successful load.
    pub fn last_detection_at(&self) -> Option<Timestamp> {
        self.cache().last_detection_at()
    }

    /// Receiver whose value increments after every load that changed the
    /// cache.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.changes.subscribe()
    }

    /// Fetch changes and merge them into the cache.
    ///
    /// Returns whether the cache changed. Errors are logged and swallowed.
    pub async fn reload(&self) -> bool {
        match self.load().await {
            Ok(changed) => changed,
            Err(e) => {
                warn!(
                    kind = %self.shared.kind,
                    error = %e,
                    "value reload failed, keeping cached values"
                );
                false
            }
        }
    }

    async fn load(&self) -> Result<bool> {
        let _guard = self.shared.load_lock.lock().await;

        let started = self.shared.clock.now();
        let since = self.cache().last_detection_at();

        let entries = self
            .shared
            .source
            .fetch_values(self.shared.kind, since)
            .await?;
        let fetched = entries.len();

        let changed = {
            let mut cache = self.cache_mut();
            match since {
                None => cache.replace(entries, started),
                Some(_) => cache.merge(entries, started),
            }
        };

        if changed {
            self.shared.changes.send_modify(|generation| *generation += 1);
        }

        debug!(
            kind = %self.shared.kind,
            full = since.is_none(),
            fetched,
            changed,
            "values loaded"
        );
        Ok(changed)
    }

    /// Reload every `period` on a background task until the returned
    /// handle is dropped or shut down.
    ///
    /// Each reload completes before the next tick is awaited, and ticks
    /// missed while a reload was running are skipped.
    pub fn spawn(&self, period: Duration) -> DetectorHandle {
        let cancel = CancellationToken::new();
        let detector = self.clone();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;

            info!(
                kind = %detector.kind(),
                interval_ms = period.as_millis() as u64,
                "change detector started"
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!(kind = %detector.kind(), "change detector stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        detector.reload().await;
                    }
                }
            }
        });

        DetectorHandle {
            cancel,
            task: Some(task),
        }
    }

    fn cache(&self) -> RwLockReadGuard<'_, SyncCache> {
        self.shared
            .cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cache_mut(&self) -> RwLockWriteGuard<'_, SyncCache> {
        self.shared
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Stops a spawned detector loop when dropped.
pub struct DetectorHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DetectorHandle {
    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedSource;
    use confstore_core::ManualClock;

    fn setup() -> (Arc<ScriptedSource>, Arc<ManualClock>) {
        (
            Arc::new(ScriptedSource::default()),
            Arc::new(ManualClock::new(Timestamp::from_millis(1_000))),
        )
    }

    #[tokio::test]
    async fn test_start_does_full_load() {
        let (source, clock) = setup();
        source.push_ok(&[("a", "1"), ("b", "2")]);

        let detector = ChangeDetector::start(ValueKind::Setting, source.clone(), clock).await;

        assert_eq!(detector.get("a").as_deref(), Some("1"));
        assert_eq!(detector.snapshot().len(), 2);
        assert_eq!(detector.last_detection_at(), Some(Timestamp::from_millis(1_000)));
        assert_eq!(source.requests(), vec![(ValueKind::Setting, None)]);
    }

    #[tokio::test]
    async fn test_reload_asks_since_last_success_and_merges() {
        let (source, clock) = setup();
        source.push_ok(&[("a", "1"), ("b", "2")]);
        let detector =
            ChangeDetector::start(ValueKind::Setting, source.clone(), clock.clone()).await;

        clock.advance(500);
        source.push_ok(&[("b", "3"), ("c", "4")]);
        assert!(detector.reload().await);

        assert_eq!(detector.get("a").as_deref(), Some("1"));
        assert_eq!(detector.get("b").as_deref(), Some("3"));
        assert_eq!(detector.get("c").as_deref(), Some("4"));
        assert_eq!(
            source.requests()[1],
            (ValueKind::Setting, Some(Timestamp::from_millis(1_000)))
        );
        assert_eq!(detector.last_detection_at(), Some(Timestamp::from_millis(1_500)));
    }

    #[tokio::test]
    async fn test_recased_key_in_diff_overwrites_cached_value() {
        let (source, clock) = setup();
        source.push_ok(&[("Db.Host", "one")]);
        let detector =
            ChangeDetector::start(ValueKind::Configuration, source.clone(), clock.clone()).await;

        clock.advance(500);
        source.push_ok(&[("db.host", "two")]);
        assert!(detector.reload().await);

        assert_eq!(detector.get("Db.Host").as_deref(), Some("two"));
        assert_eq!(detector.get("db.host").as_deref(), Some("two"));
        let snapshot = detector.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("db.host").map(String::as_str), Some("two"));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_cache_and_watermark() {
        let (source, clock) = setup();
        source.push_ok(&[("a", "1")]);
        let detector =
            ChangeDetector::start(ValueKind::Configuration, source.clone(), clock.clone()).await;

        clock.advance(500);
        source.push_err();
        assert!(!detector.reload().await);

        assert_eq!(detector.get("a").as_deref(), Some("1"));
        assert_eq!(detector.last_detection_at(), Some(Timestamp::from_millis(1_000)));

        // The retry still asks from the last successful load.
        clock.advance(500);
        source.push_ok(&[("a", "2")]);
        assert!(detector.reload().await);
        assert_eq!(
            source.requests()[2].1,
            Some(Timestamp::from_millis(1_000))
        );
        assert_eq!(detector.get("a").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_failed_start_retries_full_load() {
        let (source, clock) = setup();
        source.push_err();
        let detector = ChangeDetector::start(ValueKind::Secret, source.clone(), clock).await;
        assert!(detector.snapshot().is_empty());
        assert_eq!(detector.last_detection_at(), None);

        source.push_ok(&[("s", "x")]);
        detector.reload().await;
        assert_eq!(source.requests()[1], (ValueKind::Secret, None));
        assert_eq!(detector.get("s").as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes_only() {
        let (source, clock) = setup();
        source.push_ok(&[("a", "1")]);
        let detector = ChangeDetector::start(ValueKind::Setting, source.clone(), clock).await;
        let rx = detector.subscribe();
        assert_eq!(*rx.borrow(), 1);

        source.push_ok(&[("a", "1")]);
        detector.reload().await;
        assert_eq!(*rx.borrow(), 1);

        source.push_ok(&[("a", "2")]);
        detector.reload().await;
        assert_eq!(*rx.borrow(), 2);
    }

    #[tokio::test]
    async fn test_spawned_loop_reloads_until_shutdown() {
        let (source, clock) = setup();
        source.push_ok(&[("a", "1")]);
        let detector = ChangeDetector::start(ValueKind::Setting, source.clone(), clock).await;
        source.push_ok(&[("a", "2")]);

        let mut rx = detector.subscribe();
        let handle = detector.spawn(Duration::from_millis(10));
        assert!(handle.is_running());

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("detector did not reload")
            .unwrap();
        assert_eq!(detector.get("a").as_deref(), Some("2"));

        handle.shutdown().await;
        let polled = source.requests().len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.requests().len(), polled);
    }
}
