//! One detector per value kind, behind a single read API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use confstore_core::{Clock, ValueKind};

use crate::detector::{ChangeDetector, DetectorHandle};
use crate::source::ValueSource;

/// Default refresh interval for settings.
pub const DEFAULT_SETTINGS_REFRESH: Duration = Duration::from_secs(5 * 60);

/// Which kinds to synchronize and how often to poll each.
///
/// A kind without a refresh interval is loaded once at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    pub kinds: Vec<ValueKind>,
    pub configuration_refresh: Option<Duration>,
    pub settings_refresh: Option<Duration>,
    pub secrets_refresh: Option<Duration>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            kinds: ValueKind::ALL.to_vec(),
            configuration_refresh: None,
            settings_refresh: Some(DEFAULT_SETTINGS_REFRESH),
            secrets_refresh: None,
        }
    }
}

impl SyncOptions {
    /// Poll interval for `kind`.
    pub fn refresh_interval(&self, kind: ValueKind) -> Option<Duration> {
        match kind {
            ValueKind::Configuration => self.configuration_refresh,
            ValueKind::Setting => self.settings_refresh,
            ValueKind::Secret => self.secrets_refresh,
        }
        .filter(|d| !d.is_zero())
    }

    pub fn with_refresh(mut self, kind: ValueKind, interval: Option<Duration>) -> Self {
        match kind {
            ValueKind::Configuration => self.configuration_refresh = interval,
            ValueKind::Setting => self.settings_refresh = interval,
            ValueKind::Secret => self.secrets_refresh = interval,
        }
        self
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = ValueKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }
}

/// Client-side view of every synchronized kind.
pub struct SyncProvider {
    detectors: HashMap<ValueKind, ChangeDetector>,
    handles: Vec<DetectorHandle>,
}

impl SyncProvider {
    /// Load every configured kind and start the polling loops.
    pub async fn start(
        source: Arc<dyn ValueSource>,
        clock: Arc<dyn Clock>,
        options: &SyncOptions,
    ) -> Self {
        let mut detectors = HashMap::new();
        let mut handles = Vec::new();

        for &kind in &options.kinds {
            if detectors.contains_key(&kind) {
                continue;
            }
            let detector = ChangeDetector::start(kind, source.clone(), clock.clone()).await;
            if let Some(period) = options.refresh_interval(kind) {
                handles.push(detector.spawn(period));
            }
            detectors.insert(kind, detector);
        }

        Self { detectors, handles }
    }

    /// Cached value of `key` in `kind`.
    pub fn get(&self, kind: ValueKind, key: &str) -> Option<String> {
        self.detectors.get(&kind)?.get(key)
    }

    /// Copy of every cached value of `kind`.
    pub fn snapshot(&self, kind: ValueKind) -> HashMap<String, String> {
        self.detectors
            .get(&kind)
            .map(ChangeDetector::snapshot)
            .unwrap_or_default()
    }

    pub fn detector(&self, kind: ValueKind) -> Option<&ChangeDetector> {
        self.detectors.get(&kind)
    }

    /// Reload every kind now, regardless of its interval.
    pub async fn reload_all(&self) {
        for detector in self.detectors.values() {
            detector.reload().await;
        }
    }

    /// Stop all polling loops.
    pub async fn shutdown(self) {
        for handle in self.handles {
            handle.shutdown().await;
        }
    }
}
