use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use confstore_core::{Timestamp, ValueKind};

use crate::error::{Result, SyncError};
use crate::source::{SyncEntry, ValueSource};

/// A source that replays scripted responses and records every request.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Vec<SyncEntry>>>>,
    pub(crate) requests: Mutex<Vec<(ValueKind, Option<Timestamp>)>>,
}

impl ScriptedSource {
    pub(crate) fn push_ok(&self, entries: &[(&str, &str)]) {
        let entries = entries.iter().map(|(k, v)| SyncEntry::new(*k, *v)).collect();
        self.responses.lock().unwrap().push_back(Ok(entries));
    }

    pub(crate) fn push_err(&self) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(SyncError::Unavailable("connection refused".into())));
    }

    pub(crate) fn requests(&self) -> Vec<(ValueKind, Option<Timestamp>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ValueSource for ScriptedSource {
    async fn fetch_values(
        &self,
        kind: ValueKind,
        since: Option<Timestamp>,
    ) -> Result<Vec<SyncEntry>> {
        self.requests.lock().unwrap().push((kind, since));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
