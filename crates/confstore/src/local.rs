//! In-process [`ValueSource`] for embedding a synchronizing client next to
//! the service.
//!
//! Requests go through the same token check a remote client would pass.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;

use confstore_core::{Clock, Timestamp, ValueKind};
use confstore_store::TableStore;
use confstore_sync::{SyncEntry, SyncError, ValueSource};

use crate::config::ConnectionString;
use crate::error::Error;
use crate::service::Confstore;
use crate::token::{TokenIssuer, DEFAULT_TOKEN_LIFETIME};

/// Fetches values from a [`Confstore`] in the same process.
pub struct LocalSource<S: TableStore + ?Sized> {
    service: Arc<Confstore<S>>,
    issuer: TokenIssuer,
}

impl<S: TableStore + ?Sized> LocalSource<S> {
    pub fn new(service: Arc<Confstore<S>>, issuer: TokenIssuer) -> Self {
        Self { service, issuer }
    }

    /// Connect as the client named in `connection`. The endpoint is ignored.
    pub fn connect(
        service: Arc<Confstore<S>>,
        connection: &ConnectionString,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let issuer = TokenIssuer::new(
            connection.client_id.clone(),
            &connection.client_secret,
            DEFAULT_TOKEN_LIFETIME,
            clock,
        );
        Self::new(service, issuer)
    }
}

fn to_sync_error(e: Error) -> SyncError {
    match e {
        Error::Unauthenticated(msg) => SyncError::Unauthenticated(msg),
        Error::Store(e) => SyncError::Unavailable(e.to_string()),
        other => SyncError::Source(other.to_string()),
    }
}

#[async_trait]
impl<S: TableStore + ?Sized + 'static> ValueSource for LocalSource<S> {
    async fn fetch_values(
        &self,
        kind: ValueKind,
        since: Option<Timestamp>,
    ) -> Result<Vec<SyncEntry>, SyncError> {
        let header = self.issuer.bearer().map_err(to_sync_error)?;
        let principal = self
            .service
            .authenticate_header(&header)
            .await
            .map_err(to_sync_error)?;

        let records = self
            .service
            .get_values(&principal, kind, since)
            .try_collect::<Vec<_>>()
            .await
            .map_err(to_sync_error)?;

        Ok(records
            .into_iter()
            .map(|r| SyncEntry::new(r.key, r.value))
            .collect())
    }
}
