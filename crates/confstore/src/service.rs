//! The Confstore service: one entry point per route.
//!
//! Every call except authentication takes the [`Principal`] the caller was
//! authenticated as. Permission checks happen here; the services below
//! trust their callers.

use std::sync::Arc;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use confstore_core::{
    Capabilities, ChangeRecord, Clock, ContentHash, NewValue, Principal, SystemClock, Timestamp,
    ValueKind, ValueKindDescriptor, ValueRecord, VersionId,
};
use confstore_perms::{PermissionService, SecretVault};
use confstore_store::TableStore;

use crate::changes::ChangeLogService;
use crate::clients::ClientService;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::token::TokenValidator;
use crate::values::{AddOutcome, ValueService};

/// Per-key result of [`Confstore::add_values`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
}

impl AddReport {
    fn record(&mut self, key: String, outcome: AddOutcome) {
        match outcome {
            AddOutcome::Created => self.created.push(key),
            AddOutcome::Updated => self.updated.push(key),
            AddOutcome::Unchanged => self.unchanged.push(key),
        }
    }

    /// Number of keys that got a new version.
    pub fn written(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

/// A newly created client and its raw secret.
///
/// This is the only time the raw secret is available.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupClientResponse {
    pub client_id: String,
    pub friendly_name: String,
    pub client_secret: String,
}

impl std::fmt::Debug for SetupClientResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupClientResponse")
            .field("client_id", &self.client_id)
            .field("friendly_name", &self.friendly_name)
            .finish_non_exhaustive()
    }
}

/// The service.
pub struct Confstore<S: TableStore + ?Sized> {
    system_client_id: String,
    configuration: ValueService<S>,
    settings: ValueService<S>,
    secrets: ValueService<S>,
    permissions: Arc<PermissionService<S>>,
    changes: Arc<ChangeLogService<S>>,
    clients: Arc<ClientService<S>>,
    tokens: TokenValidator<S>,
    clock: Arc<dyn Clock>,
}

impl<S: TableStore + ?Sized> Confstore<S> {
    /// Open the service over `store` with the system clock.
    ///
    /// Only the encryption protection strategy can be used this way; the
    /// vault strategy needs [`open_with`](Self::open_with).
    pub async fn open(config: ServiceConfig, store: Arc<S>) -> Result<Self> {
        Self::open_with(config, store, SystemClock::shared(), None).await
    }

    /// Open the service with an explicit clock and vault.
    ///
    /// Registers the configured system client.
    pub async fn open_with(
        config: ServiceConfig,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        vault: Option<Arc<dyn SecretVault>>,
    ) -> Result<Self> {
        config.validate()?;

        let system_id = config.system_id.as_str();
        let protector = config.protection.build(vault)?;

        let permissions = Arc::new(
            PermissionService::new(store.clone(), system_id).with_page_size(config.page_size),
        );
        let changes = Arc::new(
            ChangeLogService::new(store.clone(), system_id, clock.clone())
                .with_page_size(config.page_size),
        );
        let clients = Arc::new(ClientService::new(store.clone(), system_id, protector));
        let tokens = TokenValidator::new(clients.clone(), clock.clone());

        let value_service = |kind| {
            ValueService::new(
                ValueKindDescriptor::new(kind, system_id),
                store.clone(),
                permissions.clone(),
                changes.clone(),
                clock.clone(),
            )
            .with_page_size(config.page_size)
        };
        let configuration = value_service(ValueKind::Configuration);
        let settings = value_service(ValueKind::Setting);
        let secrets = value_service(ValueKind::Secret);

        let system = &config.system_client;
        clients
            .register_client(&system.client_id, &system.friendly_name, &system.client_secret)
            .await?;

        tracing::info!(system_id, system_client = %system.client_id, "confstore opened");

        Ok(Self {
            system_client_id: system.client_id.clone(),
            configuration,
            settings,
            secrets,
            permissions,
            changes,
            clients,
            tokens,
            clock,
        })
    }

    /// The value service of `kind`.
    pub fn values(&self, kind: ValueKind) -> &ValueService<S> {
        match kind {
            ValueKind::Configuration => &self.configuration,
            ValueKind::Setting => &self.settings,
            ValueKind::Secret => &self.secrets,
        }
    }

    pub fn permissions(&self) -> &PermissionService<S> {
        &self.permissions
    }

    pub fn changes(&self) -> &ChangeLogService<S> {
        &self.changes
    }

    pub fn clients(&self) -> &ClientService<S> {
        &self.clients
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authentication
    // ─────────────────────────────────────────────────────────────────────────

    /// Identify the caller from a bearer token.
    pub async fn authenticate(&self, token: &str) -> Result<Principal> {
        self.tokens.authenticate(token).await
    }

    /// Identify the caller from an `Authorization` header value.
    pub async fn authenticate_header(&self, header: &str) -> Result<Principal> {
        self.tokens.authenticate_header(header).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Values
    // ─────────────────────────────────────────────────────────────────────────

    /// `GET /{kind}[?since]`: current values the caller can read.
    ///
    /// The stream is lazy: each value is fetched as it is polled, and
    /// dropping the stream stops further store round trips.
    pub fn get_values<'a>(
        &'a self,
        principal: &'a Principal,
        kind: ValueKind,
        since: Option<Timestamp>,
    ) -> BoxStream<'a, Result<ValueRecord>> {
        let values = self.values(kind);
        match since {
            Some(since) => values.get_values_since(principal.owner(), since),
            None => values.get_values(principal.owner()),
        }
    }

    /// `POST /{kind}`: write a batch of values.
    ///
    /// Every entry is validated, then every key is checked for write
    /// permission, before anything is written. A claimed key needs `WRITE`;
    /// an unclaimed one is open to its first writer. Later entries
    /// overwrite earlier ones with the same key.
    pub async fn add_values(
        &self,
        principal: &Principal,
        kind: ValueKind,
        entries: &[NewValue],
    ) -> Result<AddReport> {
        let values = self.values(kind);
        let owner = principal.owner();

        for entry in entries {
            values.descriptor().validate(&entry.key, &entry.value)?;
        }

        for entry in entries {
            if !self.permissions.can_write(kind, owner, &entry.key).await? {
                tracing::debug!(kind = %kind, key = %entry.key, owner, "write denied");
                return Err(Error::PermissionDenied(format!(
                    "{} may not write {} {}",
                    owner, kind, entry.key
                )));
            }
        }

        let mut report = AddReport::default();
        for entry in entries {
            let outcome = values
                .add_value(
                    owner,
                    &entry.key,
                    &entry.value,
                    ContentHash::of(&entry.value),
                )
                .await?;
            report.record(entry.key.clone(), outcome);
        }
        Ok(report)
    }

    /// `GET /diff/{kind}?since`: keys changed at or after `since` that the
    /// caller can read.
    pub async fn get_diff(
        &self,
        principal: &Principal,
        kind: ValueKind,
        since: Timestamp,
    ) -> Result<Vec<ChangeRecord>> {
        let mut readable = Vec::new();
        for change in self.changes.get_changes_since(kind, since).await? {
            if self
                .permissions
                .has_capability(kind, principal.owner(), &change.key, Capabilities::READ)
                .await?
            {
                readable.push(change);
            }
        }
        Ok(readable)
    }

    /// One version of a value. Values the caller cannot read are reported
    /// as not found.
    pub async fn get_value(
        &self,
        principal: &Principal,
        kind: ValueKind,
        key: &str,
        version: &VersionId,
    ) -> Result<ValueRecord> {
        let not_found = || Error::NotFound(format!("{} {} version {}", kind, key, version));

        if !self
            .permissions
            .has_capability(kind, principal.owner(), key, Capabilities::READ)
            .await?
        {
            return Err(not_found());
        }
        self.values(kind)
            .get_value(key, version)
            .await?
            .ok_or_else(not_found)
    }

    /// Label a version of a value the caller can write.
    pub async fn tag_value(
        &self,
        principal: &Principal,
        kind: ValueKind,
        key: &str,
        version: &VersionId,
        tag: &str,
    ) -> Result<ValueRecord> {
        self.require(principal, kind, key, Capabilities::WRITE).await?;
        self.values(kind)
            .tag_value(principal.owner(), key, version, tag)
            .await
    }

    /// Grant `grantee` `capabilities` over a key the caller may permit on.
    pub async fn permit(
        &self,
        principal: &Principal,
        kind: ValueKind,
        key: &str,
        grantee: &str,
        capabilities: Capabilities,
    ) -> Result<()> {
        self.require(principal, kind, key, Capabilities::PERMIT).await?;
        if self.clients.get_client(grantee).await?.is_none() {
            return Err(Error::NotFound(format!("client {}", grantee)));
        }

        self.permissions
            .set_permission(kind, grantee, key, capabilities)
            .await?;
        tracing::info!(
            kind = %kind,
            key,
            grantor = principal.owner(),
            grantee,
            capabilities = ?capabilities,
            "permission granted"
        );
        Ok(())
    }

    async fn require(
        &self,
        principal: &Principal,
        kind: ValueKind,
        key: &str,
        required: Capabilities,
    ) -> Result<()> {
        if self
            .permissions
            .has_capability(kind, principal.owner(), key, required)
            .await?
        {
            Ok(())
        } else {
            Err(Error::PermissionDenied(format!(
                "{} lacks {:?} on {} {}",
                principal.owner(),
                required,
                kind,
                key
            )))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Clients
    // ─────────────────────────────────────────────────────────────────────────

    /// `POST /setup/client`: create a client. Only the system client may
    /// call this.
    pub async fn setup_client(
        &self,
        principal: &Principal,
        client_id: &str,
        friendly_name: &str,
    ) -> Result<SetupClientResponse> {
        if principal.client_id != self.system_client_id {
            return Err(Error::PermissionDenied(format!(
                "{} may not create clients",
                principal.client_id
            )));
        }

        let (client, client_secret) = self.clients.create_client(client_id, friendly_name).await?;
        Ok(SetupClientResponse {
            client_id: client.client_id,
            friendly_name: client.friendly_name,
            client_secret,
        })
    }
}
