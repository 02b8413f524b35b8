//! Client registry.
//!
//! Each client is one row of the clients table holding its id, display
//! name, and protected secret. The raw secret is generated here, returned
//! to the caller once, and never persisted.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use confstore_core::{validate_identifier, ClientIdentity, ValidationError};
use confstore_perms::SecretProtector;
use confstore_store::{Entity, InsertResult, StoreExt, TableStore};

use crate::error::{Error, Result};

/// Random bytes in a generated client secret.
pub const SECRET_LEN: usize = 64;

/// Maximum client id length in characters.
pub const MAX_CLIENT_ID_LEN: usize = 64;

/// Maximum friendly name length in characters.
pub const MAX_FRIENDLY_NAME_LEN: usize = 256;

#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct ClientEntry(ClientIdentity);

impl Entity for ClientEntry {
    fn partition_key(&self) -> String {
        self.0.client_id.clone()
    }

    fn row_key(&self) -> String {
        self.0.client_id.clone()
    }
}

/// A freshly generated client secret.
fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

fn validate_client(client_id: &str, friendly_name: &str) -> Result<()> {
    validate_identifier("client_id", client_id, MAX_CLIENT_ID_LEN)?;
    if friendly_name.trim().is_empty() {
        return Err(ValidationError::Empty {
            field: "friendly_name",
        }
        .into());
    }
    let len = friendly_name.chars().count();
    if len > MAX_FRIENDLY_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "friendly_name",
            len,
            max: MAX_FRIENDLY_NAME_LEN,
        }
        .into());
    }
    Ok(())
}

/// Creates and looks up clients.
pub struct ClientService<S: TableStore + ?Sized> {
    store: Arc<S>,
    table: String,
    protector: Arc<dyn SecretProtector>,
}

impl<S: TableStore + ?Sized> ClientService<S> {
    pub fn new(store: Arc<S>, system_id: &str, protector: Arc<dyn SecretProtector>) -> Self {
        Self {
            store,
            table: format!("{}Clients", system_id),
            protector,
        }
    }

    /// Register a new client with a generated secret.
    ///
    /// Returns the stored identity and the raw secret. The raw secret
    /// cannot be recovered from the identity by anyone without the
    /// deployment's protection key or vault access.
    pub async fn create_client(
        &self,
        client_id: &str,
        friendly_name: &str,
    ) -> Result<(ClientIdentity, String)> {
        validate_client(client_id, friendly_name)?;

        if self.get_client(client_id).await?.is_some() {
            return Err(Error::ClientExists(client_id.to_string()));
        }

        let secret = generate_secret();
        let client = ClientIdentity {
            client_id: client_id.to_string(),
            friendly_name: friendly_name.to_string(),
            protected_secret: self.protector.protect(&secret).await?,
        };

        match self
            .store
            .insert_entity(&self.table, &ClientEntry(client.clone()))
            .await?
        {
            InsertResult::Inserted => {
                tracing::info!(client_id, friendly_name, "client created");
                Ok((client, secret))
            }
            InsertResult::AlreadyExists => {
                self.discard_secret(client_id, &client.protected_secret).await;
                Err(Error::ClientExists(client_id.to_string()))
            }
        }
    }

    /// Register a client whose secret is already known.
    ///
    /// Re-registering with the same secret is a no-op. A different secret
    /// replaces the stored one and releases the old protected value.
    pub async fn register_client(
        &self,
        client_id: &str,
        friendly_name: &str,
        secret: &str,
    ) -> Result<ClientIdentity> {
        validate_client(client_id, friendly_name)?;
        if secret.is_empty() {
            return Err(ValidationError::Empty {
                field: "client_secret",
            }
            .into());
        }

        let mut stale = None;
        if let Some(existing) = self.get_client(client_id).await? {
            match self.protector.unprotect(&existing.protected_secret).await {
                Ok(stored) if stored == secret => return Ok(existing),
                Ok(_) => tracing::info!(client_id, "client secret replaced"),
                Err(e) => {
                    tracing::warn!(client_id, error = %e, "stored client secret unreadable, replacing")
                }
            }
            stale = Some(existing.protected_secret);
        }

        let client = ClientIdentity {
            client_id: client_id.to_string(),
            friendly_name: friendly_name.to_string(),
            protected_secret: self.protector.protect(secret).await?,
        };
        self.store
            .upsert_entity(&self.table, &ClientEntry(client.clone()))
            .await?;
        if let Some(stale) = stale {
            self.discard_secret(client_id, &stale).await;
        }
        tracing::info!(client_id, "client registered");
        Ok(client)
    }

    /// Release a protected secret that no stored client refers to.
    async fn discard_secret(&self, client_id: &str, protected: &str) {
        if let Err(e) = self.protector.discard(protected).await {
            tracing::warn!(client_id, error = %e, "failed to discard unused client secret");
        }
    }

    pub async fn get_client(&self, client_id: &str) -> Result<Option<ClientIdentity>> {
        let entry: Option<ClientEntry> = self
            .store
            .get_entity(&self.table, client_id, client_id)
            .await?;
        Ok(entry.map(|e| e.0))
    }

    /// Recover the raw secret of `client`.
    pub async fn receive_client_secret(&self, client: &ClientIdentity) -> Result<String> {
        Ok(self.protector.unprotect(&client.protected_secret).await?)
    }
}
