//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;
use std::time::Duration;

use confstore::{Confstore, ConnectionString, LocalSource, ServiceConfig, SystemClientConfig, TokenIssuer};
use confstore_core::{ManualClock, Principal, Timestamp};
use confstore_perms::{EncryptionKey, MemoryVault, ProtectionConfig};
use confstore_store::MemoryStore;

/// Id of the fixture's system client.
pub const SYSTEM_CLIENT_ID: &str = "system";

/// Fixture clocks start here (2024-01-01T00:00:00Z).
pub const START_MILLIS: i64 = 1_704_067_200_000;

/// A configuration for tests using the encryption strategy.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        system_id: "test".into(),
        system_client: SystemClientConfig {
            client_id: SYSTEM_CLIENT_ID.into(),
            client_secret: "system-secret".into(),
            friendly_name: "System".into(),
        },
        protection: ProtectionConfig::Encryption {
            key: EncryptionKey::from_bytes([42u8; 32]).to_base64(),
        },
        token_lifetime_secs: 3600,
        page_size: 3,
    }
}

/// A registered client with its credentials.
#[derive(Debug, Clone)]
pub struct TestClient {
    pub client_id: String,
    pub secret: String,
    pub principal: Principal,
}

/// A memory-backed service on a manual clock.
pub struct TestService {
    pub service: Arc<Confstore<MemoryStore>>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub vault: Option<Arc<MemoryVault>>,
    pub system: TestClient,
}

impl TestService {
    /// A service using the encryption protection strategy.
    pub async fn new() -> Self {
        Self::open(test_config(), None).await
    }

    /// A service using the vault protection strategy.
    pub async fn with_vault() -> Self {
        let mut config = test_config();
        config.protection = ProtectionConfig::Vault {
            name_prefix: "clients".into(),
        };
        Self::open(config, Some(Arc::new(MemoryVault::new()))).await
    }

    async fn open(config: ServiceConfig, vault: Option<Arc<MemoryVault>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(START_MILLIS)));
        let system = TestClient {
            client_id: config.system_client.client_id.clone(),
            secret: config.system_client.client_secret.clone(),
            principal: Principal::new(config.system_client.client_id.clone()),
        };

        let service = Confstore::open_with(
            config,
            store.clone(),
            clock.clone(),
            vault.clone().map(|v| v as Arc<dyn confstore_perms::SecretVault>),
        )
        .await
        .expect("fixture service opens");

        Self {
            service: Arc::new(service),
            store,
            clock,
            vault,
            system,
        }
    }

    /// Create a client through the system client.
    pub async fn client(&self, client_id: &str) -> TestClient {
        let response = self
            .service
            .setup_client(&self.system.principal, client_id, client_id)
            .await
            .expect("fixture client is created");
        TestClient {
            client_id: response.client_id.clone(),
            secret: response.client_secret,
            principal: Principal::new(response.client_id),
        }
    }

    /// A token issuer for `client` on the fixture clock.
    pub fn issuer(&self, client: &TestClient) -> TokenIssuer {
        TokenIssuer::new(
            client.client_id.clone(),
            &client.secret,
            Duration::from_secs(3600),
            self.clock.clone(),
        )
    }

    /// A connection string for `client`.
    pub fn connection_string(&self, client: &TestClient) -> ConnectionString {
        ConnectionString {
            endpoint: "memory://confstore".into(),
            client_id: client.client_id.clone(),
            client_secret: client.secret.clone(),
        }
    }

    /// An in-process value source acting as `client`.
    pub fn source(&self, client: &TestClient) -> Arc<LocalSource<MemoryStore>> {
        Arc::new(LocalSource::connect(
            self.service.clone(),
            &self.connection_string(client),
            self.clock.clone(),
        ))
    }

    /// Move the fixture clock forward.
    pub fn advance(&self, millis: i64) {
        self.clock.advance(millis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_clients_authenticate() {
        let fixture = TestService::new().await;
        let alice = fixture.client("alice").await;

        let token = fixture.issuer(&alice).token().unwrap();
        let principal = fixture.service.authenticate(&token).await.unwrap();
        assert_eq!(principal, alice.principal);
    }

    #[tokio::test]
    async fn test_vault_fixture_stores_secrets_in_vault() {
        let fixture = TestService::with_vault().await;
        fixture.client("alice").await;
        // System client plus alice.
        assert_eq!(fixture.vault.as_ref().map(|v| v.len()), Some(2));
    }
}
