//! Bearer tokens signed with a per-client shared secret.
//!
//! A client proves its identity with a short-lived HS256 JWT whose `sub`
//! claim is its client id. Both sides derive the HMAC key from the client
//! secret with BLAKE3, so the secret itself never goes over the wire.
//!
//! The server reads the unverified `sub` first to find which client's key
//! to check the signature with; nothing in the token is trusted until that
//! check passes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use confstore_core::{Clock, Principal};
use confstore_store::TableStore;

use crate::clients::ClientService;
use crate::error::{Error, Result};

/// Context string for deriving token signing keys.
pub const SIGNING_KEY_CONTEXT: &str = "confstore 2024-06-01 client token signing key";

/// Default token lifetime.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// HMAC key for tokens of the client holding `secret`.
pub fn signing_key(secret: &str) -> [u8; 32] {
    blake3::derive_key(SIGNING_KEY_CONTEXT, secret.as_bytes())
}

/// Token claims. Times are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct SubjectOnly {
    sub: String,
}

/// Read the `sub` claim without checking the signature.
fn unverified_subject(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice::<SubjectOnly>(&bytes)
        .ok()
        .map(|claims| claims.sub)
}

/// Issues tokens for one client, reusing each until it nears expiry.
pub struct TokenIssuer {
    client_id: String,
    key: [u8; 32],
    lifetime: Duration,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<(String, i64)>>,
}

impl TokenIssuer {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: &str,
        lifetime: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            key: signing_key(client_secret),
            lifetime: lifetime.max(Duration::from_secs(1)),
            clock,
            cached: Mutex::new(None),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// A fresh token is minted once less than a quarter of the lifetime
    /// remains on the cached one.
    fn refresh_margin(&self) -> i64 {
        (self.lifetime.as_secs() / 4) as i64
    }

    /// A valid token for this client.
    pub fn token(&self) -> Result<String> {
        let now = self.clock.now().as_secs();
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some((token, exp)) = cached.as_ref() {
            if now + self.refresh_margin() < *exp {
                return Ok(token.clone());
            }
        }

        let claims = Claims {
            sub: self.client_id.clone(),
            iat: now,
            exp: now + self.lifetime.as_secs() as i64,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.key),
        )
        .map_err(|e| Error::Token(e.to_string()))?;

        *cached = Some((token.clone(), claims.exp));
        Ok(token)
    }

    /// The token in `Authorization` header form.
    pub fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.token()?))
    }
}

/// Verifies client tokens.
pub struct TokenValidator<S: TableStore + ?Sized> {
    clients: Arc<ClientService<S>>,
    clock: Arc<dyn Clock>,
}

impl<S: TableStore + ?Sized> TokenValidator<S> {
    pub fn new(clients: Arc<ClientService<S>>, clock: Arc<dyn Clock>) -> Self {
        Self { clients, clock }
    }

    /// Identify the client that signed `token`.
    ///
    /// A token is accepted only when it is signed with the key of the
    /// client named in `sub` and the current time is before `exp`.
    pub async fn authenticate(&self, token: &str) -> Result<Principal> {
        let Some(client_id) = unverified_subject(token) else {
            return Err(reject("malformed token"));
        };

        let Some(client) = self.clients.get_client(&client_id).await? else {
            return Err(reject(&format!("unknown client {}", client_id)));
        };

        let secret = match self.clients.receive_client_secret(&client).await {
            Ok(secret) => secret,
            Err(Error::Store(e)) => return Err(Error::Store(e)),
            Err(e) => return Err(reject(&format!("client {} secret: {}", client_id, e))),
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        let claims = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(&signing_key(&secret)),
            &validation,
        )
        .map_err(|e| reject(&format!("client {}: {}", client_id, e)))?
        .claims;

        if claims.sub != client_id {
            return Err(reject("subject mismatch"));
        }
        if self.clock.now().as_secs() >= claims.exp {
            return Err(reject(&format!("client {}: token expired", client_id)));
        }

        Ok(Principal::new(client_id))
    }

    /// Identify the client from an `Authorization: Bearer <token>` header.
    pub async fn authenticate_header(&self, header: &str) -> Result<Principal> {
        let header = header.trim();
        match header.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
                self.authenticate(token.trim()).await
            }
            _ => Err(reject("expected bearer authorization")),
        }
    }
}

fn reject(reason: &str) -> Error {
    tracing::warn!(reason, "token rejected");
    Error::Unauthenticated(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use confstore_core::{ManualClock, Timestamp};
    use confstore_perms::{EncryptionKey, EncryptionProtector};
    use confstore_store::MemoryStore;

    struct Harness {
        clock: Arc<ManualClock>,
        validator: TokenValidator<MemoryStore>,
        secret: String,
    }

    async fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_700_000_000_000)));
        let clients = Arc::new(ClientService::new(
            Arc::new(MemoryStore::new()),
            "t",
            Arc::new(EncryptionProtector::new(EncryptionKey::generate())),
        ));
        let (_, secret) = clients.create_client("app", "App").await.unwrap();
        Harness {
            validator: TokenValidator::new(clients, clock.clone()),
            clock,
            secret,
        }
    }

    fn issuer(h: &Harness, lifetime_secs: u64) -> TokenIssuer {
        TokenIssuer::new(
            "app",
            &h.secret,
            Duration::from_secs(lifetime_secs),
            h.clock.clone(),
        )
    }

    #[test]
    fn test_unverified_subject() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                sub: "app".into(),
                iat: 0,
                exp: 10,
            },
            &EncodingKey::from_secret(b"k"),
        )
        .unwrap();
        assert_eq!(unverified_subject(&token).as_deref(), Some("app"));
        assert_eq!(unverified_subject("garbage"), None);
        assert_eq!(unverified_subject("a.b.c"), None);
    }

    #[test]
    fn test_signing_key_depends_on_secret() {
        assert_eq!(signing_key("a"), signing_key("a"));
        assert_ne!(signing_key("a"), signing_key("b"));
    }

    #[tokio::test]
    async fn test_valid_token_authenticates() {
        let h = harness().await;
        let token = issuer(&h, 60).token().unwrap();
        let principal = h.validator.authenticate(&token).await.unwrap();
        assert_eq!(principal.client_id, "app");
    }

    #[tokio::test]
    async fn test_token_validity_window() {
        let h = harness().await;
        let token = issuer(&h, 60).token().unwrap();

        h.clock.advance(59_999);
        assert!(h.validator.authenticate(&token).await.is_ok());

        h.clock.advance(1);
        assert!(matches!(
            h.validator.authenticate(&token).await,
            Err(Error::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let h = harness().await;
        let forged = TokenIssuer::new("app", "not-the-secret", Duration::from_secs(60), h.clock.clone())
            .token()
            .unwrap();
        assert!(matches!(
            h.validator.authenticate(&forged).await,
            Err(Error::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_client_rejected() {
        let h = harness().await;
        let token = TokenIssuer::new("ghost", &h.secret, Duration::from_secs(60), h.clock.clone())
            .token()
            .unwrap();
        assert!(matches!(
            h.validator.authenticate(&token).await,
            Err(Error::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_bearer_header() {
        let h = harness().await;
        let header = issuer(&h, 60).bearer().unwrap();
        assert!(h.validator.authenticate_header(&header).await.is_ok());

        let lower = header.replacen("Bearer", "bearer", 1);
        assert!(h.validator.authenticate_header(&lower).await.is_ok());

        assert!(matches!(
            h.validator.authenticate_header("Basic abc").await,
            Err(Error::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_issuer_caches_until_margin() {
        let h = harness().await;
        let issuer = issuer(&h, 400);
        let first = issuer.token().unwrap();

        h.clock.advance(200_000);
        assert_eq!(issuer.token().unwrap(), first);

        h.clock.advance(100_000);
        let second = issuer.token().unwrap();
        assert_ne!(second, first);
        assert!(h.validator.authenticate(&second).await.is_ok());
    }
}
