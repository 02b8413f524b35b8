//! Tenant identities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A registered client.
///
/// `protected_secret` is the output of a secret protection strategy; the
/// raw secret is never stored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub client_id: String,
    pub friendly_name: String,
    pub protected_secret: String,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("friendly_name", &self.friendly_name)
            .finish_non_exhaustive()
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    pub client_id: String,
}

impl Principal {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }

    /// The owner identity used by permission records.
    pub fn owner(&self) -> &str {
        &self.client_id
    }
}
