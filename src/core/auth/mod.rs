use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};

pub const AZURE_CLIENT_ID_FALLBACK: &str = "00000000402B5328";

/// Opaque session handed over by the account layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub player_name: String,
    pub player_uuid: String,
    /// `msa` for Microsoft accounts, `legacy` for offline play.
    pub user_type: String,
    #[serde(default)]
    pub xuid: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

impl Credentials {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Fails with [`LauncherError::CredentialsExpired`] once `expires_at` has passed.
    pub fn ensure_valid(&self) -> LauncherResult<()> {
        if self.is_expired() {
            return Err(LauncherError::CredentialsExpired {
                expired_at: self.expires_at,
            });
        }
        Ok(())
    }

    pub fn client_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or(AZURE_CLIENT_ID_FALLBACK)
    }

    pub fn xuid(&self) -> &str {
        self.xuid.as_deref().unwrap_or("0")
    }
}

/// Supplies credentials that are already refreshed. The launcher only checks
/// their expiry.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_valid_credentials(&self) -> Option<Credentials>;
}

/// Hands out one fixed set of credentials (offline play, tests).
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    credentials: Option<Credentials>,
}

impl StaticCredentialProvider {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn get_valid_credentials(&self) -> Option<Credentials> {
        self.credentials.clone()
    }
}
