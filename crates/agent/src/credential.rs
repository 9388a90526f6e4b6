use std::env;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use stayfinder_core::config::CredentialStrategy;

/// Resource scope requested for every token.
const TOKEN_RESOURCE: &str = "https://ai.azure.com";

const MSI_API_VERSION: &str = "2019-08-01";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credential source produced a token (tried: {tried})")]
    Unavailable { tried: String },
    #[error("managed identity endpoint request failed: {0}")]
    ManagedIdentityTransport(#[source] reqwest::Error),
    #[error("managed identity endpoint returned an unusable payload: {0}")]
    ManagedIdentityPayload(String),
}

/// An opaque bearer token with a scoped lifetime.
///
/// The secret is never exposed by `Debug` and is wiped when the token leaves
/// scope, so acquire/use/drop forms the release-on-all-exit-paths pair the
/// samples rely on.
pub struct AccessToken {
    token: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(token: SecretString, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    pub fn secret(&self) -> &str {
        self.token.expose_secret()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= Utc::now())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Drop for AccessToken {
    fn drop(&mut self) {
        debug!(event_name = "credential.token.released", "access token released");
    }
}

/// Supplies an authentication handle for the remote client. Acquisition may
/// block on network or identity resolution and may fail; failures propagate
/// and terminate startup, since a sample has no recovery path.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn acquire(&self) -> Result<AccessToken, CredentialError>;
}

/// Chained developer credential: tries explicit environment tokens in order.
///
/// A stand-in for the hosted SDK's default chain. Locally an operator exports
/// `AZURE_ACCESS_TOKEN` (for example from `az account get-access-token`).
#[derive(Debug, Default)]
pub struct DefaultCredential;

impl DefaultCredential {
    const SOURCES: [&'static str; 2] = ["AZURE_ACCESS_TOKEN", "STAYFINDER_ACCESS_TOKEN"];
}

#[async_trait]
impl CredentialProvider for DefaultCredential {
    async fn acquire(&self) -> Result<AccessToken, CredentialError> {
        for source in Self::SOURCES {
            if let Ok(value) = env::var(source) {
                if !value.trim().is_empty() {
                    debug!(event_name = "credential.default.acquired", source, "token acquired");
                    return Ok(AccessToken::new(value.into(), None));
                }
            }
        }

        Err(CredentialError::Unavailable { tried: Self::SOURCES.join(", ") })
    }
}

/// Token acquisition through the platform's managed-identity endpoint,
/// selected when `MSI_ENDPOINT` is present in the environment.
pub struct ManagedIdentityCredential {
    msi_endpoint: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MsiTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn new(msi_endpoint: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { msi_endpoint, http }
    }

    pub fn from_env() -> Option<Self> {
        let msi_endpoint = env::var("MSI_ENDPOINT").ok().filter(|value| !value.trim().is_empty())?;
        Some(Self::new(msi_endpoint))
    }
}

#[async_trait]
impl CredentialProvider for ManagedIdentityCredential {
    async fn acquire(&self) -> Result<AccessToken, CredentialError> {
        let response = self
            .http
            .get(&self.msi_endpoint)
            .header("Metadata", "true")
            .query(&[("resource", TOKEN_RESOURCE), ("api-version", MSI_API_VERSION)])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(CredentialError::ManagedIdentityTransport)?;

        let payload: MsiTokenResponse = response
            .json()
            .await
            .map_err(|error| CredentialError::ManagedIdentityPayload(error.to_string()))?;

        if payload.access_token.trim().is_empty() {
            return Err(CredentialError::ManagedIdentityPayload(
                "empty access_token field".to_string(),
            ));
        }

        let expires_at = payload
            .expires_on
            .as_deref()
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

        debug!(event_name = "credential.msi.acquired", "token acquired from managed identity");
        Ok(AccessToken::new(payload.access_token.into(), expires_at))
    }
}

/// Builds the provider the configured strategy names. Managed identity falls
/// back to the default chain when `MSI_ENDPOINT` is missing, mirroring how the
/// hosted runtime only injects the endpoint inside the platform.
pub fn select_provider(strategy: CredentialStrategy) -> Box<dyn CredentialProvider> {
    match strategy {
        CredentialStrategy::ManagedIdentity => match ManagedIdentityCredential::from_env() {
            Some(provider) => Box::new(provider),
            None => Box::new(DefaultCredential),
        },
        CredentialStrategy::DefaultChain => Box::new(DefaultCredential),
    }
}
