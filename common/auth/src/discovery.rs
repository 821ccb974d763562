//! Tenant key discovery against Azure AD.
//!
//! Every call goes to the network. Keys rotate on Azure's schedule, so nothing
//! fetched here outlives the verification that asked for it.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::AadConfig;
use crate::error::{AuthError, AuthResult, DiscoveryError};
use crate::jwks::{SigningCertificate, SigningKeySet};
use crate::token::TenantId;

/// Tenant OpenID Connect metadata. Only the key set location is used; the rest
/// of the document is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenIdConfig {
    pub jwks_uri: String,
}

#[derive(Clone)]
pub struct KeyDiscoveryClient {
    client: Client,
    authority_host: String,
    timeout: Duration,
}

impl KeyDiscoveryClient {
    pub fn new(config: &AadConfig) -> AuthResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|err| AuthError::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &AadConfig) -> Self {
        Self {
            client,
            authority_host: config.authority_host.trim_end_matches('/').to_string(),
            timeout: config.http_timeout,
        }
    }

    pub fn openid_config_url(&self, tenant: &TenantId) -> Result<Url, DiscoveryError> {
        let raw = format!(
            "{}/{}/.well-known/openid-configuration",
            self.authority_host, tenant
        );
        if !is_path_safe(tenant.as_str()) {
            return Err(DiscoveryError::InvalidUrl {
                url: raw,
                reason: "tenant id contains characters not allowed in a path segment".to_string(),
            });
        }
        parse_url(&raw)
    }

    /// GET the tenant's `.well-known/openid-configuration` document.
    pub async fn fetch_openid_config(
        &self,
        tenant: &TenantId,
        timeout: Option<Duration>,
    ) -> Result<OpenIdConfig, DiscoveryError> {
        let url = self.openid_config_url(tenant)?;
        debug!(tenant = %tenant, url = %url, "fetching OpenID configuration");
        self.get_json(url, timeout).await
    }

    /// GET the key set at `jwks_uri` and turn its `x5c` entries into candidate
    /// certificates. Entries that fail normalization are kept in place rather
    /// than failing the fetch.
    pub async fn fetch_signing_certificates(
        &self,
        jwks_uri: &str,
        kid_filter: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Vec<SigningCertificate>, DiscoveryError> {
        let url = parse_url(jwks_uri)?;
        let key_set: SigningKeySet = self.get_json(url, timeout).await?;
        let certificates = key_set.certificates(kid_filter);
        debug!(
            jwks_uri,
            kid = kid_filter.unwrap_or("*"),
            keys = key_set.keys.len(),
            certificates = certificates.len(),
            "fetched signing certificates"
        );
        Ok(certificates)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        timeout: Option<Duration>,
    ) -> Result<T, DiscoveryError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .timeout(timeout.unwrap_or(self.timeout))
            .send()
            .await
            .map_err(|err| DiscoveryError::from_reqwest(url.as_str(), err))?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| DiscoveryError::from_reqwest(url.as_str(), err))
    }
}

fn parse_url(raw: &str) -> Result<Url, DiscoveryError> {
    Url::parse(raw).map_err(|err| DiscoveryError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })
}

fn is_path_safe(segment: &str) -> bool {
    !segment.starts_with('.')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}
