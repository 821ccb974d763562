use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::claims::DecodedClaims;
use crate::config::AadConfig;
use crate::discovery::KeyDiscoveryClient;
use crate::error::{AuthError, AuthResult, DiscoveryError, VerificationError};
use crate::jwks::SigningCertificate;
use crate::token::{self, TenantId};

/// Per-call knobs. Algorithm (RS256) and issuer are not among them: the verifier
/// always enforces both.
#[derive(Debug, Clone, Default)]
pub struct VerificationOptions {
    /// Only try certificates published under this key id.
    pub kid: Option<String>,
    /// Accepted `aud` values. Audience is not checked when empty.
    pub audience: Vec<String>,
    /// Overrides the configured clock leeway.
    pub leeway_seconds: Option<u64>,
    /// Overrides the configured HTTP timeout for both discovery requests.
    pub timeout: Option<Duration>,
}

impl VerificationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience.push(audience.into());
        self
    }

    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway_seconds = Some(seconds);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of trying one candidate certificate.
#[derive(Debug)]
pub enum Attempt<T, E> {
    Verified(T),
    /// The certificate did not sign this token; the next one may have.
    Mismatch(E),
    /// The token itself was rejected; trying more certificates would hide why.
    Fatal(E),
}

#[derive(Debug)]
pub enum SearchError<E> {
    Empty,
    Exhausted { attempts: usize, last: E },
    Fatal { index: usize, error: E },
}

/// Try candidates in order until one verifies or one fails for a reason other
/// than a signature mismatch.
pub fn first_verified<C, T, E, F>(candidates: &[C], mut attempt: F) -> Result<T, SearchError<E>>
where
    F: FnMut(usize, &C) -> Attempt<T, E>,
{
    let mut last_mismatch = None;
    for (index, candidate) in candidates.iter().enumerate() {
        match attempt(index, candidate) {
            Attempt::Verified(value) => return Ok(value),
            Attempt::Mismatch(error) => last_mismatch = Some(error),
            Attempt::Fatal(error) => return Err(SearchError::Fatal { index, error }),
        }
    }

    match last_mismatch {
        Some(last) => Err(SearchError::Exhausted {
            attempts: candidates.len(),
            last,
        }),
        None => Err(SearchError::Empty),
    }
}

/// Verifies Azure AD access tokens against keys fetched fresh for every call.
#[derive(Clone)]
pub struct TokenVerifier {
    config: AadConfig,
    discovery: KeyDiscoveryClient,
}

impl TokenVerifier {
    pub fn new(config: AadConfig) -> AuthResult<Self> {
        let discovery = KeyDiscoveryClient::new(&config)?;
        Ok(Self { config, discovery })
    }

    pub fn with_discovery(config: AadConfig, discovery: KeyDiscoveryClient) -> Self {
        Self { config, discovery }
    }

    pub fn config(&self) -> &AadConfig {
        &self.config
    }

    pub fn discovery(&self) -> &KeyDiscoveryClient {
        &self.discovery
    }

    pub async fn verify(
        &self,
        token: &str,
        options: Option<&VerificationOptions>,
    ) -> AuthResult<DecodedClaims> {
        let default_options = VerificationOptions::default();
        let options = options.unwrap_or(&default_options);
        let tenant = token::tenant_id(token)?;
        let certificates = self.discover(&tenant, options).await?;
        self.verify_against(token, &tenant, &certificates, options)
    }

    /// Like [`TokenVerifier::verify`], but gives up on discovery as soon as
    /// `cancel` fires.
    pub async fn verify_with_cancellation(
        &self,
        token: &str,
        options: Option<&VerificationOptions>,
        cancel: &CancellationToken,
    ) -> AuthResult<DecodedClaims> {
        let default_options = VerificationOptions::default();
        let options = options.unwrap_or(&default_options);
        let tenant = token::tenant_id(token)?;

        let certificates = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(tenant = %tenant, "verification cancelled during key discovery");
                return Err(DiscoveryError::Cancelled.into());
            }
            result = self.discover(&tenant, options) => result?,
        };
        self.verify_against(token, &tenant, &certificates, options)
    }

    async fn discover(
        &self,
        tenant: &TenantId,
        options: &VerificationOptions,
    ) -> AuthResult<Vec<SigningCertificate>> {
        self.fetch_certificates(tenant, options).await.map_err(|err| {
            warn!(tenant = %tenant, error = %err, "Azure AD key discovery failed");
            AuthError::from(err)
        })
    }

    async fn fetch_certificates(
        &self,
        tenant: &TenantId,
        options: &VerificationOptions,
    ) -> Result<Vec<SigningCertificate>, DiscoveryError> {
        let openid = self
            .discovery
            .fetch_openid_config(tenant, options.timeout)
            .await?;
        self.discovery
            .fetch_signing_certificates(&openid.jwks_uri, options.kid.as_deref(), options.timeout)
            .await
    }

    /// Check `token` against already discovered certificates, in order.
    pub fn verify_against(
        &self,
        token: &str,
        tenant: &TenantId,
        certificates: &[SigningCertificate],
        options: &VerificationOptions,
    ) -> AuthResult<DecodedClaims> {
        let validation = self.validation(tenant, options);

        let outcome = first_verified(certificates, |index, candidate| {
            let certificate = match candidate {
                SigningCertificate::Usable(certificate) => certificate,
                SigningCertificate::Unusable { kid, index, error } => {
                    return Attempt::Fatal(VerificationError::MalformedCertificate {
                        kid: kid.clone(),
                        index: *index,
                        source: error.clone(),
                    })
                }
            };
            let key = match certificate.decoding_key() {
                Ok(key) => key,
                Err(source) => {
                    return Attempt::Fatal(VerificationError::InvalidCertificate { index, source })
                }
            };
            match decode::<Map<String, Value>>(token, &key, &validation) {
                Ok(data) => Attempt::Verified(data.claims),
                Err(source) if matches!(source.kind(), ErrorKind::InvalidSignature) => {
                    debug!(tenant = %tenant, index, "certificate did not match token signature");
                    Attempt::Mismatch(VerificationError::SignatureMismatch {
                        attempts: index + 1,
                        source,
                    })
                }
                Err(err) => Attempt::Fatal(VerificationError::Rejected(err)),
            }
        });

        match outcome {
            Ok(claims) => {
                debug!(tenant = %tenant, "verified Azure AD token");
                Ok(DecodedClaims::new(claims))
            }
            Err(SearchError::Empty) => Err(VerificationError::NoSigningKey {
                kid: options.kid.clone(),
            }
            .into()),
            Err(SearchError::Exhausted { attempts, last }) => {
                debug!(tenant = %tenant, attempts, "no certificate matched token signature");
                Err(last.into())
            }
            Err(SearchError::Fatal { index, error }) => {
                debug!(tenant = %tenant, index, error = %error, "token rejected");
                Err(error.into())
            }
        }
    }

    fn validation(&self, tenant: &TenantId, options: &VerificationOptions) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.expected_issuer(tenant.as_str())]);
        // `exp` is checked whenever it is present but a token may omit it.
        validation.set_required_spec_claims(&["iss"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = options.leeway_seconds.unwrap_or(self.config.leeway_seconds);
        if options.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(options.audience.as_slice());
        }
        validation
    }
}
