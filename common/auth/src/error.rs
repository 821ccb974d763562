use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed token: {0}")]
    MalformedToken(#[from] MalformedTokenError),
    #[error("unable to verify token: {0}")]
    Verification(#[from] VerificationError),
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("invalid verifier configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// True when the failure came from reaching Azure AD rather than from the token itself.
    pub fn is_discovery_failure(&self) -> bool {
        matches!(
            self,
            AuthError::Verification(VerificationError::Discovery(_))
        )
    }
}

impl From<DiscoveryError> for AuthError {
    fn from(value: DiscoveryError) -> Self {
        Self::Verification(VerificationError::Discovery(value))
    }
}

/// The bearer token could not be read far enough to learn its tenant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedTokenError {
    #[error("expected 3 dot-separated segments, found {0}")]
    SegmentCount(usize),
    #[error("payload is not valid base64url: {0}")]
    PayloadEncoding(String),
    #[error("payload is not a JSON object: {0}")]
    PayloadJson(String),
    #[error("token has no tenant (tid) claim")]
    MissingTenant,
    #[error("tenant (tid) claim has surrounding whitespace")]
    PaddedTenant,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CertificateError {
    #[error("certificate body is empty")]
    Empty,
    #[error("certificate body is not base64: {0}")]
    Encoding(String),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid discovery URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("failed to parse response from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("key discovery was cancelled")]
    Cancelled,
}

impl DiscoveryError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if err.is_decode() {
            Self::Decode {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            Self::Request {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("signing keys unavailable: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("no signing key available{}", kid_suffix(.kid))]
    NoSigningKey { kid: Option<String> },
    #[error("invalid signature (tried {attempts} certificates)")]
    SignatureMismatch {
        attempts: usize,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
    #[error("x5c entry {index} of key '{kid}' is not a certificate: {source}")]
    MalformedCertificate {
        kid: String,
        index: usize,
        #[source]
        source: CertificateError,
    },
    #[error("certificate {index} could not be used as an RSA key: {source}")]
    InvalidCertificate {
        index: usize,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
    #[error("{0}")]
    Rejected(#[source] jsonwebtoken::errors::Error),
}

fn kid_suffix(kid: &Option<String>) -> String {
    match kid {
        Some(kid) => format!(" for kid '{kid}'"),
        None => String::new(),
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::MissingAuthorization | AuthError::InvalidAuthorization => {
                (StatusCode::UNAUTHORIZED, "AUTH_HEADER")
            }
            AuthError::MalformedToken(_) => (StatusCode::UNAUTHORIZED, "AUTH_TOKEN"),
            AuthError::Verification(VerificationError::Discovery(_)) => {
                (StatusCode::UNAUTHORIZED, "AUTH_DISCOVERY")
            }
            AuthError::Verification(_) => (StatusCode::UNAUTHORIZED, "AUTH_TOKEN"),
            AuthError::Config(_) => {
                warn!(error = %self, "rejecting request due to verifier misconfiguration");
                (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_CONFIG")
            }
        };

        let message = if status.is_server_error() {
            "internal error".to_string()
        } else {
            format!("Unauthorized: {self}")
        };
        (status, Json(ErrorBody { code, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_failures_are_distinguishable() {
        let err: AuthError = DiscoveryError::Status {
            url: "https://login.example/keys".to_string(),
            status: 503,
        }
        .into();
        assert!(err.is_discovery_failure());

        let err: AuthError = VerificationError::NoSigningKey { kid: None }.into();
        assert!(!err.is_discovery_failure());
    }

    #[test]
    fn no_signing_key_message_names_kid() {
        let err = VerificationError::NoSigningKey {
            kid: Some("abc".to_string()),
        };
        assert_eq!(err.to_string(), "no signing key available for kid 'abc'");
        let err = VerificationError::NoSigningKey { kid: None };
        assert_eq!(err.to_string(), "no signing key available");
    }

    #[test]
    fn token_failures_map_to_unauthorized() {
        let cases = vec![
            AuthError::MissingAuthorization,
            AuthError::MalformedToken(MalformedTokenError::MissingTenant),
            DiscoveryError::Cancelled.into(),
            VerificationError::NoSigningKey { kid: None }.into(),
        ];
        for err in cases {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn config_failures_map_to_internal_error() {
        let response = AuthError::Config("bad host".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
