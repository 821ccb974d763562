use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderValue};

use crate::claims::DecodedClaims;
use crate::error::{AuthError, AuthResult};
use crate::verifier::TokenVerifier;

/// Verified Azure AD claims for the bearer token on the current request.
#[derive(Debug, Clone)]
pub struct AadAuthContext {
    pub claims: DecodedClaims,
    pub token: String,
}

impl AadAuthContext {
    pub fn tenant_id(&self) -> Option<&str> {
        self.claims.tenant_id()
    }

    pub fn into_claims(self) -> DecodedClaims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AadAuthContext
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<TokenVerifier>::from_ref(state);

        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;

        let token = parse_bearer(header_value)?;
        let claims = verifier.verify(&token, None).await?;

        Ok(Self { claims, token })
    }
}

/// Token from an `Authorization: Bearer <token>` value. The scheme is matched
/// case-insensitively and exactly one token must follow it.
pub fn parse_bearer(value: &HeaderValue) -> AuthResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?;

    let mut parts = raw.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => {
            Ok(token.to_owned())
        }
        _ => Err(AuthError::InvalidAuthorization),
    }
}
