//! Verification of Azure AD (OIDC) bearer tokens.
//!
//! The tenant is read from the unverified token, its signing certificates are
//! discovered through OpenID metadata, and the token is checked against each
//! certificate in published order so that keys in a rotation window still verify.

pub mod certificate;
pub mod claims;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extractors;
pub mod jwks;
pub mod token;
pub mod verifier;

pub use certificate::{normalize_certificate, Certificate};
pub use claims::DecodedClaims;
pub use config::AadConfig;
pub use discovery::{KeyDiscoveryClient, OpenIdConfig};
pub use error::{
    AuthError, AuthResult, CertificateError, DiscoveryError, MalformedTokenError,
    VerificationError,
};
pub use extractors::AadAuthContext;
pub use jwks::{SigningCertificate, SigningKeySet};
pub use token::TenantId;
pub use verifier::{TokenVerifier, VerificationOptions};
