use serde::Deserialize;

use crate::certificate::Certificate;
use crate::error::CertificateError;

/// JSON Web Key Set as published at an Azure AD `jwks_uri`.
#[derive(Debug, Clone, Deserialize)]
pub struct SigningKeySet {
    pub keys: Vec<JwkEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwkEntry {
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub kty: Option<String>,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    #[serde(default)]
    pub x5c: Vec<String>,
}

impl JwkEntry {
    /// Entries that say nothing about their type or use are assumed to be RSA
    /// signing keys, which is all Azure AD publishes.
    fn is_rsa_signing_key(&self) -> bool {
        self.kty.as_deref().map_or(true, |kty| kty == "RSA")
            && self.key_use.as_deref().map_or(true, |key_use| key_use == "sig")
    }
}

/// One `x5c` entry, in the position it was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningCertificate {
    Usable(Certificate),
    /// The entry could not be normalized. It still occupies its slot so that
    /// verification stops here instead of skipping to later keys.
    Unusable {
        kid: String,
        index: usize,
        error: CertificateError,
    },
}

impl From<Certificate> for SigningCertificate {
    fn from(certificate: Certificate) -> Self {
        Self::Usable(certificate)
    }
}

impl SigningKeySet {
    /// Candidate certificates in published order: key order, then chain order.
    ///
    /// With a `kid` filter only matching entries contribute. No match is an empty
    /// list rather than an error. Keys that are not RSA signing keys are skipped.
    pub fn certificates(&self, kid_filter: Option<&str>) -> Vec<SigningCertificate> {
        let mut certificates = Vec::new();
        for key in &self.keys {
            if let Some(wanted) = kid_filter {
                if key.kid.as_deref() != Some(wanted) {
                    continue;
                }
            }
            if !key.is_rsa_signing_key() {
                continue;
            }

            for (index, raw) in key.x5c.iter().enumerate() {
                let candidate = match Certificate::from_x5c(raw) {
                    Ok(certificate) => SigningCertificate::Usable(certificate),
                    Err(error) => SigningCertificate::Unusable {
                        kid: key.kid.clone().unwrap_or_default(),
                        index,
                        error,
                    },
                };
                certificates.push(candidate);
            }
        }
        certificates
    }
}
