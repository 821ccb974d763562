use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jsonwebtoken::DecodingKey;

use crate::error::CertificateError;

pub const BEGIN_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";
pub const END_CERTIFICATE: &str = "-----END CERTIFICATE-----";
const PEM_LINE_WIDTH: usize = 64;

/// PEM encoded X.509 certificate built from one `x5c` entry.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    pem: String,
}

impl Certificate {
    pub fn from_x5c(raw: &str) -> Result<Self, CertificateError> {
        normalize_certificate(raw).map(|pem| Self { pem })
    }

    pub fn as_pem(&self) -> &str {
        &self.pem
    }

    pub fn decoding_key(&self) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
        DecodingKey::from_rsa_pem(self.pem.as_bytes())
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("pem_len", &self.pem.len())
            .finish()
    }
}

/// Re-frame a bare base64 certificate as a strict PEM block.
///
/// Markers and whitespace left over from upstream formatting are dropped, so the
/// output is identical no matter how the input was wrapped. The body is written
/// in 64 character lines and every line, including the end marker, ends in `\n`.
pub fn normalize_certificate(raw: &str) -> Result<String, CertificateError> {
    let body: String = raw
        .replace(BEGIN_CERTIFICATE, "")
        .replace(END_CERTIFICATE, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if body.is_empty() {
        return Err(CertificateError::Empty);
    }
    STANDARD
        .decode(&body)
        .map_err(|err| CertificateError::Encoding(err.to_string()))?;

    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    pem.push_str(BEGIN_CERTIFICATE);
    pem.push('\n');
    // base64 is ASCII, so byte chunks never split a character
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(END_CERTIFICATE);
    pem.push('\n');
    Ok(pem)
}
