use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims of a token whose signature and issuer have been verified.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DecodedClaims {
    claims: Map<String, Value>,
}

impl DecodedClaims {
    pub(crate) fn new(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.str_claim("tid")
    }

    pub fn issuer(&self) -> Option<&str> {
        self.str_claim("iss")
    }

    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    /// Azure AD object id of the signed-in principal.
    pub fn object_id(&self) -> Option<&str> {
        self.str_claim("oid")
    }

    pub fn audience(&self) -> Vec<String> {
        match self
            .claims
            .get("aud")
            .cloned()
            .and_then(|value| serde_json::from_value::<AudienceRepr>(value).ok())
        {
            Some(AudienceRepr::Single(item)) => vec![item],
            Some(AudienceRepr::Many(items)) => items,
            None => Vec::new(),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_claim("exp")
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.timestamp_claim("nbf")
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_claim("iat")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.claims
    }

    fn str_claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    fn timestamp_claim(&self, name: &str) -> Option<DateTime<Utc>> {
        let seconds = self.claims.get(name).and_then(Value::as_i64)?;
        Utc.timestamp_opt(seconds, 0).single()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AudienceRepr {
    Single(String),
    Many(Vec<String>),
}
