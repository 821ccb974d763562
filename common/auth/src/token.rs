use std::fmt;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::{Map, Value};

use crate::error::MalformedTokenError;

const JWT_SEGMENTS: usize = 3;

/// Azure AD directory a token was issued for, read from its `tid` claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decode the payload segment without checking the signature.
pub fn unverified_payload(token: &str) -> Result<Map<String, Value>, MalformedTokenError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != JWT_SEGMENTS {
        return Err(MalformedTokenError::SegmentCount(segments.len()));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(segments[1])
        .or_else(|_| URL_SAFE.decode(segments[1]))
        .map_err(|err| MalformedTokenError::PayloadEncoding(err.to_string()))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(MalformedTokenError::PayloadJson(format!(
            "expected object, found {}",
            json_kind(&other)
        ))),
        Err(err) => Err(MalformedTokenError::PayloadJson(err.to_string())),
    }
}

/// Read the tenant the token claims to come from. Nothing here is trusted yet.
pub fn tenant_id(token: &str) -> Result<TenantId, MalformedTokenError> {
    let payload = unverified_payload(token)?;
    match payload.get("tid").and_then(Value::as_str) {
        Some(tid) if tid.trim().is_empty() => Err(MalformedTokenError::MissingTenant),
        Some(tid) if tid.trim() != tid => Err(MalformedTokenError::PaddedTenant),
        Some(tid) => Ok(TenantId(tid.to_string())),
        None => Err(MalformedTokenError::MissingTenant),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_with_payload(payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn extracts_tenant_id() {
        let token = token_with_payload(&json!({
            "tid": "11111111-1111-1111-1111-111111111111",
            "sub": "user"
        }));
        let tenant = tenant_id(&token).expect("tenant");
        assert_eq!(tenant.as_str(), "11111111-1111-1111-1111-111111111111");
        assert_eq!(tenant.to_string(), tenant.as_str());
    }

    #[test]
    fn accepts_padded_payload() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
        let body = URL_SAFE.encode(json!({ "tid": "t1" }).to_string());
        let token = format!("{header}.{body}.sig");
        assert_eq!(tenant_id(&token).expect("tenant").as_str(), "t1");
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert_eq!(
            tenant_id("abc.def"),
            Err(MalformedTokenError::SegmentCount(2))
        );
        assert_eq!(
            tenant_id("not-a-token"),
            Err(MalformedTokenError::SegmentCount(1))
        );
        assert_eq!(
            tenant_id("a.b.c.d"),
            Err(MalformedTokenError::SegmentCount(4))
        );
    }

    #[test]
    fn rejects_undecodable_payload() {
        let err = tenant_id("aGVhZGVy.***.c2ln").expect_err("should reject");
        assert!(matches!(err, MalformedTokenError::PayloadEncoding(_)));

        let not_json = URL_SAFE_NO_PAD.encode("tid=abc");
        let err = tenant_id(&format!("aGVhZGVy.{not_json}.c2ln")).expect_err("should reject");
        assert!(matches!(err, MalformedTokenError::PayloadJson(_)));
    }

    #[test]
    fn rejects_non_object_payload() {
        let token = token_with_payload(&json!(["tid"]));
        let err = tenant_id(&token).expect_err("should reject");
        assert_eq!(
            err,
            MalformedTokenError::PayloadJson("expected object, found array".to_string())
        );
    }

    #[test]
    fn rejects_missing_or_empty_tenant() {
        for payload in [
            json!({ "sub": "user" }),
            json!({ "tid": "" }),
            json!({ "tid": "   " }),
            json!({ "tid": 42 }),
        ] {
            let token = token_with_payload(&payload);
            assert_eq!(tenant_id(&token), Err(MalformedTokenError::MissingTenant));
        }
    }

    #[test]
    fn padded_tenant_is_not_trimmed() {
        for tid in [" 11111111-1111-1111-1111-111111111111", "t1\n", "\tt1 "] {
            let token = token_with_payload(&json!({ "tid": tid }));
            assert_eq!(tenant_id(&token), Err(MalformedTokenError::PaddedTenant), "{tid:?}");
        }
    }
}
