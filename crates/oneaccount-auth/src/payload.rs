//! Callback request parsing.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

/// Identifier field posted by the widget and sent back by the client.
pub const UUID_FIELD: &str = "uuid";

/// Protocol metadata never stored with the payload.
pub const RESERVED_FIELDS: &[&str] = &[UUID_FIELD, "externalId"];

const BEARER_PREFIX: &str = "BEARER ";

/// Token from an `Authorization: BEARER <token>` header.
///
/// The prefix is matched case-insensitively. A missing header, another
/// scheme, or an empty token all yield `None`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let prefix = value.get(..BEARER_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    let token = &value[BEARER_PREFIX.len()..];
    (!token.is_empty()).then_some(token)
}

/// Split a widget callback body into its identifier and the payload to stage.
///
/// The body must be a JSON object with a non-empty string `uuid`. Reserved
/// fields are removed and the rest is re-serialized.
pub fn stage_payload(body: &[u8]) -> AuthResult<(String, Vec<u8>)> {
    let mut object: Map<String, Value> =
        serde_json::from_slice(body).map_err(|e| AuthError::malformed_body(e.to_string()))?;

    let uuid = match object.get(UUID_FIELD) {
        None => return Err(AuthError::validation(UUID_FIELD, "is required")),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(_) => return Err(AuthError::validation(UUID_FIELD, "must be a non-empty string")),
    };

    for field in RESERVED_FIELDS {
        object.remove(*field);
    }

    let payload = serde_json::to_vec(&object)?;
    Ok((uuid, payload))
}

/// Identifier carried in a JSON object body, if any.
#[must_use]
pub fn identifier_from_body(body: &[u8]) -> Option<String> {
    let object: Map<String, Value> = serde_json::from_slice(body).ok()?;
    match object.get(UUID_FIELD)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("BEARER abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer abc.def")), Some("abc.def"));
    }

    #[test]
    fn test_bearer_token_absent() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("BEARER ")), None);
        assert_eq!(bearer_token(&headers("BEAR")), None);
    }

    #[test]
    fn test_stage_payload_strips_reserved_fields() {
        let (uuid, payload) =
            stage_payload(br#"{"uuid":"abc","externalId":"x","name":"bob"}"#).unwrap();
        assert_eq!(uuid, "abc");

        let value: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value, serde_json::json!({"name": "bob"}));
    }

    #[test]
    fn test_stage_payload_only_reserved_fields() {
        let (_, payload) = stage_payload(br#"{"uuid":"abc"}"#).unwrap();
        assert_eq!(payload, b"{}");
    }

    #[test]
    fn test_stage_payload_rejects_bad_uuid() {
        for body in [
            r#"{"name":"bob"}"#,
            r#"{"uuid":""}"#,
            r#"{"uuid":42}"#,
            r#"{"uuid":null}"#,
        ] {
            let err = stage_payload(body.as_bytes()).unwrap_err();
            assert!(matches!(err, AuthError::Validation { .. }), "body {body}");
        }
    }

    #[test]
    fn test_stage_payload_rejects_non_object() {
        for body in ["", "not json", "[1,2]", r#""uuid""#] {
            let err = stage_payload(body.as_bytes()).unwrap_err();
            assert!(matches!(err, AuthError::MalformedBody(_)), "body {body:?}");
        }
    }

    #[test]
    fn test_identifier_from_body() {
        assert_eq!(identifier_from_body(br#"{"uuid":"abc"}"#).as_deref(), Some("abc"));
        assert_eq!(identifier_from_body(br#"{"uuid":""}"#), None);
        assert_eq!(identifier_from_body(b""), None);
        assert_eq!(identifier_from_body(br#"{"id":"abc"}"#), None);
    }
}
