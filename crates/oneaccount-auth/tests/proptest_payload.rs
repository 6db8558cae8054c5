//! Property-based tests for callback payload handling.

use proptest::prelude::*;
use serde_json::{Map, Value};

use oneaccount_auth::error::AuthError;
use oneaccount_auth::payload::{RESERVED_FIELDS, identifier_from_body, stage_payload};

/// Generate an arbitrary JSON scalar.
fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[A-Za-z0-9 ]{0,20}".prop_map(Value::from),
        Just(Value::Null),
    ]
}

/// Generate user fields, possibly colliding with reserved names.
fn arb_fields() -> impl Strategy<Value = Map<String, Value>> {
    proptest::collection::btree_map(
        prop_oneof!["[a-z]{1,8}", Just("externalId".to_string())],
        arb_scalar(),
        0..8,
    )
    .prop_map(|fields| fields.into_iter().filter(|(key, _)| key != "uuid").collect())
}

proptest! {
    /// Staged payload is the body minus reserved fields.
    #[test]
    fn reserved_fields_are_stripped(
        uuid in "[a-z0-9-]{1,36}",
        external_id in proptest::option::of("[a-z0-9]{1,12}"),
        fields in arb_fields(),
    ) {
        let mut body = fields.clone();
        body.insert("uuid".to_string(), Value::from(uuid.clone()));
        if let Some(id) = external_id {
            body.insert("externalId".to_string(), Value::from(id));
        }
        let raw = serde_json::to_vec(&body).expect("serialize");

        let (staged_uuid, payload) = stage_payload(&raw).expect("valid body");
        prop_assert_eq!(&staged_uuid, &uuid);

        let staged: Map<String, Value> = serde_json::from_slice(&payload).expect("payload is JSON");
        for field in RESERVED_FIELDS {
            prop_assert!(!staged.contains_key(*field));
        }

        let mut expected = fields;
        expected.remove("externalId");
        prop_assert_eq!(staged, expected);
    }

    /// Bodies without a string uuid never stage anything.
    #[test]
    fn non_string_uuid_is_rejected(uuid in arb_scalar().prop_filter("non-empty string", |v| {
        !matches!(v, Value::String(s) if !s.is_empty())
    })) {
        let body = serde_json::json!({ "uuid": uuid, "name": "bob" });
        let raw = serde_json::to_vec(&body).expect("serialize");
        let result = stage_payload(&raw);
        prop_assert!(matches!(result, Err(AuthError::Validation { .. })), "expected AuthError::Validation");
    }

    /// Identifier lookup in the body agrees with staging.
    #[test]
    fn body_identifier_matches_staged_uuid(uuid in "[a-z0-9-]{1,36}", fields in arb_fields()) {
        let mut body = fields;
        body.insert("uuid".to_string(), Value::from(uuid.clone()));
        let raw = serde_json::to_vec(&body).expect("serialize");

        prop_assert_eq!(identifier_from_body(&raw), Some(uuid));
    }
}
