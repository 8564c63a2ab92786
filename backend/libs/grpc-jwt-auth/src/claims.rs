//! Mapping of JWT payload fields onto [`Claims`]

use crate::ClaimsMapping;
use request_context::Claims;
use serde_json::{Map, Value};

/// Resolve a dot-separated `path` inside the payload
///
/// Returns `None` when any segment is missing or an intermediate value is
/// not an object.
pub fn resolve_claim<'a>(payload: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    let mut segments = path.split('.');
    let mut current = payload.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Read a claim as a list of strings
///
/// Arrays keep their string elements, strings are split on whitespace
/// (OAuth `scope` style). Anything else is `None`.
pub fn to_string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        ),
        Value::String(s) => Some(s.split_whitespace().map(str::to_string).collect()),
        _ => None,
    }
}

/// Build [`Claims`] from a verified payload
pub fn extract_claims(payload: &Map<String, Value>, mapping: &ClaimsMapping) -> Claims {
    let string = |path: &str| {
        resolve_claim(payload, path)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    };
    let list = |path: &str| {
        resolve_claim(payload, path)
            .and_then(to_string_list)
            .unwrap_or_default()
    };

    Claims {
        user_id: string(&mapping.user_id),
        tenant_id: string(&mapping.tenant_id),
        roles: list(&mapping.roles),
        permissions: list(&mapping.permissions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    #[test]
    fn test_resolve_nested_path() {
        let p = payload(json!({
            "sub": "u1",
            "realm_access": {"roles": ["admin"], "meta": {"level": 3}}
        }));

        assert_eq!(resolve_claim(&p, "sub"), Some(&json!("u1")));
        assert_eq!(resolve_claim(&p, "realm_access.roles"), Some(&json!(["admin"])));
        assert_eq!(resolve_claim(&p, "realm_access.meta.level"), Some(&json!(3)));
        assert_eq!(resolve_claim(&p, "realm_access.missing"), None);
        assert_eq!(resolve_claim(&p, "sub.inner"), None);
        assert_eq!(resolve_claim(&p, ""), None);
    }

    #[test]
    fn test_to_string_list() {
        assert_eq!(
            to_string_list(&json!(["a", 1, "b", null])),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            to_string_list(&json!("read  write\tdelete")),
            Some(vec!["read".to_string(), "write".to_string(), "delete".to_string()])
        );
        assert_eq!(to_string_list(&json!({"a": 1})), None);
        assert_eq!(to_string_list(&json!(42)), None);
    }

    #[test]
    fn test_extract_with_keycloak_style_mapping() {
        let p = payload(json!({
            "sub": "user-1",
            "org": {"id": "tenant-9"},
            "realm_access": {"roles": ["admin", "viewer"]},
            "scope": "posts:read posts:write"
        }));
        let mapping = ClaimsMapping {
            user_id: "sub".to_string(),
            tenant_id: "org.id".to_string(),
            roles: "realm_access.roles".to_string(),
            permissions: "scope".to_string(),
        };

        let claims = extract_claims(&p, &mapping);
        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.tenant_id, "tenant-9");
        assert_eq!(claims.roles, vec!["admin", "viewer"]);
        assert_eq!(claims.permissions, vec!["posts:read", "posts:write"]);
    }

    #[test]
    fn test_non_string_values_are_ignored() {
        let p = payload(json!({"sub": 12345, "tenant": ["t1"], "roles": {"admin": true}}));
        let mapping = ClaimsMapping {
            tenant_id: "tenant".to_string(),
            roles: "roles".to_string(),
            ..Default::default()
        };

        let claims = extract_claims(&p, &mapping);
        assert_eq!(claims, Claims::default());
    }
}
