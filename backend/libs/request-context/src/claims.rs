//! Identity claims extracted from a validated token

use serde::{Deserialize, Serialize};

/// Identity information of the authenticated caller
///
/// Which JWT fields feed these values is decided by the authenticator's claims
/// mapping. Fields that the mapping does not cover, or that are absent from the
/// token, stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub tenant_id: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// True when the caller holds at least one of `roles`
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims {
            user_id: "user-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            roles: vec!["admin".to_string(), "viewer".to_string()],
            permissions: vec!["posts:read".to_string()],
        }
    }

    #[test]
    fn test_default_is_empty() {
        let claims = Claims::default();
        assert!(claims.user_id.is_empty());
        assert!(claims.tenant_id.is_empty());
        assert!(claims.roles.is_empty());
        assert!(claims.permissions.is_empty());
    }

    #[test]
    fn test_role_and_permission_helpers() {
        let claims = claims();
        assert!(claims.has_role("admin"));
        assert!(!claims.has_role("owner"));
        assert!(claims.has_any_role(&["owner", "viewer"]));
        assert!(!claims.has_any_role(&["owner"]));
        assert!(claims.has_permission("posts:read"));
        assert!(!claims.has_permission("posts:write"));
    }

    #[test]
    fn test_serializes_snake_case_fields() {
        let json = serde_json::to_value(claims()).unwrap();
        assert_eq!(json["user_id"], "user-1");
        assert_eq!(json["roles"][1], "viewer");
    }
}
